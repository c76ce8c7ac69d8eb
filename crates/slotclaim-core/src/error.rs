use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid time of day: {value} (expected HH:MM)")]
    InvalidTime { value: String },

    #[error("Missing registrant identity: {field}")]
    MissingIdentity { field: &'static str },

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Short error code string used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::InvalidTime { .. } => "INVALID_TIME",
            CoreError::MissingIdentity { .. } => "MISSING_IDENTITY",
            CoreError::TomlEncode(_) => "TOML_ERROR",
            CoreError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
