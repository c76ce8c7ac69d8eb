//! Slot registration: drive the sign-up form in a fixed order.
//!
//! Steps run strictly in sequence and each one is bounded by the wait
//! timeout. An element that does not show up in time means the page is not
//! what we expect; the attempt ends there instead of retrying mid-form.

use std::sync::Arc;
use std::time::Duration;

use slotclaim_browser::{
    wait, BrowserContext, BrowserDriver, ElementRef, Locator, WaitPolicy,
};
use slotclaim_core::config::{BrowserConfig, PageProfile};
use slotclaim_core::{Identity, StopSignal};
use tracing::{debug, error, info, warn};

use crate::error::{RegistrationError, Step};

pub type RegistrationResult = Result<(), RegistrationError>;

/// Locators for the form, built from the configured page profile.
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub signup_buttons: Locator,
    pub confirm_button: Locator,
    pub first_name: Locator,
    pub last_name: Locator,
    pub email: Locator,
    pub submit: Locator,
}

impl From<&PageProfile> for SignupForm {
    fn from(page: &PageProfile) -> Self {
        Self {
            signup_buttons: Locator::xpath(&page.signup_button_xpath),
            confirm_button: Locator::xpath(&page.confirm_button_xpath),
            first_name: Locator::id(&page.first_name_id),
            last_name: Locator::id(&page.last_name_id),
            email: Locator::id(&page.email_id),
            submit: Locator::name(&page.submit_name),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    wait: WaitPolicy,
    settle: Duration,
    visible_pause: Duration,
}

pub struct SlotRegistrar {
    driver: Arc<dyn BrowserDriver>,
    form: SignupForm,
    timing: Timing,
}

impl SlotRegistrar {
    pub fn new(driver: Arc<dyn BrowserDriver>, page: &PageProfile, browser: &BrowserConfig) -> Self {
        Self {
            driver,
            form: SignupForm::from(page),
            timing: Timing {
                wait: WaitPolicy::new(browser.wait_timeout()),
                settle: browser.settle(),
                visible_pause: browser.visible_pause(),
            },
        }
    }

    /// Claim one slot, reporting success as a boolean.
    ///
    /// Any failure that leaves the session unrecoverable (slots full, page
    /// changed, form half filled) raises `stop`.
    pub async fn register_for_slot(
        &self,
        signup_url: &str,
        identity: &Identity,
        headless: bool,
        stop: &StopSignal,
    ) -> bool {
        match self.register(signup_url, identity, headless).await {
            Ok(()) => true,
            Err(e) => {
                error!(%signup_url, "registration failed: {e}");
                if e.halts_session() {
                    stop.set("registration failed");
                }
                false
            }
        }
    }

    /// Typed variant of [`SlotRegistrar::register_for_slot`]; never touches the stop signal.
    pub async fn register(&self, signup_url: &str, identity: &Identity, headless: bool) -> RegistrationResult {
        info!(email = %identity.email, "starting registration");
        let ctx = self
            .driver
            .open(headless)
            .await
            .map_err(RegistrationError::Setup)?;

        if !headless {
            if let Err(e) = ctx.maximize().await {
                debug!("could not maximise window: {e}");
            }
        }

        let result = self.fill_form(ctx.as_ref(), signup_url, identity).await;

        if !headless {
            // let an observer see where the attempt ended
            tokio::time::sleep(self.timing.visible_pause).await;
        }
        if let Err(e) = ctx.close().await {
            warn!("error closing browser after registration: {e}");
        }
        result
    }

    async fn fill_form(
        &self,
        ctx: &dyn BrowserContext,
        signup_url: &str,
        identity: &Identity,
    ) -> RegistrationResult {
        let policy = self.timing.wait;

        info!(%signup_url, "navigating to signup page");
        ctx.navigate(signup_url)
            .await
            .map_err(RegistrationError::at(Step::Navigate))?;

        info!("clicking initial signup button");
        let buttons = wait::presence_of_all(ctx, &self.form.signup_buttons, policy)
            .await
            .map_err(RegistrationError::at(Step::SignupButton))?;
        if !self.click_first_available(ctx, &buttons, policy).await {
            return Err(RegistrationError::SlotsExhausted {
                candidates: buttons.len(),
            });
        }

        info!("clicking confirmation button");
        let confirm = wait::clickable(ctx, &self.form.confirm_button, policy)
            .await
            .map_err(RegistrationError::at(Step::Confirm))?;
        ctx.click(&confirm)
            .await
            .map_err(RegistrationError::at(Step::Confirm))?;

        info!("filling registration form");
        let fields = [
            (&self.form.first_name, identity.first_name.as_str(), Step::FirstName),
            (&self.form.last_name, identity.last_name.as_str(), Step::LastName),
            (&self.form.email, identity.email.as_str(), Step::Email),
        ];
        for (locator, value, step) in fields {
            fill_field(ctx, locator, value, policy)
                .await
                .map_err(RegistrationError::at(step))?;
        }

        info!("submitting registration form");
        let submit = wait::clickable(ctx, &self.form.submit, policy)
            .await
            .map_err(RegistrationError::at(Step::Submit))?;
        ctx.click(&submit)
            .await
            .map_err(RegistrationError::at(Step::Submit))?;

        // No confirmation page is checked; reaching here counts as success.
        tokio::time::sleep(self.timing.settle).await;
        info!(email = %identity.email, "registered for slot");
        Ok(())
    }

    /// Click the first enabled, visible button. Some buttons stay on the page
    /// disabled once their slot is taken.
    async fn click_first_available(
        &self,
        ctx: &dyn BrowserContext,
        buttons: &[ElementRef],
        policy: WaitPolicy,
    ) -> bool {
        for button in buttons {
            let usable = matches!(ctx.is_enabled(button).await, Ok(true))
                && matches!(ctx.is_displayed(button).await, Ok(true));
            if !usable {
                continue;
            }
            debug!(element = button.as_str(), "found enabled signup button");
            let clicked = match wait::element_clickable(ctx, button, policy).await {
                Ok(()) => ctx.click(button).await,
                Err(e) => Err(e),
            };
            match clicked {
                Ok(()) => return true,
                Err(e) => debug!("button not clickable, trying next one: {e}"),
            }
        }
        false
    }
}

async fn fill_field(
    ctx: &dyn BrowserContext,
    locator: &Locator,
    value: &str,
    policy: WaitPolicy,
) -> slotclaim_browser::Result<()> {
    let field = wait::presence_of(ctx, locator, policy).await?;
    ctx.click(&field).await?;
    ctx.clear(&field).await?;
    ctx.send_keys(&field, value).await
}
