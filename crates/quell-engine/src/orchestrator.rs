//! Variant-agnostic admin workflows.
//!
//! Each workflow is a sequence of locate, wait and dispatch steps that
//! branches on the derived [`UiVariant`] at most once. Only authentication
//! treats a missed detection as fatal; everything else logs and continues
//! unless `workflow.strict_detection` is set.

use crate::backend::{Backend, KeyTarget};
use crate::catalog::Catalog;
use crate::config::QuellConfig;
use crate::config::schema::CredentialsConfig;
use crate::locator::{LocateOutcome, Located};
use crate::page::PageContext;
use crate::poller::{PollOutcome, Poller};
use quell_common::error::{AuthFailure, BackendError, StabilizationError};
use quell_common::target::{ElementQuery, LogicalTarget, UiVariant};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ADMIN_MENU_CONTAINER: &str = "#adminmenu a";
const LOGOUT_CONFIRM_LINK: &str = "a";
const LOGIN_PAGE_MARKER: &str = "wp-login.php";

/// Login identity, opaque to the workflows.
#[derive(Clone)]
pub struct Identity {
    pub username: String,
    pub password: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(credentials: &CredentialsConfig) -> Self {
        Self::new(credentials.username.clone(), credentials.password.clone())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthReport {
    /// URL of the admin page reached after submitting.
    pub url: String,
    /// Poll attempts spent waiting for the outcome.
    pub attempts: u32,
    /// Whether the username had to be typed after a direct set did not stick.
    pub typed_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorReport {
    pub variant: UiVariant,
    pub title_entered: bool,
    pub body_entered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// A success marker appeared in the page text.
    Confirmed { attempts: u32 },
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub variant: UiVariant,
    pub clicked: bool,
    pub confirmed_panel: bool,
    pub outcome: PublishOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutRoute {
    AdminBar,
    LogoutPage,
}

pub struct Orchestrator {
    page: PageContext,
    config: QuellConfig,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>, config: QuellConfig) -> Self {
        Self::with_catalog(backend, Catalog::wordpress(), config)
    }

    pub fn with_catalog(backend: Arc<dyn Backend>, catalog: Catalog, config: QuellConfig) -> Self {
        let page = PageContext::new(backend, Arc::new(catalog), config.suppression.clone());
        Self { page, config }
    }

    pub fn config(&self) -> &QuellConfig {
        &self.config
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut PageContext {
        &mut self.page
    }

    /// Log in and verify the admin interface loaded.
    pub async fn authenticate(&mut self, identity: &Identity) -> Result<AuthReport, StabilizationError> {
        info!("Authenticating as {}", identity.username);
        self.goto(&self.config.site.login_path.clone()).await?;

        let policy = self.config.polling.login_form;
        let page = &self.page;
        let form = Poller::new(policy)
            .await_condition("login form", move || page.is_present(LogicalTarget::LoginUsername))
            .await;
        if !form.is_satisfied() {
            return Err(auth_failed(AuthFailure::LoginFormMissing));
        }
        tokio::time::sleep(self.config.workflow.settle()).await;

        let backend = self.page.backend();
        let username = self.require_login_field(LogicalTarget::LoginUsername).await?;
        if let Err(e) = backend.set_value(&username.element, &identity.username).await {
            debug!("Direct username assignment failed: {}", e);
        }
        let typed_fallback = match backend.value_of(&username.element).await {
            Ok(Some(value)) if value == identity.username => false,
            _ => {
                warn!("Username value did not stick, typing it instead");
                retype(backend, &username.element, &identity.username).await?;
                true
            }
        };

        let password = self.require_login_field(LogicalTarget::LoginPassword).await?;
        if let Err(e) = backend.set_value(&password.element, &identity.password).await {
            debug!("Direct password assignment failed, typing instead: {}", e);
            retype(backend, &password.element, &identity.password).await?;
        }

        let submit = self.require_login_field(LogicalTarget::LoginSubmit).await?;
        backend.click(&submit.element).await?;
        debug!("Login form submitted");

        let policy = self.config.polling.login_outcome;
        let outcome = Poller::new(policy)
            .await_condition("login outcome", move || async move {
                Ok::<_, StabilizationError>(
                    page.is_present(LogicalTarget::LoginError).await?
                        || page.is_present(LogicalTarget::AdminBar).await?,
                )
            })
            .await;

        if let Some(error) = self.page.locate(LogicalTarget::LoginError).await?.found() {
            let message = backend
                .text_of(&error.element)
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            warn!("Login rejected: {}", message.trim());
            return Err(auth_failed(AuthFailure::Rejected { message }));
        }

        let admin_bar = self.page.is_present(LogicalTarget::AdminBar).await?;
        let admin_menu = self.page.is_present(LogicalTarget::AdminMenu).await?;
        let url = backend.current_url().await.unwrap_or_default();
        if admin_bar && admin_menu && !url.contains(LOGIN_PAGE_MARKER) {
            info!("Login successful, admin interface loaded at {}", url);
            Ok(AuthReport {
                url,
                attempts: outcome.attempts(),
                typed_fallback,
            })
        } else {
            warn!(
                "Admin interface not detected (bar: {}, menu: {}, url: {})",
                admin_bar, admin_menu, url
            );
            Err(auth_failed(AuthFailure::NoAdminMarker))
        }
    }

    /// Start overlay suppression, wait for either editor, derive its variant
    /// and sweep once more.
    pub async fn wait_for_editor(&mut self) -> Result<UiVariant, StabilizationError> {
        if self.config.suppression.enabled {
            self.page.start_suppression().await;
        }

        let policy = self.config.polling.editor;
        let page = &self.page;
        let outcome = Poller::new(policy)
            .await_condition("editor", move || async move {
                Ok::<_, StabilizationError>(
                    page.is_present(LogicalTarget::BlockEditorMarker).await?
                        || page.is_present(LogicalTarget::ClassicEditorMarker).await?,
                )
            })
            .await;
        self.check_detection("editor", outcome)?;

        let variant = self.page.derive_variant().await?;
        tokio::time::sleep(self.config.workflow.settle()).await;
        if self.page.watcher().is_running() {
            let removed = self.page.watcher().sweep().await;
            debug!("Post-detection sweep removed {} overlay element(s)", removed);
        }
        Ok(variant)
    }

    /// Open a new post and enter its title and optional body.
    pub async fn author_content(
        &mut self,
        title: &str,
        body: Option<&str>,
    ) -> Result<AuthorReport, StabilizationError> {
        self.goto(&self.config.site.new_post_path.clone()).await?;
        let variant = self.wait_for_editor().await?;

        let title_entered = self.type_into(LogicalTarget::TitleField, title).await?;
        if !title_entered {
            warn!("No title input found, skipping title entry");
            self.require_in_strict_mode(LogicalTarget::TitleField)?;
        }

        let body_entered = match body.filter(|b| !b.is_empty()) {
            None => false,
            Some(body) => {
                tokio::time::sleep(self.config.workflow.settle()).await;
                if variant == UiVariant::Block {
                    self.open_block_body().await;
                }
                let entered = self.type_into(LogicalTarget::ContentField, body).await?;
                if !entered {
                    warn!("No content area found, skipping body entry");
                    self.require_in_strict_mode(LogicalTarget::ContentField)?;
                }
                entered
            }
        };

        Ok(AuthorReport {
            variant,
            title_entered,
            body_entered,
        })
    }

    /// Publish the open post and watch for a success notice.
    pub async fn publish(&mut self) -> Result<PublishReport, StabilizationError> {
        tokio::time::sleep(self.config.workflow.publish_settle()).await;
        let variant = self.page.ensure_variant().await?;

        let clicked = self.click_publish(variant).await?;
        let confirmed_panel = if clicked && variant == UiVariant::Block {
            self.confirm_publish_panel().await?
        } else {
            false
        };

        let markers = match variant {
            UiVariant::Block => self.config.workflow.block_success_markers.clone(),
            _ => self.config.workflow.classic_success_markers.clone(),
        };
        let backend = self.page.backend();
        let markers = &markers;
        let poll = Poller::new(self.config.polling.publish)
            .await_condition("publish confirmation", move || async move {
                let text = backend.body_text().await?;
                Ok::<_, BackendError>(markers.iter().any(|m| text.contains(m.as_str())))
            })
            .await;
        self.check_detection("publish confirmation", poll)?;

        let outcome = match poll {
            PollOutcome::Satisfied { attempts } => {
                info!("Post published");
                PublishOutcome::Confirmed { attempts }
            }
            PollOutcome::Exhausted { .. } => {
                warn!("Publish not confirmed, continuing");
                PublishOutcome::Unconfirmed
            }
        };
        Ok(PublishReport {
            variant,
            clicked,
            confirmed_panel,
            outcome,
        })
    }

    /// Dismiss frame overlays, sweep and send Escape to the body.
    pub async fn clear_environment(&mut self) -> usize {
        self.page.watcher().dismiss_frame_overlays().await;
        let removed = self.page.watcher().sweep().await;
        if let Err(e) = self.page.backend().press_key("Escape", KeyTarget::Body).await {
            debug!("Escape dispatch failed: {}", e);
        }
        debug!("Cleared editing environment ({} overlay element(s) removed)", removed);
        removed
    }

    pub async fn logout(&mut self) -> Result<LogoutRoute, StabilizationError> {
        self.goto(&self.config.site.admin_path.clone()).await?;
        if let Some(link) = self.page.locate(LogicalTarget::LogoutLink).await?.found() {
            self.page.backend().click(&link.element).await?;
            tokio::time::sleep(self.config.workflow.settle()).await;
            match self.page.backend().current_url().await {
                Ok(url) if !url.contains(&self.config.site.admin_path) => {
                    info!("Logged out via admin bar");
                    return Ok(LogoutRoute::AdminBar);
                }
                Ok(url) => debug!("Still on {} after logout click, using logout page", url),
                Err(e) => debug!("Cannot confirm logout click ({}), using logout page", e),
            }
        }

        self.goto(&self.config.site.logout_path.clone()).await?;
        let confirm = self
            .page
            .locator()
            .locate_text(LOGOUT_CONFIRM_LINK, "log out")
            .await;
        match confirm {
            LocateOutcome::Found(link) => {
                self.page.backend().click(&link.element).await?;
                info!("Logged out via logout page");
            }
            LocateOutcome::NotFound => debug!("No logout confirmation link, assuming logged out"),
        }
        Ok(LogoutRoute::LogoutPage)
    }

    /// Click an admin menu entry by its visible text, then the sub-entry.
    /// Returns whether every requested entry was found.
    pub async fn open_admin_menu(
        &mut self,
        parent: &str,
        sub: Option<&str>,
    ) -> Result<bool, StabilizationError> {
        for label in std::iter::once(parent).chain(sub) {
            match self.page.locator().locate_text(ADMIN_MENU_CONTAINER, label).await {
                LocateOutcome::Found(entry) => {
                    self.page.backend().click(&entry.element).await?;
                    debug!("Opened admin menu entry '{}'", label);
                    tokio::time::sleep(self.config.workflow.settle()).await;
                }
                LocateOutcome::NotFound => {
                    warn!("Admin menu entry '{}' not found", label);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Search through the admin bar when present, else the front-end form.
    pub async fn search(&mut self, term: &str) -> Result<bool, StabilizationError> {
        if let Some(toggle) = self.page.locate(LogicalTarget::SearchToggle).await?.found() {
            if let Err(e) = self.page.backend().click(&toggle.element).await {
                debug!("Search toggle click failed: {}", e);
            }
        }
        let Some(input) = self.page.locate(LogicalTarget::SearchInput).await?.found() else {
            warn!("No search input available");
            return Ok(false);
        };
        let backend = self.page.backend();
        backend.type_text(&input.element, term).await?;
        backend.press_key("Enter", KeyTarget::Focused).await?;
        info!("Searched for '{}'", term);
        Ok(true)
    }

    /// Type into `target`, falling back to the focused writing surface.
    pub async fn safe_type(&mut self, target: LogicalTarget, text: &str) -> Result<bool, StabilizationError> {
        if self.type_into(target, text).await? {
            return Ok(true);
        }
        debug!("{} not found, typing into the writing surface", target);
        let Some(surface) = self.page.locate(LogicalTarget::WritingSurface).await?.found() else {
            warn!("Neither {} nor a writing surface is available", target);
            return Ok(false);
        };
        let backend = self.page.backend();
        if let Err(e) = backend.click(&surface.element).await {
            debug!("Writing surface click failed: {}", e);
        }
        match backend.type_text(&surface.element, text).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Typing into the writing surface failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Stop the watcher and remove everything it injected.
    pub async fn shutdown(&mut self) {
        self.page.teardown().await;
    }

    async fn goto(&mut self, path: &str) -> Result<(), StabilizationError> {
        let url = self
            .config
            .site
            .url(path)
            .map_err(|e| BackendError::Navigation(format!("{}: {}", path, e)))?;
        debug!("Navigating to {}", url);
        self.page.navigate(url.as_str()).await?;
        Ok(())
    }

    async fn require_login_field(&self, target: LogicalTarget) -> Result<Located, StabilizationError> {
        self.page
            .locate(target)
            .await?
            .found()
            .ok_or_else(|| {
                warn!("Login form incomplete: {} missing", target);
                auth_failed(AuthFailure::LoginFormMissing)
            })
    }

    /// Type into the first resolving candidate. `Ok(false)` when absent or
    /// when the interaction failed.
    async fn type_into(&self, target: LogicalTarget, text: &str) -> Result<bool, StabilizationError> {
        let Some(located) = self.page.locate(target).await?.found() else {
            return Ok(false);
        };
        match self.page.backend().type_text(&located.element, text).await {
            Ok(()) => {
                debug!("Typed {} chars into {}", text.chars().count(), located.element);
                Ok(true)
            }
            Err(e) => {
                warn!("Typing into {} failed: {}", target, e);
                Ok(false)
            }
        }
    }

    /// Create the first paragraph block via the appender, else Enter.
    async fn open_block_body(&self) {
        let backend = self.page.backend();
        let appender = self.page.locate(LogicalTarget::BlockAppender).await;
        let opened = match appender {
            Ok(LocateOutcome::Found(appender)) => backend.click(&appender.element).await.is_ok(),
            _ => false,
        };
        if !opened {
            debug!("No block appender, pressing Enter to start a paragraph");
            if let Err(e) = backend.press_key("Enter", KeyTarget::Focused).await {
                debug!("Enter dispatch failed: {}", e);
            }
        }
        tokio::time::sleep(self.config.workflow.settle()).await;
    }

    async fn click_publish(&self, variant: UiVariant) -> Result<bool, StabilizationError> {
        let locator = self.page.locator();
        let backend = self.page.backend();
        let mut start = 0;
        while let Some(button) = locator
            .locate_from(LogicalTarget::PublishAction, variant, start)
            .await?
            .found()
        {
            if backend.is_enabled(&button.element).await.unwrap_or(false) {
                return match backend.click(&button.element).await {
                    Ok(()) => {
                        info!("Clicked publish ({})", button.element);
                        Ok(true)
                    }
                    Err(e) => {
                        warn!("Publish click failed: {}", e);
                        Ok(false)
                    }
                };
            }
            debug!("Publish control {} is disabled, trying next", button.element);
            start = button.candidate_index + 1;
        }
        warn!("No enabled publish control found");
        self.require_in_strict_mode(LogicalTarget::PublishAction)?;
        Ok(false)
    }

    async fn confirm_publish_panel(&self) -> Result<bool, StabilizationError> {
        let page = &self.page;
        let panel = Poller::new(self.config.polling.panel)
            .await_condition("publish panel", move || page.is_present(LogicalTarget::PublishConfirm))
            .await;
        if !panel.is_satisfied() {
            debug!("No pre-publish panel appeared");
            return Ok(false);
        }
        let Some(confirm) = self.page.locate(LogicalTarget::PublishConfirm).await?.found() else {
            return Ok(false);
        };
        match self.page.backend().click(&confirm.element).await {
            Ok(()) => {
                debug!("Confirmed publish in panel");
                Ok(true)
            }
            Err(e) => {
                warn!("Publish confirmation click failed: {}", e);
                Ok(false)
            }
        }
    }

    fn check_detection(&self, condition: &str, outcome: PollOutcome) -> Result<(), StabilizationError> {
        if self.config.workflow.strict_detection {
            outcome.into_result(condition)?;
        }
        Ok(())
    }

    fn require_in_strict_mode(&self, target: LogicalTarget) -> Result<(), StabilizationError> {
        if self.config.workflow.strict_detection {
            return Err(StabilizationError::ElementNotFound {
                target: target.name().to_string(),
            });
        }
        Ok(())
    }
}

/// Replace a field's content by keyboard input. Typing alone inserts at the
/// caret, after whatever the field already holds.
async fn retype(
    backend: &dyn Backend,
    element: &ElementQuery,
    text: &str,
) -> Result<(), BackendError> {
    backend.clear(element).await?;
    backend.type_text(element, text).await
}

fn auth_failed(reason: AuthFailure) -> StabilizationError {
    StabilizationError::AuthenticationFailed { reason }
}
