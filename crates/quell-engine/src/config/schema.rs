use crate::poller::PollPolicy;
use quell_common::target::OverlaySignature;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuellConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub suppression: SuppressionConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_admin_path")]
    pub admin_path: String,
    #[serde(default = "default_new_post_path")]
    pub new_post_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
}

impl SiteConfig {
    /// Append `path` to the base URL. The base may carry a path of its own
    /// (a site installed under `/blog`), so this concatenates rather than
    /// resolving `path` as an absolute reference.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            admin_path: default_admin_path(),
            new_post_path: default_new_post_path(),
            logout_path: default_logout_path(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_login_path() -> String {
    "/wp-admin".to_string()
}

fn default_admin_path() -> String {
    "/wp-admin".to_string()
}

fn default_new_post_path() -> String {
    "/wp-admin/post-new.php".to_string()
}

fn default_logout_path() -> String {
    "/wp-login.php?action=logout".to_string()
}

/// Opaque login identity. Never validated or parsed.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialsConfig {
    pub const USERNAME_ENV: &'static str = "QUELL_USERNAME";
    pub const PASSWORD_ENV: &'static str = "QUELL_PASSWORD";

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Replace fields for which `lookup` yields a non-empty value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = lookup(Self::USERNAME_ENV).filter(|v| !v.is_empty()) {
            self.username = username;
        }
        if let Some(password) = lookup(Self::PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.password = password;
        }
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Waiting for either editor variant to render.
    #[serde(default = "default_editor_policy")]
    pub editor: PollPolicy,
    #[serde(default = "default_login_form_policy")]
    pub login_form: PollPolicy,
    /// Waiting for the admin chrome or the login error after submitting.
    #[serde(default = "default_login_outcome_policy")]
    pub login_outcome: PollPolicy,
    /// Waiting for the publish success notice.
    #[serde(default = "default_publish_policy")]
    pub publish: PollPolicy,
    /// Waiting for the pre-publish confirmation panel.
    #[serde(default = "default_panel_policy")]
    pub panel: PollPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            editor: default_editor_policy(),
            login_form: default_login_form_policy(),
            login_outcome: default_login_outcome_policy(),
            publish: default_publish_policy(),
            panel: default_panel_policy(),
        }
    }
}

fn default_editor_policy() -> PollPolicy {
    PollPolicy::new(500, 40)
}

fn default_login_form_policy() -> PollPolicy {
    PollPolicy::new(500, 20)
}

fn default_login_outcome_policy() -> PollPolicy {
    PollPolicy::new(500, 30)
}

fn default_publish_policy() -> PollPolicy {
    PollPolicy::new(500, 40)
}

fn default_panel_policy() -> PollPolicy {
    PollPolicy::new(250, 8)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pre-emptively hide signature selectors with a style block.
    #[serde(default = "default_true")]
    pub inject_style: bool,
    #[serde(default = "default_style_id")]
    pub style_id: String,
    /// Dispatch Escape on the document and body when the watcher starts.
    #[serde(default = "default_true")]
    pub dispatch_escape: bool,
    /// Dispatch Escape whenever the insertion observer removes a node.
    #[serde(default = "default_true")]
    pub escape_on_match: bool,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Stop the timed sweep after this many passes; unbounded when absent.
    #[serde(default)]
    pub max_sweeps: Option<u32>,
    /// Also sweep inside the embedded editor frame.
    #[serde(default = "default_true")]
    pub sweep_frame: bool,
    #[serde(default)]
    pub remove_style_on_stop: bool,
    /// Appended to the catalog's denylist.
    #[serde(default)]
    pub extra_signatures: Vec<OverlaySignature>,
}

impl SuppressionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inject_style: true,
            style_id: default_style_id(),
            dispatch_escape: true,
            escape_on_match: true,
            sweep_interval_ms: default_sweep_interval_ms(),
            max_sweeps: None,
            sweep_frame: true,
            remove_style_on_stop: false,
            extra_signatures: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_style_id() -> String {
    "quell-overlay-hider".to_string()
}

fn default_sweep_interval_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Pause after editor detection and between authoring steps.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Pause before looking for the publish button.
    #[serde(default = "default_publish_settle_ms")]
    pub publish_settle_ms: u64,
    /// Treat detection timeouts in editor and publish workflows as failures.
    #[serde(default)]
    pub strict_detection: bool,
    #[serde(default = "default_block_success_markers")]
    pub block_success_markers: Vec<String>,
    #[serde(default = "default_classic_success_markers")]
    pub classic_success_markers: Vec<String>,
}

impl WorkflowConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn publish_settle(&self) -> Duration {
        Duration::from_millis(self.publish_settle_ms)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            publish_settle_ms: default_publish_settle_ms(),
            strict_detection: false,
            block_success_markers: default_block_success_markers(),
            classic_success_markers: default_classic_success_markers(),
        }
    }
}

fn default_settle_ms() -> u64 {
    500
}

fn default_publish_settle_ms() -> u64 {
    1000
}

fn default_block_success_markers() -> Vec<String> {
    vec![
        "Published".to_string(),
        "Post published".to_string(),
        "View Post".to_string(),
    ]
}

fn default_classic_success_markers() -> Vec<String> {
    vec!["Post published".to_string()]
}
