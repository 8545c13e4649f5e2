use async_trait::async_trait;
pub use quell_common::error::BackendError;
pub use quell_common::protocol::KeyTarget;
use quell_common::target::{ElementQuery, FrameScope};

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16, // generic status code (e.g. 200)
}

/// The capability set the stabilization layer drives a browser through.
///
/// Every method takes `&self`: the suppression sweep task and the
/// orchestrator share one backend behind an `Arc`. Queries are evaluated
/// against live state on every call.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch the backend (start browser, connect to remote, etc.)
    async fn launch(&self) -> Result<(), BackendError>;

    /// Close the backend and cleanup resources.
    async fn close(&self) -> Result<(), BackendError>;

    /// Check if the backend is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Navigate to a specific URL. Replaces the current document.
    async fn navigate(&self, url: &str) -> Result<NavigationResult, BackendError>;

    async fn current_url(&self) -> Result<String, BackendError>;

    /// Number of elements matching `query`.
    ///
    /// Fails with [`BackendError::FrameAccessDenied`] when the query targets
    /// an embedded frame that is missing or unreachable.
    async fn count(&self, query: &ElementQuery) -> Result<usize, BackendError>;

    /// Text content of the picked match.
    async fn text_of(&self, query: &ElementQuery) -> Result<Option<String>, BackendError>;

    /// Form value of the picked match, `None` for elements without one.
    async fn value_of(&self, query: &ElementQuery) -> Result<Option<String>, BackendError>;

    async fn is_enabled(&self, query: &ElementQuery) -> Result<bool, BackendError>;

    /// Assign a form value directly and fire `input`/`change`.
    async fn set_value(&self, query: &ElementQuery, value: &str) -> Result<(), BackendError>;

    /// Select and delete the picked match's content through editing input,
    /// which framework-controlled fields honour even when they ignore
    /// [`Backend::set_value`].
    async fn clear(&self, query: &ElementQuery) -> Result<(), BackendError>;

    /// Focus the picked match and type `text` as keyboard input at the caret.
    async fn type_text(&self, query: &ElementQuery, text: &str) -> Result<(), BackendError>;

    async fn click(&self, query: &ElementQuery) -> Result<(), BackendError>;

    /// Dispatch a synthetic keydown for `key` (e.g. `"Escape"`, `"Enter"`).
    async fn press_key(&self, key: &str, target: KeyTarget) -> Result<(), BackendError>;

    /// Rendered text of the top-level document body.
    async fn body_text(&self) -> Result<String, BackendError>;

    /// Hide and detach every element matching any selector. Returns how many
    /// were removed; elements already gone are skipped silently.
    async fn remove_matching(
        &self,
        selectors: &[String],
        scope: &FrameScope,
    ) -> Result<usize, BackendError>;

    /// Install (or replace) a `<style>` block with the given id.
    async fn inject_style(&self, id: &str, css: &str) -> Result<(), BackendError>;

    /// Returns whether a block with that id existed.
    async fn remove_style(&self, id: &str) -> Result<bool, BackendError>;

    /// Subscribe to element insertions; matching nodes (or nodes containing
    /// matches) are hidden immediately and detached within one tick.
    async fn observe_insertions(
        &self,
        id: &str,
        selectors: &[String],
        escape_on_match: bool,
    ) -> Result<(), BackendError>;

    /// Release a subscription. Returns whether it was still registered.
    async fn disconnect_observer(&self, id: &str) -> Result<bool, BackendError>;
}
