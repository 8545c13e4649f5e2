//! Overlay suppression controller.
//!
//! A [`SuppressionWatcher`] keeps the viewport free of transient modal
//! overlays while a workflow runs. It combines four mechanisms:
//!
//! 1. a style block hiding every denylisted selector before it renders,
//! 2. an immediate sweep removing overlays already present,
//! 3. an in-page insertion observer removing new overlays within one tick,
//! 4. a timed sweep task catching nodes the observer cannot see (re-parented
//!    nodes, nodes inside the editor frame).
//!
//! Every step is best effort. Failures are logged as
//! [`StabilizationError::SuppressionTransientFailure`] and swallowed.

use crate::backend::{Backend, KeyTarget};
use crate::catalog::Catalog;
use crate::config::schema::SuppressionConfig;
use crate::locator::{LocateOutcome, Locator};
use quell_common::error::{BackendError, StabilizationError};
use quell_common::target::{FrameScope, LogicalTarget, OverlaySignature, UiVariant};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, info};

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Starting,
    Running,
}

pub struct SuppressionWatcher {
    backend: Arc<dyn Backend>,
    catalog: Arc<Catalog>,
    config: SuppressionConfig,
    selectors: Arc<Vec<String>>,
    editor_scope: FrameScope,
    state: WatcherState,
    subscription: Option<String>,
    sweeper: Option<JoinHandle<()>>,
}

impl SuppressionWatcher {
    pub fn new(backend: Arc<dyn Backend>, catalog: Arc<Catalog>, config: SuppressionConfig) -> Self {
        let mut selectors = catalog.overlay_selectors();
        for extra in config.extra_signatures.iter().map(OverlaySignature::selector) {
            if !selectors.contains(&extra) {
                selectors.push(extra);
            }
        }
        let editor_scope = catalog.editor_frame_scope();
        Self {
            backend,
            catalog,
            config,
            selectors: Arc::new(selectors),
            editor_scope,
            state: WatcherState::Stopped,
            subscription: None,
            sweeper: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == WatcherState::Running
    }

    /// Id of the live insertion subscription, if any.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Start suppressing. A running watcher is disposed first, so at most
    /// one subscription exists at any time.
    pub async fn start(&mut self) {
        if self.state != WatcherState::Stopped {
            debug!("Overlay watcher already running, disposing previous instance");
            self.dispose(false).await;
        }
        self.state = WatcherState::Starting;

        if self.config.inject_style {
            let css = overlay_hider_css(&self.selectors, &self.catalog.writing_surface_selectors());
            if let Err(e) = self.backend.inject_style(&self.config.style_id, &css).await {
                swallow("inject style", e);
            }
        }

        let removed = sweep_once(self.backend.as_ref(), &self.selectors, self.frame_scope()).await;
        if removed > 0 {
            info!("Removed {} overlay element(s) on start", removed);
        }

        let id = format!(
            "quell-overlay-watcher-{}",
            NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed)
        );
        match self
            .backend
            .observe_insertions(&id, &self.selectors, self.config.escape_on_match)
            .await
        {
            Ok(()) => self.subscription = Some(id),
            Err(e) => swallow("observe insertions", e),
        }

        if self.config.dispatch_escape {
            for target in [KeyTarget::Document, KeyTarget::Body] {
                if let Err(e) = self.backend.press_key("Escape", target).await {
                    swallow("dispatch escape", e);
                }
            }
        }

        self.sweeper = Some(spawn_sweeper(
            Arc::clone(&self.backend),
            Arc::clone(&self.selectors),
            self.frame_scope().cloned(),
            &self.config,
        ));
        self.state = WatcherState::Running;
        debug!(
            "Overlay watcher running ({} signatures, subscription {:?})",
            self.selectors.len(),
            self.subscription
        );
    }

    /// Stop suppressing. The style block stays unless `remove_style` is set
    /// or the configuration asks for removal.
    pub async fn stop(&mut self, remove_style: bool) {
        self.dispose(remove_style || self.config.remove_style_on_stop)
            .await;
    }

    /// Remove every overlay currently attached. Returns how many went.
    pub async fn sweep(&self) -> usize {
        sweep_once(self.backend.as_ref(), &self.selectors, self.frame_scope()).await
    }

    /// Click the first close control inside the editor frame and send Escape
    /// to the frame body. Unreachable frames are skipped.
    pub async fn dismiss_frame_overlays(&self) -> bool {
        let locator = Locator::new(&self.catalog, self.backend.as_ref());
        let mut dismissed = false;
        match locator
            .locate_for(LogicalTarget::FrameCloseButton, UiVariant::Block)
            .await
        {
            Ok(LocateOutcome::Found(located)) => match self.backend.click(&located.element).await
            {
                Ok(()) => {
                    debug!("Clicked frame close control {}", located.element);
                    dismissed = true;
                }
                Err(e) => swallow("click frame close control", e),
            },
            Ok(LocateOutcome::NotFound) => {}
            Err(e) => debug!("Frame close controls unavailable: {}", e),
        }

        let frame = KeyTarget::FrameBody {
            frame: self.catalog.editor_frame().to_string(),
        };
        if let Err(e) = self.backend.press_key("Escape", frame).await {
            swallow("dispatch escape in frame", e);
        }
        dismissed
    }

    async fn dispose(&mut self, remove_style: bool) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
        if let Some(id) = self.subscription.take() {
            match self.backend.disconnect_observer(&id).await {
                Ok(true) => debug!("Disconnected overlay subscription {}", id),
                Ok(false) => debug!("Overlay subscription {} was already gone", id),
                Err(e) => swallow("disconnect observer", e),
            }
        }
        if remove_style {
            if let Err(e) = self.backend.remove_style(&self.config.style_id).await {
                swallow("remove style", e);
            }
        }
        self.state = WatcherState::Stopped;
    }

    fn frame_scope(&self) -> Option<&FrameScope> {
        if self.config.sweep_frame {
            Some(&self.editor_scope)
        } else {
            None
        }
    }
}

impl Drop for SuppressionWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

fn spawn_sweeper(
    backend: Arc<dyn Backend>,
    selectors: Arc<Vec<String>>,
    frame: Option<FrameScope>,
    config: &SuppressionConfig,
) -> JoinHandle<()> {
    let interval = config.sweep_interval();
    let max_sweeps = config.max_sweeps;
    tokio::spawn(async move {
        let mut passes: u32 = 0;
        loop {
            tokio::time::sleep(interval).await;
            let removed = sweep_once(backend.as_ref(), &selectors, frame.as_ref()).await;
            if removed > 0 {
                debug!("Timed sweep removed {} overlay element(s)", removed);
            }
            passes += 1;
            if max_sweeps.is_some_and(|max| passes >= max) {
                break;
            }
        }
    })
}

async fn sweep_once(backend: &dyn Backend, selectors: &[String], frame: Option<&FrameScope>) -> usize {
    let mut removed = match backend.remove_matching(selectors, &FrameScope::Document).await {
        Ok(count) => count,
        Err(e) => {
            swallow("sweep document", e);
            0
        }
    };
    if let Some(frame) = frame {
        match backend.remove_matching(selectors, frame).await {
            Ok(count) => removed += count,
            // The editor frame only exists on block editor pages.
            Err(BackendError::FrameAccessDenied(_)) => {}
            Err(e) => swallow("sweep frame", e),
        }
    }
    removed
}

fn swallow(step: &str, error: BackendError) {
    let failure = StabilizationError::SuppressionTransientFailure(format!("{}: {}", step, error));
    debug!("{}", failure);
}

/// Style block hiding every overlay selector while keeping the writing
/// surface interactive.
pub fn overlay_hider_css(selectors: &[String], keep_interactive: &[String]) -> String {
    let mut css = String::new();
    if !selectors.is_empty() {
        css.push_str(&selectors.join(",\n"));
        css.push_str(
            " {\n  display: none !important;\n  visibility: hidden !important;\n  \
             opacity: 0 !important;\n  pointer-events: none !important;\n  \
             z-index: -1 !important;\n}\n",
        );
    }
    if !keep_interactive.is_empty() {
        css.push_str(&keep_interactive.join(",\n"));
        css.push_str(" {\n  pointer-events: auto !important;\n  visibility: visible !important;\n}\n");
    }
    css
}
