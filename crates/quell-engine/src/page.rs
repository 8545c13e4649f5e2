//! Per-page state: the backend, the derived UI variant and the page's single
//! overlay watcher.
//!
//! Navigation replaces the document, so it also stops the watcher and
//! forgets the variant.

use crate::backend::{Backend, NavigationResult};
use crate::catalog::Catalog;
use crate::config::schema::SuppressionConfig;
use crate::locator::{LocateOutcome, Locator};
use crate::suppression::SuppressionWatcher;
use quell_common::error::StabilizationError;
use quell_common::target::{LogicalTarget, UiVariant};
use std::sync::Arc;
use tracing::{debug, info};

pub struct PageContext {
    backend: Arc<dyn Backend>,
    catalog: Arc<Catalog>,
    watcher: SuppressionWatcher,
    variant: UiVariant,
}

impl PageContext {
    pub fn new(backend: Arc<dyn Backend>, catalog: Arc<Catalog>, suppression: SuppressionConfig) -> Self {
        let watcher = SuppressionWatcher::new(Arc::clone(&backend), Arc::clone(&catalog), suppression);
        Self {
            backend,
            catalog,
            watcher,
            variant: UiVariant::Unknown,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn locator(&self) -> Locator<'_> {
        Locator::new(&self.catalog, self.backend.as_ref())
    }

    pub fn watcher(&self) -> &SuppressionWatcher {
        &self.watcher
    }

    pub fn watcher_mut(&mut self) -> &mut SuppressionWatcher {
        &mut self.watcher
    }

    /// Variant derived for the current page load, `Unknown` until derived.
    pub fn variant(&self) -> UiVariant {
        self.variant
    }

    pub async fn navigate(&mut self, url: &str) -> Result<NavigationResult, StabilizationError> {
        if self.watcher.is_running() {
            self.watcher.stop(false).await;
        }
        self.variant = UiVariant::Unknown;
        let result = self.backend.navigate(url).await?;
        debug!("Page context now at {}", result.url);
        Ok(result)
    }

    /// Probe the block editor markers; anything else is the classic form.
    pub async fn derive_variant(&mut self) -> Result<UiVariant, StabilizationError> {
        let outcome = self.locator().locate(LogicalTarget::BlockEditorMarker).await?;
        self.variant = match outcome {
            LocateOutcome::Found(_) => UiVariant::Block,
            LocateOutcome::NotFound => UiVariant::Classic,
        };
        info!("Editor detected: {}", self.variant);
        Ok(self.variant)
    }

    /// Cached variant, derived on first use after a navigation.
    pub async fn ensure_variant(&mut self) -> Result<UiVariant, StabilizationError> {
        if self.variant == UiVariant::Unknown {
            self.derive_variant().await
        } else {
            Ok(self.variant)
        }
    }

    /// Resolve `target` against the current variant.
    pub async fn locate(&self, target: LogicalTarget) -> Result<LocateOutcome, StabilizationError> {
        self.locator().locate_for(target, self.variant).await
    }

    pub async fn is_present(&self, target: LogicalTarget) -> Result<bool, StabilizationError> {
        Ok(self.locate(target).await?.is_found())
    }

    /// Start the page's overlay watcher, replacing a running one.
    pub async fn start_suppression(&mut self) {
        self.watcher.start().await;
    }

    pub async fn stop_suppression(&mut self, remove_style: bool) {
        self.watcher.stop(remove_style).await;
    }

    /// Release everything the page context owns in the document.
    pub async fn teardown(&mut self) {
        self.watcher.stop(true).await;
        self.variant = UiVariant::Unknown;
    }
}
