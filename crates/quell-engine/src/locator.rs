//! Multi-strategy locator.
//!
//! Resolves a [`LogicalTarget`] to a concrete [`ElementQuery`] by trying the
//! catalog's candidates in order. The first candidate with at least one match
//! wins. A frame that is missing or unreachable counts as a miss for that
//! candidate only.

use crate::backend::{Backend, BackendError};
use crate::catalog::Catalog;
use quell_common::error::StabilizationError;
use quell_common::target::{ElementQuery, LogicalTarget, UiVariant};
use serde::Serialize;
use tracing::{debug, trace};

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    pub element: ElementQuery,
    /// Index of the matching candidate in the catalog's list for the target.
    pub candidate_index: usize,
    /// Variant the matching candidate was tagged with.
    pub variant: UiVariant,
    pub matches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateOutcome {
    Found(Located),
    /// Every candidate missed: the feature is absent in the current rendering.
    NotFound,
}

impl LocateOutcome {
    pub fn found(self) -> Option<Located> {
        match self {
            LocateOutcome::Found(located) => Some(located),
            LocateOutcome::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LocateOutcome::Found(_))
    }
}

pub struct Locator<'a> {
    catalog: &'a Catalog,
    backend: &'a dyn Backend,
}

impl<'a> Locator<'a> {
    pub fn new(catalog: &'a Catalog, backend: &'a dyn Backend) -> Self {
        Self { catalog, backend }
    }

    /// Try every candidate for `target`.
    pub async fn locate(&self, target: LogicalTarget) -> Result<LocateOutcome, StabilizationError> {
        self.locate_for(target, UiVariant::Unknown).await
    }

    /// Try the candidates applicable to `variant`, in catalog order.
    pub async fn locate_for(
        &self,
        target: LogicalTarget,
        variant: UiVariant,
    ) -> Result<LocateOutcome, StabilizationError> {
        self.locate_from(target, variant, 0).await
    }

    /// Like [`Locator::locate_for`], skipping candidates before `start`.
    /// Used to fall through to the next strategy when the first match is
    /// present but unusable.
    pub async fn locate_from(
        &self,
        target: LogicalTarget,
        variant: UiVariant,
        start: usize,
    ) -> Result<LocateOutcome, StabilizationError> {
        let candidates = self.catalog.lookup(target)?;

        for (index, candidate) in candidates.iter().enumerate().skip(start) {
            if !candidate.variant.applies_to(variant) {
                continue;
            }
            let query = candidate.query();
            match self.probe(&query).await {
                Some(matches) if matches > 0 => {
                    debug!(
                        "Located {} via candidate #{} ({})",
                        target, index, query
                    );
                    return Ok(LocateOutcome::Found(Located {
                        element: query,
                        candidate_index: index,
                        variant: candidate.variant,
                        matches,
                    }));
                }
                _ => continue,
            }
        }

        debug!("No candidate matched {} (variant {})", target, variant);
        Ok(LocateOutcome::NotFound)
    }

    /// Resolve an element inside `container` by visible text.
    pub async fn locate_text(&self, container: &str, text: &str) -> LocateOutcome {
        let query = ElementQuery::css(container).with_text(text);
        match self.probe(&query).await {
            Some(matches) if matches > 0 => LocateOutcome::Found(Located {
                element: query,
                candidate_index: 0,
                variant: UiVariant::Unknown,
                matches,
            }),
            _ => LocateOutcome::NotFound,
        }
    }

    /// Count matches for one query; `None` means the probe itself missed.
    async fn probe(&self, query: &ElementQuery) -> Option<usize> {
        match self.backend.count(query).await {
            Ok(matches) => {
                trace!("{} -> {} matches", query, matches);
                Some(matches)
            }
            Err(BackendError::FrameAccessDenied(frame)) => {
                let miss = StabilizationError::FrameAccessDenied { frame };
                debug!("Skipping candidate {}: {}", query, miss);
                None
            }
            Err(e) => {
                debug!("Probe for {} failed, treating as miss: {}", query, e);
                None
            }
        }
    }
}
