//! Selector catalog.
//!
//! A static registry of ordered candidate selectors per [`LogicalTarget`].
//! Candidate order is preference order: the most specific rendering first,
//! generic fallbacks last. The locator stops at the first candidate that
//! matches, so reordering entries changes behaviour.

use quell_common::error::StabilizationError;
use quell_common::target::{
    FrameScope, LogicalTarget, OverlaySignature, Pick, SelectorCandidate, UiVariant,
};
use std::collections::BTreeMap;

/// The iframe hosting the block editor's content document in recent releases.
pub const EDITOR_CANVAS_FRAME: &str = "iframe[name=\"editor-canvas\"]";

#[derive(Debug, Clone)]
pub struct Catalog {
    candidates: BTreeMap<LogicalTarget, Vec<SelectorCandidate>>,
    signatures: Vec<OverlaySignature>,
    editor_frame: String,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Ordered candidates for `target`.
    pub fn lookup(&self, target: LogicalTarget) -> Result<&[SelectorCandidate], StabilizationError> {
        match self.candidates.get(&target) {
            Some(list) if !list.is_empty() => Ok(list),
            _ => Err(StabilizationError::UnknownTarget(target.name().to_string())),
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = LogicalTarget> + '_ {
        self.candidates.keys().copied()
    }

    /// The overlay denylist.
    pub fn overlay_signatures(&self) -> &[OverlaySignature] {
        &self.signatures
    }

    pub fn overlay_selectors(&self) -> Vec<String> {
        self.signatures.iter().map(OverlaySignature::selector).collect()
    }

    pub fn editor_frame(&self) -> &str {
        &self.editor_frame
    }

    pub fn editor_frame_scope(&self) -> FrameScope {
        FrameScope::frame(self.editor_frame.clone())
    }

    /// Selectors for the editing surface that must stay interactive while
    /// overlays are force-hidden.
    pub fn writing_surface_selectors(&self) -> Vec<String> {
        self.candidates
            .get(&LogicalTarget::WritingSurface)
            .map(|list| {
                list.iter()
                    .filter(|c| c.scope == FrameScope::Document)
                    .map(|c| c.selector.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Catalog for the WordPress admin: login form, admin chrome, block
    /// editor (document and `editor-canvas` frame) and classic editor.
    pub fn wordpress() -> Self {
        use LogicalTarget::*;
        use UiVariant::{Block, Classic};

        let frame = FrameScope::frame(EDITOR_CANVAS_FRAME);
        let doc = FrameScope::Document;
        let any = UiVariant::Unknown;

        Catalog::builder()
            .editor_frame(EDITOR_CANVAS_FRAME)
            // Login form
            .candidate(LoginUsername, any, "#user_login", doc.clone())
            .candidate(LoginUsername, any, "input[name=\"log\"]", doc.clone())
            .candidate(LoginPassword, any, "#user_pass", doc.clone())
            .candidate(LoginPassword, any, "input[name=\"pwd\"]", doc.clone())
            .candidate(LoginSubmit, any, "#wp-submit", doc.clone())
            .candidate(LoginError, any, "#login_error", doc.clone())
            // Admin chrome
            .candidate(AdminBar, any, "#wpadminbar", doc.clone())
            .candidate(AdminMenu, any, "#adminmenu", doc.clone())
            .candidate(LogoutLink, any, "#wp-admin-bar-logout a", doc.clone())
            // Variant markers
            .candidate(BlockEditorMarker, Block, ".block-editor", doc.clone())
            .candidate(BlockEditorMarker, Block, ".editor-styles-wrapper", doc.clone())
            .candidate(BlockEditorMarker, Block, ".editor-styles-wrapper", frame.clone())
            .candidate(BlockEditorMarker, Block, "h1[aria-label*=\"Add title\"]", doc.clone())
            .candidate(BlockEditorMarker, Block, ".edit-post-layout", doc.clone())
            .candidate(ClassicEditorMarker, Classic, "#content", doc.clone())
            .candidate(ClassicEditorMarker, Classic, "#title", doc.clone())
            // Title
            .candidate(TitleField, Block, ".editor-post-title__input", doc.clone())
            .candidate(TitleField, Block, ".editor-post-title__input", frame.clone())
            .candidate(TitleField, Block, "h1[aria-label*=\"Add title\"]", doc.clone())
            .candidate(TitleField, Block, "h1[aria-label*=\"Add title\"]", frame.clone())
            .candidate(TitleField, Block, ".wp-block-post-title", frame.clone())
            .candidate(TitleField, Block, ".wp-block-post-title", doc.clone())
            .candidate(TitleField, Block, ".editor-visual-editor h1", doc.clone())
            .candidate(TitleField, Classic, "#title", doc.clone())
            .candidate(TitleField, any, "[aria-label*=\"title\"]", doc.clone())
            .candidate(TitleField, Block, "[contenteditable=\"true\"]", doc.clone())
            // Body
            .candidate(BlockAppender, Block, ".block-editor-default-block-appender__content", frame.clone())
            .candidate(BlockAppender, Block, ".block-editor-default-block-appender__content", doc.clone())
            .picked(ContentField, Block, "[data-type=\"core/paragraph\"]", frame.clone(), Pick::Last)
            .picked(ContentField, Block, "[data-type=\"core/paragraph\"]", doc.clone(), Pick::Last)
            .candidate(ContentField, Block, ".block-editor-block-list__layout", frame.clone())
            .candidate(ContentField, Block, ".block-editor-block-list__layout", doc.clone())
            .candidate(ContentField, Classic, "#content", doc.clone())
            .candidate(WritingSurface, Block, ".block-editor-writing-flow", frame.clone())
            .candidate(WritingSurface, Block, ".block-editor-writing-flow", doc.clone())
            .candidate(WritingSurface, Block, ".editor-styles-wrapper", doc.clone())
            .candidate(WritingSurface, Block, ".editor-post-title__input", doc.clone())
            .candidate(WritingSurface, Classic, "#content", doc.clone())
            // Publishing
            .candidate(PublishAction, Block, ".editor-post-publish-button", doc.clone())
            .candidate(PublishAction, Block, ".editor-post-publish-button__button", doc.clone())
            .candidate(PublishAction, Block, ".editor-header__settings > button", doc.clone())
            .candidate(PublishAction, Classic, "#publish", doc.clone())
            .candidate(PublishConfirm, Block, ".editor-post-publish-panel__header-publish-button button", doc.clone())
            // Overlays
            .candidate(OverlayRoot, any, ".components-modal__screen-overlay", doc.clone())
            .candidate(OverlayRoot, any, ".components-modal__frame", doc.clone())
            .candidate(OverlayRoot, Block, ".components-modal__screen-overlay", frame.clone())
            .candidate(FrameCloseButton, Block, "button[aria-label*=\"Close\"]", frame.clone())
            .candidate(FrameCloseButton, Block, ".close", frame.clone())
            .candidate(FrameCloseButton, Block, "[data-dismiss]", frame.clone())
            .candidate(FrameCloseButton, Block, ".modal-close", frame.clone())
            // Search
            .candidate(SearchToggle, any, "#wp-admin-bar-search a", doc.clone())
            .candidate(SearchInput, any, "#adminbar-search-input", doc.clone())
            .candidate(SearchInput, any, "input[name=\"s\"]", doc)
            .signatures([
                "components-modal__screen-overlay",
                "edit-site-layout__overlay",
                "edit-site-template-card",
                "edit-site-start-template-options",
                "block-editor-block-patterns-list",
                "pattern-selection-modal",
                "components-modal__frame",
                "components-modal__content",
                "edit-site-template-details",
            ]
            .into_iter()
            .map(OverlaySignature::class))
            .build()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::wordpress()
    }
}

#[derive(Debug, Default)]
pub struct CatalogBuilder {
    candidates: BTreeMap<LogicalTarget, Vec<SelectorCandidate>>,
    signatures: Vec<OverlaySignature>,
    editor_frame: Option<String>,
}

impl CatalogBuilder {
    /// Append a candidate after those already registered for `target`.
    pub fn candidate(
        self,
        target: LogicalTarget,
        variant: UiVariant,
        selector: &str,
        scope: FrameScope,
    ) -> Self {
        self.picked(target, variant, selector, scope, Pick::First)
    }

    pub fn picked(
        mut self,
        target: LogicalTarget,
        variant: UiVariant,
        selector: &str,
        scope: FrameScope,
        pick: Pick,
    ) -> Self {
        self.candidates
            .entry(target)
            .or_default()
            .push(SelectorCandidate {
                target,
                variant,
                selector: selector.to_string(),
                scope,
                pick,
            });
        self
    }

    pub fn signature(mut self, signature: OverlaySignature) -> Self {
        if !self.signatures.contains(&signature) {
            self.signatures.push(signature);
        }
        self
    }

    pub fn signatures(self, signatures: impl IntoIterator<Item = OverlaySignature>) -> Self {
        signatures.into_iter().fold(self, |b, s| b.signature(s))
    }

    pub fn editor_frame(mut self, selector: &str) -> Self {
        self.editor_frame = Some(selector.to_string());
        self
    }

    pub fn build(self) -> Catalog {
        Catalog {
            candidates: self.candidates,
            signatures: self.signatures,
            editor_frame: self
                .editor_frame
                .unwrap_or_else(|| EDITOR_CANVAS_FRAME.to_string()),
        }
    }
}

impl From<Catalog> for CatalogBuilder {
    fn from(catalog: Catalog) -> Self {
        Self {
            candidates: catalog.candidates,
            signatures: catalog.signatures,
            editor_frame: Some(catalog.editor_frame),
        }
    }
}
