use crate::error::StabilizationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A UI concept addressed independently of how the current editor renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalTarget {
    LoginUsername,
    LoginPassword,
    LoginSubmit,
    LoginError,
    AdminBar,
    AdminMenu,
    LogoutLink,
    /// Present only when the block editor rendered.
    BlockEditorMarker,
    /// Present only when the classic form editor rendered.
    ClassicEditorMarker,
    TitleField,
    BlockAppender,
    ContentField,
    /// The editable region that receives typing when no specific block resolves.
    WritingSurface,
    PublishAction,
    PublishConfirm,
    OverlayRoot,
    FrameCloseButton,
    SearchToggle,
    SearchInput,
}

impl LogicalTarget {
    pub const ALL: [LogicalTarget; 19] = [
        LogicalTarget::LoginUsername,
        LogicalTarget::LoginPassword,
        LogicalTarget::LoginSubmit,
        LogicalTarget::LoginError,
        LogicalTarget::AdminBar,
        LogicalTarget::AdminMenu,
        LogicalTarget::LogoutLink,
        LogicalTarget::BlockEditorMarker,
        LogicalTarget::ClassicEditorMarker,
        LogicalTarget::TitleField,
        LogicalTarget::BlockAppender,
        LogicalTarget::ContentField,
        LogicalTarget::WritingSurface,
        LogicalTarget::PublishAction,
        LogicalTarget::PublishConfirm,
        LogicalTarget::OverlayRoot,
        LogicalTarget::FrameCloseButton,
        LogicalTarget::SearchToggle,
        LogicalTarget::SearchInput,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogicalTarget::LoginUsername => "login_username",
            LogicalTarget::LoginPassword => "login_password",
            LogicalTarget::LoginSubmit => "login_submit",
            LogicalTarget::LoginError => "login_error",
            LogicalTarget::AdminBar => "admin_bar",
            LogicalTarget::AdminMenu => "admin_menu",
            LogicalTarget::LogoutLink => "logout_link",
            LogicalTarget::BlockEditorMarker => "block_editor_marker",
            LogicalTarget::ClassicEditorMarker => "classic_editor_marker",
            LogicalTarget::TitleField => "title_field",
            LogicalTarget::BlockAppender => "block_appender",
            LogicalTarget::ContentField => "content_field",
            LogicalTarget::WritingSurface => "writing_surface",
            LogicalTarget::PublishAction => "publish_action",
            LogicalTarget::PublishConfirm => "publish_confirm",
            LogicalTarget::OverlayRoot => "overlay_root",
            LogicalTarget::FrameCloseButton => "frame_close_button",
            LogicalTarget::SearchToggle => "search_toggle",
            LogicalTarget::SearchInput => "search_input",
        }
    }
}

impl fmt::Display for LogicalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogicalTarget {
    type Err = StabilizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        LogicalTarget::ALL
            .iter()
            .copied()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| StabilizationError::UnknownTarget(s.to_string()))
    }
}

/// One of the mutually exclusive renderings of the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiVariant {
    /// Not derived yet for this page load. As a candidate hint: applies to every variant.
    #[default]
    Unknown,
    /// Block editor; content may live inside the `editor-canvas` iframe.
    Block,
    /// Flat form editor (`#title`, `#content`).
    Classic,
}

impl UiVariant {
    /// Whether a candidate tagged with `self` applies when the page renders `variant`.
    pub fn applies_to(&self, variant: UiVariant) -> bool {
        *self == UiVariant::Unknown || variant == UiVariant::Unknown || *self == variant
    }
}

impl fmt::Display for UiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiVariant::Unknown => write!(f, "unknown"),
            UiVariant::Block => write!(f, "block"),
            UiVariant::Classic => write!(f, "classic"),
        }
    }
}

/// Which document a selector is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameScope {
    #[default]
    Document,
    /// The content document of the first iframe matching `frame`.
    EmbeddedFrame { frame: String },
}

impl FrameScope {
    pub fn frame(selector: impl Into<String>) -> Self {
        FrameScope::EmbeddedFrame {
            frame: selector.into(),
        }
    }

    pub fn frame_selector(&self) -> Option<&str> {
        match self {
            FrameScope::Document => None,
            FrameScope::EmbeddedFrame { frame } => Some(frame),
        }
    }
}

impl fmt::Display for FrameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameScope::Document => write!(f, "document"),
            FrameScope::EmbeddedFrame { frame } => write!(f, "frame({})", frame),
        }
    }
}

/// Which of several matches an interaction applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pick {
    #[default]
    First,
    Last,
}

/// A concrete, re-queryable address of an element.
///
/// Queries are evaluated fresh on every use, so a query that matched once can
/// come back empty after the page re-rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementQuery {
    pub selector: String,
    #[serde(default)]
    pub scope: FrameScope,
    /// Only elements whose text content contains this string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub pick: Pick,
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            scope: FrameScope::Document,
            text: None,
            pick: Pick::First,
        }
    }

    pub fn in_scope(mut self, scope: FrameScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn last(mut self) -> Self {
        self.pick = Pick::Last;
        self
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.selector, self.scope)?;
        if let Some(text) = &self.text {
            write!(f, " containing {:?}", text)?;
        }
        Ok(())
    }
}

/// One way of finding a logical target, in catalog preference order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub target: LogicalTarget,
    #[serde(default)]
    pub variant: UiVariant,
    pub selector: String,
    #[serde(default)]
    pub scope: FrameScope,
    #[serde(default)]
    pub pick: Pick,
}

impl SelectorCandidate {
    pub fn query(&self) -> ElementQuery {
        ElementQuery {
            selector: self.selector.clone(),
            scope: self.scope.clone(),
            text: None,
            pick: self.pick,
        }
    }
}

/// Denylist entry identifying a transient blocking element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlaySignature {
    Class(String),
    Attribute {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl OverlaySignature {
    pub fn class(name: impl Into<String>) -> Self {
        OverlaySignature::Class(name.into())
    }

    pub fn attribute(name: impl Into<String>, value: Option<&str>) -> Self {
        OverlaySignature::Attribute {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }

    /// CSS selector matching elements carrying this signature.
    pub fn selector(&self) -> String {
        match self {
            OverlaySignature::Class(class) => format!(".{}", class),
            OverlaySignature::Attribute { name, value: None } => format!("[{}]", name),
            OverlaySignature::Attribute {
                name,
                value: Some(value),
            } => format!("[{}=\"{}\"]", name, value.replace('"', "\\\"")),
        }
    }
}
