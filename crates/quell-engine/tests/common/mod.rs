#![allow(dead_code)]

//! In-memory DOM backend for driving the engine without a browser.
//!
//! A node matches a query when its selector list contains the query's
//! selector verbatim. Frames are registered by selector and can be made
//! unreachable to exercise frame-access misses.

use async_trait::async_trait;
use quell_engine::backend::{Backend, BackendError, KeyTarget, NavigationResult};
use quell_engine::target::{ElementQuery, FrameScope, Pick};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub type NodeId = usize;

type Hook = Box<dyn FnMut(&mut Dom) + Send>;

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub selectors: Vec<String>,
    pub scope: FrameScope,
    pub text: String,
    pub value: Option<String>,
    pub enabled: bool,
    /// Ignores direct value assignment, like a framework-controlled input.
    pub rejects_set_value: bool,
    pub attached: bool,
}

impl FakeNode {
    pub fn new(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            scope: FrameScope::Document,
            text: String::new(),
            value: None,
            enabled: true,
            rejects_set_value: false,
            attached: true,
        }
    }

    pub fn in_frame(mut self, frame: &str) -> Self {
        self.scope = FrameScope::frame(frame);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn rejects_set_value(mut self) -> Self {
        self.rejects_set_value = true;
        self
    }

    fn matches_any(&self, selectors: &[String]) -> bool {
        selectors.iter().any(|s| self.selectors.contains(s))
    }
}

#[derive(Default)]
pub struct Dom {
    pub url: String,
    /// Makes `current_url` fail, as when the page is mid-unload.
    pub url_unreadable: bool,
    nodes: Vec<FakeNode>,
    frames: HashMap<String, bool>,
    styles: BTreeMap<String, String>,
    observers: BTreeMap<String, Vec<String>>,
    failing: HashSet<String>,
    click_hooks: Vec<(String, Hook)>,
    nav_hooks: Vec<(String, Hook)>,
    /// Ordered record of side effects (`observe:<id>`, `click:<selector>`, ...).
    pub events: Vec<String>,
    pub removals: usize,
}

impl Dom {
    /// Attach a node, passing it through the active insertion observers.
    pub fn insert(&mut self, node: FakeNode) -> NodeId {
        let observed = node.scope == FrameScope::Document
            && self.observers.values().any(|sels| node.matches_any(sels));
        let id = self.insert_unobserved(node);
        if observed {
            self.nodes[id].attached = false;
            self.removals += 1;
            self.events.push(format!("observer-removed:{}", id));
        }
        id
    }

    /// Attach a node the observers never see (a re-parented node).
    pub fn insert_unobserved(&mut self, node: FakeNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn frame(&mut self, selector: &str, accessible: bool) {
        self.frames.insert(selector.to_string(), accessible);
    }

    /// Make every probe for `selector` fail with a scanner error.
    pub fn fail_selector(&mut self, selector: &str) {
        self.failing.insert(selector.to_string());
    }

    pub fn on_click(&mut self, selector: &str, hook: impl FnMut(&mut Dom) + Send + 'static) {
        self.click_hooks.push((selector.to_string(), Box::new(hook)));
    }

    /// Run `hook` after navigating to any URL ending with `suffix`.
    pub fn on_navigate(&mut self, suffix: &str, hook: impl FnMut(&mut Dom) + Send + 'static) {
        self.nav_hooks.push((suffix.to_string(), Box::new(hook)));
    }

    pub fn node(&self, id: NodeId) -> &FakeNode {
        &self.nodes[id]
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.nodes[id].attached
    }

    /// Attached nodes carrying `selector`, in any scope.
    pub fn attached(&self, selector: &str) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.attached && n.selectors.iter().any(|s| s == selector))
            .count()
    }

    pub fn value_of_first(&self, selector: &str) -> Option<String> {
        self.nodes
            .iter()
            .find(|n| n.attached && n.selectors.iter().any(|s| s == selector))
            .and_then(|n| n.value.clone())
    }

    pub fn has_style(&self, id: &str) -> bool {
        self.styles.contains_key(id)
    }

    pub fn active_observers(&self) -> usize {
        self.observers.len()
    }

    pub fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn check_scope(&self, scope: &FrameScope) -> Result<(), BackendError> {
        match scope {
            FrameScope::Document => Ok(()),
            FrameScope::EmbeddedFrame { frame } => {
                if self.frames.get(frame).copied().unwrap_or(false) {
                    Ok(())
                } else {
                    Err(BackendError::FrameAccessDenied(frame.clone()))
                }
            }
        }
    }

    fn matching(&self, query: &ElementQuery) -> Result<Vec<NodeId>, BackendError> {
        self.check_scope(&query.scope)?;
        if self.failing.contains(&query.selector) {
            return Err(BackendError::Scanner(format!("probe failed: {}", query.selector)));
        }
        let needle = query.text.as_ref().map(|t| t.to_lowercase());
        Ok(self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.attached
                    && n.scope == query.scope
                    && n.selectors.contains(&query.selector)
                    && needle
                        .as_ref()
                        .is_none_or(|t| n.text.to_lowercase().contains(t.as_str()))
            })
            .map(|(id, _)| id)
            .collect())
    }

    fn pick(&self, query: &ElementQuery) -> Result<NodeId, BackendError> {
        let matches = self.matching(query)?;
        let picked = match query.pick {
            Pick::First => matches.first(),
            Pick::Last => matches.last(),
        };
        picked
            .copied()
            .ok_or_else(|| BackendError::ElementNotFound(query.to_string()))
    }

    fn run_click_hooks(&mut self, selector: &str) {
        let mut hooks = std::mem::take(&mut self.click_hooks);
        for (key, hook) in hooks.iter_mut() {
            if key == selector {
                hook(self);
            }
        }
        hooks.append(&mut self.click_hooks);
        self.click_hooks = hooks;
    }

    fn run_nav_hooks(&mut self, url: &str) {
        let mut hooks = std::mem::take(&mut self.nav_hooks);
        for (suffix, hook) in hooks.iter_mut() {
            if url.ends_with(suffix.as_str()) {
                hook(self);
            }
        }
        hooks.append(&mut self.nav_hooks);
        self.nav_hooks = hooks;
    }
}

#[derive(Default)]
pub struct FakeBackend {
    dom: Mutex<Dom>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_dom<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        let mut dom = self.dom.lock().unwrap();
        f(&mut dom)
    }

    pub fn as_backend(self: &Arc<Self>) -> Arc<dyn Backend> {
        Arc::clone(self) as Arc<dyn Backend>
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn launch(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, BackendError> {
        self.with_dom(|dom| {
            dom.url = url.to_string();
            dom.nodes.clear();
            dom.frames.clear();
            dom.styles.clear();
            dom.observers.clear();
            dom.events.push(format!("navigate:{}", url));
            dom.run_nav_hooks(url);
            Ok(NavigationResult {
                url: dom.url.clone(),
                title: String::new(),
                status: 200,
            })
        })
    }

    async fn current_url(&self) -> Result<String, BackendError> {
        self.with_dom(|dom| {
            if dom.url_unreadable {
                return Err(BackendError::Navigation("page is unloading".to_string()));
            }
            Ok(dom.url.clone())
        })
    }

    async fn count(&self, query: &ElementQuery) -> Result<usize, BackendError> {
        self.with_dom(|dom| dom.matching(query).map(|m| m.len()))
    }

    async fn text_of(&self, query: &ElementQuery) -> Result<Option<String>, BackendError> {
        self.with_dom(|dom| {
            let id = dom.pick(query)?;
            Ok(Some(dom.nodes[id].text.clone()))
        })
    }

    async fn value_of(&self, query: &ElementQuery) -> Result<Option<String>, BackendError> {
        self.with_dom(|dom| {
            let id = dom.pick(query)?;
            Ok(dom.nodes[id].value.clone())
        })
    }

    async fn is_enabled(&self, query: &ElementQuery) -> Result<bool, BackendError> {
        self.with_dom(|dom| {
            let id = dom.pick(query)?;
            Ok(dom.nodes[id].enabled)
        })
    }

    async fn set_value(&self, query: &ElementQuery, value: &str) -> Result<(), BackendError> {
        self.with_dom(|dom| {
            let id = dom.pick(query)?;
            let node = &mut dom.nodes[id];
            if !node.rejects_set_value {
                node.value = Some(value.to_string());
            }
            dom.events.push(format!("set:{}", query.selector));
            Ok(())
        })
    }

    async fn clear(&self, query: &ElementQuery) -> Result<(), BackendError> {
        self.with_dom(|dom| {
            let id = dom.pick(query)?;
            let node = &mut dom.nodes[id];
            if node.value.is_some() {
                node.value = Some(String::new());
            }
            dom.events.push(format!("clear:{}", query.selector));
            Ok(())
        })
    }

    async fn type_text(&self, query: &ElementQuery, text: &str) -> Result<(), BackendError> {
        self.with_dom(|dom| {
            let id = dom.pick(query)?;
            let node = &mut dom.nodes[id];
            node.value = Some(format!("{}{}", node.value.take().unwrap_or_default(), text));
            dom.events.push(format!("type:{}", query.selector));
            Ok(())
        })
    }

    async fn click(&self, query: &ElementQuery) -> Result<(), BackendError> {
        self.with_dom(|dom| {
            dom.pick(query)?;
            dom.events.push(format!("click:{}", query.selector));
            dom.run_click_hooks(&query.selector);
            Ok(())
        })
    }

    async fn press_key(&self, key: &str, target: KeyTarget) -> Result<(), BackendError> {
        self.with_dom(|dom| {
            let label = match &target {
                KeyTarget::Document => "document".to_string(),
                KeyTarget::Body => "body".to_string(),
                KeyTarget::Focused => "focused".to_string(),
                KeyTarget::FrameBody { frame } => {
                    dom.check_scope(&FrameScope::frame(frame.clone()))?;
                    "frame".to_string()
                }
            };
            dom.events.push(format!("key:{}:{}", key, label));
            Ok(())
        })
    }

    async fn body_text(&self) -> Result<String, BackendError> {
        Ok(self.with_dom(|dom| {
            dom.nodes
                .iter()
                .filter(|n| n.attached && n.scope == FrameScope::Document)
                .map(|n| n.text.as_str())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        }))
    }

    async fn remove_matching(
        &self,
        selectors: &[String],
        scope: &FrameScope,
    ) -> Result<usize, BackendError> {
        self.with_dom(|dom| {
            dom.check_scope(scope)?;
            let mut removed = 0;
            for node in dom.nodes.iter_mut() {
                if node.attached && &node.scope == scope && node.matches_any(selectors) {
                    node.attached = false;
                    removed += 1;
                }
            }
            dom.removals += removed;
            Ok(removed)
        })
    }

    async fn inject_style(&self, id: &str, css: &str) -> Result<(), BackendError> {
        self.with_dom(|dom| {
            dom.styles.insert(id.to_string(), css.to_string());
            dom.events.push(format!("style:{}", id));
            Ok(())
        })
    }

    async fn remove_style(&self, id: &str) -> Result<bool, BackendError> {
        Ok(self.with_dom(|dom| dom.styles.remove(id).is_some()))
    }

    async fn observe_insertions(
        &self,
        id: &str,
        selectors: &[String],
        _escape_on_match: bool,
    ) -> Result<(), BackendError> {
        self.with_dom(|dom| {
            dom.observers.insert(id.to_string(), selectors.to_vec());
            dom.events.push(format!("observe:{}", id));
            Ok(())
        })
    }

    async fn disconnect_observer(&self, id: &str) -> Result<bool, BackendError> {
        Ok(self.with_dom(|dom| {
            dom.events.push(format!("disconnect:{}", id));
            dom.observers.remove(id).is_some()
        }))
    }
}
