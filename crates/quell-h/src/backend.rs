use crate::cdp::CdpClient;
use crate::inject::{execute_action, inject_scanner};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use quell_engine::backend::{Backend, BackendError, KeyTarget, NavigationResult};
use quell_engine::protocol::{
    BodyTextRequest, DisconnectRequest, DispatchKeyRequest, InjectStyleRequest, ObserveRequest,
    QueryRequest, RemoveMatchingRequest, ScannerAction, ScannerProtocolResponse, SetValueRequest,
    StyleRequest,
};
use quell_engine::target::{ElementQuery, FrameScope};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Chromium over CDP. Every DOM capability is one scanner action evaluated
/// in the page; typing and focused key presses go through CDP input events
/// so editors see real keystrokes.
pub struct HeadlessBackend {
    client: RwLock<Option<CdpClient>>,
    visible: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::new_with_visibility(false)
    }

    pub fn new_with_visibility(visible: bool) -> Self {
        Self {
            client: RwLock::new(None),
            visible,
        }
    }

    /// Handle to the controlled page.
    pub async fn page(&self) -> Result<Page, BackendError> {
        self.client
            .read()
            .await
            .as_ref()
            .map(|client| client.page.clone())
            .ok_or(BackendError::NotReady)
    }

    async fn run(&self, action: ScannerAction) -> Result<Value, BackendError> {
        let page = self.page().await?;
        let raw = execute_action(&page, &action).await?;
        let response: ScannerProtocolResponse = serde_json::from_value(raw)?;
        response.into_value()
    }

    async fn run_query(
        &self,
        wrap: fn(QueryRequest) -> ScannerAction,
        query: &ElementQuery,
    ) -> Result<Value, BackendError> {
        self.run(wrap(QueryRequest {
            query: query.clone(),
        }))
        .await
    }

    async fn dispatch_cdp_key(&self, key: &str) -> Result<(), BackendError> {
        let page = self.page().await?;
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let is_down = kind == DispatchKeyEventType::KeyDown;
            let mut builder = DispatchKeyEventParams::builder().r#type(kind).key(key).code(key);
            if key == "Enter" {
                builder = builder.windows_virtual_key_code(13);
                if is_down {
                    builder = builder.text("\r");
                }
            }
            let event = builder
                .build()
                .map_err(|e| BackendError::Other(format!("Failed to build key event: {:?}", e)))?;
            page.execute(event)
                .await
                .map_err(|e| BackendError::Other(format!("press_key {} failed: {}", key, e)))?;
        }
        Ok(())
    }

    async fn get_navigation_result(page: &Page) -> Result<NavigationResult, BackendError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_count(value: Value) -> Result<usize, BackendError> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| BackendError::Scanner(format!("expected a count, got {}", value)))
}

fn optional_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn launch(&self) -> Result<(), BackendError> {
        let mut client = self.client.write().await;
        if client.is_some() {
            return Ok(());
        }
        info!("Launching headless backend (Chromium)...");
        let launched = CdpClient::launch(self.visible)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;
        *client = Some(launched);
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        let client = self.client.write().await.take();
        if let Some(client) = client {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn navigate(&self, url: &str) -> Result<NavigationResult, BackendError> {
        let page = self.page().await?;
        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;
        if let Err(e) = inject_scanner(&page).await {
            // Retried lazily by the next scanner action.
            debug!("Scanner not installed after navigation: {}", e);
        }
        Self::get_navigation_result(&page).await
    }

    async fn current_url(&self) -> Result<String, BackendError> {
        let page = self.page().await?;
        Ok(page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default())
    }

    async fn count(&self, query: &ElementQuery) -> Result<usize, BackendError> {
        expect_count(self.run_query(ScannerAction::Count, query).await?)
    }

    async fn text_of(&self, query: &ElementQuery) -> Result<Option<String>, BackendError> {
        Ok(optional_string(self.run_query(ScannerAction::Text, query).await?))
    }

    async fn value_of(&self, query: &ElementQuery) -> Result<Option<String>, BackendError> {
        Ok(optional_string(self.run_query(ScannerAction::Value, query).await?))
    }

    async fn is_enabled(&self, query: &ElementQuery) -> Result<bool, BackendError> {
        Ok(self
            .run_query(ScannerAction::Enabled, query)
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn set_value(&self, query: &ElementQuery, value: &str) -> Result<(), BackendError> {
        self.run(ScannerAction::SetValue(SetValueRequest {
            query: query.clone(),
            value: value.to_string(),
        }))
        .await?;
        Ok(())
    }

    async fn clear(&self, query: &ElementQuery) -> Result<(), BackendError> {
        self.run_query(ScannerAction::Clear, query).await?;
        Ok(())
    }

    async fn type_text(&self, query: &ElementQuery, text: &str) -> Result<(), BackendError> {
        self.run_query(ScannerAction::Focus, query).await?;
        let page = self.page().await?;
        page.execute(InsertTextParams::new(text))
            .await
            .map_err(|e| BackendError::Other(format!("insertText failed: {}", e)))?;
        Ok(())
    }

    async fn click(&self, query: &ElementQuery) -> Result<(), BackendError> {
        self.run_query(ScannerAction::Click, query).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str, target: KeyTarget) -> Result<(), BackendError> {
        if target == KeyTarget::Focused {
            return self.dispatch_cdp_key(key).await;
        }
        let dispatched = self
            .run(ScannerAction::DispatchKey(DispatchKeyRequest {
                key: key.to_string(),
                target,
            }))
            .await?;
        if dispatched.as_bool() == Some(false) {
            return Err(BackendError::ElementNotFound(format!("{} key target", key)));
        }
        Ok(())
    }

    async fn body_text(&self) -> Result<String, BackendError> {
        Ok(optional_string(self.run(ScannerAction::BodyText(BodyTextRequest {})).await?)
            .unwrap_or_default())
    }

    async fn remove_matching(
        &self,
        selectors: &[String],
        scope: &FrameScope,
    ) -> Result<usize, BackendError> {
        expect_count(
            self.run(ScannerAction::RemoveMatching(RemoveMatchingRequest {
                selectors: selectors.to_vec(),
                scope: scope.clone(),
            }))
            .await?,
        )
    }

    async fn inject_style(&self, id: &str, css: &str) -> Result<(), BackendError> {
        self.run(ScannerAction::InjectStyle(InjectStyleRequest {
            id: id.to_string(),
            css: css.to_string(),
        }))
        .await?;
        Ok(())
    }

    async fn remove_style(&self, id: &str) -> Result<bool, BackendError> {
        Ok(self
            .run(ScannerAction::RemoveStyle(StyleRequest { id: id.to_string() }))
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn observe_insertions(
        &self,
        id: &str,
        selectors: &[String],
        escape_on_match: bool,
    ) -> Result<(), BackendError> {
        self.run(ScannerAction::Observe(ObserveRequest {
            id: id.to_string(),
            selectors: selectors.to_vec(),
            escape_on_match,
        }))
        .await?;
        Ok(())
    }

    async fn disconnect_observer(&self, id: &str) -> Result<bool, BackendError> {
        Ok(self
            .run(ScannerAction::Disconnect(DisconnectRequest { id: id.to_string() }))
            .await?
            .as_bool()
            .unwrap_or(false))
    }
}
