use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, RemoteObject};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

type CdpResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub const CHROME_BIN_ENV: &str = "CHROME_BIN";
pub const USER_DATA_DIR_ENV: &str = "QUELL_USER_DATA_DIR";

/// The block editor collapses its sidebar below this width.
const WINDOW_SIZE: (u32, u32) = (1366, 900);

/// Browser launch settings.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub visible: bool,
    pub chrome_bin: Option<PathBuf>,
    /// Reused across runs when set; otherwise a throwaway profile is created.
    pub user_data_dir: Option<PathBuf>,
}

impl LaunchOptions {
    /// Settings for `visible`, with paths taken from `CHROME_BIN` and
    /// `QUELL_USER_DATA_DIR`.
    pub fn from_env(visible: bool) -> Self {
        let path = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };
        Self {
            visible,
            chrome_bin: path(CHROME_BIN_ENV),
            user_data_dir: path(USER_DATA_DIR_ENV),
        }
    }
}

/// Chromium profile directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    /// Supplied by the user; left in place on close.
    Persistent(PathBuf),
    /// Created for this session and deleted on close.
    Ephemeral(PathBuf),
}

impl Profile {
    pub fn prepare(requested: Option<&Path>) -> CdpResult<Self> {
        let profile = match requested {
            Some(dir) => Profile::Persistent(dir.to_path_buf()),
            None => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| format!("System clock error: {}", e))?
                    .as_nanos();
                Profile::Ephemeral(std::env::temp_dir().join(format!(
                    "quell-chromium-profile-{}-{}",
                    std::process::id(),
                    nanos
                )))
            }
        };
        std::fs::create_dir_all(profile.path())?;
        tracing::debug!("Using browser profile {:?}", profile);
        Ok(profile)
    }

    pub fn path(&self) -> &Path {
        match self {
            Profile::Persistent(path) | Profile::Ephemeral(path) => path,
        }
    }

    fn cleanup(&self) {
        if let Profile::Ephemeral(dir) = self {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::debug!("Failed to remove profile {}: {}", dir.display(), e);
            }
        }
    }
}

/// A launched browser with one controlled page.
pub struct CdpClient {
    pub browser: Browser,
    pub page: Page,
    handler_task: JoinHandle<()>,
    listeners: Vec<JoinHandle<()>>,
    profile: Profile,
}

impl CdpClient {
    pub async fn launch(visible: bool) -> CdpResult<Self> {
        Self::launch_with(LaunchOptions::from_env(visible)).await
    }

    pub async fn launch_with(options: LaunchOptions) -> CdpResult<Self> {
        let profile = Profile::prepare(options.user_data_dir.as_deref())?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1)
            .user_data_dir(profile.path());
        if options.visible {
            builder = builder.with_head();
        }
        if let Some(bin) = &options.chrome_bin {
            tracing::info!("Using Chrome binary {}", bin.display());
            builder = builder.chrome_executable(bin);
        }
        tracing::info!(
            "Launching Chromium ({})",
            if options.visible { "visible" } else { "headless" }
        );

        let launched = Browser::launch(
            builder
                .build()
                .map_err(|e| format!("Failed to build browser config: {}", e))?,
        )
        .await;
        let (browser, mut handler) = match launched {
            Ok(pair) => pair,
            Err(e) => {
                profile.cleanup();
                return Err(format!("Failed to launch browser: {}", e).into());
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {}", e);
                }
            }
            tracing::debug!("CDP handler finished");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to open page: {}", e))?;

        let listeners = vec![forward_console(&page).await?, accept_dialogs(&page).await?];

        Ok(Self {
            browser,
            page,
            handler_task,
            listeners,
            profile,
        })
    }

    pub async fn close(mut self) -> CdpResult<()> {
        for listener in &self.listeners {
            listener.abort();
        }
        let closed = self.browser.close().await;
        let finished = self.handler_task.await;
        self.profile.cleanup();

        closed.map_err(|e| format!("Failed to close browser: {}", e))?;
        finished.map_err(|e| format!("CDP handler panicked: {}", e))?;
        Ok(())
    }
}

/// Mirror page console output into the debug log.
async fn forward_console(page: &Page) -> CdpResult<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            tracing::debug!("console.{:?}: {}", event.r#type, render_args(&event.args));
        }
    }))
}

/// WordPress raises `beforeunload` prompts when leaving an unsaved post.
/// An open dialog blocks every evaluation, so accept them all.
async fn accept_dialogs(page: &Page) -> CdpResult<JoinHandle<()>> {
    let mut events = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;
    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            tracing::info!("Accepting {:?} dialog: {}", event.r#type, event.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                tracing::warn!("Failed to accept dialog: {}", e);
            }
        }
    }))
}

fn render_args(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(value), _) => value.to_string(),
            (None, Some(description)) => description.clone(),
            (None, None) => "?".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_profile_is_removed_on_cleanup() {
        let profile = Profile::prepare(None).unwrap();
        assert!(matches!(profile, Profile::Ephemeral(_)));
        assert!(profile.path().is_dir());
        profile.cleanup();
        assert!(!profile.path().exists());
    }

    #[test]
    fn persistent_profile_survives_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let requested = dir.path().join("profile");
        let profile = Profile::prepare(Some(&requested)).unwrap();
        assert_eq!(profile, Profile::Persistent(requested.clone()));
        profile.cleanup();
        assert!(requested.is_dir());
    }
}
