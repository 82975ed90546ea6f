//! PNG rendering of slide HTML
//!
//! One browser instance serves the whole process, guarded by a mutex and
//! launched lazily on the first render. Each render stages the HTML to a
//! temp file, navigates the shared tab to it, and captures the canvas.

use crate::browser::{BrowserConfig, BrowserSession};
use async_trait::async_trait;
use slated_core::{Aspect, Result, SlatedError};
use std::io::Write;
use tokio::sync::Mutex;
use tracing::info;

/// Renderer seam: `(html, aspect) -> png bytes`
#[async_trait]
pub trait SlideRenderer: Send + Sync {
    async fn render(&self, html: &str, aspect: Aspect) -> Result<Vec<u8>>;
}

/// Headless-Chrome renderer
pub struct ChromeRenderer {
    session: Mutex<Option<BrowserSession>>,
}

impl ChromeRenderer {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }
}

impl Default for ChromeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlideRenderer for ChromeRenderer {
    async fn render(&self, html: &str, aspect: Aspect) -> Result<Vec<u8>> {
        let (width, height) = aspect.canvas();

        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(BrowserSession::launch(BrowserConfig::default())?);
        }
        let session = session.as_ref().expect("session initialized above");

        // Stage the document so the tab can load it over file://
        let mut staged = tempfile::Builder::new()
            .prefix("slated-slide-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| SlatedError::Render(format!("Failed to stage HTML: {}", e)))?;
        staged
            .write_all(html.as_bytes())
            .map_err(|e| SlatedError::Render(format!("Failed to stage HTML: {}", e)))?;
        staged
            .flush()
            .map_err(|e| SlatedError::Render(format!("Failed to stage HTML: {}", e)))?;

        let url = format!("file://{}", staged.path().display());
        session.navigate(&url)?;
        let bytes = session.capture_png(width, height)?;

        info!("Rendered {} preview ({} bytes)", aspect, bytes.len());
        Ok(bytes)
    }
}
