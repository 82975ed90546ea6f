//! Browser lifecycle management using Chrome DevTools Protocol

use headless_chrome::protocol::cdp::Page;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use slated_core::{Result, SlatedError};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Active headless browser session
pub struct BrowserSession {
    /// Underlying browser instance (kept alive for tab lifetime)
    #[allow(dead_code)]
    browser: Browser,
    /// Current active tab
    tab: Arc<Tab>,
}

impl BrowserSession {
    /// Launch a new headless browser instance
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser ({}x{})",
            config.window_width, config.window_height
        );

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.window_width, config.window_height)))
            .build()
            .map_err(|e| SlatedError::Render(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| SlatedError::Render(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| SlatedError::Render(format!("Failed to create tab: {}", e)))?;

        info!("Browser launched successfully");

        Ok(Self { browser, tab })
    }

    /// Navigate to a URL and wait for the load to settle
    pub fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);

        self.tab
            .navigate_to(url)
            .map_err(|e| SlatedError::Render(format!("Failed to navigate to {}: {}", url, e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| SlatedError::Render(format!("Navigation timeout for {}: {}", url, e)))?;

        Ok(())
    }

    /// Capture a PNG of the given viewport region
    pub fn capture_png(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f64,
            height: height as f64,
            scale: 1.0,
        };

        let bytes = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| SlatedError::Render(format!("CDP capture failed: {}", e)))?;

        debug!("Captured {}x{} screenshot ({} bytes)", width, height, bytes.len());
        Ok(bytes)
    }
}
