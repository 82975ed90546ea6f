//! # slated-browser
//!
//! PNG preview rendering for generated slides.
//!
//! The service treats rendering as a pure function `(html, aspect) -> png
//! bytes`, expressed as the [`SlideRenderer`] trait. The production
//! implementation drives a single headless Chrome instance over the Chrome
//! DevTools Protocol, launched lazily on the first render.
//!
//! # Requirements
//!
//! - Chrome or Chromium installed; headless operation needs no further setup.

mod browser;
mod renderer;

pub use browser::{BrowserConfig, BrowserSession};
pub use renderer::{ChromeRenderer, SlideRenderer};
