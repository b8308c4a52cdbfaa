use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ScreenshotCapturer: Send + Sync {
    /// Capture the page at `url` and return the stored screenshot URL, if any.
    async fn capture(&self, url: &str) -> Result<Option<String>>;
}

/// Capturer used when no browser is available; never produces a screenshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScreenshots;

#[async_trait]
impl ScreenshotCapturer for DisabledScreenshots {
    async fn capture(&self, _url: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
