use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Invalid article link: {0}")]
    InvalidLink(String),
    #[error("Failed to open article link: {0}")]
    Launch(String),
}

/// Hands an article link to something that can display it.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), OpenError>;
}

/// Opens links in the platform's default browser.
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), OpenError> {
        let url = checked_link(url)?;
        info!("Opening {}", url);
        open::that_detached(url.as_str()).map_err(|e| OpenError::Launch(e.to_string()))
    }
}

/// Only absolute http(s) links are handed to the platform.
pub fn checked_link(url: &str) -> Result<Url, OpenError> {
    let parsed = Url::parse(url.trim()).map_err(|e| OpenError::InvalidLink(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(OpenError::InvalidLink(format!("unsupported scheme {}", scheme))),
    }
}
