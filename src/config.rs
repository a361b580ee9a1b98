use std::time::Duration;

use reqwest::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(5);

/// Connection settings for the back-office API. Passed explicitly to
/// [`crate::core::api::RestClient::new`]; nothing is read from the
/// environment at call time.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid API base url {:?}: {}", base_url, e))?;
        Ok(Self {
            base_url,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WizardConfig {
    /// Trailing window in which a second submission of the same project
    /// name is treated as an accidental duplicate.
    pub duplicate_window: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
        }
    }
}
