use std::collections::BTreeMap;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::sse::DEFAULT_MAX_BUFFER_SIZE;
use crate::url::DEFAULT_BASE_URL;

pub const DEFAULT_USER_AGENT: &str = "gpt-client";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_ORGANIZATION: &str = "OPENAI_ORGANIZATION";
pub const ENV_AZURE_API_KEY: &str = "AZURE_OPENAI_API_KEY";

/// Transport configuration. Immutable once handed to a client, so one value
/// can back any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bearer token passed in `Authorization`.
    pub api_key: String,
    /// Azure-style key passed in `api-key`.
    pub azure_api_key: Option<String>,
    /// Value for the `OpenAI-Organization` header.
    pub organization: Option<String>,
    pub base_url: String,
    pub user_agent: String,
    /// Raw query string appended to every endpoint, e.g. `api-version=2023-05-15`.
    pub query: Option<String>,
    pub timeout: Option<Duration>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    pub retry: RetryPolicy,
    /// Longest event-stream line accepted before decoding fails.
    pub max_buffer_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            azure_api_key: None,
            organization: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            query: None,
            timeout: Some(DEFAULT_TIMEOUT),
            extra_headers: BTreeMap::new(),
            retry: RetryPolicy::default(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read credentials and endpoint overrides from the environment.
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::new(read(ENV_API_KEY).unwrap_or_default());
        if let Some(base_url) = read(ENV_BASE_URL) {
            config = config.with_base_url(base_url);
        }
        if let Some(organization) = read(ENV_ORGANIZATION) {
            config = config.with_organization(organization);
        }
        if let Some(azure_api_key) = read(ENV_AZURE_API_KEY) {
            config = config.with_azure_api_key(azure_api_key);
        }
        config
    }

    /// Empty values keep the current base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url;
        }
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_azure_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.azure_api_key = Some(api_key.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Zero falls back to the default attempt count.
    pub fn with_max_retry(mut self, max_attempts: u32) -> Self {
        self.retry = self.retry.with_max_attempts(max_attempts);
        self
    }

    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }
}
