use std::env;

use crate::error::SearchError;

pub const DEFAULT_MODEL: &str = "grok-4-1-fast";
const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";
const DEFAULT_IMAGE_UNDERSTANDING: bool = true;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// `None` leaves the HTTP client's own default in place.
    pub timeout_secs: Option<u64>,
    pub enable_image_understanding: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let api_key = parse_non_empty(get_var("XAI_API_KEY").as_deref());
        let model = parse_non_empty(get_var("XAI_MODEL").as_deref())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = parse_non_empty(get_var("XAI_BASE_URL").as_deref())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = parse_timeout_secs(get_var("XAI_TIMEOUT_SECS").as_deref());
        let enable_image_understanding = parse_bool(
            get_var("XAI_IMAGE_UNDERSTANDING").as_deref(),
            DEFAULT_IMAGE_UNDERSTANDING,
        );

        Self {
            api_key,
            model,
            base_url,
            timeout_secs,
            enable_image_understanding,
        }
    }

    pub fn api_key(&self) -> Result<&str, SearchError> {
        self.api_key.as_deref().ok_or(SearchError::Configuration)
    }
}

fn parse_non_empty(raw: Option<&str>) -> Option<String> {
    raw.filter(|value| !value.is_empty()).map(str::to_string)
}

fn parse_timeout_secs(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
