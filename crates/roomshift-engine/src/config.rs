use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
pub const DEFAULT_MODEL: &str = "adirik/interior-design";
pub const MOCK_MODEL: &str = "roomshift-mock";

const DEFAULT_TIMEOUT_SECS: u64 = 90;
const DEFAULT_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_SIMULATED_MS: RangeInclusive<u64> = 15_000..=45_000;

const DEFAULT_MOCK_BEFORE_URL: &str =
    "https://images.unsplash.com/photo-1560185007-cde436f6a4d0?w=1200&q=80";

const DEFAULT_MOCK_AFTER_URLS: &[&str] = &[
    "https://images.unsplash.com/photo-1586023492125-27b2c045efd7?w=1200&q=80",
    "https://images.unsplash.com/photo-1618221195710-dd6b41faaea6?w=1200&q=80",
    "https://images.unsplash.com/photo-1600210492486-724fe5c67fb0?w=1200&q=80",
    "https://images.unsplash.com/photo-1615529182904-14819c35db37?w=1200&q=80",
    "https://images.unsplash.com/photo-1616486338812-3dadae4b4ace?w=1200&q=80",
    "https://images.unsplash.com/photo-1617806118233-18e1de247200?w=1200&q=80",
];

/// Fixed parameters sent with every model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub num_outputs: u32,
    pub output_format: String,
    pub output_quality: u32,
    pub max_reference_images: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            num_outputs: 1,
            output_format: "jpg".to_string(),
            output_quality: 90,
            max_reference_images: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_base: String,
    /// Absent means every request short-circuits to the mock path.
    pub api_token: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub output: OutputSettings,
    pub simulated_ms: RangeInclusive<u64>,
    pub mock_before_url: String,
    pub mock_after_urls: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_token: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            output: OutputSettings::default(),
            simulated_ms: DEFAULT_SIMULATED_MS,
            mock_before_url: DEFAULT_MOCK_BEFORE_URL.to_string(),
            mock_after_urls: DEFAULT_MOCK_AFTER_URLS
                .iter()
                .map(|url| (*url).to_string())
                .collect(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let mut config = Self::default();

        config.api_token = value("REPLICATE_API_TOKEN").or_else(|| value("REPLICATE_API_KEY"));
        if let Some(base) = value("REPLICATE_API_BASE") {
            let base = base.trim_end_matches('/').to_string();
            if !base.is_empty() {
                config.api_base = base;
            }
        }
        if let Some(model) = value("ROOMSHIFT_MODEL") {
            config.model = model;
        }
        if let Some(secs) = value("ROOMSHIFT_TIMEOUT_SECS").and_then(|raw| raw.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs.clamp(1, 600));
        }
        if let Some(attempts) =
            value("ROOMSHIFT_MAX_ATTEMPTS").and_then(|raw| raw.parse::<u32>().ok())
        {
            config.max_attempts = attempts.clamp(1, 5);
        }
        if let Some(ms) = value("ROOMSHIFT_RETRY_DELAY_MS").and_then(|raw| raw.parse::<u64>().ok())
        {
            config.retry_delay = Duration::from_millis(ms.min(30_000));
        }
        if let Some(ms) =
            value("ROOMSHIFT_POLL_INTERVAL_MS").and_then(|raw| raw.parse::<u64>().ok())
        {
            config.poll_interval = Duration::from_millis(ms.clamp(200, 5_000));
        }
        if let Some(raw) = value("ROOMSHIFT_MOCK_AFTER_URLS") {
            let urls: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
            if !urls.is_empty() {
                config.mock_after_urls = urls;
            }
        }
        config
    }

    pub fn has_credential(&self) -> bool {
        self.api_token.is_some()
    }

    pub fn without_credential(mut self) -> Self {
        self.api_token = None;
        self
    }
}
