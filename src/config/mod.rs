use std::env;
use std::time::Duration;

use url::Url;

use crate::error::AppError;
use crate::flow::FlowConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub survey: SurveyConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub transitions: TransitionConfig,
}

/// Survey selection and recording configuration
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// Built-in graph name
    pub name: String,
    /// Page URL whose query string holds the address-bar state
    pub base_url: Url,
    /// Snapshot sink endpoint; `None` disables delivery
    pub sink_url: Option<String>,
    pub record_anonymous: bool,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

/// Auto-advance delays and transition pacing
#[derive(Debug, Clone)]
pub struct TransitionConfig {
    pub scale_delay_ms: u64,
    pub choice_delay_ms: u64,
    /// Multiplier on paced player timings
    pub pace: f64,
}

/// Snapshot sink client configuration
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw_base = env::var("SURVEY_BASE_URL").unwrap_or_else(|_| "http://localhost/nps".to_string());
        let survey = SurveyConfig {
            name: env::var("SURVEY_NAME").unwrap_or_else(|_| "nps".to_string()),
            base_url: Url::parse(&raw_base).map_err(|e| AppError::Config {
                message: format!("SURVEY_BASE_URL is not a valid URL: {}", e),
            })?,
            sink_url: env::var("SURVEY_SINK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            record_anonymous: env::var("SURVEY_RECORD_ANONYMOUS")
                .ok()
                .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10000),
        };

        let defaults = TransitionConfig::default();
        let transitions = TransitionConfig {
            scale_delay_ms: env::var("AUTO_ADVANCE_SCALE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.scale_delay_ms),
            choice_delay_ms: env::var("AUTO_ADVANCE_CHOICE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.choice_delay_ms),
            pace: env::var("TRANSITION_PACE")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|p| p.is_finite() && *p >= 0.0)
                .unwrap_or(defaults.pace),
        };

        Ok(Config {
            survey,
            logging,
            request,
            transitions,
        })
    }

    /// Sink client settings, if a sink is configured
    pub fn sink(&self) -> Option<SinkConfig> {
        self.survey.sink_url.as_ref().map(|url| SinkConfig {
            url: url.clone(),
            timeout_ms: self.request.timeout_ms,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 10000 }
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            scale_delay_ms: 80,
            choice_delay_ms: 350,
            pace: 1.0,
        }
    }
}

impl TransitionConfig {
    /// Auto-advance delays for the orchestrator
    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig {
            scale_delay: Duration::from_millis(self.scale_delay_ms),
            choice_delay: Duration::from_millis(self.choice_delay_ms),
        }
    }
}
