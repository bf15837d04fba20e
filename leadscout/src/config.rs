//! Configuration for the pipeline and its collaborators.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Business-domain string threaded through every stage.
    #[serde(default = "default_business_domain")]
    pub business_domain: String,
    /// A company name the pipeline always excludes from identification and
    /// research, regardless of other matches. Empty disables the exclusion.
    #[serde(default)]
    pub excluded_company: String,
    /// Validation gating per stage.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Queue delivery retries per job.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Search fan-out settings.
    #[serde(default)]
    pub search: SearchConfig,
    /// Number of queue workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_business_domain() -> String {
    "IT Staff Augmentation".to_string()
}

fn default_workers() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            business_domain: default_business_domain(),
            excluded_company: String::new(),
            validation: ValidationConfig::default(),
            delivery: DeliveryConfig::default(),
            search: SearchConfig::default(),
            workers: default_workers(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the business domain.
    #[must_use]
    pub fn with_business_domain(mut self, domain: impl Into<String>) -> Self {
        self.business_domain = domain.into();
        self
    }

    /// Sets the excluded company name.
    #[must_use]
    pub fn with_excluded_company(mut self, name: impl Into<String>) -> Self {
        self.excluded_company = name.into();
        self
    }

    /// Sets the validation attempt bound.
    #[must_use]
    pub fn with_validation_attempts(mut self, attempts: usize) -> Self {
        self.validation.max_attempts = attempts;
        self
    }

    /// Sets the queue delivery options.
    #[must_use]
    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Validation-retry settings for stage gating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum stage executions per pipeline step (default: 2).
    #[serde(default = "default_validation_attempts")]
    pub max_attempts: usize,
}

fn default_validation_attempts() -> usize {
    2
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_validation_attempts(),
        }
    }
}

/// Delivery-retry settings for queued jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Total delivery attempts per job, including the first.
    #[serde(default = "default_delivery_attempts")]
    pub attempts: usize,
    /// Base delay between delivery attempts in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the computed backoff delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_delivery_attempts() -> usize {
    2
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            attempts: default_delivery_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl DeliveryConfig {
    /// Sets the attempt count.
    #[must_use]
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Base delay as a `Duration`.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Search fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of results requested per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,
}

fn default_results_per_query() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_per_query: default_results_per_query(),
        }
    }
}
