//! Application state
//!
//! Holds configuration and the shared components behind the API

use crate::alert_gateway::AlertDefaults;
use crate::event_recorder::EventLogStore;
use crate::result_cache::ResultCacheConfig;
use crate::verification_engine::probe::RetryConfig;
use crate::verification_engine::{EngineConfig, VerificationEngine};
use crate::orchestration::CycleConfig;
use std::sync::Arc;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Inventory JSON file path
    pub inventory_path: String,
    /// Ticketing endpoint for down/recovered alerts
    pub alert_url: String,
    pub alert_username: String,
    pub alert_password: String,
    /// Snapshot probe timeout
    pub probe_timeout: Duration,
    /// Retries after the first probe attempt
    pub probe_retries: u32,
    pub retry_backoff: Duration,
    /// Minimum Intelbras snapshot size in bytes
    pub min_image_size: u64,
    /// Idle connections kept per camera host
    pub http_pool_size: usize,
    pub alert_partition: String,
    pub alert_occurrence_down: i32,
    pub alert_occurrence_recovered: i32,
    pub alert_machine_code: i64,
    pub alert_occurrence_set: i32,
    pub cache_ttl_online: Duration,
    pub cache_ttl_offline: Duration,
    pub cache_escalation_threshold: u32,
    pub cache_prune_max_age: Duration,
    pub cache_prune_min_interval: Duration,
    /// Worker ceiling for cameras within one property
    pub camera_workers: usize,
    /// Worker ceiling for concurrent properties
    pub property_workers: usize,
    pub submit_delay: Duration,
    /// Pause between cycles, measured from cycle end
    pub cycle_interval: Duration,
    pub event_log_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8080),
            inventory_path: std::env::var("INVENTORY_PATH")
                .unwrap_or_else(|_| "/etc/camwatch/inventory.json".to_string()),
            alert_url: std::env::var("ALERT_URL").unwrap_or_default(),
            alert_username: std::env::var("ALERT_USERNAME").unwrap_or_default(),
            alert_password: std::env::var("ALERT_PASSWORD").unwrap_or_default(),
            probe_timeout: Duration::from_secs(env_or("PROBE_TIMEOUT_SECS", 12)),
            probe_retries: env_or("PROBE_RETRIES", 2),
            retry_backoff: Duration::from_secs(env_or("RETRY_BACKOFF_SECS", 1)),
            min_image_size: env_or("MIN_IMAGE_SIZE", 1024),
            http_pool_size: env_or("HTTP_POOL_SIZE", 50),
            alert_partition: std::env::var("ALERT_PARTITION").unwrap_or_else(|_| "01".to_string()),
            alert_occurrence_down: env_or("ALERT_OCCURRENCE_DOWN", 960),
            alert_occurrence_recovered: env_or("ALERT_OCCURRENCE_RECOVERED", 961),
            alert_machine_code: env_or("ALERT_MACHINE_CODE", 897),
            alert_occurrence_set: env_or("ALERT_OCCURRENCE_SET", 7),
            cache_ttl_online: Duration::from_secs(env_or("CACHE_TTL_ONLINE_SECS", 30)),
            cache_ttl_offline: Duration::from_secs(env_or("CACHE_TTL_OFFLINE_SECS", 120)),
            cache_escalation_threshold: env_or("CACHE_ESCALATION_THRESHOLD", 3),
            cache_prune_max_age: Duration::from_secs(env_or("CACHE_PRUNE_MAX_AGE_SECS", 60)),
            cache_prune_min_interval: Duration::from_secs(env_or(
                "CACHE_PRUNE_MIN_INTERVAL_SECS",
                300,
            )),
            camera_workers: env_or("CAMERA_WORKERS", 10),
            property_workers: env_or("PROPERTY_WORKERS", 8),
            submit_delay: Duration::from_millis(env_or("SUBMIT_DELAY_MS", 100)),
            cycle_interval: Duration::from_secs(env_or("CYCLE_INTERVAL_SECS", 600)),
            event_log_capacity: env_or("EVENT_LOG_CAPACITY", 2000),
        }
    }
}

impl AppConfig {
    pub fn cache_config(&self) -> ResultCacheConfig {
        ResultCacheConfig {
            ttl_online: self.cache_ttl_online,
            ttl_offline: self.cache_ttl_offline,
            escalation_threshold: self.cache_escalation_threshold,
            prune_max_age: self.cache_prune_max_age,
            prune_min_interval: self.cache_prune_min_interval,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            retries: self.probe_retries,
            backoff_base: self.retry_backoff,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_workers: self.camera_workers,
            submit_delay: self.submit_delay,
            retry: self.retry_config(),
            min_image_size: self.min_image_size,
            alert_defaults: AlertDefaults {
                partition: self.alert_partition.clone(),
                occurrence: self.alert_occurrence_down,
                recovered_occurrence: self.alert_occurrence_recovered,
                machine_code: self.alert_machine_code,
                occurrence_set: self.alert_occurrence_set,
            },
        }
    }

    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            interval: self.cycle_interval,
            max_property_workers: self.property_workers,
            submit_delay: self.submit_delay,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<VerificationEngine>,
    pub event_log: Arc<EventLogStore>,
}
