//! OrchestrationLoop - Fixed-Interval Verification Cycles
//!
//! ## Responsibilities
//!
//! - Fetch the property inventory at the start of every cycle
//! - Fan verification out across properties with a bounded pool
//! - Flush recorded events once per cycle
//! - Sleep a fixed interval measured from the end of one cycle to the
//!   start of the next
//!
//! Inventory access sits behind `InventoryProvider`, so the loop works
//! the same against a remote catalog and against fixture data in tests.

use crate::error::Result;
use crate::event_recorder::{EventRecorder, EventSink};
use crate::models::{Property, PropertyRecord};
use crate::verification_engine::VerificationEngine;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Source of the property/camera inventory, refreshed every cycle
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<PropertyRecord>>;
}

/// Fixed in-memory inventory, for fixtures and single-tenant setups
pub struct StaticInventory {
    records: Vec<PropertyRecord>,
}

impl StaticInventory {
    pub fn new(records: Vec<PropertyRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    async fn fetch(&self) -> Result<Vec<PropertyRecord>> {
        Ok(self.records.clone())
    }
}

/// Inventory backed by a JSON file, re-read every cycle so edits are
/// picked up without a restart
pub struct FileInventory {
    path: std::path::PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InventoryProvider for FileInventory {
    async fn fetch(&self) -> Result<Vec<PropertyRecord>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let records = serde_json::from_str(&raw)?;
        Ok(records)
    }
}

#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Worker ceiling for concurrent properties
    pub max_property_workers: usize,
    /// Fixed delay between property task submissions
    pub submit_delay: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            max_property_workers: 8,
            submit_delay: Duration::from_millis(100),
        }
    }
}

/// OrchestrationLoop instance
pub struct OrchestrationLoop {
    engine: Arc<VerificationEngine>,
    inventory: Arc<dyn InventoryProvider>,
    events: Arc<EventRecorder>,
    sink: Arc<dyn EventSink>,
    config: CycleConfig,
}

impl OrchestrationLoop {
    pub fn new(
        engine: Arc<VerificationEngine>,
        inventory: Arc<dyn InventoryProvider>,
        events: Arc<EventRecorder>,
        sink: Arc<dyn EventSink>,
        config: CycleConfig,
    ) -> Self {
        Self {
            engine,
            inventory,
            events,
            sink,
            config,
        }
    }

    /// Run cycles forever. A failed inventory fetch skips the cycle and
    /// waits out the normal interval.
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting verification loop"
        );
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Execute one full verification cycle
    pub async fn run_cycle(&self) {
        let started = std::time::Instant::now();

        let records = match self.inventory.fetch().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Inventory fetch failed, skipping cycle");
                return;
            }
        };

        let properties: Vec<Property> = records.iter().map(PropertyRecord::flatten).collect();
        if properties.is_empty() {
            tracing::warn!("Inventory is empty, nothing to verify");
            return;
        }

        let workers = self
            .config
            .max_property_workers
            .min(properties.len())
            .max(1);
        tracing::info!(
            properties = properties.len(),
            workers = workers,
            "Cycle started"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::new();

        for property in properties {
            let engine = Arc::clone(&self.engine);
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.unwrap();
                engine.verify_many(&property).await;
            }));

            tokio::time::sleep(self.config.submit_delay).await;
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Property verification task failed");
            }
        }

        self.events.flush(self.sink.as_ref()).await;

        tracing::info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Cycle finished"
        );
    }
}
