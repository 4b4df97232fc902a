//! VerificationEngine - Concurrent Camera Verification
//!
//! ## Responsibilities
//!
//! - Per-camera check: config validation, cache lookup, retried probe,
//!   transition detection, alert/event side effects
//! - Batch verification per property with a bounded worker pool and
//!   paced submission
//! - Per-property status snapshots, replaced wholesale each cycle
//!
//! The engine owns the result cache, the last-known-state map and the
//! snapshot store; the prober, alert gateway and event recorder are
//! injected boundaries.

pub mod probe;
pub mod transition;

use crate::alert_gateway::{
    build_alert_info, build_recovery_info, AlertDefaults, AlertGateway,
};
use crate::event_recorder::{EventKind, EventRecorder};
use crate::models::{AlertRouting, Camera, CameraStatus, Property, PropertySnapshot, SnapshotCamera};
use crate::protocol_adapter;
use crate::result_cache::{cache_key, failure_key, ResultCache};
use probe::{RetryConfig, SnapshotProber};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use transition::Transition;

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker ceiling for camera checks within one property
    pub max_workers: usize,
    /// Fixed delay between task submissions, to avoid bursting the
    /// target network (paced submission, not paced execution)
    pub submit_delay: Duration,
    pub retry: RetryConfig,
    /// Minimum Intelbras snapshot size in bytes
    pub min_image_size: u64,
    pub alert_defaults: AlertDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            submit_delay: Duration::from_millis(100),
            retry: RetryConfig::default(),
            min_image_size: 1024,
            alert_defaults: AlertDefaults::default(),
        }
    }
}

/// VerificationEngine instance
pub struct VerificationEngine {
    cache: ResultCache,
    /// Last known state per property+camera, engine-lifetime;
    /// drives edge detection only
    last_state: RwLock<HashMap<String, bool>>,
    /// Current snapshot per property
    snapshots: RwLock<HashMap<String, PropertySnapshot>>,
    prober: Arc<dyn SnapshotProber>,
    alerts: Arc<dyn AlertGateway>,
    events: Arc<EventRecorder>,
    config: EngineConfig,
}

impl VerificationEngine {
    pub fn new(
        cache: ResultCache,
        prober: Arc<dyn SnapshotProber>,
        alerts: Arc<dyn AlertGateway>,
        events: Arc<EventRecorder>,
        config: EngineConfig,
    ) -> Self {
        Self {
            cache,
            last_state: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            prober,
            alerts,
            events,
            config,
        }
    }

    /// Verify every camera of a property with a bounded worker pool.
    ///
    /// The property's snapshot is reset first; an empty camera list
    /// leaves it empty, signalling "nothing configured" to the status
    /// API. Completed checks append in completion order. A panicking
    /// check is logged and excluded without aborting its siblings.
    pub async fn verify_many(self: Arc<Self>, property: &Property) {
        {
            let mut snapshots = self.snapshots.write().await;
            snapshots.insert(
                property.name.clone(),
                PropertySnapshot {
                    cameras: Vec::new(),
                    metadata: property.routing.clone(),
                },
            );
        }

        if property.cameras.is_empty() {
            return;
        }

        self.cache.prune().await;

        let workers = self.config.max_workers.min(property.cameras.len()).max(1);
        tracing::info!(
            property = %property.name,
            cameras = property.cameras.len(),
            workers = workers,
            delay_ms = self.config.submit_delay.as_millis() as u64,
            "Verifying cameras"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::new();

        for camera in property.cameras.iter().cloned() {
            let engine = Arc::clone(&self);
            let semaphore = semaphore.clone();
            let property_name = property.name.clone();
            let routing = property.routing.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.unwrap();
                let (name, status) = engine
                    .verify_one(&camera, &property_name, routing.as_ref())
                    .await;

                let mut snapshots = engine.snapshots.write().await;
                if let Some(snapshot) = snapshots.get_mut(&property_name) {
                    snapshot.cameras.push(SnapshotCamera { name, status });
                }
            }));

            tokio::time::sleep(self.config.submit_delay).await;
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(
                    property = %property.name,
                    error = %e,
                    "Camera check task failed"
                );
            }
        }
    }

    /// Check a single camera and return its display name and status.
    ///
    /// A camera missing ip or credentials is terminal NO_CONFIG: no
    /// probe, no cache write, no alert. A fresh cache entry supplies
    /// the state without a network call, but transition detection and
    /// alerting still run against it.
    pub async fn verify_one(
        &self,
        camera: &Camera,
        property: &str,
        routing: Option<&AlertRouting>,
    ) -> (String, CameraStatus) {
        let target = match protocol_adapter::resolve(camera) {
            Ok(target) => target,
            Err(_) => {
                tracing::warn!(
                    property = %property,
                    camera = %camera.name,
                    "Camera lacks ip or credentials, skipping probe"
                );
                return (camera.name.clone(), CameraStatus::NoConfig);
            }
        };

        let key = cache_key(
            property,
            &camera.name,
            &target.ip,
            &target.channel,
            target.protocol.as_str(),
        );
        let fkey = failure_key(property, &camera.name);

        if let Some(cached) = self.cache.lookup(&key, &fkey).await {
            tracing::debug!(
                property = %property,
                camera = %camera.name,
                online = cached,
                "Status served from cache"
            );
            self.apply_transition(camera, property, routing, cached).await;
            return (camera.name.clone(), Self::status_of(cached));
        }

        let online = probe::probe_with_retry(
            self.prober.as_ref(),
            &target,
            &camera.name,
            &self.config.retry,
            self.config.min_image_size,
        )
        .await;

        tracing::info!(
            property = %property,
            camera = %camera.name,
            protocol = %target.protocol.as_str(),
            online = online,
            "Camera verified"
        );

        self.cache.store(&key, online).await;
        self.cache.record_outcome(&fkey, online).await;
        self.apply_transition(camera, property, routing, online).await;

        (camera.name.clone(), Self::status_of(online))
    }

    fn status_of(online: bool) -> CameraStatus {
        if online {
            CameraStatus::On
        } else {
            CameraStatus::Off
        }
    }

    /// Compare against the last known state, fire side effects on an
    /// edge, then overwrite the state unconditionally
    async fn apply_transition(
        &self,
        camera: &Camera,
        property: &str,
        routing: Option<&AlertRouting>,
        online: bool,
    ) {
        let state_key = failure_key(property, &camera.name);
        let prev = self.last_state.read().await.get(&state_key).copied();

        if let Some(tr) = transition::detect(prev, online) {
            self.emit(tr, camera, property, routing).await;
        }

        self.last_state
            .write()
            .await
            .insert(state_key, online);
    }

    async fn emit(
        &self,
        tr: Transition,
        camera: &Camera,
        property: &str,
        routing: Option<&AlertRouting>,
    ) {
        let defaults = &self.config.alert_defaults;
        let (info, kind) = match tr {
            Transition::Down => {
                tracing::warn!(
                    property = %property,
                    camera = %camera.name,
                    "Camera went offline"
                );
                (build_alert_info(camera, property, routing, defaults), EventKind::Down)
            }
            Transition::Recovered => {
                tracing::info!(
                    property = %property,
                    camera = %camera.name,
                    "Camera back online"
                );
                (
                    build_recovery_info(camera, property, routing, defaults),
                    EventKind::Recovered,
                )
            }
        };

        // At most one delivery attempt per transition; the gateway
        // logs failures and the cached state is unaffected either way
        let _delivered = self.alerts.send(&info, property).await;
        self.events.enqueue(camera.correlation_id, kind).await;
    }

    /// Current snapshot of every property
    pub async fn snapshot(&self) -> HashMap<String, PropertySnapshot> {
        self.snapshots.read().await.clone()
    }

    /// Snapshot filtered by company code
    pub async fn snapshot_for_company(&self, company: i64) -> HashMap<String, PropertySnapshot> {
        self.snapshots
            .read()
            .await
            .iter()
            .filter(|(_, snap)| {
                snap.metadata
                    .as_ref()
                    .and_then(|m| m.company)
                    .map(|c| c == company)
                    .unwrap_or(false)
            })
            .map(|(name, snap)| (name.clone(), snap.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_gateway::AlertInfo;
    use crate::error::{Error, Result};
    use crate::protocol_adapter::ProbeTarget;
    use crate::result_cache::ResultCacheConfig;
    use async_trait::async_trait;
    use probe::ProbeResponse;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Prober scripted by target ip: true -> image response, false ->
    /// transport error. Counts fetches and tracks peak concurrency.
    struct ScriptedProber {
        online: HashMap<String, bool>,
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
        panic_ip: Option<String>,
    }

    impl ScriptedProber {
        fn new(online: HashMap<String, bool>) -> Self {
            Self {
                online,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                panic_ip: None,
            }
        }
    }

    #[async_trait]
    impl SnapshotProber for ScriptedProber {
        async fn fetch(&self, target: &ProbeTarget) -> Result<ProbeResponse> {
            if self.panic_ip.as_deref() == Some(target.ip.as_str()) {
                panic!("scripted panic for {}", target.ip);
            }

            self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.online.get(&target.ip).copied().unwrap_or(false) {
                Ok(ProbeResponse {
                    status: 200,
                    content_type: Some("image/jpeg".to_string()),
                    content_length: Some(4096),
                })
            } else {
                Err(Error::Internal("connection refused".to_string()))
            }
        }
    }

    /// Gateway recording every delivered alert
    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<AlertInfo>>,
    }

    #[async_trait]
    impl AlertGateway for RecordingGateway {
        async fn send(&self, info: &AlertInfo, _property: &str) -> bool {
            self.sent.lock().await.push(info.clone());
            true
        }
    }

    fn camera(name: &str, ip: &str) -> Camera {
        Camera {
            name: name.to_string(),
            device_ip: Some(ip.to_string()),
            device_username: Some("admin".to_string()),
            device_password: Some("pw".to_string()),
            correlation_id: Some(uuid::Uuid::new_v4()),
            ..Default::default()
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            max_workers: 10,
            submit_delay: Duration::ZERO,
            retry: RetryConfig {
                retries: 0,
                backoff_base: Duration::ZERO,
            },
            ..Default::default()
        }
    }

    /// Cache that never serves hits, so every check really probes
    fn no_hit_cache() -> ResultCache {
        ResultCache::new(ResultCacheConfig {
            ttl_online: Duration::ZERO,
            ttl_offline: Duration::ZERO,
            ..Default::default()
        })
    }

    fn engine_with(
        prober: Arc<ScriptedProber>,
        gateway: Arc<RecordingGateway>,
        cache: ResultCache,
    ) -> Arc<VerificationEngine> {
        Arc::new(VerificationEngine::new(
            cache,
            prober,
            gateway,
            Arc::new(EventRecorder::new()),
            fast_config(),
        ))
    }

    #[tokio::test]
    async fn missing_config_never_reaches_the_network() {
        let prober = Arc::new(ScriptedProber::new(HashMap::new()));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober.clone(), gateway.clone(), no_hit_cache());

        let mut cam = camera("Gate", "10.0.0.20");
        cam.device_password = None;

        let (name, status) = engine.verify_one(&cam, "Aurora", None).await;
        assert_eq!(name, "Gate");
        assert_eq!(status, CameraStatus::NoConfig);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
        assert!(gateway.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn cache_hit_skips_the_probe() {
        let prober = Arc::new(ScriptedProber::new(HashMap::from([(
            "10.0.0.20".to_string(),
            true,
        )])));
        let gateway = Arc::new(RecordingGateway::default());
        // Default TTLs: the second check lands within the 30s window
        let engine = engine_with(prober.clone(), gateway, ResultCache::with_defaults());

        let cam = camera("Gate", "10.0.0.20");
        let (_, first) = engine.verify_one(&cam, "Aurora", None).await;
        let (_, second) = engine.verify_one(&cam, "Aurora", None).await;

        assert_eq!(first, CameraStatus::On);
        assert_eq!(second, CameraStatus::On);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn alert_fires_exactly_on_transitions() {
        let prober = Arc::new(ScriptedProber::new(HashMap::from([(
            "10.0.0.20".to_string(),
            false,
        )])));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober.clone(), gateway.clone(), no_hit_cache());
        let cam = camera("Gate", "10.0.0.20");

        // First seen offline: one down alert
        engine.verify_one(&cam, "Aurora", None).await;
        assert_eq!(gateway.sent.lock().await.len(), 1);
        assert_eq!(gateway.sent.lock().await[0].occurrence, 960);

        // Still offline: no further alert
        engine.verify_one(&cam, "Aurora", None).await;
        assert_eq!(gateway.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn recovery_alert_uses_distinct_occurrence() {
        let online = AtomicBool::new(false);

        struct FlipProber {
            online: AtomicBool,
        }

        #[async_trait]
        impl SnapshotProber for FlipProber {
            async fn fetch(&self, _target: &ProbeTarget) -> Result<ProbeResponse> {
                if self.online.load(Ordering::SeqCst) {
                    Ok(ProbeResponse {
                        status: 200,
                        content_type: Some("image/jpeg".to_string()),
                        content_length: Some(4096),
                    })
                } else {
                    Err(Error::Internal("connection refused".to_string()))
                }
            }
        }

        let prober = Arc::new(FlipProber { online });
        let gateway = Arc::new(RecordingGateway::default());
        let engine = Arc::new(VerificationEngine::new(
            no_hit_cache(),
            prober.clone(),
            gateway.clone(),
            Arc::new(EventRecorder::new()),
            fast_config(),
        ));
        let cam = camera("Gate", "10.0.0.20");

        engine.verify_one(&cam, "Aurora", None).await;
        prober.online.store(true, Ordering::SeqCst);
        engine.verify_one(&cam, "Aurora", None).await;

        let sent = gateway.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].occurrence, 960);
        assert_eq!(sent[1].occurrence, 961);
        assert_eq!(sent[1].complement, "Gate back online");
    }

    #[tokio::test]
    async fn first_seen_online_is_silent() {
        let prober = Arc::new(ScriptedProber::new(HashMap::from([(
            "10.0.0.20".to_string(),
            true,
        )])));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober, gateway.clone(), no_hit_cache());

        engine
            .verify_one(&camera("Gate", "10.0.0.20"), "Aurora", None)
            .await;
        assert!(gateway.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn worker_ceiling_bounds_concurrent_probes() {
        let mut online = HashMap::new();
        for i in 0..6 {
            online.insert(format!("10.0.0.{}", i), true);
        }
        let prober = Arc::new(ScriptedProber::new(online));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = Arc::new(VerificationEngine::new(
            no_hit_cache(),
            prober.clone(),
            gateway,
            Arc::new(EventRecorder::new()),
            EngineConfig {
                max_workers: 2,
                ..fast_config()
            },
        ));

        let property = Property {
            name: "Aurora".to_string(),
            routing: None,
            cameras: (0..6)
                .map(|i| camera(&format!("Cam{}", i), &format!("10.0.0.{}", i)))
                .collect(),
        };

        engine.clone().verify_many(&property).await;
        assert!(prober.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(engine.snapshot().await["Aurora"].cameras.len(), 6);
    }

    #[tokio::test]
    async fn one_panicking_check_does_not_abort_siblings() {
        let mut online = HashMap::new();
        for i in 0..3 {
            online.insert(format!("10.0.0.{}", i), true);
        }
        let mut prober = ScriptedProber::new(online);
        prober.panic_ip = Some("10.0.0.1".to_string());
        let prober = Arc::new(prober);
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober, gateway, no_hit_cache());

        let property = Property {
            name: "Aurora".to_string(),
            routing: None,
            cameras: (0..3)
                .map(|i| camera(&format!("Cam{}", i), &format!("10.0.0.{}", i)))
                .collect(),
        };

        engine.clone().verify_many(&property).await;
        let snapshot = engine.snapshot().await;
        // The panicking camera is excluded; its siblings are present
        assert_eq!(snapshot["Aurora"].cameras.len(), 2);
    }

    #[tokio::test]
    async fn empty_camera_list_yields_empty_snapshot_entry() {
        let prober = Arc::new(ScriptedProber::new(HashMap::new()));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober, gateway, no_hit_cache());

        let property = Property {
            name: "Vacant".to_string(),
            routing: None,
            cameras: Vec::new(),
        };

        engine.clone().verify_many(&property).await;
        let snapshot = engine.snapshot().await;
        assert!(snapshot.contains_key("Vacant"));
        assert!(snapshot["Vacant"].cameras.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_reset_wholesale_per_property() {
        let prober = Arc::new(ScriptedProber::new(HashMap::from([(
            "10.0.0.20".to_string(),
            true,
        )])));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober, gateway, no_hit_cache());

        let property = Property {
            name: "Aurora".to_string(),
            routing: None,
            cameras: vec![camera("Gate", "10.0.0.20")],
        };

        engine.clone().verify_many(&property).await;
        engine.clone().verify_many(&property).await;
        // Replaced, not appended
        assert_eq!(engine.snapshot().await["Aurora"].cameras.len(), 1);
    }

    #[tokio::test]
    async fn company_filter_matches_metadata() {
        let prober = Arc::new(ScriptedProber::new(HashMap::new()));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober, gateway, no_hit_cache());

        let mut with_company = Property {
            name: "Aurora".to_string(),
            routing: Some(AlertRouting {
                company: Some(3),
                ..Default::default()
            }),
            cameras: Vec::new(),
        };
        engine.clone().verify_many(&with_company).await;

        with_company.name = "Norte".to_string();
        with_company.routing = Some(AlertRouting {
            company: Some(5),
            ..Default::default()
        });
        engine.clone().verify_many(&with_company).await;

        let filtered = engine.snapshot_for_company(3).await;
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("Aurora"));
    }

    #[tokio::test]
    async fn cache_served_value_still_drives_transitions() {
        // Same camera name resolves to two cache keys (different ip)
        // but one shared last-known state, so a cache-served value can
        // land on a state edge
        let prober = Arc::new(ScriptedProber::new(HashMap::from([
            ("10.0.0.20".to_string(), false),
            ("10.0.0.21".to_string(), true),
        ])));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = engine_with(prober.clone(), gateway.clone(), ResultCache::with_defaults());

        let offline_cam = camera("Gate", "10.0.0.20");
        let online_cam = camera("Gate", "10.0.0.21");
        let fkey = failure_key("Aurora", "Gate");

        // Probe offline: down alert, failure counter at 1
        engine.verify_one(&offline_cam, "Aurora", None).await;
        assert_eq!(gateway.sent.lock().await.len(), 1);
        assert_eq!(engine.cache.failure_count(&fkey).await, 1);

        // Probe the other address online: recovered alert, state true
        engine.verify_one(&online_cam, "Aurora", None).await;
        assert_eq!(gateway.sent.lock().await.len(), 2);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);

        // The first address again, within its offline TTL: no probe,
        // but the cached value hits the true->false edge and alerts
        let (_, status) = engine.verify_one(&offline_cam, "Aurora", None).await;
        assert_eq!(status, CameraStatus::Off);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
        let sent = gateway.sent.lock().await;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].occurrence, 960);
        // Cache-served checks never touch the failure counter
        assert_eq!(engine.cache.failure_count(&fkey).await, 1);
    }

    #[tokio::test]
    async fn failed_alert_delivery_leaves_state_and_events_intact() {
        struct RejectingGateway {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl AlertGateway for RejectingGateway {
            async fn send(&self, _info: &AlertInfo, _property: &str) -> bool {
                self.calls.fetch_add(1, Ordering::SeqCst);
                false
            }
        }

        let prober = Arc::new(ScriptedProber::new(HashMap::from([(
            "10.0.0.20".to_string(),
            false,
        )])));
        let gateway = Arc::new(RejectingGateway {
            calls: AtomicUsize::new(0),
        });
        let engine = Arc::new(VerificationEngine::new(
            ResultCache::with_defaults(),
            prober.clone(),
            gateway.clone(),
            Arc::new(EventRecorder::new()),
            fast_config(),
        ));
        let cam = camera("Gate", "10.0.0.20");

        let (_, status) = engine.verify_one(&cam, "Aurora", None).await;
        assert_eq!(status, CameraStatus::Off);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        // The event is queued even though delivery was refused
        assert_eq!(engine.events.pending_count().await, 1);

        // Cached state and last-known state are intact: the next check
        // is served from cache and sees no edge, so no retry delivery
        let (_, status) = engine.verify_one(&cam, "Aurora", None).await;
        assert_eq!(status, CameraStatus::Off);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.events.pending_count().await, 1);
    }
}
