//! Camwatch - Camera Uptime Monitor
//!
//! Polls networked cameras over their snapshot endpoints, tracks
//! per-camera up/down state and raises edge-triggered alerts to a
//! ticketing endpoint.
//!
//! ## Architecture (7 Components)
//!
//! 1. ProtocolAdapter - Snapshot URL and channel resolution per protocol
//! 2. ResultCache - Failure-aware adaptive-TTL result cache
//! 3. VerificationEngine - Concurrent camera verification
//! 4. AlertGateway - Down/recovered alert delivery
//! 5. EventRecorder - Event batching and retention
//! 6. OrchestrationLoop - Fixed-interval verification cycles
//! 7. WebAPI - Read-only status endpoints

pub mod alert_gateway;
pub mod error;
pub mod event_recorder;
pub mod models;
pub mod orchestration;
pub mod protocol_adapter;
pub mod result_cache;
pub mod state;
pub mod verification_engine;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
