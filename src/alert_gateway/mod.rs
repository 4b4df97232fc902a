//! AlertGateway - Ticketing Alert Delivery
//!
//! ## Responsibilities
//!
//! - Build the alert payload for a camera transition, resolving each
//!   field with camera > property routing > configured default precedence
//! - Deliver it to the external ticketing endpoint, best effort:
//!   at most one attempt per transition, failures logged and swallowed

use crate::models::{AlertRouting, Camera};
use async_trait::async_trait;
use chrono::Local;
use serde_json::json;
use std::time::Duration;

/// Defaults for alert fields not supplied by the camera or the property
#[derive(Debug, Clone)]
pub struct AlertDefaults {
    pub partition: String,
    /// Occurrence code for a "down" alert
    pub occurrence: i32,
    /// Occurrence code for a "recovered" alert
    pub recovered_occurrence: i32,
    pub machine_code: i64,
    pub occurrence_set: i32,
}

impl Default for AlertDefaults {
    fn default() -> Self {
        Self {
            partition: "01".to_string(),
            occurrence: 960,
            recovered_occurrence: 961,
            machine_code: 897,
            occurrence_set: 7,
        }
    }
}

/// Fully-resolved alert payload
#[derive(Debug, Clone, PartialEq)]
pub struct AlertInfo {
    pub client: String,
    pub partition: String,
    pub company: i64,
    pub occurrence: i32,
    pub identification: String,
    pub machine_code: i64,
    pub occurrence_set: i32,
    pub sector: i32,
    pub complement: String,
    pub name: String,
}

/// Build the "down" alert payload for a camera
pub fn build_alert_info(
    camera: &Camera,
    property: &str,
    routing: Option<&AlertRouting>,
    defaults: &AlertDefaults,
) -> AlertInfo {
    let routing = routing.cloned().unwrap_or_default();
    AlertInfo {
        client: routing
            .client_code
            .unwrap_or_else(|| property.to_string()),
        partition: routing
            .partition
            .unwrap_or_else(|| defaults.partition.clone()),
        company: routing.company.unwrap_or(1),
        occurrence: routing.occurrence.unwrap_or(defaults.occurrence),
        identification: camera
            .identification
            .clone()
            .unwrap_or_else(|| camera.name.clone()),
        machine_code: camera
            .machine_code
            .or(routing.machine_code)
            .unwrap_or(defaults.machine_code),
        occurrence_set: routing.occurrence_set.unwrap_or(defaults.occurrence_set),
        sector: camera.sector.unwrap_or(1),
        complement: camera
            .complement
            .clone()
            .unwrap_or_else(|| format!("{} offline", camera.name)),
        name: camera.name.clone(),
    }
}

/// Build the "recovered" alert payload: same fields, but the distinct
/// recovery occurrence code and a recovery complement
pub fn build_recovery_info(
    camera: &Camera,
    property: &str,
    routing: Option<&AlertRouting>,
    defaults: &AlertDefaults,
) -> AlertInfo {
    let mut info = build_alert_info(camera, property, routing, defaults);
    info.occurrence = defaults.recovered_occurrence;
    info.complement = format!("{} back online", camera.name);
    info
}

/// Boundary for alert delivery
#[async_trait]
pub trait AlertGateway: Send + Sync {
    /// Deliver one alert; returns whether delivery succeeded
    async fn send(&self, info: &AlertInfo, property: &str) -> bool;
}

/// Gateway posting the insert command the ticketing API expects
pub struct HttpAlertGateway {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl HttpAlertGateway {
    pub fn new(url: String, username: String, password: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            url,
            username,
            password,
        }
    }

    fn command(&self, info: &AlertInfo) -> String {
        format!(
            "INSERT INTO EventosNaoProcessados(DataHora, Cliente, Particao, Empresa, \
             Ocorrencia, Identificacao, Codigomaquina, CodigoConjuntoOcorrencias, \
             Setor, Complemento) \
             VALUES (CURRENT_TIMESTAMP, '{}', '{}', {}, '{}', '{}', {}, {}, {}, '{} - {}')",
            info.client,
            info.partition,
            info.company,
            info.occurrence,
            info.identification,
            info.machine_code,
            info.occurrence_set,
            info.sector,
            info.complement,
            Local::now().format("%H:%M:%S"),
        )
    }
}

#[async_trait]
impl AlertGateway for HttpAlertGateway {
    async fn send(&self, info: &AlertInfo, property: &str) -> bool {
        let payload = json!({ "comando": self.command(info) });

        let result = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(resp) => {
                tracing::info!(
                    property = %property,
                    camera = %info.name,
                    occurrence = info.occurrence,
                    status = %resp.status(),
                    "Alert delivered"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    property = %property,
                    camera = %info.name,
                    error = %e,
                    "Alert delivery failed"
                );
                false
            }
        }
    }
}
