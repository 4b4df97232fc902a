//! Shared models and types for camwatch
//!
//! This module contains types shared across multiple modules
//! to avoid circular dependencies: the inbound inventory shape,
//! the flattened per-camera view the engine works on, and the
//! per-property status snapshot.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-camera verification status as exposed by the status API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraStatus {
    /// Camera answered with a valid snapshot
    #[serde(rename = "ON")]
    On,
    /// Camera unreachable or returned an invalid snapshot
    #[serde(rename = "OFF")]
    Off,
    /// Camera record lacks ip or credentials; never probed
    #[serde(rename = "NO_CONFIG")]
    NoConfig,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::On => "ON",
            CameraStatus::Off => "OFF",
            CameraStatus::NoConfig => "NO_CONFIG",
        }
    }
}

/// Inbound camera record (per-property inventory)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraRecord {
    pub name: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub identification: Option<String>,
    #[serde(default)]
    pub sector: Option<i32>,
    #[serde(default)]
    pub complement: Option<String>,
    #[serde(default)]
    pub machine_code: Option<i64>,
    /// External correlation id used for event recording
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

/// Inbound device record: a DVR/NVR endpoint hosting camera channels
/// with shared address and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cameras: Vec<CameraRecord>,
}

/// Inbound property record: a monitored site with its devices and
/// alert-routing metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub name: String,
    #[serde(default)]
    pub client_code: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub company: Option<i64>,
    #[serde(default)]
    pub occurrence: Option<i32>,
    #[serde(default)]
    pub machine_code: Option<i64>,
    #[serde(default)]
    pub occurrence_set: Option<i32>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    /// Cameras with their own connection fields, not behind a DVR
    #[serde(default)]
    pub standalone_cameras: Vec<CameraRecord>,
}

impl PropertyRecord {
    /// Extract alert-routing metadata, present only when the record
    /// carries at least a partition or company code
    pub fn routing(&self) -> Option<AlertRouting> {
        if self.partition.is_none() && self.company.is_none() {
            return None;
        }
        Some(AlertRouting {
            client_code: self.client_code.clone(),
            partition: self.partition.clone(),
            company: self.company,
            occurrence: self.occurrence,
            machine_code: self.machine_code,
            occurrence_set: self.occurrence_set,
        })
    }

    /// Flatten into the per-camera view the verification engine works on.
    /// Device-level connection fields become fallbacks on each camera;
    /// standalone cameras carry their own fields as both levels.
    pub fn flatten(&self) -> Property {
        let mut cameras = Vec::new();

        for device in &self.devices {
            for cam in &device.cameras {
                cameras.push(Camera {
                    name: cam.name.clone(),
                    ip: cam.ip.clone(),
                    port: cam.port,
                    channel: cam.channel.clone(),
                    protocol: cam.protocol.clone(),
                    username: cam.username.clone(),
                    password: cam.password.clone(),
                    device_ip: device.ip.clone(),
                    device_port: device.port,
                    device_protocol: device.protocol.clone(),
                    device_username: device.username.clone(),
                    device_password: device.password.clone(),
                    identification: cam.identification.clone(),
                    sector: cam.sector,
                    complement: cam.complement.clone(),
                    machine_code: cam.machine_code,
                    correlation_id: cam.correlation_id,
                });
            }
        }

        for cam in &self.standalone_cameras {
            cameras.push(Camera {
                name: cam.name.clone(),
                ip: cam.ip.clone(),
                port: cam.port,
                channel: cam.channel.clone(),
                protocol: cam.protocol.clone(),
                username: cam.username.clone(),
                password: cam.password.clone(),
                device_ip: cam.ip.clone(),
                device_port: cam.port,
                device_protocol: cam.protocol.clone(),
                device_username: cam.username.clone(),
                device_password: cam.password.clone(),
                identification: cam.identification.clone(),
                sector: cam.sector,
                complement: cam.complement.clone(),
                machine_code: cam.machine_code,
                correlation_id: cam.correlation_id,
            });
        }

        Property {
            name: self.name.clone(),
            routing: self.routing(),
            cameras,
        }
    }
}

/// Alert-routing metadata attached to a property
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertRouting {
    pub client_code: Option<String>,
    pub partition: Option<String>,
    pub company: Option<i64>,
    pub occurrence: Option<i32>,
    pub machine_code: Option<i64>,
    pub occurrence_set: Option<i32>,
}

/// Flattened camera: own fields plus owning-device fallbacks
#[derive(Debug, Clone, Default)]
pub struct Camera {
    pub name: String,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub channel: Option<String>,
    pub protocol: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_ip: Option<String>,
    pub device_port: Option<u16>,
    pub device_protocol: Option<String>,
    pub device_username: Option<String>,
    pub device_password: Option<String>,
    pub identification: Option<String>,
    pub sector: Option<i32>,
    pub complement: Option<String>,
    pub machine_code: Option<i64>,
    pub correlation_id: Option<Uuid>,
}

/// A property ready for verification: flattened cameras plus routing
#[derive(Debug, Clone, Default)]
pub struct Property {
    pub name: String,
    pub routing: Option<AlertRouting>,
    pub cameras: Vec<Camera>,
}

/// One camera line in a property snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotCamera {
    pub name: String,
    pub status: CameraStatus,
}

/// Per-property status snapshot, replaced wholesale each cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub cameras: Vec<SnapshotCamera>,
    #[serde(default)]
    pub metadata: Option<AlertRouting>,
}

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
