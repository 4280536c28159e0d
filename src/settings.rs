use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::camera::{DeviceConstraints, FacingMode};

pub const API_URL_ENV: &str = "QRSCAN_API_URL";
pub const CAMERA_DEVICE_ENV: &str = "QRSCAN_CAMERA_DEVICE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".into(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    pub device: String,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
    pub ready_timeout_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            ideal_width: 640,
            ideal_height: 480,
            facing: FacingMode::Environment,
            ready_timeout_ms: 10_000,
        }
    }
}

impl CameraSettings {
    pub fn constraints(&self) -> DeviceConstraints {
        DeviceConstraints {
            facing: self.facing,
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub service: ServiceSettings,
    pub camera: CameraSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Missing or unreadable settings fall back to defaults; environment
    /// overrides are applied on top.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed settings at {}: {err}", path.display());
                Settings::default()
            })
        } else {
            Settings::default()
        };
        apply_env_overrides(&mut data);

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qrscan")
            .join("settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn service(&self) -> ServiceSettings {
        self.snapshot().service
    }

    pub fn camera(&self) -> CameraSettings {
        self.snapshot().camera
    }

    /// In-memory only; used for one-off command line overrides.
    pub fn override_base_url(&self, base_url: &str) {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.service.base_url = base_url.to_string();
    }

    pub fn update_camera(&self, camera: CameraSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        guard.camera = camera;
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn apply_env_overrides(data: &mut Settings) {
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            data.service.base_url = url;
        }
    }
    if let Ok(device) = std::env::var(CAMERA_DEVICE_ENV) {
        if !device.trim().is_empty() {
            data.camera.device = device;
        }
    }
}
