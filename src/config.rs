// src/config.rs
use crate::com::ExistencePolicy;
use crate::error::{Result, TrackingError};
use crate::reference::DisplacementMode;
use crate::segments::SegmentPreset;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub tracker: TrackerConfig,
    pub com: ComConfig,
    pub log: LogConfig,
    pub overlay: OverlayConfig,
    pub calibration: CalibrationConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorResolution {
    #[serde(rename = "720p")]
    R720p,
    #[default]
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "1440p")]
    R1440p,
    #[serde(rename = "2160p")]
    R2160p,
}

impl ColorResolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::R720p => (1280, 720),
            Self::R1080p => (1920, 1080),
            Self::R1440p => (2560, 1440),
            Self::R2160p => (3840, 2160),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepthMode {
    NfovBinned,
    #[default]
    NfovUnbinned,
    WfovBinned,
    WfovUnbinned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub fps: u32,
    pub color_resolution: ColorResolution,
    pub depth_mode: DepthMode,
    pub synchronized_images_only: bool,
    pub capture_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            color_resolution: ColorResolution::R1080p,
            depth_mode: DepthMode::NfovUnbinned,
            synchronized_images_only: true,
            capture_timeout_ms: 1000,
        }
    }
}

impl DeviceConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

/// Body tracker queue timeouts; absent means wait forever.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub enqueue_timeout_ms: Option<u64>,
    pub pop_timeout_ms: Option<u64>,
}

impl TrackerConfig {
    pub fn enqueue_timeout(&self) -> Option<Duration> {
        self.enqueue_timeout_ms.map(Duration::from_millis)
    }

    pub fn pop_timeout(&self) -> Option<Duration> {
        self.pop_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComConfig {
    pub preset: SegmentPreset,
    pub existence: ExistencePolicy,
    pub displacement: DisplacementMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("com_data.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    /// Save one snapshot every `save_every` frames.
    pub save_every: u64,
    pub marker_radius: i32,
    pub draw_skeleton: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from("overlay"),
            save_every: 30,
            marker_radius: 20,
            draw_skeleton: true,
        }
    }
}

/// Pinhole intrinsics of the color camera, used by the replay backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    /// Depth camera origin expressed in color camera space, millimeters.
    pub depth_to_color_mm: [f32; 3],
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            fx: 913.0,
            fy: 913.0,
            cx: 960.0,
            cy: 550.0,
            depth_to_color_mm: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// JSON-lines body recording; no path means no device is installed.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Explicit path first, then the per-user config directory, then defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        if let Some(path) = default_config_path().filter(|p| p.exists()) {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if ![5, 15, 30].contains(&self.device.fps) {
            return Err(TrackingError::Config(format!(
                "device.fps must be 5, 15 or 30, got {}",
                self.device.fps
            )));
        }
        if self.device.capture_timeout_ms == 0 {
            return Err(TrackingError::Config(
                "device.capture_timeout_ms must be positive".to_string(),
            ));
        }
        if self.overlay.save_every == 0 {
            return Err(TrackingError::Config(
                "overlay.save_every must be at least 1".to_string(),
            ));
        }
        if self.overlay.marker_radius <= 0 {
            return Err(TrackingError::Config(
                "overlay.marker_radius must be positive".to_string(),
            ));
        }
        if self.calibration.fx <= 0.0 || self.calibration.fy <= 0.0 {
            return Err(TrackingError::Config(
                "calibration focal lengths must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "com_tracker")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Which of the tracking programs to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// Full-body model, displacement drawn every frame on overlay snapshots.
    StreamCom,
    /// Lower-body model, displacement logged to CSV once a reference is set.
    PipeCom,
    /// Only counts the tracked bodies per frame.
    BodyCount,
}

impl Program {
    pub fn apply(self, config: &mut AppConfig) {
        match self {
            Self::StreamCom => {
                config.com.preset = SegmentPreset::Full14;
                config.com.displacement = DisplacementMode::Always;
                config.overlay.enabled = true;
                config.log.enabled = false;
            }
            Self::PipeCom => {
                config.com.preset = SegmentPreset::Basic8;
                config.com.displacement = DisplacementMode::AfterReference;
                config.overlay.enabled = false;
                config.log.enabled = true;
            }
            Self::BodyCount => {
                config.overlay.enabled = false;
                config.log.enabled = false;
            }
        }
    }

    pub fn computes_com(self) -> bool {
        !matches!(self, Self::BodyCount)
    }
}

impl FromStr for Program {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stream-com" => Ok(Self::StreamCom),
            "pipe-com" => Ok(Self::PipeCom),
            "body-count" => Ok(Self::BodyCount),
            other => Err(TrackingError::Config(format!(
                "unknown program '{other}', expected stream-com, pipe-com or body-count"
            ))),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StreamCom => "stream-com",
            Self::PipeCom => "pipe-com",
            Self::BodyCount => "body-count",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.device.capture_timeout(), Duration::from_millis(1000));
        assert_eq!(config.tracker.pop_timeout(), None);
        assert_eq!(config.com.existence, ExistencePolicy::Confidence);
        assert_eq!(config.log.path, PathBuf::from("com_data.csv"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [device]
            fps = 15
            color_resolution = "720p"
            depth_mode = "wfov-binned"

            [tracker]
            pop_timeout_ms = 250

            [com]
            preset = "full14"
            existence = "all"
            displacement = "always"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.fps, 15);
        assert_eq!(config.device.color_resolution.dimensions(), (1280, 720));
        assert_eq!(config.device.depth_mode, DepthMode::WfovBinned);
        assert_eq!(config.device.capture_timeout_ms, 1000);
        assert_eq!(config.tracker.pop_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.tracker.enqueue_timeout(), None);
        assert_eq!(config.com.preset, SegmentPreset::Full14);
        assert_eq!(config.com.existence, ExistencePolicy::All);
        assert_eq!(config.com.displacement, DisplacementMode::Always);
        assert!(!config.overlay.enabled);
    }

    #[test]
    fn test_rejects_unsupported_fps() {
        let mut config = AppConfig::default();
        config.device.fps = 60;
        assert!(matches!(config.validate(), Err(TrackingError::Config(_))));
    }

    #[test]
    fn test_program_presets() {
        let mut config = AppConfig::default();
        Program::PipeCom.apply(&mut config);
        assert_eq!(config.com.preset, SegmentPreset::Basic8);
        assert_eq!(config.com.displacement, DisplacementMode::AfterReference);
        assert!(config.log.enabled);
        assert!(!config.overlay.enabled);

        Program::StreamCom.apply(&mut config);
        assert_eq!(config.com.preset, SegmentPreset::Full14);
        assert_eq!(config.com.displacement, DisplacementMode::Always);
        assert!(config.overlay.enabled);
        assert!(!config.log.enabled);
    }

    #[test]
    fn test_program_from_str() {
        assert_eq!("pipe-com".parse::<Program>().unwrap(), Program::PipeCom);
        assert_eq!(Program::BodyCount.to_string(), "body-count");
        assert!(!Program::BodyCount.computes_com());
        assert!("GetImages".parse::<Program>().is_err());
    }
}
