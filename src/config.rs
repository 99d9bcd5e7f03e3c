use crate::barcode::{BarcodeReader, DEFAULT_MAX_SYMBOLS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot get config dir")]
    NoConfigDir,
    #[error("cannot access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotBackend {
    #[default]
    Auto,
    X11,
    Portal,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BarcodeConfig {
    pub max_symbols: usize,
    pub try_invert: bool,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            max_symbols: DEFAULT_MAX_SYMBOLS,
            try_invert: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub backend: ScreenshotBackend,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CameraConfig {
    pub device: Option<String>, // None: первая найденная камера
    pub ffmpeg: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub barcode: BarcodeConfig,
    pub screenshot: ScreenshotConfig,
    pub camera: CameraConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            barcode: BarcodeConfig::default(),
            screenshot: ScreenshotConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl Config {
    /// Нет файла: дефолты. Битый файл: ошибка.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let s = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, s).map_err(io_err)
    }

    pub fn barcode_reader(&self) -> BarcodeReader {
        BarcodeReader::new(self.barcode.max_symbols, self.barcode.try_invert)
    }
}

/// Например, ~/.config/otpdecode/config.json
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let mut dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    dir.push("otpdecode");
    Ok(dir.join("config.json"))
}
