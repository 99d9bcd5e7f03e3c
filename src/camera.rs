//! Живой поток с камеры через `ffmpeg`, кадры в формате PPM.

use image::DynamicImage;
use image::codecs::pnm::PnmDecoder;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("failed to start {cmd}: {source}")]
    Spawn {
        cmd: String,
        source: std::io::Error,
    },
    #[error("camera stream read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad PPM frame: {0}")]
    BadFrame(#[from] image::ImageError),
    #[error("no camera found")]
    NoCamera,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub device: String,
    pub name: String,
}

/// Linux: /sys/class/video4linux, по номеру устройства.
#[cfg(target_os = "linux")]
pub fn list_cameras() -> Vec<CameraInfo> {
    list_cameras_in(Path::new("/sys/class/video4linux"))
}

#[cfg(not(target_os = "linux"))]
pub fn list_cameras() -> Vec<CameraInfo> {
    Vec::new()
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn list_cameras_in(sysfs: &Path) -> Vec<CameraInfo> {
    let Ok(dir) = std::fs::read_dir(sysfs) else {
        return Vec::new();
    };

    let mut found: Vec<(u32, CameraInfo)> = dir
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let node = entry.file_name().to_string_lossy().into_owned();
            let index: u32 = node.strip_prefix("video")?.parse().ok()?;
            let name = std::fs::read_to_string(entry.path().join("name"))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| node.clone());
            Some((
                index,
                CameraInfo {
                    device: format!("/dev/{node}"),
                    name,
                },
            ))
        })
        .collect();

    found.sort_by_key(|(index, _)| *index);
    found.into_iter().map(|(_, info)| info).collect()
}

fn input_args(device: &str) -> Vec<String> {
    let format = if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    };
    let input = if cfg!(target_os = "windows") && !device.starts_with("video=") {
        format!("video={device}")
    } else {
        device.to_string()
    };
    vec!["-f".into(), format.into(), "-i".into(), input]
}

/// Запущенный ffmpeg; при drop процесс убивается.
pub struct CameraFeed {
    child: Child,
    frames: PpmFrames<BufReader<ChildStdout>>,
}

impl CameraFeed {
    pub fn open(ffmpeg: &str, device: &str) -> Result<Self, CameraError> {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-hide_banner", "-loglevel", "error"])
            .args(input_args(device))
            .args(["-f", "image2pipe", "-vcodec", "ppm", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        log::info!("opening camera {device} via {ffmpeg}");
        let mut child = cmd.spawn().map_err(|source| CameraError::Spawn {
            cmd: ffmpeg.to_string(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg has no stdout"))?;

        Ok(Self {
            child,
            frames: PpmFrames::new(BufReader::new(stdout)),
        })
    }
}

impl Iterator for CameraFeed {
    type Item = Result<DynamicImage, CameraError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.next()
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Поток PNM кадров (ffmpeg пишет P6), идущих подряд.
pub struct PpmFrames<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> PpmFrames<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    /// Кадры идут вплотную: декодер читает ровно один заголовок и пиксели.
    fn read_frame(&mut self) -> Result<Option<DynamicImage>, CameraError> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let decoder = PnmDecoder::new(&mut self.reader)?;
        Ok(Some(DynamicImage::from_decoder(decoder)?))
    }
}

impl<R: BufRead> Iterator for PpmFrames<R> {
    type Item = Result<DynamicImage, CameraError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
