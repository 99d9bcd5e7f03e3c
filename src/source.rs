//! Откуда берутся картинки и текст: файлы, data URL, file:// ссылки.

use crate::otpauth::is_otpauth_uri;
use base64::{Engine as _, engine::general_purpose};
use image::DynamicImage;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid base64 in data URL: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("no image data found")]
    NoImage,
}

/// Что лежит в брошенном или вставленном тексте.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPayload {
    OtpUri(String),
    DataUrl(String),
    FileUrl(PathBuf),
    Plain(String),
}

/// otpauth:// важнее data URL, data URL важнее file://.
pub fn classify_text(text: &str) -> TextPayload {
    if is_otpauth_uri(text) {
        return TextPayload::OtpUri(text.to_string());
    }
    if let Some(data_url) = find_data_url(text) {
        return TextPayload::DataUrl(data_url.to_string());
    }
    if let Some(path) = file_url_path(text) {
        return TextPayload::FileUrl(path);
    }
    TextPayload::Plain(text.to_string())
}

pub fn load_file(path: &Path) -> Result<DynamicImage, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_bytes(&bytes)
}

/// Формат определяется по содержимому, не по расширению.
pub fn load_bytes(bytes: &[u8]) -> Result<DynamicImage, SourceError> {
    if bytes.is_empty() {
        return Err(SourceError::NoImage);
    }
    Ok(image::load_from_memory(bytes)?)
}

fn data_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"data:image/[a-zA-Z]+;base64,[\w\d+/=\s]+").expect("static regex is valid")
    })
}

pub fn find_data_url(text: &str) -> Option<&str> {
    data_url_regex().find(text).map(|m| m.as_str())
}

pub fn decode_data_url(data_url: &str) -> Result<DynamicImage, SourceError> {
    let (_, payload) = data_url.split_once(',').ok_or(SourceError::NoImage)?;
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    load_bytes(&bytes)
}

/// Первая строка вида `file://...` из text/uri-list.
pub fn file_url_path(text: &str) -> Option<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| line.strip_prefix("file://"))
        .map(|rest| {
            // file://host/path: хост отбрасываем
            let path = match rest.find('/') {
                Some(idx) => &rest[idx..],
                None => rest,
            };
            PathBuf::from(percent_decode_str(path).decode_utf8_lossy().into_owned())
        })
}
