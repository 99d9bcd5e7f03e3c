//! Снимок экрана: утилиты X11 (maim/scrot) или XDG desktop portal.

use crate::config::ScreenshotBackend;
use image::DynamicImage;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no screenshot tool found (install maim or scrot)")]
    NoTool,
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: &'static str, reason: String },
    #[error("screenshot portal error: {0}")]
    Portal(String),
    #[error("screenshot cancelled or failed, portal response code {0}")]
    Cancelled(u32),
    #[error("screenshot portal is not available on this platform")]
    Unsupported,
    #[error(transparent)]
    Source(#[from] crate::source::SourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    FullScreen,
    Area,
}

/// Какой бэкенд реально использовать при `auto`.
pub fn resolve_backend(configured: ScreenshotBackend) -> ScreenshotBackend {
    match configured {
        ScreenshotBackend::Auto => {
            let has_wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
            let has_x11 = std::env::var_os("DISPLAY").is_some();
            if has_x11 && !has_wayland {
                ScreenshotBackend::X11
            } else {
                ScreenshotBackend::Portal
            }
        }
        other => other,
    }
}

pub fn capture(
    backend: ScreenshotBackend,
    mode: CaptureMode,
) -> Result<DynamicImage, CaptureError> {
    let backend = resolve_backend(backend);
    log::info!("capturing screenshot via {backend:?} ({mode:?})");
    match backend {
        ScreenshotBackend::X11 | ScreenshotBackend::Auto => capture_x11(mode),
        ScreenshotBackend::Portal => portal::capture(mode),
    }
}

/// Аргументы для утилиты; PNG пишется в stdout.
fn tool_args(tool: &str, mode: CaptureMode) -> &'static [&'static str] {
    match (tool, mode) {
        ("maim", CaptureMode::FullScreen) => &["-u", "-m", "8"],
        ("maim", CaptureMode::Area) => &["-u", "-m", "8", "-s"],
        ("scrot", CaptureMode::FullScreen) => &["-F", "-"],
        ("scrot", CaptureMode::Area) => &["-s", "-"],
        _ => &[],
    }
}

fn capture_x11(mode: CaptureMode) -> Result<DynamicImage, CaptureError> {
    let tool: &'static str = ["maim", "scrot"]
        .into_iter()
        .find(|t| which::which(t).is_ok())
        .ok_or(CaptureError::NoTool)?;

    let output = Command::new(tool)
        .args(tool_args(tool, mode))
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| CaptureError::ToolFailed {
            tool,
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(CaptureError::ToolFailed {
            tool,
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(crate::source::load_bytes(&output.stdout)?)
}

#[cfg(target_os = "linux")]
mod portal {
    use super::{CaptureError, CaptureMode};
    use image::DynamicImage;
    use std::collections::HashMap;
    use zbus::blocking::{Connection, Proxy};
    use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

    const DESTINATION: &str = "org.freedesktop.portal.Desktop";
    const DESKTOP_PATH: &str = "/org/freedesktop/portal/desktop";
    const SCREENSHOT_IFACE: &str = "org.freedesktop.portal.Screenshot";
    const REQUEST_IFACE: &str = "org.freedesktop.portal.Request";

    fn portal_err(e: impl std::fmt::Display) -> CaptureError {
        CaptureError::Portal(e.to_string())
    }

    /// `/org/freedesktop/portal/desktop/request/SENDER/TOKEN`, где SENDER:
    /// уникальное имя без `:` и с `_` вместо `.`.
    pub(super) fn request_path(unique_name: &str, token: &str) -> String {
        let sender = unique_name.trim_start_matches(':').replace('.', "_");
        format!("{DESKTOP_PATH}/request/{sender}/{token}")
    }

    pub(super) fn handle_token() -> String {
        format!("otpdecode_{}", rand::random::<u32>())
    }

    pub fn capture(mode: CaptureMode) -> Result<DynamicImage, CaptureError> {
        let conn = Connection::session().map_err(portal_err)?;
        let unique = conn
            .unique_name()
            .ok_or_else(|| portal_err("session bus gave no unique name"))?
            .to_string();

        let token = handle_token();
        let expected = request_path(&unique, &token);

        // подписка до вызова, иначе Response можно пропустить
        let request =
            Proxy::new(&conn, DESTINATION, expected.as_str(), REQUEST_IFACE).map_err(portal_err)?;
        let mut responses = request.receive_signal("Response").map_err(portal_err)?;

        let screenshot = Proxy::new(&conn, DESTINATION, DESKTOP_PATH, SCREENSHOT_IFACE)
            .map_err(portal_err)?;

        let mut options: HashMap<&str, Value> = HashMap::new();
        options.insert("handle_token", Value::from(token.as_str()));
        options.insert("interactive", Value::from(mode == CaptureMode::Area));

        let handle: OwnedObjectPath = screenshot
            .call("Screenshot", &("", options))
            .map_err(portal_err)?;
        log::info!("screenshot requested, waiting for portal response on {}", handle.as_str());

        let response = if handle.as_str() == expected {
            responses.next()
        } else {
            // старые порталы возвращают свой путь запроса
            log::debug!("portal returned unexpected request path {}", handle.as_str());
            let request = Proxy::new(&conn, DESTINATION, handle.as_str(), REQUEST_IFACE)
                .map_err(portal_err)?;
            let mut responses = request.receive_signal("Response").map_err(portal_err)?;
            responses.next()
        };
        let message = response.ok_or_else(|| portal_err("portal closed without a response"))?;

        let (code, mut results): (u32, HashMap<String, OwnedValue>) =
            message.body().deserialize().map_err(portal_err)?;
        if code != 0 {
            log::warn!("screenshot portal answered with code {code}");
            return Err(CaptureError::Cancelled(code));
        }

        let uri = results
            .remove("uri")
            .ok_or_else(|| portal_err("response has no uri"))?;
        let uri = String::try_from(uri).map_err(portal_err)?;
        log::info!("screenshot captured: {uri}");

        let path = crate::source::file_url_path(&uri)
            .ok_or_else(|| portal_err(format!("unexpected screenshot uri {uri}")))?;
        Ok(crate::source::load_file(&path)?)
    }

}

#[cfg(not(target_os = "linux"))]
mod portal {
    use super::{CaptureError, CaptureMode};
    use image::DynamicImage;

    pub fn capture(_mode: CaptureMode) -> Result<DynamicImage, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}
