use anyhow::{Result, anyhow};
use image::DynamicImage;

#[cfg(target_os = "linux")]
use std::process::{Command, Stdio};

#[cfg(not(target_os = "linux"))]
use copypasta::{ClipboardContext, ClipboardProvider};

/// Содержимое буфера обмена: картинка важнее текста.
#[derive(Debug)]
pub enum ClipboardContent {
    Image(DynamicImage),
    Text(String),
    Empty,
}

#[cfg(target_os = "linux")]
fn display_kind() -> Result<(bool, bool)> {
    let has_wayland = std::env::var("WAYLAND_DISPLAY").is_ok();
    let has_x11 = std::env::var("DISPLAY").is_ok();

    // Ни X11, ни Wayland: скорее всего чистый tty
    if !has_wayland && !has_x11 {
        return Err(anyhow!(
            "No GUI clipboard detected (no DISPLAY or WAYLAND_DISPLAY). \
             You might be in a tty. Use:\n  xclip -selection clipboard -o | otpdecode text -"
        ));
    }
    Ok((has_wayland, has_x11))
}

/// Linux: используем wl-copy (Wayland) или xclip (X11).
#[cfg(target_os = "linux")]
pub fn copy_to_clipboard(value: &str) -> Result<()> {
    let (has_wayland, has_x11) = display_kind()?;

    if has_wayland && try_pipe_to("wl-copy", &[], value).is_ok() {
        return Ok(());
    }

    if has_x11 && try_pipe_to("xclip", &["-selection", "clipboard"], value).is_ok() {
        return Ok(());
    }

    Err(anyhow!(
        "Failed to copy to clipboard: wl-copy/xclip not available or failed.\n\
         Try installing `wl-clipboard` or `xclip`."
    ))
}

/// Linux: wl-paste / xclip -o, сначала image/png, потом текст.
#[cfg(target_os = "linux")]
pub fn read_clipboard() -> Result<ClipboardContent> {
    let (has_wayland, has_x11) = display_kind()?;

    let mut readers: Vec<(&str, Vec<&str>, Vec<&str>)> = Vec::new();
    if has_wayland {
        readers.push((
            "wl-paste",
            vec!["--no-newline", "--type", "image/png"],
            vec!["--no-newline"],
        ));
    }
    if has_x11 {
        readers.push((
            "xclip",
            vec!["-selection", "clipboard", "-t", "image/png", "-o"],
            vec!["-selection", "clipboard", "-o"],
        ));
    }

    for (cmd, image_args, text_args) in &readers {
        if let Ok(bytes) = try_read_from(cmd, image_args) {
            match crate::source::load_bytes(&bytes) {
                Ok(img) => return Ok(ClipboardContent::Image(img)),
                Err(e) => log::debug!("{cmd}: clipboard has no usable image ({e})"),
            }
        }
        if let Ok(bytes) = try_read_from(cmd, text_args) {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Ok(if text.is_empty() {
                ClipboardContent::Empty
            } else {
                ClipboardContent::Text(text)
            });
        }
    }

    Err(anyhow!(
        "Failed to read clipboard: wl-paste/xclip not available or failed.\n\
         Try installing `wl-clipboard` or `xclip`."
    ))
}

#[cfg(target_os = "linux")]
fn try_pipe_to(cmd: &str, args: &[&str], value: &str) -> Result<()> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null()) // глушим болтовню утилиты
        .spawn()
        .map_err(|e| anyhow!("failed to spawn {}: {e}", cmd))?;

    {
        use std::io::Write;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(value.as_bytes())?;
        }
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(anyhow!("{} exited with status {}", cmd, status));
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn try_read_from(cmd: &str, args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| anyhow!("failed to spawn {}: {e}", cmd))?;

    if !output.status.success() {
        return Err(anyhow!("{} exited with status {}", cmd, output.status));
    }
    Ok(output.stdout)
}

/// Не-Linux (Windows/macOS и прочие): используем copypasta.
#[cfg(not(target_os = "linux"))]
pub fn copy_to_clipboard(value: &str) -> Result<()> {
    let mut ctx =
        ClipboardContext::new().map_err(|e| anyhow!("Failed to initialize clipboard: {e}"))?;

    ctx.set_contents(value.to_string())
        .map_err(|e| anyhow!("Failed to copy to clipboard: {e}"))?;

    Ok(())
}

/// Не-Linux: картинку берём через arboard, текст через copypasta.
#[cfg(not(target_os = "linux"))]
pub fn read_clipboard() -> Result<ClipboardContent> {
    if let Ok(mut board) = arboard::Clipboard::new() {
        if let Ok(data) = board.get_image() {
            let rgba = image::RgbaImage::from_raw(
                data.width as u32,
                data.height as u32,
                data.bytes.into_owned(),
            )
            .ok_or_else(|| anyhow!("clipboard image has inconsistent size"))?;
            return Ok(ClipboardContent::Image(DynamicImage::ImageRgba8(rgba)));
        }
    }

    let mut ctx =
        ClipboardContext::new().map_err(|e| anyhow!("Failed to initialize clipboard: {e}"))?;
    match ctx.get_contents() {
        Ok(text) if !text.is_empty() => Ok(ClipboardContent::Text(text)),
        Ok(_) => Ok(ClipboardContent::Empty),
        Err(e) => {
            log::debug!("clipboard has no text: {e}");
            Ok(ClipboardContent::Empty)
        }
    }
}
