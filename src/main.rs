use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use image::DynamicImage;
use otpdecode::barcode::BarcodeReader;
use otpdecode::camera::{CameraFeed, list_cameras};
use otpdecode::clipboard::{ClipboardContent, copy_to_clipboard, read_clipboard};
use otpdecode::code::current_code;
use otpdecode::config::{Config, config_path};
use otpdecode::otpauth::OtpUri;
use otpdecode::present::{Presentation, RenderOptions, render};
use otpdecode::scanner::{ChangeFilter, FrameScanner};
use otpdecode::screenshot::{self, CaptureMode};
use otpdecode::source::{self, TextPayload, classify_text};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "otpdecode",
    version,
    about = "Decode QR codes and otpauth:// URIs containing OTP setup information"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Show what each OTP parameter means and its default
    #[arg(long, global = true)]
    explain: bool,

    /// Copy the value of one parameter (e.g. secret) to clipboard
    #[arg(long, global = true, value_name = "KEY")]
    copy: Option<String>,

    /// Also print the current one-time code
    #[arg(long, global = true)]
    code: bool,

    /// Config file (default: <config dir>/otpdecode/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode QR codes in image files
    ///
    /// Примеры:
    ///   otpdecode file qr.png
    ///   otpdecode file --copy secret qr.png
    File {
        /// Image files (png, jpg, bmp, ...)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Decode the clipboard: image, file link, data URL or otpauth:// text
    Paste,

    /// Decode dropped text: otpauth:// URI, data URL or file:// link
    ///
    /// Примеры:
    ///   otpdecode text 'otpauth://totp/Example:alice?secret=JBSWY3DPEHPK3PXP'
    ///   xclip -o | otpdecode text -
    Text {
        /// Text to decode; stdin when omitted or "-"
        text: Option<String>,
    },

    /// Take a screenshot and decode it
    Screenshot {
        /// Select a region instead of the full screen
        #[arg(long)]
        area: bool,
    },

    /// Scan QR codes from a live camera feed
    Camera {
        /// Camera device, e.g. /dev/video0
        #[arg(long)]
        device: Option<String>,
        /// List cameras and exit
        #[arg(long)]
        list: bool,
        /// Keep scanning and print every new result
        #[arg(long)]
        follow: bool,
    },

    /// Config file helpers
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print config file path
    Path,
    /// Write a config file with default values
    Init {
        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Как показывать результат: формат, копирование, код.
struct Output {
    opts: RenderOptions,
    copy: Option<String>,
    code: bool,
}

impl Output {
    fn show(&self, p: &Presentation) -> anyhow::Result<()> {
        let preview = if self.code { self.code_for(p) } else { None };

        let mut stdout = std::io::stdout().lock();
        match (&preview, self.opts.json) {
            (Some(code), true) => {
                let doc = serde_json::json!({
                    "result": p,
                    "code": { "value": code.code, "remaining": code.remaining },
                });
                render_json(&doc, &mut stdout)?;
            }
            (Some(code), false) => {
                render(p, &self.opts, &mut stdout)?;
                match code.remaining {
                    Some(secs) => writeln!(stdout, "Code: {} (valid {secs}s)", code.code)?,
                    None => writeln!(stdout, "Code: {}", code.code)?,
                }
            }
            (None, _) => render(p, &self.opts, &mut stdout)?,
        }

        if let Some(ref key) = self.copy {
            let value = p.copy_value(key)?;
            copy_to_clipboard(value)?;
            eprintln!("{key} copied to clipboard.");
        }

        Ok(())
    }

    fn code_for(&self, p: &Presentation) -> Option<otpdecode::code::CodePreview> {
        let uri = OtpUri::parse(p.uri()?)?;
        match current_code(&uri) {
            Ok(code) => Some(code),
            Err(e) => {
                eprintln!("Cannot compute code: {e}");
                None
            }
        }
    }
}

fn render_json(doc: &serde_json::Value, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(doc)?)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg_path = match cli.config {
        Some(ref p) => p.clone(),
        None => config_path()?,
    };

    if let Commands::Config { cmd } = &cli.command {
        return cmd_config(cmd, &cfg_path);
    }

    let config = Config::load(&cfg_path)?;
    let reader = config.barcode_reader();
    let out = Output {
        opts: RenderOptions {
            json: cli.json,
            explain: cli.explain,
        },
        copy: cli.copy.clone(),
        code: cli.code,
    };

    match cli.command {
        Commands::File { paths } => cmd_file(&paths, &reader, &out)?,
        Commands::Paste => cmd_paste(&reader, &out)?,
        Commands::Text { text } => cmd_text(text, &reader, &out)?,
        Commands::Screenshot { area } => cmd_screenshot(area, &config, &reader, &out)?,
        Commands::Camera {
            device,
            list,
            follow,
        } => cmd_camera(device, list, follow, &config, &reader, &out)?,
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn show_found(p: &Presentation, out: &Output) -> anyhow::Result<()> {
    if p.is_empty() {
        anyhow::bail!("No QR code found");
    }
    out.show(p)
}

/// otpdecode file PATH...
fn cmd_file(paths: &[PathBuf], reader: &BarcodeReader, out: &Output) -> anyhow::Result<()> {
    let mut failed = 0usize;

    for path in paths {
        if paths.len() > 1 && !out.opts.json {
            println!("== {}", path.display());
        }

        let result = source::load_file(path)
            .map_err(anyhow::Error::from)
            .and_then(|img| show_found(&Presentation::from_payloads(reader.decode(&img)), out));

        if let Err(e) = result {
            eprintln!("{}: {e}", path.display());
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} file(s) failed", paths.len());
    }
    Ok(())
}

/// otpdecode paste
fn cmd_paste(reader: &BarcodeReader, out: &Output) -> anyhow::Result<()> {
    match read_clipboard()? {
        ClipboardContent::Image(img) => {
            show_found(&Presentation::from_payloads(reader.decode(&img)), out)
        }
        ClipboardContent::Text(text) => show_text(text, reader, out),
        ClipboardContent::Empty => anyhow::bail!("Clipboard is empty"),
    }
}

/// otpdecode text [TEXT|-]
fn cmd_text(text: Option<String>, reader: &BarcodeReader, out: &Output) -> anyhow::Result<()> {
    let text = match text.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            buf.trim_end_matches(['\r', '\n']).to_string()
        }
        Some(t) => t.to_string(),
    };

    if text.is_empty() {
        anyhow::bail!("Nothing to decode");
    }
    show_text(text, reader, out)
}

/// Текст из буфера или drag-and-drop.
fn show_text(text: String, reader: &BarcodeReader, out: &Output) -> anyhow::Result<()> {
    match classify_text(&text) {
        TextPayload::OtpUri(uri) => out.show(&Presentation::from_text(uri)),
        TextPayload::DataUrl(data_url) => {
            let img = source::decode_data_url(&data_url)?;
            show_found(&Presentation::from_payloads(reader.decode(&img)), out)
        }
        TextPayload::FileUrl(path) => {
            let img = source::load_file(&path)?;
            show_found(&Presentation::from_payloads(reader.decode(&img)), out)
        }
        TextPayload::Plain(text) => out.show(&Presentation::from_text(text)),
    }
}

/// otpdecode screenshot [--area]
fn cmd_screenshot(
    area: bool,
    config: &Config,
    reader: &BarcodeReader,
    out: &Output,
) -> anyhow::Result<()> {
    let mode = if area {
        CaptureMode::Area
    } else {
        CaptureMode::FullScreen
    };
    let img = screenshot::capture(config.screenshot.backend, mode)?;
    show_found(&Presentation::from_payloads(reader.decode(&img)), out)
}

/// otpdecode camera [--device D] [--list] [--follow]
fn cmd_camera(
    device: Option<String>,
    list: bool,
    follow: bool,
    config: &Config,
    reader: &BarcodeReader,
    out: &Output,
) -> anyhow::Result<()> {
    let cameras = list_cameras();

    if list {
        for cam in &cameras {
            println!("{}\t{}", cam.device, cam.name);
        }
        return Ok(());
    }

    let device = device
        .or_else(|| config.camera.device.clone())
        .or_else(|| cameras.first().map(|c| c.device.clone()))
        .or_else(|| default_camera_device().map(str::to_string))
        .ok_or(otpdecode::camera::CameraError::NoCamera)?;

    let feed = CameraFeed::open(&config.camera.ffmpeg, &device)?;
    let reader = *reader;
    let mut scanner = FrameScanner::new(move |img: &DynamicImage| reader.decode(img));
    let mut filter = ChangeFilter::default();

    eprintln!("Scanning {device}, press Ctrl+C to stop...");

    let mut on_result = |payloads: Vec<String>| -> anyhow::Result<bool> {
        if follow && !filter.is_new(&payloads) {
            return Ok(false);
        }
        out.show(&Presentation::from_payloads(payloads))?;
        Ok(!follow)
    };

    for frame in feed {
        let frame = frame?;
        scanner.offer(frame);
        while let Some(payloads) = scanner.try_next() {
            if on_result(payloads)? {
                return Ok(());
            }
        }
    }

    // поток кончился: дождаться последнего кадра в работе
    if let Some(payloads) = scanner.recv_timeout(Duration::from_secs(2)) {
        if on_result(payloads)? {
            return Ok(());
        }
    }
    log::info!("{} frame(s) dropped while decoding", scanner.dropped());

    if follow {
        Ok(())
    } else {
        Err(anyhow!("Camera stream ended before a QR code was found"))
    }
}

fn default_camera_device() -> Option<&'static str> {
    if cfg!(target_os = "linux") {
        Some("/dev/video0")
    } else if cfg!(target_os = "macos") {
        Some("0")
    } else {
        None
    }
}

/// otpdecode config path | init
fn cmd_config(cmd: &ConfigCommands, path: &PathBuf) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                println!("Config already exists at: {}", path.display());
                return Ok(());
            }
            Config::default().save(path)?;
            println!("Wrote default config to {}", path.display());
        }
    }
    Ok(())
}
