use crate::otpauth::{OtpUri, ParameterEntry, is_otpauth_uri};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("nothing to copy: result is plain text, not an otpauth URI")]
    NotStructured,
    #[error("no parameter named '{0}'")]
    UnknownKey(String),
}

/// Два взаимоисключающих режима показа.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Presentation {
    Structured {
        uri: String,
        entries: Vec<ParameterEntry>,
    },
    Text {
        lines: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub json: bool,
    pub explain: bool,
}

impl Presentation {
    /// Ровно один распознанный otpauth:// даёт структурированный вывод,
    /// всё остальное показывается текстом.
    pub fn from_payloads(payloads: Vec<String>) -> Self {
        if let [single] = payloads.as_slice() {
            if let Some(uri) = OtpUri::parse(single) {
                return Self::Structured {
                    uri: single.clone(),
                    entries: uri.entries(),
                };
            }
        }
        Self::Text { lines: payloads }
    }

    /// Текст как есть, либо структура, если это otpauth://.
    pub fn from_text(text: String) -> Self {
        if is_otpauth_uri(&text) {
            return Self::from_payloads(vec![text]);
        }
        Self::Text { lines: vec![text] }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::Structured { uri, .. } => Some(uri),
            Self::Text { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured { .. } => false,
            Self::Text { lines } => lines.iter().all(|l| l.trim().is_empty()),
        }
    }

    /// Значение строки `key` для кнопки «копировать».
    pub fn copy_value(&self, key: &str) -> Result<&str, PresentError> {
        match self {
            Self::Structured { entries, .. } => entries
                .iter()
                .find(|e| e.key == key)
                .map(|e| e.value.as_str())
                .ok_or_else(|| PresentError::UnknownKey(key.to_string())),
            Self::Text { .. } => Err(PresentError::NotStructured),
        }
    }
}

pub fn render(p: &Presentation, opts: &RenderOptions, out: &mut impl Write) -> anyhow::Result<()> {
    if opts.json {
        let s = serde_json::to_string_pretty(p)?;
        writeln!(out, "{s}")?;
        return Ok(());
    }

    match p {
        Presentation::Structured { uri, entries } => {
            writeln!(out, "{uri}")?;
            let width = entries.iter().map(|e| e.key.len() + 1).max().unwrap_or(0);
            for e in entries {
                writeln!(out, "{:<width$} {}", format!("{}:", e.key), e.value)?;
                if opts.explain && !e.tooltip.is_empty() {
                    writeln!(out, "{:width$}   {}", "", e.tooltip)?;
                }
            }
        }
        Presentation::Text { lines } => {
            let text = lines.join("\n");
            let text = text.trim();
            if !text.is_empty() {
                writeln!(out, "{text}")?;
            }
        }
    }
    Ok(())
}
