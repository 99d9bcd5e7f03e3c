use crate::otpauth::OtpUri;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};

#[derive(Debug, Error)]
pub enum CodeError {
    #[error("unsupported OTP type '{0}', expected totp or hotp")]
    UnsupportedType(String),
    #[error("unsupported OTP algorithm '{0}', expected SHA1/SHA256/SHA512")]
    UnsupportedAlgorithm(String),
    #[error("unsupported OTP digits '{0}', expected 6-8")]
    UnsupportedDigits(String),
    #[error("invalid numeric parameter {key}='{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("invalid OTP secret (base32): {0}")]
    InvalidSecret(String),
    #[error("OTP secret decoded to empty byte string")]
    EmptySecret,
    #[error("system time error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePreview {
    pub code: String,
    /// Сколько секунд код ещё действителен (только для TOTP).
    pub remaining: Option<u64>,
}

/// Текущий одноразовый код для разобранного URI.
pub fn current_code(uri: &OtpUri) -> Result<CodePreview, CodeError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    code_at(uri, now)
}

/// То же, что `current_code`, но для заданного момента времени.
pub fn code_at(uri: &OtpUri, unix_time: u64) -> Result<CodePreview, CodeError> {
    let kind = uri.kind().to_lowercase();
    if kind != "totp" && kind != "hotp" {
        return Err(CodeError::UnsupportedType(uri.kind().to_string()));
    }

    let algo = match uri.get_or_default("algorithm").to_uppercase().as_str() {
        "SHA1" => Algorithm::SHA1,
        "SHA256" => Algorithm::SHA256,
        "SHA512" => Algorithm::SHA512,
        other => return Err(CodeError::UnsupportedAlgorithm(other.to_string())),
    };

    let digits_raw = uri.get_or_default("digits");
    let digits: usize = digits_raw
        .parse()
        .map_err(|_| CodeError::UnsupportedDigits(digits_raw.to_string()))?;
    if !(6..=8).contains(&digits) {
        return Err(CodeError::UnsupportedDigits(digits_raw.to_string()));
    }

    let secret = uri.get("secret").unwrap_or("");
    let secret_bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|e| CodeError::InvalidSecret(format!("{e:?}")))?;
    if secret_bytes.is_empty() {
        return Err(CodeError::EmptySecret);
    }

    if kind == "hotp" {
        let counter = number(uri, "counter")?;
        // шаг 1: время / шаг == счётчик, то есть обычный HOTP
        let otp = TOTP::new_unchecked(algo, digits, 0, 1, secret_bytes);
        return Ok(CodePreview {
            code: otp.generate(counter),
            remaining: None,
        });
    }

    let period = number(uri, "period")?;
    if period == 0 {
        return Err(CodeError::InvalidNumber {
            key: "period",
            value: "0".to_string(),
        });
    }

    // new_unchecked: короткие (80-битные) секреты, как у GitHub, тоже нормальны
    let otp = TOTP::new_unchecked(algo, digits, 1, period, secret_bytes);
    Ok(CodePreview {
        code: otp.generate(unix_time),
        remaining: Some(period - unix_time % period),
    })
}

fn number(uri: &OtpUri, key: &'static str) -> Result<u64, CodeError> {
    let raw = uri.get_or_default(key);
    raw.parse().map_err(|_| CodeError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}
