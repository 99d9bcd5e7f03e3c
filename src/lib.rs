//! Разбор QR-кодов и `otpauth://` URI в сверенный список
//! параметров одноразовых паролей.

pub mod barcode;
pub mod camera;
pub mod clipboard;
pub mod code;
pub mod config;
pub mod otpauth;
pub mod present;
pub mod scanner;
pub mod screenshot;
pub mod source;

pub use otpauth::{OtpUri, ParameterEntry, interpret, is_otpauth_uri};
pub use present::{Presentation, RenderOptions};
