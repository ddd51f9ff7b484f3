//! Rendering configuration and its default value
//!
//! `Options` is always fully populated. Callers change it through partial JSON
//! documents which are merged by [`crate::normalize`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Highest explicit symbol version. `0` selects the smallest version that fits.
pub const MAX_TYPE_NUMBER: u8 = 40;

/// Error-correction level of the encoded symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrectionLevel {
    /// ~7% recovery
    L,
    /// ~15% recovery
    M,
    /// ~25% recovery
    Q,
    /// ~30% recovery
    H,
}

impl FromStr for ErrorCorrectionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(Self::L),
            "M" | "MEDIUM" => Ok(Self::M),
            "Q" | "QUARTILE" => Ok(Self::Q),
            "H" | "HIGH" => Ok(Self::H),
            other => Err(format!("unknown error correction level '{}'", other)),
        }
    }
}

/// Classification of the input text that governs encoding density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
    Kanji,
}

impl Mode {
    /// Detect the densest mode able to carry `data`.
    ///
    /// Kanji is never detected; it has to be forced through `qrOptions.mode`.
    pub fn detect(data: &str) -> Mode {
        if data.bytes().all(|b| b.is_ascii_digit()) {
            Mode::Numeric
        } else if data.bytes().all(is_alphanumeric_byte) {
            Mode::Alphanumeric
        } else {
            Mode::Byte
        }
    }

    /// Whether this mode can represent `data` at all
    pub fn accepts(self, data: &str) -> bool {
        match self {
            Mode::Numeric => data.bytes().all(|b| b.is_ascii_digit()),
            Mode::Alphanumeric => data.bytes().all(is_alphanumeric_byte),
            // Kanji pairs are validated by the encoder
            Mode::Byte | Mode::Kanji => true,
        }
    }
}

fn is_alphanumeric_byte(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'A'..=b'Z' | b' ' | b'$' | b'%' | b'*' | b'+' | b'-' | b'.' | b'/' | b':')
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "numeric" => Ok(Mode::Numeric),
            "alphanumeric" => Ok(Mode::Alphanumeric),
            "byte" => Ok(Mode::Byte),
            "kanji" => Ok(Mode::Kanji),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Encoding options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrOptions {
    /// Explicit symbol version (1..=40), or 0 for automatic
    pub type_number: u8,
    /// Forced content mode; detected from the data when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    pub error_correction_level: ErrorCorrectionLevel,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            type_number: 0,
            mode: None,
            error_correction_level: ErrorCorrectionLevel::Q,
        }
    }
}

/// Shape used for each dark module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DotType {
    #[default]
    Square,
    Dots,
    Rounded,
    ExtraRounded,
    Classy,
    ClassyRounded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DotsOptions {
    #[serde(rename = "type")]
    pub dot_type: DotType,
    pub color: String,
}

impl Default for DotsOptions {
    fn default() -> Self {
        Self {
            dot_type: DotType::Square,
            color: "#000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundOptions {
    pub color: String,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            color: "#fff".to_string(),
        }
    }
}

/// Colour override for the finder patterns (outer square or inner dot)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CornerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Options for an embedded centre image, passed through to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    pub hide_background_dots: bool,
    pub image_size: f64,
    pub margin: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<String>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            hide_background_dots: true,
            image_size: 0.4,
            margin: 0,
            cross_origin: None,
        }
    }
}

/// Fully populated rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub qr_options: QrOptions,
    pub image_options: ImageOptions,
    pub dots_options: DotsOptions,
    pub background_options: BackgroundOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners_square_options: Option<CornerOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners_dot_options: Option<CornerOptions>,
    /// Keys this crate does not interpret; kept for the renderer
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            margin: 0,
            data: None,
            image: None,
            qr_options: QrOptions::default(),
            image_options: ImageOptions::default(),
            dots_options: DotsOptions::default(),
            background_options: BackgroundOptions::default(),
            corners_square_options: None,
            corners_dot_options: None,
            extra: Map::new(),
        }
    }
}

impl Options {
    /// The data to encode, if any
    pub fn data(&self) -> Option<&str> {
        self.data.as_deref().filter(|d| !d.is_empty())
    }

    /// Mode used for encoding: the forced one, else the detected one
    pub fn effective_mode(&self) -> Option<Mode> {
        let data = self.data()?;
        Some(self.qr_options.mode.unwrap_or_else(|| Mode::detect(data)))
    }
}

impl fmt::Display for ErrorCorrectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}
