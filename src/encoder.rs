//! Symbol encoding: text in, module matrix out
//!
//! The controller only depends on the [`SymbolEncoder`] trait. The default
//! backend wraps the `qrcode` crate and is gated behind `qrcode-encoder`.

use crate::options::{ErrorCorrectionLevel, Mode};
use crate::Result;

/// Everything the encoder needs for one render cycle
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub data: &'a str,
    pub mode: Mode,
    /// Explicit version, or 0 for the smallest one that fits
    pub type_number: u8,
    pub level: ErrorCorrectionLevel,
}

/// Immutable square grid of modules; `true` is dark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMatrix {
    size: usize,
    modules: Vec<bool>,
}

impl SymbolMatrix {
    /// Build from row-major modules. Returns `None` if `modules` is not `size * size` long.
    pub fn from_modules(size: usize, modules: Vec<bool>) -> Option<Self> {
        (modules.len() == size * size).then_some(Self { size, modules })
    }

    /// Number of modules per side
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_dark(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size && self.modules[row * self.size + col]
    }

    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|m| **m).count()
    }
}

/// Produces a symbol matrix for the configured data
pub trait SymbolEncoder: Send + Sync {
    fn encode(&self, request: &EncodeRequest<'_>) -> Result<SymbolMatrix>;
}

#[cfg(feature = "qrcode-encoder")]
pub use self::qr::QrcodeEncoder;

#[cfg(feature = "qrcode-encoder")]
mod qr {
    use super::{EncodeRequest, SymbolEncoder, SymbolMatrix};
    use crate::options::{ErrorCorrectionLevel, Mode, MAX_TYPE_NUMBER};
    use crate::{Error, Result};
    use qrcode::bits::Bits;
    use qrcode::types::QrError;
    use qrcode::{Color, EcLevel, QrCode, Version};

    /// Encoder backed by the `qrcode` crate
    #[derive(Debug, Default, Clone, Copy)]
    pub struct QrcodeEncoder;

    impl QrcodeEncoder {
        pub fn new() -> Self {
            QrcodeEncoder
        }
    }

    fn ec_level(level: ErrorCorrectionLevel) -> EcLevel {
        match level {
            ErrorCorrectionLevel::L => EcLevel::L,
            ErrorCorrectionLevel::M => EcLevel::M,
            ErrorCorrectionLevel::Q => EcLevel::Q,
            ErrorCorrectionLevel::H => EcLevel::H,
        }
    }

    fn encode_at(request: &EncodeRequest<'_>, version: Version, ec: EcLevel) -> std::result::Result<QrCode, QrError> {
        let mut bits = Bits::new(version);
        let data = request.data.as_bytes();
        match request.mode {
            Mode::Numeric => bits.push_numeric_data(data)?,
            Mode::Alphanumeric => bits.push_alphanumeric_data(data)?,
            Mode::Byte => bits.push_byte_data(data)?,
            Mode::Kanji => bits.push_kanji_data(data)?,
        }
        bits.push_terminator(ec)?;
        QrCode::with_bits(bits, ec)
    }

    impl SymbolEncoder for QrcodeEncoder {
        fn encode(&self, request: &EncodeRequest<'_>) -> Result<SymbolMatrix> {
            let ec = ec_level(request.level);

            let code = if request.type_number == 0 {
                // Smallest version whose capacity fits the data
                let mut found = None;
                for v in 1..=i16::from(MAX_TYPE_NUMBER) {
                    match encode_at(request, Version::Normal(v), ec) {
                        Ok(code) => {
                            found = Some(code);
                            break;
                        }
                        Err(QrError::DataTooLong) => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                found.ok_or_else(|| Error::Encode("data too long for any symbol version".into()))?
            } else {
                encode_at(request, Version::Normal(i16::from(request.type_number)), ec)?
            };

            let size = code.width();
            let modules = code.to_colors().into_iter().map(|c| c == Color::Dark).collect();
            SymbolMatrix::from_modules(size, modules)
                .ok_or_else(|| Error::Encode(format!("encoder returned a malformed {0}x{0} matrix", size)))
        }
    }

}
