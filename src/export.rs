//! Surface export: data URIs and one-shot downloads

use crate::document::Document;
use crate::rendering::Surface;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Default download name (without extension)
pub const DEFAULT_NAME: &str = "qr";

/// Output format, named by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extension {
    #[default]
    Png,
    Jpeg,
    Webp,
    /// Raster surfaces cannot produce SVG; PNG content is emitted instead
    Svg,
}

impl Extension {
    pub fn as_str(self) -> &'static str {
        match self {
            Extension::Png => "png",
            Extension::Jpeg => "jpeg",
            Extension::Webp => "webp",
            Extension::Svg => "svg",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Extension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Extension::Png),
            "jpeg" | "jpg" => Ok(Extension::Jpeg),
            "webp" => Ok(Extension::Webp),
            "svg" => Ok(Extension::Svg),
            other => Err(Error::Export(format!("unsupported extension '{}'", other))),
        }
    }
}

/// Structured export/download arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub name: Option<String>,
    pub extension: Option<Extension>,
}

impl ExportOptions {
    pub fn extension(extension: Extension) -> Self {
        Self {
            name: None,
            extension: Some(extension),
        }
    }

    pub fn named(name: &str, extension: Extension) -> Self {
        Self {
            name: Some(name.to_string()),
            extension: Some(extension),
        }
    }
}

/// Accepted argument shapes for `export_as_string` and `download`.
///
/// A bare string is the legacy form: it names the extension only and is kept
/// for older callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportArg {
    Options(ExportOptions),
    Legacy(String),
}

impl Default for ExportArg {
    fn default() -> Self {
        ExportArg::Options(ExportOptions::default())
    }
}

impl From<ExportOptions> for ExportArg {
    fn from(o: ExportOptions) -> Self {
        ExportArg::Options(o)
    }
}

impl From<Option<ExportOptions>> for ExportArg {
    fn from(o: Option<ExportOptions>) -> Self {
        ExportArg::Options(o.unwrap_or_default())
    }
}

impl From<Extension> for ExportArg {
    fn from(e: Extension) -> Self {
        ExportArg::Options(ExportOptions::extension(e))
    }
}

impl From<&str> for ExportArg {
    fn from(s: &str) -> Self {
        ExportArg::Legacy(s.to_string())
    }
}

impl From<String> for ExportArg {
    fn from(s: String) -> Self {
        ExportArg::Legacy(s)
    }
}

/// Resolved name + extension for one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub name: String,
    pub extension: Extension,
}

impl ExportTarget {
    pub fn filename(&self) -> String {
        format!("{}.{}", self.name, self.extension)
    }
}

impl ExportArg {
    /// Collapse either argument shape into one target. `advise` runs on the
    /// legacy branch so callers can emit their deprecation notice.
    pub fn resolve(self, advise: impl FnOnce()) -> ExportTarget {
        match self {
            ExportArg::Options(o) => ExportTarget {
                name: o.name.filter(|n| !n.is_empty()).unwrap_or_else(|| DEFAULT_NAME.to_string()),
                extension: o.extension.unwrap_or_default(),
            },
            ExportArg::Legacy(ext) => {
                advise();
                let extension = ext.parse().unwrap_or_else(|e| {
                    log::warn!("{}; exporting as png", e);
                    Extension::Png
                });
                ExportTarget {
                    name: DEFAULT_NAME.to_string(),
                    extension,
                }
            }
        }
    }
}

/// Encode the surface's current pixels as a `data:` URI.
///
/// The declared MIME type matches the bytes actually produced, so an SVG
/// request yields `data:image/png`.
pub fn to_data_uri(surface: &Surface, extension: Extension) -> Result<String> {
    let frame = surface.snapshot();
    let (mime, format, image) = match extension {
        Extension::Png => ("image/png", ImageFormat::Png, DynamicImage::ImageRgba8(frame)),
        Extension::Webp => ("image/webp", ImageFormat::WebP, DynamicImage::ImageRgba8(frame)),
        // JPEG has no alpha channel
        Extension::Jpeg => (
            "image/jpeg",
            ImageFormat::Jpeg,
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(frame).to_rgb8()),
        ),
        Extension::Svg => {
            log::warn!("SVG export is not available for raster surfaces; emitting png");
            ("image/png", ImageFormat::Png, DynamicImage::ImageRgba8(frame))
        }
    };

    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format)?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&buf)))
}

/// Decode a base64 `data:` URI into its bytes
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::Download("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::Download("data URI has no payload".into()))?;
    if !meta.ends_with(";base64") {
        return Err(Error::Download("only base64 data URIs are supported".into()));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| Error::Download(format!("invalid base64 payload: {}", e)))
}

/// MIME type declared by a data URI, e.g. `image/png`
pub fn data_uri_mime(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("data:")?;
    let meta = rest.split_once(',')?.0;
    Some(meta.split(';').next().unwrap_or(meta))
}

/// Save `data` under `filename` through a transient anchor in `document`.
///
/// The anchor is attached to the body, activated once and removed again, so
/// the document carries no residue whether or not the save succeeds.
pub fn trigger_download(document: &Document, data: &str, filename: &str) -> Result<()> {
    let link = document.create_element("a");
    link.set_attribute("download", filename);
    link.set_attribute("href", data);
    let body = document.body();
    body.append_child(&link)?;
    let res = link.click();
    body.remove_child(&link);
    link.discard();
    res
}
