//! QR Style
//!
//! Renders styled QR codes into an in-memory host document and exports them
//! as data URIs or one-shot downloads.
//!
//! # Features
//!
//! - **Render lifecycle**: `update` re-renders synchronously and never waits
//!   for paint; export and download wait for the latest paint only
//! - **Pluggable backends**: symbol encoding and styled painting sit behind
//!   the [`SymbolEncoder`] and [`StyledRenderer`] traits
//! - **Forgiving configuration**: partial JSON updates are deep-merged over
//!   the previous options and sanitized instead of rejected
//!
//! # Example
//!
//! ```no_run
//! use qrstyle::{Document, ExportOptions, QrStyling};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let document = Document::new();
//! let mut qr = QrStyling::new(document.clone(), Some(json!({ "data": "https://example.com" })))?;
//!
//! let container = document.create_element("div");
//! qr.append(&container)?;
//!
//! let uri = qr.export_as_string(ExportOptions::default()).await?;
//! assert!(uri.starts_with("data:image/png;base64,"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod document;
pub mod encoder;
pub mod export;
pub mod normalize;
pub mod options;
pub mod rendering;
pub mod styling;

pub use document::{Document, DownloadHandler, Node, NodeKind};
pub use encoder::{EncodeRequest, SymbolEncoder, SymbolMatrix};
#[cfg(feature = "qrcode-encoder")]
pub use encoder::QrcodeEncoder;
pub use export::{ExportArg, ExportOptions, Extension};
pub use options::{ErrorCorrectionLevel, Mode, Options};
pub use rendering::{DrawOperation, RasterRenderer, Rendering, StyledRenderer, Surface};
pub use styling::{QrStyling, RenderPhase};
