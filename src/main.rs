use anyhow::Context;
use clap::Parser;
use qrstyle::document::DirectoryDownloads;
use qrstyle::{Document, ExportOptions, Extension, QrStyling};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Render a styled QR code and print it as a data URI or save it to a directory
#[derive(Parser, Debug)]
#[command(name = "qrstyle", version, about)]
struct Args {
    /// Text to encode
    #[arg(long)]
    data: Option<String>,

    /// JSON file with options, applied before the flags below
    #[arg(long)]
    options: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    margin: Option<u32>,

    /// Symbol version 1-40, 0 for automatic
    #[arg(long)]
    type_number: Option<u8>,

    /// L, M, Q or H
    #[arg(long)]
    error_correction: Option<String>,

    /// numeric, alphanumeric, byte or kanji
    #[arg(long)]
    mode: Option<String>,

    #[arg(long)]
    dots_color: Option<String>,

    #[arg(long)]
    background_color: Option<String>,

    /// png, jpeg, webp or svg
    #[arg(long, default_value = "png")]
    format: String,

    /// File name without extension
    #[arg(long, default_value = qrstyle::export::DEFAULT_NAME)]
    name: String,

    /// Save into this directory instead of printing
    #[arg(long)]
    out: Option<PathBuf>,
}

impl Args {
    /// Flags as a partial options document
    fn overrides(&self) -> Value {
        let mut top = Map::new();
        let mut qr = Map::new();
        if let Some(d) = &self.data {
            top.insert("data".into(), json!(d));
        }
        if let Some(w) = self.width {
            top.insert("width".into(), json!(w));
        }
        if let Some(h) = self.height {
            top.insert("height".into(), json!(h));
        }
        if let Some(m) = self.margin {
            top.insert("margin".into(), json!(m));
        }
        if let Some(t) = self.type_number {
            qr.insert("typeNumber".into(), json!(t));
        }
        if let Some(e) = &self.error_correction {
            qr.insert("errorCorrectionLevel".into(), json!(e));
        }
        if let Some(m) = &self.mode {
            qr.insert("mode".into(), json!(m));
        }
        if !qr.is_empty() {
            top.insert("qrOptions".into(), Value::Object(qr));
        }
        if let Some(c) = &self.dots_color {
            top.insert("dotsOptions".into(), json!({ "color": c }));
        }
        if let Some(c) = &self.background_color {
            top.insert("backgroundOptions".into(), json!({ "color": c }));
        }
        Value::Object(top)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut options = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading options file {}", path.display()))?;
            serde_json::from_str::<Value>(&text).context("parsing options file")?
        }
        None => json!({}),
    };
    qrstyle::normalize::merge_deep(&mut options, &args.overrides());

    let extension: Extension = args.format.parse()?;
    let document = match &args.out {
        Some(dir) => Document::with_download_handler(Arc::new(DirectoryDownloads::new(dir))),
        None => Document::new(),
    };

    let qr = QrStyling::new(document, Some(options))?;
    if qr.options().data().is_none() {
        anyhow::bail!("nothing to encode: pass --data or set \"data\" in the options file");
    }

    let export = ExportOptions::named(&args.name, extension);
    match &args.out {
        Some(dir) => {
            if let Some(task) = qr.download(export) {
                task.await.context("download task")?;
            }
            let path = dir.join(format!("{}.{}", args.name, extension));
            if !path.exists() {
                anyhow::bail!("download did not produce {}", path.display());
            }
            println!("{}", path.display());
        }
        None => {
            let uri = qr.export_as_string(export).await?;
            println!("{}", uri);
        }
    }
    Ok(())
}
