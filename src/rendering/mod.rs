//! Drawable surfaces and the asynchronous paint contract

pub mod paint;
pub mod raster;

use crate::document::{Document, Node};
use crate::encoder::SymbolMatrix;
use crate::Options;
use futures::future::{BoxFuture, FutureExt, Shared};
use image::RgbaImage;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

pub use raster::RasterRenderer;

/// A canvas node plus the pixels painted into it.
///
/// The handle is attachable as soon as it exists; pixels arrive when the
/// matching [`DrawOperation`] resolves.
#[derive(Clone)]
pub struct Surface {
    node: Node,
    pixels: Arc<Mutex<RgbaImage>>,
}

impl Surface {
    /// Create a transparent surface backed by a new canvas node in `document`
    pub fn new(document: &Document, width: u32, height: u32) -> Self {
        Self {
            node: document.create_canvas(width, height),
            pixels: Arc::new(Mutex::new(RgbaImage::new(width, height))),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn width(&self) -> u32 {
        self.pixels().width()
    }

    pub fn height(&self) -> u32 {
        self.pixels().height()
    }

    /// Lock the pixel buffer
    pub fn pixels(&self) -> MutexGuard<'_, RgbaImage> {
        self.pixels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current pixel content
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels().clone()
    }

    pub(crate) fn pixel_handle(&self) -> Arc<Mutex<RgbaImage>> {
        Arc::clone(&self.pixels)
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface").field("node", &self.node).finish()
    }
}

/// Handle to an in-flight paint. Cloneable; every clone resolves together.
#[derive(Clone)]
pub struct DrawOperation {
    inner: Shared<BoxFuture<'static, ()>>,
}

impl DrawOperation {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// An operation that has already completed
    pub fn ready() -> Self {
        let op = Self::new(futures::future::ready(()));
        let _ = op.clone().now_or_never();
        op
    }

    /// Whether the paint finished. Only observes progress made by whoever
    /// polls the operation (a driver task or an awaiting caller).
    pub fn is_complete(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl Future for DrawOperation {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

/// Output of one renderer invocation
pub struct Rendering {
    pub surface: Surface,
    pub draw: DrawOperation,
}

/// Paints a symbol matrix onto a new surface in the host document
pub trait StyledRenderer: Send + Sync {
    /// Must return immediately; painting may continue in the background.
    fn render(&self, document: &Document, options: &Options, matrix: Arc<SymbolMatrix>) -> Rendering;
}
