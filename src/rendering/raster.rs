//! Rasterizer: executes paint commands into an RGBA surface

use super::paint::{self, PaintCommand};
use super::{DrawOperation, Rendering, StyledRenderer, Surface};
use crate::document::Document;
use crate::encoder::SymbolMatrix;
use crate::Options;
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex, PoisonError};

/// Apply `commands` to `image` in order
pub fn rasterize(image: &mut RgbaImage, commands: &[PaintCommand]) {
    let (w, h) = image.dimensions();
    for cmd in commands {
        match *cmd {
            PaintCommand::Clear { rgba } => {
                for px in image.pixels_mut() {
                    *px = Rgba(rgba);
                }
            }
            PaintCommand::SolidRect { x, y, width, height, rgba } => {
                for py in y..(y + height).min(h) {
                    for px in x..(x + width).min(w) {
                        image.put_pixel(px, py, Rgba(rgba));
                    }
                }
            }
            PaintCommand::Circle { x, y, size, rgba } => {
                let r = size as f64 / 2.0;
                let (cx, cy) = (x as f64 + r, y as f64 + r);
                for py in y..(y + size).min(h) {
                    for px in x..(x + size).min(w) {
                        let dx = px as f64 + 0.5 - cx;
                        let dy = py as f64 + 0.5 - cy;
                        if dx * dx + dy * dy <= r * r {
                            image.put_pixel(px, py, Rgba(rgba));
                        }
                    }
                }
            }
        }
    }
}

fn paint_into(pixels: &Mutex<RgbaImage>, commands: &[PaintCommand]) {
    // Paint off-lock, then swap in so readers never see a half-painted frame
    let (w, h) = pixels.lock().unwrap_or_else(PoisonError::into_inner).dimensions();
    let mut frame = RgbaImage::new(w, h);
    rasterize(&mut frame, commands);
    *pixels.lock().unwrap_or_else(PoisonError::into_inner) = frame;
}

/// Default renderer: plans commands synchronously and rasterizes them on a
/// blocking task when a tokio runtime is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterRenderer;

impl RasterRenderer {
    pub fn new() -> Self {
        RasterRenderer
    }
}

impl StyledRenderer for RasterRenderer {
    fn render(&self, document: &Document, options: &Options, matrix: Arc<SymbolMatrix>) -> Rendering {
        let surface = Surface::new(document, options.width, options.height);
        if options.image.is_some() {
            log::debug!("Embedded images are not painted by the raster renderer");
        }
        let commands = paint::plan(&matrix, options);
        let pixels = surface.pixel_handle();

        let draw = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn_blocking(move || paint_into(&pixels, &commands));
                let op = DrawOperation::new(async move {
                    if let Err(e) = task.await {
                        log::error!("Paint task failed: {}", e);
                    }
                });
                // Drive to completion even if nobody awaits it
                handle.spawn(op.clone());
                op
            }
            Err(_) => {
                paint_into(&pixels, &commands);
                DrawOperation::ready()
            }
        };

        Rendering { surface, draw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(size: usize) -> Arc<SymbolMatrix> {
        Arc::new(SymbolMatrix::from_modules(size, vec![true; size * size]).unwrap())
    }

    #[test]
    fn rasterize_rect_and_circle() {
        let mut img = RgbaImage::new(10, 10);
        rasterize(
            &mut img,
            &[
                PaintCommand::Clear { rgba: [255, 255, 255, 255] },
                PaintCommand::SolidRect { x: 0, y: 0, width: 2, height: 2, rgba: [0, 0, 0, 255] },
                PaintCommand::Circle { x: 4, y: 4, size: 6, rgba: [255, 0, 0, 255] },
            ],
        );
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(3, 3).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(7, 7).0, [255, 0, 0, 255]);
        // circle corners stay background
        assert_eq!(img.get_pixel(4, 4).0, [255, 255, 255, 255]);
    }

    #[test]
    fn rects_are_clipped() {
        let mut img = RgbaImage::new(4, 4);
        rasterize(&mut img, &[PaintCommand::SolidRect { x: 2, y: 2, width: 10, height: 10, rgba: [1, 2, 3, 4] }]);
        assert_eq!(img.get_pixel(3, 3).0, [1, 2, 3, 4]);
    }

    #[test]
    fn renders_synchronously_without_runtime() {
        let doc = Document::new();
        let r = RasterRenderer::new().render(&doc, &Options::default(), full(21));
        assert!(r.draw.is_complete());
        assert_eq!(r.surface.snapshot().get_pixel(10, 10).0, [0, 0, 0, 255]);
        // margin strip around the centred grid stays background
        assert_eq!(r.surface.snapshot().get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn renders_in_background_with_runtime() {
        let doc = Document::new();
        let r = RasterRenderer::new().render(&doc, &Options::default(), full(21));
        assert_eq!(r.surface.width(), 300);
        r.draw.clone().await;
        assert_eq!(r.surface.snapshot().get_pixel(150, 150).0, [0, 0, 0, 255]);
    }
}
