//! Render lifecycle controller
//!
//! `QrStyling` owns the canonical options, the current surface and the single
//! "current" draw operation. `update` synchronously replaces all three; export
//! and download wait on whichever draw operation is current when they are
//! called and then read whichever surface is current when it resolves.
//!
//! If an update lands while an export waits, the export moves on to the newer
//! draw operation, so it only ever reads a surface whose paint has finished.
//! Clearing the data keeps the last draw operation tracked: later exports
//! still wait on it and then report the missing surface.
//!
//! A superseded draw operation is never cancelled. Anyone still holding a
//! clone of it will see it resolve against its own (stale) surface, but the
//! controller no longer attaches, exports or downloads that surface.

use crate::document::{Document, Node};
use crate::encoder::{EncodeRequest, SymbolEncoder, SymbolMatrix};
use crate::export::{self, ExportArg};
use crate::normalize::normalize;
use crate::rendering::{DrawOperation, StyledRenderer, Surface};
use crate::{Error, Mode, Options, Result};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};

static EXPORT_ARG_NOTICE: Once = Once::new();
static DOWNLOAD_ARG_NOTICE: Once = Once::new();

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// No data; nothing rendered
    Empty,
    /// Surface exists, paint still in flight
    Rendering,
    /// Surface exists and the current paint finished
    Ready,
}

#[derive(Default)]
struct RenderState {
    container: Option<Node>,
    matrix: Option<Arc<SymbolMatrix>>,
    surface: Option<Surface>,
    draw: Option<DrawOperation>,
    cycle: u64,
}

/// Renders styled QR codes into a host document and exports them
pub struct QrStyling {
    document: Document,
    options: Options,
    encoder: Arc<dyn SymbolEncoder>,
    renderer: Arc<dyn StyledRenderer>,
    state: Arc<Mutex<RenderState>>,
}

impl QrStyling {
    /// Construct with the built-in `qrcode` encoder and raster renderer
    #[cfg(feature = "qrcode-encoder")]
    pub fn new(document: Document, options: Option<Value>) -> Result<Self> {
        Self::with_backends(
            document,
            options,
            Arc::new(crate::encoder::QrcodeEncoder::new()),
            Arc::new(crate::rendering::RasterRenderer::new()),
        )
    }

    /// Construct with explicit encoder and renderer backends.
    ///
    /// `options` are merged over [`Options::default`]; a first render cycle
    /// runs immediately if they carry data.
    pub fn with_backends(
        document: Document,
        options: Option<Value>,
        encoder: Arc<dyn SymbolEncoder>,
        renderer: Arc<dyn StyledRenderer>,
    ) -> Result<Self> {
        let mut styling = Self {
            document,
            options: normalize(&Options::default(), options.as_ref()),
            encoder,
            renderer,
            state: Arc::new(Mutex::new(RenderState::default())),
        };
        styling.render()?;
        Ok(styling)
    }

    fn state(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current canonical options
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Surface of the current render cycle, if any
    pub fn surface(&self) -> Option<Surface> {
        self.state().surface.clone()
    }

    /// Matrix of the current render cycle, if any
    pub fn matrix(&self) -> Option<Arc<SymbolMatrix>> {
        self.state().matrix.clone()
    }

    /// Draw operation of the current render cycle, if any
    pub fn draw_operation(&self) -> Option<DrawOperation> {
        self.state().draw.clone()
    }

    pub fn container(&self) -> Option<Node> {
        self.state().container.clone()
    }

    /// Number of render cycles that produced a surface
    pub fn cycles(&self) -> u64 {
        self.state().cycle
    }

    pub fn phase(&self) -> RenderPhase {
        let state = self.state();
        match (&state.surface, &state.draw) {
            (Some(_), Some(d)) if d.is_complete() => RenderPhase::Ready,
            (Some(_), _) => RenderPhase::Rendering,
            _ => RenderPhase::Empty,
        }
    }

    /// Merge `partial` over the current options and start a new render cycle.
    ///
    /// Returns before painting finishes. Only fails if the encoder rejects the
    /// data, in which case the controller is left empty.
    pub fn update(&mut self, partial: Option<Value>) -> Result<()> {
        self.options = normalize(&self.options, partial.as_ref());
        self.render()
    }

    /// Shorthand for updating just the data
    pub fn set_data(&mut self, data: &str) -> Result<()> {
        self.update(Some(crate::normalize::patch("data", data)))
    }

    fn render(&mut self) -> Result<()> {
        let mut state = self.state();

        // Only our own surface is removed; other children of the container are left alone
        if let Some(old) = state.surface.take() {
            old.node().discard();
        }
        state.matrix = None;

        let Some(data) = self.options.data() else {
            log::debug!("No data configured; leaving render state empty");
            return Ok(());
        };
        let mode = self.options.qr_options.mode.unwrap_or_else(|| Mode::detect(data));

        let request = EncodeRequest {
            data,
            mode,
            type_number: self.options.qr_options.type_number,
            level: self.options.qr_options.error_correction_level,
        };
        let matrix = Arc::new(self.encoder.encode(&request)?);

        let rendering = self.renderer.render(&self.document, &self.options, Arc::clone(&matrix));
        state.cycle += 1;
        log::debug!(
            "Render cycle {}: {}x{} modules, {:?} mode, level {}",
            state.cycle,
            matrix.size(),
            matrix.size(),
            mode,
            request.level
        );

        if let Some(container) = &state.container {
            if let Err(e) = container.append_child(rendering.surface.node()) {
                log::warn!("Could not attach surface to container: {}", e);
            }
        }
        state.matrix = Some(matrix);
        state.surface = Some(rendering.surface);
        state.draw = Some(rendering.draw);
        Ok(())
    }

    /// Attach the current surface (if any) to `container` and remember the
    /// container for later cycles. `None` leaves everything as it is.
    pub fn append<'a>(&mut self, container: impl Into<Option<&'a Node>>) -> Result<()> {
        let Some(container) = container.into() else {
            return Ok(());
        };
        if !container.accepts_children() {
            return Err(Error::InvalidContainer(format!("{:?} cannot hold child nodes", container.kind())));
        }
        if !container.document().ptr_eq(&self.document) {
            return Err(Error::InvalidContainer("container belongs to another document".into()));
        }
        let mut state = self.state();
        if let Some(surface) = &state.surface {
            container.append_child(surface.node())?;
        }
        state.container = Some(container.clone());
        Ok(())
    }

    /// Encode the current surface as a data URI once its paint completes.
    ///
    /// Fails with [`Error::NotReady`] if no render cycle ever started and with
    /// [`Error::SurfaceMissing`] if the surface is gone when the paint resolves.
    pub fn export_as_string(&self, arg: impl Into<ExportArg>) -> BoxFuture<'static, Result<String>> {
        let target = arg.into().resolve(|| {
            EXPORT_ARG_NOTICE.call_once(|| {
                log::warn!(
                    "Extension is deprecated as argument for 'export_as_string', please pass ExportOptions {{ extension: .. }}"
                )
            })
        });
        let current = self.current_draw();
        let state = Arc::clone(&self.state);

        async move {
            let (draw, cycle) = current.ok_or(Error::NotReady)?;
            let surface = settled_surface(state, draw, cycle).await.ok_or(Error::SurfaceMissing)?;
            export::to_data_uri(&surface, target.extension)
        }
        .boxed()
    }

    /// Best-effort download of the current surface once its paint completes.
    ///
    /// Never reports errors and never blocks on a pending paint. Returns the
    /// spawned task when there was a render cycle to wait for and a tokio
    /// runtime to run on. Without a runtime a finished paint is downloaded
    /// before returning and a pending one is waited for on a helper thread.
    pub fn download(&self, arg: impl Into<ExportArg>) -> Option<tokio::task::JoinHandle<()>> {
        let target = arg.into().resolve(|| {
            DOWNLOAD_ARG_NOTICE.call_once(|| {
                log::warn!(
                    "Extension is deprecated as argument for 'download', please pass ExportOptions {{ name: .., extension: .. }}"
                )
            })
        });
        let (draw, cycle) = self.current_draw()?;
        let painted = draw.is_complete();
        let state = Arc::clone(&self.state);
        let document = self.document.clone();

        let job = async move {
            let Some(surface) = settled_surface(state, draw, cycle).await else {
                return;
            };
            let res = export::to_data_uri(&surface, target.extension)
                .and_then(|data| export::trigger_download(&document, &data, &target.filename()));
            if let Err(e) = res {
                log::error!("Download of {} failed: {}", target.filename(), e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(job)),
            Err(_) if painted => {
                futures::executor::block_on(job);
                None
            }
            Err(_) => {
                std::thread::spawn(move || futures::executor::block_on(job));
                None
            }
        }
    }

    fn current_draw(&self) -> Option<(DrawOperation, u64)> {
        let state = self.state();
        state.draw.clone().map(|d| (d, state.cycle))
    }
}

/// Wait for `draw`, following any newer cycle started meanwhile, and return
/// the surface current once the tracked draw operation has settled.
async fn settled_surface(state: Arc<Mutex<RenderState>>, mut draw: DrawOperation, mut cycle: u64) -> Option<Surface> {
    loop {
        draw.await;
        let (newer, newer_cycle) = {
            let st = state.lock().unwrap_or_else(PoisonError::into_inner);
            match &st.draw {
                Some(newer) if st.cycle != cycle => (newer.clone(), st.cycle),
                _ => return st.surface.clone(),
            }
        };
        log::debug!("Cycle {} superseded while waiting; following cycle {}", cycle, newer_cycle);
        draw = newer;
        cycle = newer_cycle;
    }
}
