//! The OS window and the GUI drawn into it.
//!
//! A `Window` owns everything needed to produce a frame: the `winit` window, the
//! imgui context, the polled input and the renderer. Its data model is a struct that
//! implements the `Layout` trait. All window and UI specific state is contained in
//! the data model and it is responsible for the GUI layout (`Layout::layout()`).

use super::input::{InputSnapshot, InputState};
use super::render::{rasterize, DrawCommandList, RasterOptions, RasterStats, WgpuRenderer};
use super::ErrorCode;
use super::UiError;
use super::UiResult;
use std::cell::Cell;
use std::error::Error;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use winit::event::WindowEvent;

pub use winit::window::WindowId;

/// This trait contains the functions which are used to layout the GUI.
///
/// You must implement this trait in your own struct and create a `Window` with an
/// instance of it (which is called the data model). Every frame the `App` calls
/// `Window::render_frame()`, which in turn calls `Layout::layout()`.
pub trait Layout {
    /// The central method for creating the GUI.
    fn layout(&mut self, ui: &LayoutContext<'_>);

    /// Called once before the window is shown. Styles and fonts are set up here.
    ///
    /// If this method fails, `App::new_window()` fails with `WINDOW_BUILD_FAILED`
    /// and the error as its source.
    fn init(&mut self, _imgui: &mut imgui::Context) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    /// Called before the window gets closed. The window stays open if this returns
    /// `false`.
    fn before_close(&mut self) -> bool {
        true
    }
}

/// The context used to create the GUI using Dear ImGui.
/// It is passed to the `Layout::layout()` method.
pub struct LayoutContext<'ui> {
    pub ui: &'ui imgui::Ui,
    input: &'ui InputSnapshot,
    close_requested: Cell<bool>,
}

impl LayoutContext<'_> {
    /// The input this frame is built from.
    #[inline]
    pub fn input(&self) -> &InputSnapshot {
        self.input
    }

    /// Closes the window after the current frame.
    pub fn request_close(&self) {
        self.close_requested.set(true);
    }
}

impl Deref for LayoutContext<'_> {
    type Target = imgui::Ui;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.ui
    }
}

/// This struct represents an OS window, which contains an imgui graphical user interface.
pub struct Window {
    window: Arc<winit::window::Window>,
    renderer: WgpuRenderer,
    imgui: imgui::Context,
    input: InputState,
    last_snapshot: InputSnapshot,
    closed: bool,

    /// The data model associated with this window, that holds its state.
    pub data_model: Box<dyn Layout>,
}

impl Window {
    /// Creates a standard top level window with `size` in logical pixels.
    ///
    /// Call this method inside the closure passed to `App::new_window()`.
    pub fn build_window(title: &str, size: (u32, u32)) -> winit::window::WindowBuilder {
        winit::window::WindowBuilder::new()
            .with_title(title)
            .with_inner_size(winit::dpi::LogicalSize {
                width: size.0,
                height: size.1,
            })
            .with_resizable(true)
    }

    /// Creates a new `Window` instance.
    ///
    /// *Only for internal use.* The user creates new windows using `App::new_window()`.
    pub fn new(
        mut data_model: Box<dyn Layout>,
        wnd: winit::window::Window,
        present_mode: wgpu::PresentMode,
    ) -> UiResult<Window> {
        let window = Arc::new(wnd);
        let scale_factor = window.scale_factor();
        let size = window.inner_size().to_logical::<f32>(scale_factor);

        let mut renderer = WgpuRenderer::new(window.clone(), present_mode)?;

        let mut imgui = imgui::Context::create();
        imgui.set_ini_filename(None);
        imgui
            .fonts()
            .add_font(&[imgui::FontSource::DefaultFontData { config: None }]);

        if let Err(err) = data_model.init(&mut imgui) {
            return Err(UiError::with_boxed_source(ErrorCode::WINDOW_BUILD_FAILED, err));
        }
        renderer.upload_font_atlas(imgui.fonts())?;

        window.set_visible(true);
        log::debug!("Window {:?} created.", window.id());

        Ok(Window {
            window,
            renderer,
            imgui,
            input: InputState::new([size.width, size.height], scale_factor),
            last_snapshot: InputSnapshot::default(),
            closed: false,
            data_model,
        })
    }

    /// Get a reference to the underlying `winit::window::Window`, which can be used to
    /// change size, position, etc.
    pub fn window(&self) -> &winit::window::Window {
        &self.window
    }

    /// Get the id of the window.
    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the window, unless the data model refuses in `Layout::before_close()`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.data_model.before_close() {
            log::info!("Closing window {:?}.", self.id());
            self.closed = true;
            self.window.set_visible(false);
        }
    }

    /// Builds and draws one frame. `delta` is the time since the previous frame.
    pub fn render_frame(&mut self, delta: Duration, options: &RasterOptions) -> UiResult<RasterStats> {
        if self.closed {
            return Err(ErrorCode::WINDOW_DOES_NOT_EXIST.into());
        }

        let snapshot = self.input.snapshot();
        let scale_factor = self.window.scale_factor();
        let size = self.window.inner_size().to_logical::<f32>(scale_factor);
        {
            let io = self.imgui.io_mut();
            io.display_size = [size.width, size.height];
            io.display_framebuffer_scale = [scale_factor as f32, scale_factor as f32];
            io.delta_time = delta.as_secs_f32().max(f32::EPSILON);
            snapshot.apply_to_io(&self.last_snapshot, io);
        }

        if snapshot.exit_hotkey_pressed() {
            self.last_snapshot = snapshot;
            self.close();
            return Ok(RasterStats::default());
        }

        let Window {
            imgui, data_model, ..
        } = self;

        let close_requested = {
            let ctx = LayoutContext {
                ui: imgui.new_frame(),
                input: &snapshot,
                close_requested: Cell::new(false),
            };
            data_model.layout(&ctx);
            ctx.close_requested.get()
        };
        let draw_list = DrawCommandList::from_imgui(imgui.render());

        self.last_snapshot = snapshot;
        if close_requested {
            self.close();
        }

        let draw_list = draw_list?;
        rasterize(&mut self.renderer, &draw_list, options)
    }

    /// Handles a platform event of this window.
    pub fn on_event(&mut self, event: &WindowEvent) {
        self.input.handle_event(event);

        match event {
            WindowEvent::Resized(physical_size) => {
                self.renderer
                    .resize(physical_size.width, physical_size.height);
                let logical = physical_size.to_logical::<f32>(self.window.scale_factor());
                self.input.set_client_size([logical.width, logical.height]);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.input.set_scale_factor(*scale_factor);
                let logical = self.window.inner_size().to_logical::<f32>(*scale_factor);
                self.input.set_client_size([logical.width, logical.height]);
            }
            WindowEvent::CloseRequested => self.close(),
            _ => (),
        }
    }
}
