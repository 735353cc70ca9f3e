/*!
Implements the main loop of the application.

The `App` struct owns the platform event loop and the window. `App::run()` must be
called on the main thread and drives the window at a fixed cadence: every iteration
builds and draws one frame, pumps the pending platform events without blocking and
then idles until the frame period is used up. The loop ends when the window is closed
by the user, by the data model, or with the Alt+F4 hotkey.

The platform window is managed using the [winit](https://crates.io/crates/winit) crate.
The GUI is created using the [Dear ImGui](https://github.com/ocornut/imgui) C++ library
and its rust bindings [imgui-rs](https://github.com/imgui-rs/imgui-rs), and is drawn
with [wgpu](https://crates.io/crates/wgpu).
*/

use super::frame::FramePacer;
use super::render::{CallbackPolicy, RasterOptions};
use super::{ErrorCode, Layout, UiError, UiResult, Window};
use crate::utils;
use std::error::Error;
use std::time::Duration;
use winit::event::Event;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};

pub type EventLoop = winit::event_loop::EventLoop<()>;

/// The event loop, the window and the settings of the main loop.
pub struct App {
    event_loop: EventLoop,
    window: Option<Window>,
    /// The target length of one frame, defaults to 1/60 s.
    pub frame_period: Duration,
    /// The color the window is cleared with before the GUI is drawn.
    pub clear_color: [f32; 4],
    /// How draw commands with user callbacks are handled, defaults to `Abort`.
    pub callback_policy: CallbackPolicy,
    /// Present mode of windows created afterwards. The frame pacer sets the cadence,
    /// so this defaults to `AutoNoVsync`.
    pub present_mode: wgpu::PresentMode,
}

impl App {
    /// Create a new App instance.
    ///
    /// Only one instance can be created per program, creating a second one fails with
    /// `EVENT_LOOP_FAILED`.
    pub fn new() -> UiResult<App> {
        let event_loop = EventLoop::new()
            .map_err(|err| UiError::with_source(ErrorCode::EVENT_LOOP_FAILED, err))?;

        Ok(App {
            event_loop,
            window: None,
            frame_period: utils::frame_period(60),
            clear_color: RasterOptions::default().clear_color,
            callback_policy: CallbackPolicy::default(),
            present_mode: wgpu::PresentMode::AutoNoVsync,
        })
    }

    /// Creates the window of the app with `data_model` as its data model.
    ///
    /// `window_builder_func` creates the `WindowBuilder`, see `Window::build_window()`.
    /// A window created earlier is replaced.
    pub fn new_window<'a>(
        &'a mut self,
        data_model: impl Layout + 'static,
        window_builder_func: &impl Fn(&App) -> Result<winit::window::WindowBuilder, Box<dyn Error>>,
    ) -> UiResult<&'a mut Window> {
        let wnd_builder: winit::window::WindowBuilder = match window_builder_func(self) {
            Ok(w) => w,
            Err(err) => {
                return Err(UiError::with_boxed_source(
                    ErrorCode::WINDOW_BUILD_FAILED,
                    err,
                ))
            }
        };

        // Prevents the window from flickering white as much when shown initially.
        let wnd = match wnd_builder.with_visible(false).build(&self.event_loop) {
            Ok(w) => w,
            Err(err) => return Err(UiError::with_source(ErrorCode::WINDOW_BUILD_FAILED, err)),
        };

        let window = Window::new(Box::new(data_model), wnd, self.present_mode)?;
        if let Some(previous) = self.window.replace(window) {
            log::debug!("Window {:?} replaced.", previous.id());
        }

        self.window
            .as_mut()
            .ok_or_else(|| UiError::new(ErrorCode::WINDOW_DOES_NOT_EXIST))
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }

    pub fn window_mut(&mut self) -> Option<&mut Window> {
        self.window.as_mut()
    }

    /// Runs the main loop until the window is closed.
    ///
    /// Fails with `WINDOW_DOES_NOT_EXIST` if no window was created. Errors of single
    /// frames are logged and the loop goes on with the next frame.
    pub fn run(self) -> UiResult<()> {
        let App {
            mut event_loop,
            window,
            frame_period,
            clear_color,
            callback_policy,
            ..
        } = self;

        let mut window = window.ok_or_else(|| UiError::new(ErrorCode::WINDOW_DOES_NOT_EXIST))?;
        let window_id = window.id();
        let options = RasterOptions {
            clear_color,
            callback_policy,
        };
        let mut pacer = FramePacer::new(frame_period);

        log::info!("Running at {:?} per frame.", frame_period);
        while !window.is_closed() {
            let delta = pacer.begin_frame();

            if let Err(err) = window.render_frame(delta, &options) {
                log::warn!("Failed to render frame: {}", err);
            }

            let status = event_loop.pump_events(Some(Duration::ZERO), |event, _| {
                if let Event::WindowEvent {
                    window_id: id,
                    event,
                } = event
                {
                    if id == window_id {
                        window.on_event(&event);
                    }
                }
            });
            if let PumpStatus::Exit(code) = status {
                log::info!("Event loop exited with code {}.", code);
                break;
            }

            pacer.idle_wait();
        }

        Ok(())
    }
}
