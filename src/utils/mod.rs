pub mod message_error;

pub use message_error::*;

use std::time::Duration;

/// The length of one frame when running at `frames_per_second`.
///
/// A rate of zero is treated as one frame per second.
#[inline]
pub fn frame_period(frames_per_second: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(frames_per_second.max(1)))
}

/// Runs `f` with a fresh imgui context whose fonts are built, with a 960x540 display.
///
/// imgui allows only one context at a time, tests creating one take turns.
#[cfg(test)]
pub(crate) fn with_imgui<R>(f: impl FnOnce(&mut imgui::Context) -> R) -> R {
    use std::sync::Mutex;

    static IMGUI_LOCK: Mutex<()> = Mutex::new(());
    let _guard = IMGUI_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let mut imgui = imgui::Context::create();
    imgui.set_ini_filename(None);
    imgui.fonts().build_rgba32_texture();
    {
        let io = imgui.io_mut();
        io.display_size = [960.0, 540.0];
        io.delta_time = 1.0 / 60.0;
    }
    f(&mut imgui)
}
