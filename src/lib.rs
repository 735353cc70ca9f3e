pub use imgui;
pub use log;
pub use winit;

pub mod utils;

pub mod app;
pub mod error;
pub mod frame;
pub mod input;
pub mod render;
pub mod window;

pub use app::*;
pub use error::*;
pub use window::*;
