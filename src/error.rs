//! Error handling.

use crate::utils::MessageError;
use std::error::Error;

/// The error code that represents the actual error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
#[allow(non_camel_case_types)]
pub enum ErrorCode {
    /// The window was already closed or was never created.
    WINDOW_DOES_NOT_EXIST = 0,
    /// The platform event loop could not be created.
    EVENT_LOOP_FAILED,
    /// `winit` failed to build the window.
    WINDOW_BUILD_FAILED,
    /// `wgpu` could not create a surface for the window.
    SURFACE_CREATION_FAILED,
    /// No graphics adapter available from `wgpu`.
    GRAPHICS_ADAPTER_NOT_AVAILABLE,
    REQUEST_GRAPHICS_DEVICE_FAILED,
    /// The font atlas could not be uploaded to the GPU.
    FONT_TEXTURE_FAILED,
    /// The surface was lost or outdated and has been reconfigured, the frame is dropped.
    SURFACE_LOST,
    /// Timeout when requesting the next surface texture.
    SURFACE_TIMEOUT,
    RENDER_ERROR,
    /// A draw command carried a user callback which this renderer does not invoke.
    UNSUPPORTED_DRAW_CALLBACK,
    /// A draw command referenced indices or vertices outside of its draw list.
    INVALID_DRAW_LIST,
}

/// A generic error struct for `App`, `Window` and rendering related errors.
///
/// All `UiError`s have an associated `ErrorCode` that specifies the exact error.
#[derive(Debug)]
pub struct UiError {
    error_code: ErrorCode,
    source_error: Option<Box<dyn Error>>,
}

impl std::fmt::Display for UiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error_code)?;
        if let Some(ref err) = self.source_error {
            write!(f, " caused by {}", err)?;
        }
        Ok(())
    }
}

impl Error for UiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source_error.as_ref().map(|s| &**s)
    }
}

impl UiError {
    /// Create a new `UiError` with the provided error code.
    pub fn new(error_code: ErrorCode) -> UiError {
        UiError {
            error_code,
            source_error: None,
        }
    }

    /// Create a new `UiError` with the provided error code and source error.
    pub fn with_source<T: Error + 'static>(error_code: ErrorCode, source: T) -> UiError {
        UiError {
            error_code,
            source_error: Some(Box::new(source)),
        }
    }

    /// Create a new `UiError` with the provided error code and boxed source error.
    pub fn with_boxed_source(error_code: ErrorCode, source: Box<dyn Error>) -> UiError {
        UiError {
            error_code,
            source_error: Some(source),
        }
    }

    /// Create a new `UiError` whose source is a plain text message.
    pub fn with_message(error_code: ErrorCode, message: impl Into<String>) -> UiError {
        UiError::with_source(error_code, MessageError::from(message.into()))
    }

    /// The code of this error.
    pub fn code(&self) -> ErrorCode {
        self.error_code
    }
}

impl From<ErrorCode> for UiError {
    fn from(error_code: ErrorCode) -> UiError {
        UiError::new(error_code)
    }
}

pub type UiResult<T> = Result<T, UiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_source() {
        let err = UiError::with_message(ErrorCode::INVALID_DRAW_LIST, "index 7 out of range");
        assert_eq!(err.code(), ErrorCode::INVALID_DRAW_LIST);
        assert_eq!(
            err.to_string(),
            "INVALID_DRAW_LIST caused by index 7 out of range"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn from_code_has_no_source() {
        let err: UiError = ErrorCode::SURFACE_LOST.into();
        assert_eq!(err.to_string(), "SURFACE_LOST");
        assert!(err.source().is_none());
    }
}
