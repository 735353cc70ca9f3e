/// An error that only carries a message.
///
/// Used for errors which only implement `Debug` (see `MessageError::debug()`) and for
/// plain text sources of `UiError::with_message()`.
#[derive(Debug)]
pub struct MessageError(pub String);

impl std::error::Error for MessageError {}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageError {
    fn from(message: String) -> MessageError {
        MessageError(message)
    }
}

impl MessageError {
    /// The debug format `{:?}` of `val` as message.
    pub fn debug<T: std::fmt::Debug>(val: &T) -> MessageError {
        MessageError(format!("{:?}", val))
    }
}
