use serde::{Deserialize, Serialize};

/// `{success, message, data}` wrapper used by every JSON response and push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
        }
    }
}

impl Envelope<()> {
    /// Failure without any data.
    pub fn error(message: impl Into<String>) -> Self {
        Self::failure(message, None)
    }
}
