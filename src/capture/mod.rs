//! The `capture` module produces the pictures that start every exchange.
//! A `Camera` hands back a base64 JPEG, whether it comes from a snapshot
//! program or from a file kept fresh by another tool.

use async_trait::async_trait;

pub mod camera;

pub use camera::{encode_jpeg, CommandCamera, FileCamera};

/// A captured picture, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Base64-encoded JPEG image data
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("capture I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode picture: {0}")]
    Decode(String),
    #[error("encode picture: {0}")]
    Encode(String),
}

#[async_trait]
pub trait Camera: Send + Sync {
    /// Take one picture. Failures are reported, never retried by the caller.
    async fn capture(&self) -> Result<ImagePayload, CaptureError>;

    fn name(&self) -> &str;
}
