//! Decoder seam and the scoped lease that guarantees its release.

use crate::config::ScanConfig;
use crate::error::DecoderError;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

/// A camera the decoder can stream from. Owned by the decoder; sessions only
/// refer to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraHandle {
    /// Platform device id.
    pub id: String,
    /// Human-readable label.
    pub label: String,
}

/// Identifies one running camera stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Result of one decode attempt on a camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult {
    /// A code was found; this is its text.
    Decoded(String),
    /// No code in this frame.
    NoCode(String),
}

/// Sampling parameters for a camera stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSettings {
    /// Decode attempts per second.
    pub fps: u32,
    /// Side of the square detection window in pixels.
    pub detection_box: u32,
    /// Viewfinder aspect ratio.
    pub aspect_ratio: f32,
}

impl From<&ScanConfig> for StreamSettings {
    fn from(config: &ScanConfig) -> Self {
        Self {
            fps: config.fps,
            detection_box: config.detection_box,
            aspect_ratio: config.aspect_ratio,
        }
    }
}

/// An uploaded image.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Original file name.
    pub name: String,
    /// MIME type reported by the picker, e.g. `image/png`.
    pub content_type: String,
    /// File contents.
    pub data: Bytes,
}

impl ImageInput {
    /// Whether the reported type is an image type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Turns camera frames or image files into decoded text.
#[async_trait]
pub trait Decoder: Send {
    /// Enumerate cameras, in platform order.
    async fn list_devices(&mut self) -> Result<Vec<CameraHandle>, DecoderError>;

    /// Start decoding frames from `device`, sending one [`FrameResult`] per
    /// attempt on `frames`.
    async fn start_stream(
        &mut self,
        device: &CameraHandle,
        settings: StreamSettings,
        frames: mpsc::Sender<FrameResult>,
    ) -> Result<StreamHandle, DecoderError>;

    /// Stop a stream started by [`start_stream`](Self::start_stream).
    async fn stop_stream(&mut self, stream: StreamHandle) -> Result<(), DecoderError>;

    /// Decode a single image. `Ok(None)` means no code was found.
    async fn decode_image(&mut self, image: &ImageInput) -> Result<Option<String>, DecoderError>;

    /// Tear the decoder down, stopping any stream still running. Called
    /// exactly once, from [`DecoderLease`]'s drop.
    fn release(&mut self);
}

/// Hands out decoders. At most one decoder per screen is live at a time.
#[async_trait]
pub trait DecoderSource: Send + Sync {
    /// Acquire a decoder, e.g. after camera permission is granted.
    async fn acquire(&self) -> Result<Box<dyn Decoder>, DecoderError>;
}

/// Exclusive ownership of an acquired decoder. Dropping the lease releases
/// the decoder on every path, including errors and unwinding.
pub struct DecoderLease {
    decoder: Box<dyn Decoder>,
}

impl DecoderLease {
    /// Acquire a decoder from `source`.
    ///
    /// # Errors
    ///
    /// Returns the source's error if acquisition fails.
    pub async fn acquire(source: &dyn DecoderSource) -> Result<Self, DecoderError> {
        let decoder = source.acquire().await?;
        debug!("Decoder acquired");
        Ok(Self { decoder })
    }

    /// The leased decoder.
    pub fn decoder(&mut self) -> &mut dyn Decoder {
        self.decoder.as_mut()
    }
}

impl Drop for DecoderLease {
    fn drop(&mut self) {
        self.decoder.release();
        debug!("Decoder released");
    }
}

impl std::fmt::Debug for DecoderLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderLease").finish_non_exhaustive()
    }
}
