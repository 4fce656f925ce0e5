//! Scripted stand-ins for the camera decoder and the checkout widget.

use async_trait::async_trait;
use parking_lot::Mutex;
use schoolpay::error::{CheckoutError, DecoderError};
use schoolpay::payment::{CheckoutProvider, CheckoutRequest, ProviderConfirmation};
use schoolpay::scan::{
    CameraHandle, Decoder, DecoderSource, FrameResult, ImageInput, StreamHandle, StreamSettings,
};
use schoolpay::InMemoryLedger;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Default)]
struct Leases {
    acquired: usize,
    released: usize,
}

/// Decoder source replaying a fixed script.
#[derive(Debug, Default)]
pub struct FakeDecoderSource {
    leases: Arc<Mutex<Leases>>,
    cameras: Vec<String>,
    frames: Vec<FrameResult>,
    image_text: Option<String>,
    fail_listing: bool,
}

impl FakeDecoderSource {
    /// A source whose decoders see the given cameras.
    pub fn with_cameras(ids: &[&str]) -> Self {
        Self {
            cameras: ids.iter().map(|id| (*id).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Frames delivered to the first stream each decoder starts.
    pub fn frames(mut self, frames: Vec<FrameResult>) -> Self {
        self.frames = frames;
        self
    }

    /// Text found in every uploaded image.
    pub fn image_text(mut self, text: &str) -> Self {
        self.image_text = Some(text.to_string());
        self
    }

    /// Make camera enumeration fail as if permission were denied.
    pub fn deny_camera(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Decoders handed out so far.
    pub fn acquired(&self) -> usize {
        self.leases.lock().acquired
    }

    /// Decoders not yet released.
    pub fn outstanding(&self) -> usize {
        let leases = self.leases.lock();
        leases.acquired - leases.released
    }
}

#[async_trait]
impl DecoderSource for FakeDecoderSource {
    async fn acquire(&self) -> Result<Box<dyn Decoder>, DecoderError> {
        self.leases.lock().acquired += 1;
        Ok(Box::new(FakeDecoder {
            leases: Arc::clone(&self.leases),
            cameras: self.cameras.clone(),
            frames: self.frames.clone(),
            image_text: self.image_text.clone(),
            fail_listing: self.fail_listing,
            sink: None,
        }))
    }
}

struct FakeDecoder {
    leases: Arc<Mutex<Leases>>,
    cameras: Vec<String>,
    frames: Vec<FrameResult>,
    image_text: Option<String>,
    fail_listing: bool,
    sink: Option<mpsc::Sender<FrameResult>>,
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn list_devices(&mut self) -> Result<Vec<CameraHandle>, DecoderError> {
        if self.fail_listing {
            return Err(DecoderError::PermissionDenied);
        }
        Ok(self
            .cameras
            .iter()
            .map(|id| CameraHandle {
                id: id.clone(),
                label: id.clone(),
            })
            .collect())
    }

    async fn start_stream(
        &mut self,
        _device: &CameraHandle,
        _settings: StreamSettings,
        frames: mpsc::Sender<FrameResult>,
    ) -> Result<StreamHandle, DecoderError> {
        for frame in self.frames.drain(..) {
            frames
                .send(frame)
                .await
                .map_err(|e| DecoderError::Backend(e.to_string()))?;
        }
        self.sink = Some(frames);
        Ok(StreamHandle(1))
    }

    async fn stop_stream(&mut self, _stream: StreamHandle) -> Result<(), DecoderError> {
        self.sink = None;
        Ok(())
    }

    async fn decode_image(&mut self, _image: &ImageInput) -> Result<Option<String>, DecoderError> {
        Ok(self.image_text.clone())
    }

    fn release(&mut self) {
        self.sink = None;
        self.leases.lock().released += 1;
    }
}

/// How the fake checkout widget behaves once shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// The user pays; the confirmation carries a valid signature.
    Pay,
    /// The user closes the widget.
    Close,
    /// The widget stays open and never answers.
    Ignore,
}

/// Checkout widget signing confirmations with the ledger's secret.
pub struct FakeCheckout {
    ledger: Arc<InMemoryLedger>,
    mode: CheckoutMode,
    opened: AtomicUsize,
    pending: Mutex<Vec<oneshot::Sender<ProviderConfirmation>>>,
}

impl FakeCheckout {
    /// A widget behaving as `mode`.
    pub fn new(ledger: Arc<InMemoryLedger>, mode: CheckoutMode) -> Self {
        Self {
            ledger,
            mode,
            opened: AtomicUsize::new(0),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Times the widget was shown.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckoutProvider for FakeCheckout {
    async fn open(
        &self,
        request: &CheckoutRequest,
        on_result: oneshot::Sender<ProviderConfirmation>,
    ) -> Result<(), CheckoutError> {
        let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        match self.mode {
            CheckoutMode::Pay => {
                let payment_id = format!("pay_scenario_{n}");
                let signature = self.ledger.sign(&request.order_id, &payment_id);
                let _ = on_result.send(ProviderConfirmation {
                    payment_id,
                    order_id: request.order_id.clone(),
                    signature,
                });
            }
            CheckoutMode::Close => drop(on_result),
            CheckoutMode::Ignore => self.pending.lock().push(on_result),
        }
        Ok(())
    }
}
