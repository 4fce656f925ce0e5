//! Scripted decoder and checkout doubles for unit tests.

use crate::error::{CheckoutError, DecoderError, LedgerError};
use crate::ledger::{
    ChargeReceipt, ChargeRequest, Identity, InMemoryLedger, LedgerService, PendingOrder,
    QrCodeImage, RechargeOrderRequest, Transaction, VerifiedRecharge, VerifyRechargeRequest,
};
use crate::qr::Role;
use crate::payment::{CheckoutProvider, CheckoutRequest, ProviderConfirmation};
use crate::scan::{
    CameraHandle, Decoder, DecoderSource, FrameResult, ImageInput, StreamHandle, StreamSettings,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Default)]
struct Tally {
    acquired: usize,
    released: usize,
    started_on: Vec<String>,
    stopped: usize,
    acquire_failures: Vec<DecoderError>,
}

/// Hands out [`ScriptedDecoder`]s and counts what happened to them.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSource {
    tally: Arc<Mutex<Tally>>,
    cameras: Vec<CameraHandle>,
    frames: Vec<FrameResult>,
    image_text: Option<String>,
    image_error: Option<DecoderError>,
    list_error: Option<DecoderError>,
    stream_error_on: Option<String>,
}

impl ScriptedSource {
    pub(crate) fn with_cameras(ids: &[&str]) -> Self {
        Self {
            cameras: ids
                .iter()
                .map(|id| CameraHandle {
                    id: (*id).to_string(),
                    label: format!("{id} camera"),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn with_frames(mut self, frames: Vec<FrameResult>) -> Self {
        self.frames = frames;
        self
    }

    pub(crate) fn with_image_text(mut self, text: &str) -> Self {
        self.image_text = Some(text.to_string());
        self
    }

    pub(crate) fn failing_image(mut self, error: DecoderError) -> Self {
        self.image_error = Some(error);
        self
    }

    pub(crate) fn failing_list(mut self, error: DecoderError) -> Self {
        self.list_error = Some(error);
        self
    }

    pub(crate) fn failing_acquire_once(self, error: DecoderError) -> Self {
        self.tally.lock().acquire_failures.push(error);
        self
    }

    pub(crate) fn failing_stream_on(mut self, camera_id: &str) -> Self {
        self.stream_error_on = Some(camera_id.to_string());
        self
    }

    pub(crate) fn acquired(&self) -> usize {
        self.tally.lock().acquired
    }

    pub(crate) fn released(&self) -> usize {
        self.tally.lock().released
    }

    pub(crate) fn outstanding(&self) -> usize {
        let tally = self.tally.lock();
        tally.acquired - tally.released
    }

    pub(crate) fn streams_started_on(&self) -> Vec<String> {
        self.tally.lock().started_on.clone()
    }

    pub(crate) fn streams_stopped(&self) -> usize {
        self.tally.lock().stopped
    }
}

#[async_trait]
impl DecoderSource for ScriptedSource {
    async fn acquire(&self) -> Result<Box<dyn Decoder>, DecoderError> {
        let mut tally = self.tally.lock();
        if let Some(error) = tally.acquire_failures.pop() {
            return Err(error);
        }
        tally.acquired += 1;
        Ok(Box::new(ScriptedDecoder {
            tally: Arc::clone(&self.tally),
            cameras: self.cameras.clone(),
            frames: self.frames.clone(),
            image_text: self.image_text.clone(),
            image_error: self.image_error.clone(),
            list_error: self.list_error.clone(),
            stream_error_on: self.stream_error_on.clone(),
            sink: None,
            next_stream: 0,
        }))
    }
}

/// Decoder that replays scripted frames into the first stream it starts.
pub(crate) struct ScriptedDecoder {
    tally: Arc<Mutex<Tally>>,
    cameras: Vec<CameraHandle>,
    frames: Vec<FrameResult>,
    image_text: Option<String>,
    image_error: Option<DecoderError>,
    list_error: Option<DecoderError>,
    stream_error_on: Option<String>,
    sink: Option<mpsc::Sender<FrameResult>>,
    next_stream: u64,
}

#[async_trait]
impl Decoder for ScriptedDecoder {
    async fn list_devices(&mut self) -> Result<Vec<CameraHandle>, DecoderError> {
        match &self.list_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.cameras.clone()),
        }
    }

    async fn start_stream(
        &mut self,
        device: &CameraHandle,
        _settings: StreamSettings,
        frames: mpsc::Sender<FrameResult>,
    ) -> Result<StreamHandle, DecoderError> {
        if self.stream_error_on.as_deref() == Some(device.id.as_str()) {
            return Err(DecoderError::DeviceUnavailable(device.id.clone()));
        }
        self.tally.lock().started_on.push(device.id.clone());
        for frame in self.frames.drain(..) {
            frames
                .try_send(frame)
                .map_err(|e| DecoderError::Backend(e.to_string()))?;
        }
        self.sink = Some(frames);
        self.next_stream += 1;
        Ok(StreamHandle(self.next_stream))
    }

    async fn stop_stream(&mut self, _stream: StreamHandle) -> Result<(), DecoderError> {
        self.sink = None;
        self.tally.lock().stopped += 1;
        Ok(())
    }

    async fn decode_image(&mut self, _image: &ImageInput) -> Result<Option<String>, DecoderError> {
        match &self.image_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.image_text.clone()),
        }
    }

    fn release(&mut self) {
        self.sink = None;
        self.tally.lock().released += 1;
    }
}

/// What a [`ScriptedCheckout`] does once opened.
#[derive(Debug, Clone)]
pub(crate) enum CheckoutScript {
    /// Complete with a signature the ledger accepts.
    Pay,
    /// Complete with a signature the ledger rejects.
    Forge,
    /// Close the widget: the result channel is dropped.
    Close,
    /// Keep the widget open and never answer.
    Ignore,
    /// Refuse to open at all.
    Refuse(CheckoutError),
}

/// Checkout provider double signing with the in-memory ledger's secret.
pub(crate) struct ScriptedCheckout {
    ledger: Arc<InMemoryLedger>,
    script: CheckoutScript,
    opened: AtomicUsize,
    held: Mutex<Vec<oneshot::Sender<ProviderConfirmation>>>,
}

impl ScriptedCheckout {
    pub(crate) fn new(ledger: Arc<InMemoryLedger>, script: CheckoutScript) -> Self {
        Self {
            ledger,
            script,
            opened: AtomicUsize::new(0),
            held: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckoutProvider for ScriptedCheckout {
    async fn open(
        &self,
        request: &CheckoutRequest,
        on_result: oneshot::Sender<ProviderConfirmation>,
    ) -> Result<(), CheckoutError> {
        if let CheckoutScript::Refuse(error) = &self.script {
            return Err(error.clone());
        }
        let attempt = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let payment_id = format!("pay_test_{attempt}");
        match self.script {
            CheckoutScript::Pay | CheckoutScript::Forge => {
                let signature = if matches!(self.script, CheckoutScript::Pay) {
                    self.ledger.sign(&request.order_id, &payment_id)
                } else {
                    "0".repeat(64)
                };
                let _ = on_result.send(ProviderConfirmation {
                    payment_id,
                    order_id: request.order_id.clone(),
                    signature,
                });
            }
            CheckoutScript::Close => drop(on_result),
            CheckoutScript::Ignore => self.held.lock().push(on_result),
            CheckoutScript::Refuse(_) => {}
        }
        Ok(())
    }
}

/// Ledger whose identity lookups take `delay` before answering.
pub(crate) struct SlowLookupLedger {
    inner: Arc<InMemoryLedger>,
    delay: Duration,
}

impl SlowLookupLedger {
    pub(crate) fn new(inner: Arc<InMemoryLedger>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl LedgerService for SlowLookupLedger {
    async fn get_identity(&self, role: Role, id: &str) -> Result<Identity, LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_identity(role, id).await
    }

    async fn create_recharge_order(
        &self,
        request: &RechargeOrderRequest,
    ) -> Result<PendingOrder, LedgerError> {
        self.inner.create_recharge_order(request).await
    }

    async fn verify_recharge_payment(
        &self,
        request: &VerifyRechargeRequest,
    ) -> Result<VerifiedRecharge, LedgerError> {
        self.inner.verify_recharge_payment(request).await
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<ChargeReceipt, LedgerError> {
        self.inner.create_charge(request).await
    }

    async fn list_transactions(
        &self,
        role: Role,
        id: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.inner.list_transactions(role, id).await
    }

    async fn get_qr_code(&self, role: Role, id: &str) -> Result<QrCodeImage, LedgerError> {
        self.inner.get_qr_code(role, id).await
    }
}
