//! Camera scan session state machine.

use super::decoder::{
    CameraHandle, DecoderLease, DecoderSource, FrameResult, ImageInput, StreamHandle,
    StreamSettings,
};
use super::upload::scan_image;
use crate::config::ScanConfig;
use crate::error::{DecoderError, ScanError};
use crate::event::{create_event_channel, ScanEvent, ScanEventsChannel, ScanEventsSender};
use crate::identity::IdentityResolver;
use crate::ledger::Identity;
use crate::qr::Role;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Frames buffered between the decoder and the session.
const FRAME_BUFFER: usize = 32;

/// Lifecycle phase of a [`ScanSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    /// Created, decoder not yet acquired.
    Idle,
    /// Acquiring the decoder and enumerating cameras.
    Initializing,
    /// Decoder held, no stream running.
    Ready,
    /// Camera stream running.
    Scanning,
    /// Stopped and decoder released.
    Stopped,
    /// Initialization or a device switch failed; decoder released.
    Failed,
}

impl ScanPhase {
    /// Lowercase name, used in log lines and phase errors.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Scanning => "scanning",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of waiting for the next physical scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// A code was decoded and resolved to the expected counterparty.
    Resolved(Identity),
    /// A code was decoded but could not be used. The session is `Ready`
    /// again and scanning may resume.
    Rejected(ScanError),
    /// The session was aborted; any lookup result was discarded.
    Aborted,
    /// The decoder closed the stream without a code.
    StreamEnded,
}

/// Aborts a [`ScanSession`] from another task.
///
/// Aborting stops further decode callbacks. A lookup already in flight is
/// allowed to finish but its result is discarded. An abort that arrives
/// while nothing is waiting is honored by the session's next operation.
#[derive(Debug, Clone)]
pub struct ScanAbortHandle {
    generation: Arc<watch::Sender<u64>>,
}

impl ScanAbortHandle {
    /// Abort whatever the session is currently waiting on.
    pub fn abort(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }
}

struct ActiveStream {
    handle: StreamHandle,
    frames: mpsc::Receiver<FrameResult>,
}

enum Step {
    Aborted,
    Miss(String),
    Decoded(String),
    Closed,
}

/// One scanning screen: owns at most one decoder and at most one stream.
pub struct ScanSession {
    source: Arc<dyn DecoderSource>,
    resolver: IdentityResolver,
    expected: Role,
    settings: StreamSettings,
    phase: ScanPhase,
    lease: Option<DecoderLease>,
    devices: Vec<CameraHandle>,
    selected: Option<CameraHandle>,
    stream: Option<ActiveStream>,
    generation: Arc<watch::Sender<u64>>,
    acknowledged: u64,
    events: ScanEventsSender,
}

impl ScanSession {
    /// Create an idle session that expects codes of the `expected` role.
    #[must_use]
    pub fn new(
        source: Arc<dyn DecoderSource>,
        resolver: IdentityResolver,
        expected: Role,
        config: &ScanConfig,
    ) -> Self {
        let (events, _) = create_event_channel();
        let (generation, _) = watch::channel(0);
        Self {
            source,
            resolver,
            expected,
            settings: StreamSettings::from(config),
            phase: ScanPhase::Idle,
            lease: None,
            devices: Vec::new(),
            selected: None,
            stream: None,
            generation: Arc::new(generation),
            acknowledged: 0,
            events,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Role this session accepts.
    #[must_use]
    pub fn expected_role(&self) -> Role {
        self.expected
    }

    /// Cameras found by the last [`start`](Self::start).
    #[must_use]
    pub fn devices(&self) -> &[CameraHandle] {
        &self.devices
    }

    /// Camera that [`begin_scan`](Self::begin_scan) will use.
    #[must_use]
    pub fn selected_device(&self) -> Option<&CameraHandle> {
        self.selected.as_ref()
    }

    /// Whether a decoder is currently held.
    #[must_use]
    pub fn holds_decoder(&self) -> bool {
        self.lease.is_some()
    }

    /// Subscribe to phase changes and scan results.
    #[must_use]
    pub fn subscribe(&self) -> ScanEventsChannel {
        self.events.subscribe()
    }

    /// Handle for aborting this session from another task.
    #[must_use]
    pub fn abort_handle(&self) -> ScanAbortHandle {
        ScanAbortHandle {
            generation: Arc::clone(&self.generation),
        }
    }

    /// Acquire the decoder and enumerate cameras.
    ///
    /// An empty camera list still leaves the session `Ready`; only image
    /// upload is usable then.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotReady`] if the session already holds a
    /// decoder, or [`ScanError::Decoder`] if acquisition or enumeration
    /// fails. In the latter case the session is `Failed` and holds nothing.
    pub async fn start(&mut self) -> Result<(), ScanError> {
        if !matches!(
            self.phase,
            ScanPhase::Idle | ScanPhase::Stopped | ScanPhase::Failed
        ) {
            return Err(ScanError::NotReady(self.phase.as_str()));
        }
        self.acknowledged = *self.generation.borrow();
        self.set_phase(ScanPhase::Initializing);

        let mut lease = match DecoderLease::acquire(self.source.as_ref()).await {
            Ok(lease) => lease,
            Err(e) => return Err(self.fail(e).await),
        };
        let devices = match lease.decoder().list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                drop(lease);
                return Err(self.fail(e).await);
            }
        };

        debug!("Found {} camera(s)", devices.len());
        let _ = self.events.send(ScanEvent::DevicesListed {
            count: devices.len(),
        });
        self.selected = devices.first().cloned();
        self.devices = devices;
        self.lease = Some(lease);
        self.set_phase(ScanPhase::Ready);
        Ok(())
    }

    /// Choose the camera to scan with. Switching while scanning restarts the
    /// stream on the new camera.
    ///
    /// # Errors
    ///
    /// Returns [`DecoderError::DeviceUnavailable`] for an unknown id. A
    /// failed restart leaves the session `Failed`.
    pub async fn select_device(&mut self, device_id: &str) -> Result<(), ScanError> {
        if self.honor_abort().await {
            return Err(ScanError::NotReady(self.phase.as_str()));
        }
        let Some(device) = self.devices.iter().find(|d| d.id == device_id).cloned() else {
            return Err(DecoderError::DeviceUnavailable(device_id.to_string()).into());
        };
        if self.selected.as_ref() == Some(&device) {
            return Ok(());
        }

        debug!("Selected camera {} ({})", device.label, device.id);
        self.selected = Some(device);
        if self.phase == ScanPhase::Scanning {
            self.bump_generation();
            self.halt_stream().await;
            if let Err(e) = self.open_stream().await {
                return Err(self.fail(e).await);
            }
        }
        Ok(())
    }

    /// Start continuous decoding on the selected camera. A stream that is
    /// already running is stopped first.
    ///
    /// # Errors
    ///
    /// * [`ScanError::NotReady`] unless `Ready` or `Scanning`, or if the
    ///   session was aborted; it is then `Stopped`.
    /// * [`ScanError::NoCamera`] if no camera is selected.
    /// * [`ScanError::Decoder`] if the stream cannot start; the session is
    ///   then `Failed`.
    pub async fn begin_scan(&mut self) -> Result<(), ScanError> {
        if self.honor_abort().await {
            return Err(ScanError::NotReady(self.phase.as_str()));
        }
        match self.phase {
            ScanPhase::Ready => {}
            ScanPhase::Scanning => {
                self.bump_generation();
                self.halt_stream().await;
                self.set_phase(ScanPhase::Ready);
            }
            other => return Err(ScanError::NotReady(other.as_str())),
        }
        if self.selected.is_none() {
            return Err(ScanError::NoCamera);
        }
        if let Err(e) = self.open_stream().await {
            return Err(self.fail(e).await);
        }
        self.set_phase(ScanPhase::Scanning);
        Ok(())
    }

    /// Start scanning when ready, stop the stream when scanning.
    ///
    /// # Errors
    ///
    /// As [`begin_scan`](Self::begin_scan).
    pub async fn toggle(&mut self) -> Result<(), ScanError> {
        if self.honor_abort().await {
            return Err(ScanError::NotReady(self.phase.as_str()));
        }
        if self.phase == ScanPhase::Scanning {
            self.bump_generation();
            self.halt_stream().await;
            self.set_phase(ScanPhase::Ready);
            Ok(())
        } else {
            self.begin_scan().await
        }
    }

    /// Wait for the next decoded code and resolve it.
    ///
    /// Frames without a code are skipped. The stream is stopped as soon as a
    /// code is decoded, so one physical scan yields at most one lookup.
    pub async fn next_scan(&mut self) -> ScanOutcome {
        let mut abort = self.generation.subscribe();
        if self.honor_abort().await {
            return ScanOutcome::Aborted;
        }
        if self.phase != ScanPhase::Scanning {
            return ScanOutcome::Rejected(ScanError::NotReady(self.phase.as_str()));
        }

        let text = loop {
            let Some(stream) = self.stream.as_mut() else {
                return ScanOutcome::StreamEnded;
            };
            let step = tokio::select! {
                biased;
                _ = abort.changed() => Step::Aborted,
                frame = stream.frames.recv() => match frame {
                    Some(FrameResult::Decoded(text)) => Step::Decoded(text),
                    Some(FrameResult::NoCode(reason)) => Step::Miss(reason),
                    None => Step::Closed,
                },
            };
            match step {
                Step::Miss(reason) => trace!("No code in frame: {reason}"),
                Step::Decoded(text) => break text,
                Step::Aborted => {
                    self.stop().await;
                    return ScanOutcome::Aborted;
                }
                Step::Closed => {
                    debug!("Decoder closed the stream");
                    self.halt_stream().await;
                    self.set_phase(ScanPhase::Ready);
                    return ScanOutcome::StreamEnded;
                }
            }
        };

        self.halt_stream().await;
        self.set_phase(ScanPhase::Ready);

        let result = self.resolver.resolve_text(&text, self.expected).await;
        if self.honor_abort().await {
            debug!("Discarded lookup result for an aborted scan");
            return ScanOutcome::Aborted;
        }
        match result {
            Ok(identity) => {
                info!("Scanned {} {}", identity.role, identity.id);
                let _ = self.events.send(ScanEvent::Resolved(identity.clone()));
                ScanOutcome::Resolved(identity)
            }
            Err(e) => {
                warn!("Scan rejected: {e}");
                let _ = self.events.send(ScanEvent::Error(e.clone()));
                ScanOutcome::Rejected(e)
            }
        }
    }

    /// Decode an uploaded image instead of using the camera.
    ///
    /// Works in every phase, including `Failed`. A running stream is stopped
    /// first; the session keeps its camera decoder otherwise.
    ///
    /// # Errors
    ///
    /// Any [`ScanError`] from the upload path. Returns
    /// [`ScanError::NotReady`] if the session was aborted before or during
    /// the lookup.
    pub async fn upload(&mut self, image: &ImageInput) -> Result<Identity, ScanError> {
        if self.honor_abort().await {
            return Err(ScanError::NotReady(self.phase.as_str()));
        }
        if self.phase == ScanPhase::Scanning {
            self.bump_generation();
            self.halt_stream().await;
            self.set_phase(ScanPhase::Ready);
        }

        let result = scan_image(self.source.as_ref(), &self.resolver, image, self.expected).await;
        if self.honor_abort().await {
            debug!("Discarded upload result for an aborted session");
            return Err(ScanError::NotReady(self.phase.as_str()));
        }
        match &result {
            Ok(identity) => {
                let _ = self.events.send(ScanEvent::Resolved(identity.clone()));
            }
            Err(e) => {
                let _ = self.events.send(ScanEvent::Error(e.clone()));
            }
        }
        result
    }

    /// Stop scanning and release the decoder. Safe to call in any phase.
    pub async fn stop(&mut self) {
        self.bump_generation();
        self.halt_stream().await;
        if self.lease.take().is_some() {
            debug!("Scan session released its decoder");
        }
        if self.phase != ScanPhase::Stopped {
            self.set_phase(ScanPhase::Stopped);
        }
    }

    async fn open_stream(&mut self) -> Result<(), DecoderError> {
        let Some(device) = self.selected.clone() else {
            return Err(DecoderError::DeviceUnavailable("no camera selected".into()));
        };
        let Some(lease) = self.lease.as_mut() else {
            return Err(DecoderError::Backend("decoder not acquired".into()));
        };
        let (tx, frames) = mpsc::channel(FRAME_BUFFER);
        let handle = lease
            .decoder()
            .start_stream(&device, self.settings, tx)
            .await?;
        debug!("Streaming from {} at {} fps", device.label, self.settings.fps);
        self.stream = Some(ActiveStream { handle, frames });
        Ok(())
    }

    async fn halt_stream(&mut self) {
        let Some(active) = self.stream.take() else {
            return;
        };
        if let Some(lease) = self.lease.as_mut() {
            if let Err(e) = lease.decoder().stop_stream(active.handle).await {
                warn!("Failed to stop camera stream: {e}");
            }
        }
    }

    async fn fail(&mut self, error: DecoderError) -> ScanError {
        warn!("Scanner failed: {error}");
        self.halt_stream().await;
        self.lease = None;
        self.set_phase(ScanPhase::Failed);
        let error = ScanError::Decoder(error);
        let _ = self.events.send(ScanEvent::Error(error.clone()));
        error
    }

    fn bump_generation(&mut self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
        self.acknowledged = *self.generation.borrow();
    }

    /// Stop the session if an abort arrived since the session last moved
    /// the generation itself.
    async fn honor_abort(&mut self) -> bool {
        if *self.generation.borrow() == self.acknowledged {
            return false;
        }
        debug!("Scan session aborted");
        self.stop().await;
        true
    }

    fn set_phase(&mut self, phase: ScanPhase) {
        debug!("Scanner {} -> {}", self.phase, phase);
        self.phase = phase;
        let _ = self.events.send(ScanEvent::PhaseChanged(phase));
    }
}

impl fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSession")
            .field("expected", &self.expected)
            .field("phase", &self.phase)
            .field("devices", &self.devices)
            .field("selected", &self.selected)
            .field("streaming", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}
