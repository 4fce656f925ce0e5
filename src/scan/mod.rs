//! QR scanning.
//!
//! A [`ScanSession`] drives one camera through
//! `Idle -> Initializing -> Ready <-> Scanning`, with `Stopped` and `Failed`
//! reachable from anywhere. The camera decoder is held through a
//! [`DecoderLease`], so it is released on every exit path: explicit stop,
//! initialization errors, failed device switches, or dropping the session.
//!
//! [`scan_image`] is the single-shot upload path. It needs no session and
//! keeps working when the camera is unavailable.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut session = ScanSession::new(source, resolver, Role::Vendor, &config.scan);
//! session.start().await?;
//! session.begin_scan().await?;
//! match session.next_scan().await {
//!     ScanOutcome::Resolved(vendor) => println!("Paying {}", vendor.display_name),
//!     ScanOutcome::Rejected(e) => println!("{}", e.user_message()),
//!     ScanOutcome::Aborted | ScanOutcome::StreamEnded => {}
//! }
//! session.stop().await;
//! ```

mod decoder;
mod session;
mod upload;

pub use decoder::{
    CameraHandle, Decoder, DecoderLease, DecoderSource, FrameResult, ImageInput, StreamHandle,
    StreamSettings,
};
pub use session::{ScanAbortHandle, ScanOutcome, ScanPhase, ScanSession};
pub use upload::scan_image;
