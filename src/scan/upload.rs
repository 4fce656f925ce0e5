//! Single-image scan path.

use super::decoder::{DecoderLease, DecoderSource, ImageInput};
use crate::error::{ParseError, ScanError};
use crate::identity::IdentityResolver;
use crate::ledger::Identity;
use crate::qr::Role;
use tracing::{debug, warn};

/// Decode one uploaded image and resolve the code it carries.
///
/// Non-image files are refused before a decoder is acquired. The decoder
/// used for the attempt is released before resolution starts, whether or
/// not a code was found.
///
/// # Errors
///
/// * [`ScanError::NotAnImage`] for a non-`image/*` content type.
/// * [`ScanError::Decoder`] if no decoder could be acquired.
/// * [`ScanError::Parse`] with [`ParseError::NotStructured`] when the image
///   holds no code.
/// * Any parse or resolve error for the decoded text.
pub async fn scan_image(
    source: &dyn DecoderSource,
    resolver: &IdentityResolver,
    image: &ImageInput,
    expected: Role,
) -> Result<Identity, ScanError> {
    if !image.is_image() {
        warn!("Refusing upload {} of type {}", image.name, image.content_type);
        return Err(ScanError::NotAnImage(image.content_type.clone()));
    }

    let decoded = {
        let mut lease = DecoderLease::acquire(source).await?;
        lease.decoder().decode_image(image).await?
    };

    let Some(text) = decoded else {
        debug!("No code found in {}", image.name);
        return Err(ParseError::NotStructured.into());
    };
    resolver.resolve_text(&text, expected).await
}
