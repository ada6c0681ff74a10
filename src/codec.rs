/// Binary codec for data: URIs
///
/// Converts between the portable text encoding used by uploads and legacy
/// records (`data:<mime>;base64,<payload>`) and raw image bytes. Pure
/// functions, no I/O.

use base64::Engine;

use crate::error::PersistError;
use crate::shot::ImageBlob;

/// Encode raw bytes as a self-describing data URI.
pub fn encode(bytes: &[u8], mime: &str) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, payload)
}

/// Decode a data URI or a bare base64 payload into an image blob.
///
/// Accepts either form:
/// - `data:image/png;base64,iVBOR...` (header is stripped, mime captured)
/// - `iVBOR...` (bare payload, mime defaults to `image/png`)
pub fn decode(text: &str) -> Result<ImageBlob, PersistError> {
    let (mime, payload) = split_header(text)?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PersistError::MalformedEncoding(e.to_string()))?;

    Ok(ImageBlob {
        mime: mime.to_string(),
        bytes,
    })
}

/// Permissive decode: malformed input degrades to an empty blob.
///
/// Legacy sessions were written by a frontend that swallowed decode failures
/// and displayed a blank image instead of crashing the session. Stored data
/// from that era can contain truncated payloads, so the legacy read path
/// keeps the same behavior.
pub fn decode_or_empty(text: &str) -> ImageBlob {
    match decode(text) {
        Ok(blob) => blob,
        Err(e) => {
            tracing::warn!("dropping malformed image payload: {e}");
            ImageBlob::empty()
        }
    }
}

/// Split an optional `data:<mime>;base64,` header off the payload.
fn split_header(text: &str) -> Result<(&str, &str), PersistError> {
    if let Some(rest) = text.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| PersistError::MalformedEncoding("data URI without ','".into()))?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            PersistError::MalformedEncoding(format!("unsupported data URI header: {header}"))
        })?;
        Ok((mime, payload))
    } else {
        // Bare payload. Uploads always go through the data URI form, but
        // some legacy records stored the payload alone.
        Ok(("image/png", text))
    }
}
