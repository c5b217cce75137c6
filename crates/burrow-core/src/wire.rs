//! burrow wire format — the one bit-exact contract between sender and receiver.
//!
//! A frame is the base64 (standard alphabet, padded) encoding of
//!
//!   filename '|' index '|' total '|' payload
//!
//! `index` and `total` are ASCII decimal. The encoder emits minimal-width
//! digits; the decoder accepts any width, including zero-padded forms.
//! Splitting stops after the third delimiter, so the payload may contain
//! `|` bytes freely.
//!
//! The optical channel delivers noise as well as frames: corrupted scans,
//! codes from other applications, frames from an earlier transfer. Every
//! rejection is a `FrameError` variant; nothing here panics on input.

use base64::alphabet;
use base64::engine::general_purpose::{self, STANDARD};
use base64::engine::GeneralPurpose;
use base64::Engine as _;
use bytes::Bytes;

/// Field separator inside the decoded frame bytes.
pub const DELIMITER: u8 = b'|';

/// Longest filename a sender puts on the wire, in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Decoding side: scanners and other encoders don't always zero the unused
/// bits of the last base64 symbol.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_allow_trailing_bits(true),
);

/// Reserved filename: the payload is clipboard text, not a file.
pub const CLIPBOARD_FILENAME: &str = "clipboard.txt";

/// One decoded frame. Self-describing: carries the transfer descriptor
/// (`filename`, `total`) alongside its own chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub filename: String,
    pub index: u32,
    pub total: u32,
    pub payload: Bytes,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("expected 4 fields, found {0}")]
    MissingFields(usize),
    #[error("filename is not valid UTF-8")]
    FilenameEncoding,
    #[error("filename contains the '|' delimiter")]
    DelimiterInFilename,
    #[error("index field is not a decimal number")]
    BadIndex,
    #[error("total field is not a decimal number")]
    BadTotal,
    #[error("index {index} out of range for total {total}")]
    IndexOutOfRange { index: u32, total: u32 },
}

impl WireFrame {
    /// Encode this frame into its wire text.
    pub fn encode(&self) -> Result<String, FrameError> {
        encode(&self.filename, self.index, self.total, &self.payload)
    }
}

/// Serialize one chunk into wire text.
///
/// Fails only on inputs that could never decode: a filename containing the
/// delimiter, or `index >= total`.
pub fn encode(filename: &str, index: u32, total: u32, payload: &[u8]) -> Result<String, FrameError> {
    if filename.as_bytes().contains(&DELIMITER) {
        return Err(FrameError::DelimiterInFilename);
    }
    if index >= total {
        return Err(FrameError::IndexOutOfRange { index, total });
    }

    let header = format!("{filename}|{index}|{total}|");
    let mut raw = Vec::with_capacity(header.len() + payload.len());
    raw.extend_from_slice(header.as_bytes());
    raw.extend_from_slice(payload);
    Ok(STANDARD.encode(raw))
}

/// Longest wire text a `chunk_size`-byte chunk can encode to: a filename
/// of `MAX_FILENAME_LEN` bytes and both numbers at full `u32` width.
pub fn max_wire_len(chunk_size: usize) -> usize {
    let raw = chunk_size.saturating_add(MAX_FILENAME_LEN + 2 * 10 + 3);
    raw.div_ceil(3).saturating_mul(4)
}

/// Parse wire text back into a frame.
///
/// Leading and trailing ASCII whitespace is ignored; scanners commonly
/// append a newline to each decoded symbol.
pub fn decode(wire: &[u8]) -> Result<WireFrame, FrameError> {
    let raw = LENIENT.decode(wire.trim_ascii())?;

    let mut parts = raw.splitn(4, |b| *b == DELIMITER);
    let (filename, index, total, payload) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(f), Some(i), Some(t), Some(p)) => (f, i, t, p),
            (f, i, t, _) => {
                let found = [f, i, t].iter().filter(|p| p.is_some()).count();
                return Err(FrameError::MissingFields(found));
            }
        };

    let filename = std::str::from_utf8(filename).map_err(|_| FrameError::FilenameEncoding)?;
    let index = parse_decimal(index).ok_or(FrameError::BadIndex)?;
    let total = parse_decimal(total).ok_or(FrameError::BadTotal)?;
    if index >= total {
        return Err(FrameError::IndexOutOfRange { index, total });
    }

    Ok(WireFrame {
        filename: filename.to_string(),
        index,
        total,
        payload: Bytes::copy_from_slice(payload),
    })
}

/// Strict ASCII decimal: no sign, no whitespace, at least one digit.
fn parse_decimal(field: &[u8]) -> Option<u32> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(field).ok()?.parse().ok()
}
