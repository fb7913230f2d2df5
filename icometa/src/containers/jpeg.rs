//! A thin JPEG segment walker.
//!
//! This is deliberately not a JPEG decoder. The walk collects the APPn
//! segments into a name-keyed table and stops caring after that - just
//! enough for the extractor to look up APP13, where Photoshop keeps its
//! resource blocks.

use std::sync::Arc;

use icometa_types::FxHashMap;
use parking_lot::RwLock;
use winnow::{
    Parser,
    binary::{be_u16, u8},
    error::EmptyError,
    token::take,
};

use super::cached_iptc;
use crate::{MaybeParsedIptc, iptc::Iptc};

/// Start of image.
const SOI: u8 = 0xD8;

/// End of image.
const EOI: u8 = 0xD9;

/// Start of scan: entropy-coded data follows.
const SOS: u8 = 0xDA;

/// `"Photoshop 3.0\0"` - every APP13 resource payload starts with this.
const PHOTOSHOP_SIGNATURE: &[u8] = b"Photoshop 3.0\x00";

/// Photoshop image-resource blocks open with this marker.
const RESOURCE_MARKER: &[u8] = b"8BIM";

/// The resource id Photoshop keeps IPTC/NAA data under.
const IPTC_RESOURCE_ID: u16 = 0x0404;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JpegError {
    /// The stream didn't open with an `SOI` marker.
    MissingSoi,

    /// A marker's first byte should be `0xFF`, but wasn't.
    BadMarkerByte(u8),

    /// Marker code `0x00` is disallowed.
    BadMarkerCode(u8),

    /// A segment declared a length shorter than its own length field.
    BadSegmentLength {
        /// The afflicted segment's marker code.
        marker_code: u8,

        /// Its declared length, including the two length bytes.
        declared: u16,
    },

    /// Ran out of bytes mid-marker or mid-segment.
    Truncated,
}

impl core::fmt::Display for JpegError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingSoi => f.write_str("A JPEG stream must start with an `SOI` marker."),

            Self::BadMarkerByte(got) => write!(
                f,
                "A JPEG marker's first byte should be `0xFF`, \
                but was `{got:#04x}`."
            ),

            Self::BadMarkerCode(code) => {
                write!(f, "JPEG marker code `{code:#04x}` is disallowed.")
            }

            Self::BadSegmentLength {
                marker_code,
                declared,
            } => write!(
                f,
                "JPEG segment `{marker_code:#04x}` declared length \
                `{declared}`, which can't even hold its own length field."
            ),

            Self::Truncated => f.write_str("Ran out of bytes mid-marker or mid-segment."),
        }
    }
}

impl core::error::Error for JpegError {}

/// A parsed-enough JPEG: its application segments, plus the IPTC cache.
#[derive(Clone, Debug)]
pub struct JpegContainer {
    segments: FxHashMap<String, Vec<u8>>,
    iptc: Arc<RwLock<Option<MaybeParsedIptc>>>,
}

impl JpegContainer {
    /// Walks the marker stream and collects every APPn segment.
    pub fn new(bytes: &[u8]) -> Result<Self, JpegError> {
        let input: &mut &[u8] = &mut &*bytes;

        match marker(input)? {
            Marker::Standalone(SOI) => (),
            _ => {
                log::error!("The first JPEG marker should be `SOI`, but wasn't.");
                return Err(JpegError::MissingSoi);
            }
        }

        let mut segments: FxHashMap<String, Vec<u8>> = FxHashMap::default();
        while !input.is_empty() {
            match marker(input)? {
                Marker::Standalone(EOI) => {
                    log::trace!("EOI detected! Stopping the walk.");
                    break;
                }

                Marker::Standalone(code) => {
                    log::trace!("Skipping standalone marker `{code:#04x}`.");
                }

                // entropy-coded data follows SOS; scan past it byte by byte
                Marker::Segment { code: SOS, .. } => skip_entropy(input),

                Marker::Segment { code, len } => {
                    let payload = take(len as usize).parse_next(input).map_err(
                        |_: EmptyError| {
                            log::error!(
                                "Segment `{code:#04x}` promised `{len}` bytes, \
                                but the stream ended first."
                            );
                            JpegError::Truncated
                        },
                    )?;

                    if (0xE0..=0xEF).contains(&code) {
                        let name = format!("APP{}", code - 0xE0);
                        log::trace!("Collected `{name}` (`{len}` bytes).");
                        segments.entry(name).or_insert_with(|| payload.to_vec());
                    }
                }
            }
        }

        Ok(Self::from_segments(segments))
    }

    /// Wraps an already-built segment table, for hosts that parsed the
    /// JPEG themselves.
    pub fn from_segments(segments: FxHashMap<String, Vec<u8>>) -> Self {
        let block = segments
            .get("APP13")
            .and_then(|app13| iptc_resource(app13));

        Self {
            segments,
            iptc: Arc::new(RwLock::new(block.map(MaybeParsedIptc::Raw))),
        }
    }

    /// Looks up a named application segment, e.g. `"APP13"`.
    pub fn app_segment(&self, name: &str) -> Option<&[u8]> {
        self.segments.get(name).map(Vec::as_slice)
    }

    /// Best-effort IPTC lookup, cached after the first parse.
    pub fn iptc(&self) -> Option<Arc<RwLock<Iptc>>> {
        cached_iptc(&self.iptc)
    }
}

/// A piece of the marker stream.
enum Marker {
    /// A bare marker code with no payload.
    Standalone(u8),

    /// A marker followed by a length-prefixed segment.
    Segment { code: u8, len: u16 },
}

/// Reads the next marker.
fn marker(input: &mut &[u8]) -> Result<Marker, JpegError> {
    let first: u8 = u8.parse_next(input).map_err(|_: EmptyError| {
        log::error!("Out of bytes before a marker's `0xFF` byte.");
        JpegError::Truncated
    })?;
    if first != 0xFF {
        log::error!("A JPEG marker's first byte was `{first:#04x}`, not `0xFF`.");
        return Err(JpegError::BadMarkerByte(first));
    }

    // any run of `0xFF` fill bytes may precede the code
    let code: u8 = loop {
        let byte: u8 = u8
            .parse_next(input)
            .map_err(|_: EmptyError| JpegError::Truncated)?;
        if byte != 0xFF {
            break byte;
        }
    };
    if code == 0x00 {
        log::error!("Marker code `0x00` is disallowed.");
        return Err(JpegError::BadMarkerCode(code));
    }

    // TEM, the restart markers, SOI, and EOI carry no payload
    const STANDALONE: &[u8] = &[
        0x01, 0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, SOI, EOI,
    ];
    if STANDALONE.contains(&code) {
        return Ok(Marker::Standalone(code));
    }

    let declared: u16 = be_u16.parse_next(input).map_err(|_: EmptyError| {
        log::error!("Segment `{code:#04x}` has no length field.");
        JpegError::Truncated
    })?;
    let len = declared
        .checked_sub(2)
        .ok_or(JpegError::BadSegmentLength {
            marker_code: code,
            declared,
        })?;

    Ok(Marker::Segment { code, len })
}

/// Skips entropy-coded data after `SOS`: everything up to the next real
/// marker, i.e. `0xFF` followed by anything but a stuffed `0x00` or a
/// restart code.
fn skip_entropy(input: &mut &[u8]) {
    let mut index = 0_usize;
    while index + 1 < input.len() {
        if input[index] == 0xFF
            && input[index + 1] != 0x00
            && !(0xD0..=0xD7).contains(&input[index + 1])
        {
            *input = &input[index..];
            return;
        }
        index += 1;
    }

    // no further marker; the stream ends inside the scan
    *input = &[];
}

/// Scans the APP13 payload's Photoshop image-resource blocks for the IPTC
/// resource (id `0x0404`).
///
/// Returns `None` when the signature is missing, the block run ends
/// without that resource, or a block is cut short - none of those are
/// errors on this best-effort path.
fn iptc_resource(app13: &[u8]) -> Option<Vec<u8>> {
    let Some(body) = app13.strip_prefix(PHOTOSHOP_SIGNATURE) else {
        log::trace!("APP13 payload without a Photoshop 3.0 signature.");
        return None;
    };

    let mut offset = 0_usize;
    while body.get(offset..offset + 4)? == RESOURCE_MARKER {
        offset += 4;

        let id = u16::from_be_bytes(body.get(offset..offset + 2)?.try_into().ok()?);
        offset += 2;

        // Pascal-style name (usually empty): a length byte plus that many
        // bytes, padded so the total is even
        let name_len = *body.get(offset)? as usize;
        offset += 1 + name_len;
        if offset & 1 == 1 {
            offset += 1;
        }

        let size = u32::from_be_bytes(body.get(offset..offset + 4)?.try_into().ok()?) as usize;
        offset += 4;

        let payload = body.get(offset..offset + size)?;
        if id == IPTC_RESOURCE_ID {
            log::trace!("Found the IPTC resource block (`{size}` bytes).");
            return Some(payload.to_vec());
        }

        // payloads are padded to an even offset too
        offset += size;
        if offset & 1 == 1 {
            offset += 1;
        }
    }

    log::trace!("No IPTC resource block in APP13.");
    None
}
