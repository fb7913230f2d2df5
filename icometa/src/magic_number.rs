//! Helps route a byte prefix to one of the two decoders without knowing
//! the file type beforehand.
//!
//! Host frameworks usually register each decoder with an accept predicate;
//! [`get`] is that predicate for both formats at once, fed with however
//! many leading bytes the host has on hand.

use crate::{ico, iptc};

/// One of the supported file formats.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DetectedFormat {
    /// A Windows icon container.
    Ico,

    /// A standalone IPTC/NAA stream.
    Iptc,
}

impl DetectedFormat {
    /// Attempts to recognize a file format from its first bytes.
    #[inline(always)]
    pub fn new(prefix: &impl AsRef<[u8]>) -> Option<Self> {
        get(prefix)
    }
}

/// Checks each format's sniffing predicate against `prefix`.
///
/// This only looks at the prefix - it does NOT parse the whole file!
pub fn get(prefix: &impl AsRef<[u8]>) -> Option<DetectedFormat> {
    let prefix: &[u8] = prefix.as_ref();

    if ico::sniff(prefix) {
        return Some(DetectedFormat::Ico);
    }
    if iptc::sniff(prefix) {
        return Some(DetectedFormat::Iptc);
    }

    log::trace!("No decoders matched the prefix.");
    None
}
