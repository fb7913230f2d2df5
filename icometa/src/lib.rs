//! # `icometa`
//!
//! Two small binary-format decoders meant to live inside a larger
//! image-processing framework:
//!
//! - [`ico`] reads a Windows icon container's directory, picks the entry to
//!   decode, and delegates pixel work to an external bitmap decoder.
//! - [`iptc`] parses IPTC/NAA tag/length/value streams into a tag-keyed
//!   record mapping, derives color mode, dimensions, and compression from
//!   well-known datasets, and can stage an embedded raster for decoding.
//!
//! The [`containers`] module ties the second one to JPEG and TIFF: given an
//! already-opened container, it locates the embedded IPTC block (a
//! Photoshop `8BIM` resource inside APP13, or TIFF tag 33723) and parses
//! just those bytes - no full file-open lifecycle.
//!
//! Pixel decoding stays the host framework's job. The ICO path takes a
//! [`ico::BitmapDecoder`] implementation, and staged IPTC rasters go
//! through an [`iptc::pixels::RasterOpener`].

#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::RwLock;

use crate::iptc::Iptc;

pub mod containers;
pub mod ico;
pub mod iptc;
pub mod magic_number;

/// IPTC metadata that might have been parsed already.
///
/// Containers keep the raw extracted block around until someone asks for
/// it, then cache the parsed mapping so repeated lookups don't re-run the
/// parser.
#[derive(Clone, Debug)]
pub enum MaybeParsedIptc {
    /// An extracted IPTC block that hasn't been parsed yet.
    Raw(Vec<u8>),

    /// The parsed record mapping.
    Parsed(Arc<RwLock<Iptc>>),
}

/// Internal utility methods.
pub(crate) mod util {
    /// Helper function to initialize the logger for testing.
    #[cfg(test)]
    pub fn logger() {
        _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::max())
            .format_file(true)
            .format_line_number(true)
            .try_init();
    }
}
