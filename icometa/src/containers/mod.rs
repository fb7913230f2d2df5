//! Cross-container IPTC extraction.
//!
//! JPEG and TIFF files can carry an IPTC block without being IPTC files
//! themselves: JPEG keeps it inside a Photoshop `8BIM` resource in the
//! APP13 segment, TIFF under private tag 33723. The [`Container`] enum
//! wraps the three supported sources and answers the one question the host
//! framework asks: "does this image have IPTC metadata, and what's in it?"
//!
//! Extraction is best-effort by design. A missing segment, a missing
//! signature, or malformed trailing records all degrade to "no further
//! information" - they never fail the host's open/decode operation.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    MaybeParsedIptc,
    iptc::{Iptc, IptcFile},
};

pub mod jpeg;
pub mod tiff;

pub use jpeg::JpegContainer;
pub use tiff::TiffContainer;

/// An opened image-like object that may carry IPTC metadata.
///
/// Dispatch is a plain `match` over the variants; each container exposes
/// only the lookup capability the extractor needs (a named application
/// segment for JPEG, a tag table for TIFF).
#[derive(Clone, Debug)]
pub enum Container {
    Jpeg(JpegContainer),
    Tiff(TiffContainer),
    Iptc(IptcFile),
}

impl Container {
    /// Returns the IPTC record mapping for any supported container, or
    /// `None` when no IPTC block could be located.
    pub fn iptc(&self) -> Option<Arc<RwLock<Iptc>>> {
        match self {
            Self::Jpeg(jpeg) => jpeg.iptc(),
            Self::Tiff(tiff) => tiff.iptc(),

            // standalone files already parsed their records at open
            Self::Iptc(file) => Some(file.iptc()),
        }
    }
}

/// Parse-once cache shared by the JPEG and TIFF containers.
///
/// Takes the read lock first to see whether someone already parsed the
/// block, and only grabs the write lock when the raw bytes still need
/// parsing - checking the state again under the write lock, since another
/// caller may have gotten there in between.
pub(crate) fn cached_iptc(
    slot: &Arc<RwLock<Option<MaybeParsedIptc>>>,
) -> Option<Arc<RwLock<Iptc>>> {
    match &*slot.read() {
        // already parsed, so let's return that!
        Some(MaybeParsedIptc::Parsed(parsed)) => {
            log::trace!("Cached IPTC found! Returning...");
            return Some(Arc::clone(parsed));
        }

        // we'll handle this case in a sec.
        Some(MaybeParsedIptc::Raw(_)) => (),

        // no block was ever located. early return.
        None => return None,
    }

    let locked = &mut *slot.write();
    match locked {
        Some(MaybeParsedIptc::Raw(raw)) => {
            // lenient: internal parse failures degrade to a partial mapping
            let parsed = Arc::new(RwLock::new(Iptc::parse_lenient(raw)));
            log::trace!("Completed IPTC parsing! Cached internally.");
            *locked = Some(MaybeParsedIptc::Parsed(Arc::clone(&parsed)));
            Some(parsed)
        }

        Some(MaybeParsedIptc::Parsed(parsed)) => Some(Arc::clone(parsed)),
        None => None,
    }
}
