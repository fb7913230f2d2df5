//! The TIFF side of cross-container extraction.
//!
//! Parsing TIFF itself is the host framework's job. This container only
//! wraps the tag table that parser produced and knows which private tag
//! Photoshop stores raw IPTC/NAA bytes under.

use std::sync::Arc;

use icometa_types::FxHashMap;
use parking_lot::RwLock;

use super::cached_iptc;
use crate::{MaybeParsedIptc, iptc::Iptc};

/// The private TIFF tag holding raw IPTC/NAA bytes (33723, `0x83BB`).
pub const IPTC_NAA_TAG: u16 = 33_723;

/// A host-parsed TIFF, reduced to its tag table.
#[derive(Clone, Debug)]
pub struct TiffContainer {
    tags: FxHashMap<u16, Vec<u8>>,
    iptc: Arc<RwLock<Option<MaybeParsedIptc>>>,
}

impl TiffContainer {
    /// Wraps a tag table.
    ///
    /// Photoshop writes the IPTC data as untyped bytes, so the raw tag
    /// value is taken verbatim. An absent tag just means "no metadata."
    pub fn from_tags(tags: FxHashMap<u16, Vec<u8>>) -> Self {
        let block = tags.get(&IPTC_NAA_TAG).cloned();
        if block.is_none() {
            log::trace!("TIFF tag table has no IPTC/NAA entry.");
        }

        Self {
            tags,
            iptc: Arc::new(RwLock::new(block.map(MaybeParsedIptc::Raw))),
        }
    }

    /// Looks up a raw tag value.
    pub fn tag(&self, id: u16) -> Option<&[u8]> {
        self.tags.get(&id).map(Vec::as_slice)
    }

    /// Best-effort IPTC lookup, cached after the first parse.
    pub fn iptc(&self) -> Option<Arc<RwLock<Iptc>>> {
        cached_iptc(&self.iptc)
    }
}
