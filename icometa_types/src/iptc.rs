//! Types for IPTC/NAA (IIM) metadata.
//!
//! An IPTC stream is a run of records, each identified by a
//! (record number, dataset number) pair. Fields may repeat, so the mapping
//! we build holds either one payload or an ordered list of them.

use rustc_hash::FxHashMap;

/// Identifies one IPTC field: a record number paired with a dataset number.
///
/// Record numbers live in `1..=9`; dataset numbers use the full byte range.
/// This is a plain value type so it can key a map directly.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct IptcTag {
    /// The record number, `1..=9` in a well-formed stream.
    pub record: u8,

    /// The dataset number within that record.
    pub dataset: u8,
}

impl IptcTag {
    /// Layer count (byte 0) and component flag (byte 1) live here.
    pub const RECORD_LAYERS: Self = Self::new(3, 60);

    /// One-based channel selector for single-component streams.
    pub const CHANNEL_SELECTOR: Self = Self::new(3, 65);

    /// Pixel width, as a big-endian integer.
    pub const PIXEL_WIDTH: Self = Self::new(3, 20);

    /// Pixel height, as a big-endian integer.
    pub const PIXEL_HEIGHT: Self = Self::new(3, 30);

    /// Compression scheme of the embedded raster.
    pub const COMPRESSION: Self = Self::new(3, 120);

    /// Marks the start of embedded image data rather than a descriptive
    /// field.
    pub const IMAGE_DATA: Self = Self::new(8, 10);

    /// Makes a tag from its two halves.
    pub const fn new(record: u8, dataset: u8) -> Self {
        Self { record, dataset }
    }

    /// Whether the record number is in the valid `1..=9` range.
    pub const fn valid_record(&self) -> bool {
        self.record >= 1 && self.record <= 9
    }
}

impl core::fmt::Display for IptcTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // the conventional IIM spelling, e.g. `3:60`
        write!(f, "{}:{:02}", self.record, self.dataset)
    }
}

/// One record's data.
///
/// `None` means the record carried no payload at all (a marker record, or a
/// zero-size field) - that's distinct from an empty byte buffer.
pub type Payload = Option<Vec<u8>>;

/// What a tag maps to: a single payload, or every payload that arrived
/// under that tag, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IptcValue {
    /// The tag appeared exactly once.
    Scalar(Payload),

    /// The tag appeared more than once; arrival order is preserved.
    List(Vec<Payload>),
}

/// The mapping built while parsing a tag stream.
///
/// Repeated tags promote their value from [`IptcValue::Scalar`] to
/// [`IptcValue::List`] on the second occurrence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordMap {
    map: FxHashMap<IptcTag, IptcValue>,
}

impl RecordMap {
    /// Makes an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one more occurrence of `tag`.
    pub fn push(&mut self, tag: IptcTag, payload: Payload) {
        use std::collections::hash_map::Entry;

        match self.map.entry(tag) {
            Entry::Vacant(vacant) => {
                vacant.insert(IptcValue::Scalar(payload));
            }

            Entry::Occupied(occupied) => {
                let value = occupied.into_mut();
                match value {
                    // second occurrence: promote to a list
                    IptcValue::Scalar(first) => {
                        let first_payload = first.take();
                        *value = IptcValue::List(vec![first_payload, payload]);
                    }

                    IptcValue::List(list) => list.push(payload),
                }
            }
        }
    }

    /// Looks up the value stored under `tag`.
    pub fn get(&self, tag: IptcTag) -> Option<&IptcValue> {
        self.map.get(&tag)
    }

    /// The first payload stored under `tag`, skipping list promotion.
    ///
    /// Returns `None` when the tag is absent or its (first) payload is a
    /// marker with no data.
    pub fn first(&self, tag: IptcTag) -> Option<&[u8]> {
        match self.map.get(&tag)? {
            IptcValue::Scalar(payload) => payload.as_deref(),
            IptcValue::List(list) => list.first()?.as_deref(),
        }
    }

    /// Reads the first payload of `tag` as a big-endian integer.
    ///
    /// Only the last four bytes participate; shorter payloads act as if
    /// left-padded with zeroes, so an empty payload reads as `0`.
    ///
    /// ```
    /// use icometa_types::iptc::{IptcTag, RecordMap};
    ///
    /// let mut map = RecordMap::new();
    /// map.push(IptcTag::PIXEL_WIDTH, Some(vec![0x01, 0x00]));
    /// assert_eq!(map.integer(IptcTag::PIXEL_WIDTH), Some(256));
    /// ```
    pub fn integer(&self, tag: IptcTag) -> Option<u32> {
        Some(be_int(self.first(tag)?))
    }

    /// How many distinct tags are stored.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no tags are stored at all.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over every `(tag, value)` pair, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&IptcTag, &IptcValue)> {
        self.map.iter()
    }
}

/// Big-endian integer of the last (up to) four bytes of `bytes`,
/// left-padded with zeroes.
pub fn be_int(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .skip(bytes.len().saturating_sub(4))
        .fold(0_u32, |acc, &b| (acc << 8) | u32::from(b))
}

/// Compression scheme of an embedded IPTC raster.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Compression {
    /// Uncompressed samples.
    Raw = 1,

    /// JPEG-compressed data.
    Jpeg = 5,
}

impl TryFrom<u32> for Compression {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Raw),
            5 => Ok(Self::Jpeg),

            _ => Err(()),
        }
    }
}

/// The color mode derived from the layer-info datasets.
///
/// Multi-layer streams describe a single channel out of an ordered channel
/// set, so most variants name one channel rather than a full color space.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColorMode {
    /// One layer, no component flag.
    Grayscale,

    Red,
    Green,
    Blue,

    Cyan,
    Magenta,
    Yellow,

    /// The K in CMYK.
    Key,
}

impl ColorMode {
    /// The channel at `index` in the ordered `{R, G, B}` set.
    pub const fn rgb(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Red),
            1 => Some(Self::Green),
            2 => Some(Self::Blue),

            _ => None,
        }
    }

    /// The channel at `index` in the ordered `{C, M, Y, K}` set.
    pub const fn cmyk(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Cyan),
            1 => Some(Self::Magenta),
            2 => Some(Self::Yellow),
            3 => Some(Self::Key),

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_tags_promote_to_list() {
        let tag = IptcTag::new(2, 25);

        let mut map = RecordMap::new();
        map.push(tag, Some(b"A".to_vec()));
        assert_eq!(map.get(tag), Some(&IptcValue::Scalar(Some(b"A".to_vec()))));

        map.push(tag, Some(b"B".to_vec()));
        map.push(tag, Some(b"C".to_vec()));

        assert_eq!(
            map.get(tag),
            Some(&IptcValue::List(vec![
                Some(b"A".to_vec()),
                Some(b"B".to_vec()),
                Some(b"C".to_vec()),
            ]))
        );
    }

    #[test]
    fn single_tag_stays_scalar() {
        let tag = IptcTag::new(2, 5);

        let mut map = RecordMap::new();
        map.push(tag, Some(b"title".to_vec()));

        assert_eq!(
            map.get(tag),
            Some(&IptcValue::Scalar(Some(b"title".to_vec())))
        );
    }

    #[test]
    fn integers_pad_on_the_left() {
        let mut map = RecordMap::new();
        map.push(IptcTag::PIXEL_WIDTH, Some(vec![2]));
        map.push(IptcTag::PIXEL_HEIGHT, Some(vec![0x01, 0x02, 0x03, 0x04]));
        map.push(IptcTag::COMPRESSION, Some(vec![]));
        map.push(IptcTag::IMAGE_DATA, None);

        assert_eq!(map.integer(IptcTag::PIXEL_WIDTH), Some(2));
        assert_eq!(map.integer(IptcTag::PIXEL_HEIGHT), Some(0x0102_0304));
        assert_eq!(map.integer(IptcTag::COMPRESSION), Some(0)); // empty buffer
        assert_eq!(map.integer(IptcTag::IMAGE_DATA), None); // marker, no payload
        assert_eq!(map.integer(IptcTag::RECORD_LAYERS), None); // absent tag
    }

    #[test]
    fn oversized_integers_keep_the_tail() {
        // mirrors the historical helper, which took the last four bytes
        assert_eq!(be_int(&[0xFF, 0x01, 0x02, 0x03, 0x04]), 0x0102_0304);
        assert_eq!(be_int(&[]), 0);
    }

    #[test]
    fn channel_sets_reject_out_of_range_indices() {
        assert_eq!(ColorMode::rgb(1), Some(ColorMode::Green));
        assert_eq!(ColorMode::rgb(3), None);
        assert_eq!(ColorMode::cmyk(3), Some(ColorMode::Key));
        assert_eq!(ColorMode::cmyk(4), None);
    }

    #[test]
    fn compression_table_is_closed() {
        assert_eq!(Compression::try_from(1), Ok(Compression::Raw));
        assert_eq!(Compression::try_from(5), Ok(Compression::Jpeg));
        assert_eq!(Compression::try_from(2), Err(()));
    }
}
