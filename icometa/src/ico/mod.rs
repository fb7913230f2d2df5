//! Windows icon containers.
//!
//! An ICO file is a small directory of bitmap images at different sizes.
//! This module reads that directory, picks the entry to decode, and hands
//! its data offset to whatever [`BitmapDecoder`] the host framework
//! supplies - the pixel data itself is never interpreted here.

use winnow::{Parser, binary::le_u16, error::EmptyError, token::take};

pub mod error;

use error::{IcoError, IcoOpenError};

/// The 4-byte sequence every icon container starts with: a zero reserved
/// field, then resource type `1`, little-endian.
const ICO_MAGIC: &[u8] = &[0x00, 0x00, 0x01, 0x00];

/// Returns whether `prefix` looks like the start of an icon container.
pub fn sniff(prefix: &[u8]) -> bool {
    prefix.starts_with(ICO_MAGIC)
}

/// One 16-byte directory entry, as stored on disk.
///
/// `width` and `height` keep their raw byte values; a stored `0` denotes
/// 256 pixels. See [`IconDirEntry::pixel_width`] for the decoded size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IconDirEntry {
    pub width: u8,
    pub height: u8,
    pub color_count: u8,
    pub reserved: u8,
    pub planes: u16,
    pub bit_count: u16,

    /// Size of the entry's bitmap data, in bytes.
    pub byte_size: u32,

    /// Where the bitmap data starts, from the beginning of the file.
    ///
    /// Bounds are not validated here - that's the delegate decoder's
    /// responsibility.
    pub data_offset: u32,
}

impl IconDirEntry {
    /// Declared width in pixels (a stored `0` means 256).
    pub const fn pixel_width(&self) -> u32 {
        if self.width == 0 { 256 } else { self.width as u32 }
    }

    /// Declared height in pixels (a stored `0` means 256).
    pub const fn pixel_height(&self) -> u32 {
        if self.height == 0 { 256 } else { self.height as u32 }
    }
}

/// What a delegate bitmap decoder reports back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap<T> {
    /// Intrinsic width from the bitmap header.
    pub width: u32,

    /// Intrinsic height from the bitmap header.
    ///
    /// Icon bitmaps double the declared height to make room for the
    /// implicit 1-bit transparency mask, so the published image height is
    /// half of this.
    pub raw_height: u32,

    /// The decoded pixel tile, opaque to this crate.
    pub tile: T,
}

/// Decodes the DIB an icon directory entry points at.
///
/// Implemented by the host framework; this crate only picks the entry and
/// passes its data offset along.
pub trait BitmapDecoder {
    /// The decoded pixel tile.
    type Tile;

    /// Why decoding failed.
    type Error: core::error::Error;

    /// Decodes the bitmap found at `data_offset` within `source`.
    fn decode(
        &mut self,
        source: &[u8],
        data_offset: u32,
    ) -> Result<Bitmap<Self::Tile>, Self::Error>;
}

/// A decoded icon, sized after mask-halving.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IcoImage<T> {
    pub width: u32,
    pub height: u32,

    /// The decode region, always rewritten to span the full published size.
    pub region: (u32, u32, u32, u32),

    /// The delegate decoder's pixel tile.
    pub tile: T,
}

/// Reads the container header and every directory entry, in file order.
pub fn parse_directory(input: &mut &[u8]) -> Result<Vec<IconDirEntry>, IcoError> {
    let magic = take(4_usize).parse_next(input).map_err(|_: EmptyError| {
        log::error!("Too few bytes for an icon container magic sequence.");
        IcoError::NotIco
    })?;
    if magic != ICO_MAGIC {
        log::error!("Icon container magic was wrong. got: `{magic:x?}`");
        return Err(IcoError::NotIco);
    }

    let count: u16 = le_u16.parse_next(input).map_err(|_: EmptyError| {
        log::error!("Icon container header is missing its entry count.");
        IcoError::TruncatedHeader
    })?;
    log::trace!("Icon directory declares `{count}` entries.");

    let mut entries = Vec::with_capacity(count as usize);
    for index in 0..count {
        entries.push(parse_entry(input, index, count)?);
    }
    Ok(entries)
}

/// Reads one 16-byte directory entry.
fn parse_entry(input: &mut &[u8], index: u16, count: u16) -> Result<IconDirEntry, IcoError> {
    let raw = take(16_usize).parse_next(input).map_err(|_: EmptyError| {
        log::error!("Icon directory entry `{index}` of `{count}` is cut short.");
        IcoError::TruncatedEntry { index, count }
    })?;

    Ok(IconDirEntry {
        width: raw[0],
        height: raw[1],
        color_count: raw[2],
        reserved: raw[3],
        planes: u16::from_le_bytes([raw[4], raw[5]]),
        bit_count: u16::from_le_bytes([raw[6], raw[7]]),
        byte_size: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
        data_offset: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
    })
}

/// Picks the directory entry to decode.
///
/// Compatibility note: this reproduces the historical selection rule
/// exactly. A candidate replaces the current pick only when *both* of its
/// raw size bytes are strictly larger, so a wider icon with a tied height
/// loses to an earlier, smaller one, and a stored `0` (meaning 256)
/// compares as the smallest value of all. Likely unintended upstream, but
/// kept as-is for compatibility.
pub fn select_entry(entries: &[IconDirEntry]) -> Option<&IconDirEntry> {
    let mut selected = entries.first()?;
    for candidate in &entries[1..] {
        if candidate.width > selected.width && candidate.height > selected.height {
            selected = candidate;
        }
    }
    Some(selected)
}

/// Opens an icon container: verifies the header, selects a directory
/// entry, and delegates pixel decoding to `decoder`.
///
/// The published size halves the decoder's intrinsic height, since icon
/// bitmaps double it to hold the transparency mask.
pub fn open<D: BitmapDecoder>(
    source: &[u8],
    decoder: &mut D,
) -> Result<IcoImage<D::Tile>, IcoOpenError<D::Error>> {
    let input: &mut &[u8] = &mut &*source;
    let entries = parse_directory(input)?;

    let Some(entry) = select_entry(&entries) else {
        log::error!("Icon container has zero directory entries.");
        return Err(IcoOpenError::Parse(IcoError::NoEntries));
    };
    log::trace!(
        "Selected icon entry: `{}x{}`, data at offset `{}`.",
        entry.pixel_width(),
        entry.pixel_height(),
        entry.data_offset
    );

    let bitmap = decoder.decode(source, entry.data_offset).map_err(|e| {
        log::error!("Bitmap decoder rejected the selected entry! err: {e}");
        IcoOpenError::Bitmap(e)
    })?;

    let (width, height) = (bitmap.width, bitmap.raw_height / 2);
    Ok(IcoImage {
        width,
        height,
        region: (0, 0, width, height),
        tile: bitmap.tile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::logger;

    /// A decoder that never touches the source and reports a fixed
    /// intrinsic size.
    struct FixedDecoder {
        width: u32,
        raw_height: u32,
        seen_offset: Option<u32>,
    }

    impl BitmapDecoder for FixedDecoder {
        type Tile = ();
        type Error = std::io::Error;

        fn decode(
            &mut self,
            _source: &[u8],
            data_offset: u32,
        ) -> Result<Bitmap<()>, Self::Error> {
            self.seen_offset = Some(data_offset);
            Ok(Bitmap {
                width: self.width,
                raw_height: self.raw_height,
                tile: (),
            })
        }
    }

    /// Builds a container with the given `(width, height, data_offset)`
    /// entries.
    fn container(entries: &[(u8, u8, u32)]) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x01, 0x00];
        bytes.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for &(w, h, offset) in entries {
            bytes.extend_from_slice(&[w, h, 0, 0]);
            bytes.extend_from_slice(&1_u16.to_le_bytes()); // planes
            bytes.extend_from_slice(&32_u16.to_le_bytes()); // bit count
            bytes.extend_from_slice(&64_u32.to_le_bytes()); // byte size
            bytes.extend_from_slice(&offset.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn sniffs_only_the_magic() {
        logger();

        assert!(sniff(&[0x00, 0x00, 0x01, 0x00, 0xAA]));
        assert!(!sniff(&[0x00, 0x00, 0x02, 0x00]));
        assert!(!sniff(&[0x00, 0x00]));
    }

    #[test]
    fn selection_requires_both_dimensions_to_grow() {
        logger();

        // (48, 32) is wider than (32, 32), but its height ties - so the
        // earlier entry stays selected
        let bytes = container(&[(16, 16, 100), (32, 32, 200), (48, 32, 300)]);
        let entries = parse_directory(&mut bytes.as_slice()).unwrap();
        let picked = select_entry(&entries).unwrap();
        assert_eq!((picked.width, picked.height), (32, 32));
        assert_eq!(picked.data_offset, 200);
    }

    #[test]
    fn selection_takes_a_strictly_growing_chain() {
        logger();

        let bytes = container(&[(16, 16, 100), (32, 24, 200), (48, 32, 300)]);
        let entries = parse_directory(&mut bytes.as_slice()).unwrap();
        let picked = select_entry(&entries).unwrap();
        assert_eq!((picked.width, picked.height), (48, 32));
        assert_eq!(picked.data_offset, 300);
    }

    #[test]
    fn published_height_is_halved() {
        logger();

        let bytes = container(&[(64, 64, 22)]);
        let mut decoder = FixedDecoder {
            width: 64,
            raw_height: 128,
            seen_offset: None,
        };

        let image = open(&bytes, &mut decoder).unwrap();
        assert_eq!((image.width, image.height), (64, 64));
        assert_eq!(image.region, (0, 0, 64, 64));
        assert_eq!(decoder.seen_offset, Some(22));
    }

    #[test]
    fn rejects_a_wrong_magic() {
        logger();

        let mut input: &[u8] = &[0x00, 0x00, 0x02, 0x00, 0x01, 0x00];
        assert_eq!(parse_directory(&mut input), Err(IcoError::NotIco));
    }

    #[test]
    fn rejects_truncated_entries() {
        logger();

        let mut bytes = container(&[(16, 16, 100), (32, 32, 200)]);
        bytes.truncate(6 + 16 + 8); // halfway through the second entry

        assert_eq!(
            parse_directory(&mut bytes.as_slice()),
            Err(IcoError::TruncatedEntry { index: 1, count: 2 })
        );
    }

    #[test]
    fn an_empty_directory_cannot_be_opened() {
        logger();

        let bytes = container(&[]);
        let mut decoder = FixedDecoder {
            width: 0,
            raw_height: 0,
            seen_offset: None,
        };

        assert!(matches!(
            open(&bytes, &mut decoder),
            Err(IcoOpenError::Parse(IcoError::NoEntries))
        ));
    }
}
