//! IPTC/NAA (IIM) record streams.
//!
//! The format is a run of tag/length/value records: a `0x1C` marker byte, a
//! (record, dataset) tag pair, then a size whose encoding has three regimes
//! (see [`read_record`]). Descriptive records accumulate into a
//! [`RecordMap`]; a record tagged `8:10` marks the start of embedded image
//! data and ends the descriptive section.
//!
//! Streams appear standalone (see [`IptcFile`]) or buried inside JPEG and
//! TIFF containers (see [`crate::containers`]).

use std::sync::Arc;

use parking_lot::RwLock;
use winnow::{Parser, error::EmptyError, token::take};

pub mod error;
pub mod pixels;

pub use icometa_types::iptc::{
    ColorMode, Compression, IptcTag, IptcValue, Payload, RecordMap, be_int,
};

use error::IptcError;

/// Every record header opens with this marker byte.
const RECORD_MARKER: u8 = 0x1C;

/// Returns whether `prefix` looks like the start of a standalone IPTC/NAA
/// stream.
///
/// The format has no dedicated magic, so the first record header has to do:
/// the marker byte followed by a record number in range.
pub fn sniff(prefix: &[u8]) -> bool {
    prefix.len() >= 5 && prefix[0] == RECORD_MARKER && (1..=9).contains(&prefix[1])
}

/// One parsed record: a tag plus its payload, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IptcRecord {
    pub tag: IptcTag,

    /// `None` for marker records and zero-size fields.
    pub payload: Payload,
}

/// Reads the next record from the stream.
///
/// Returns `Ok(None)` when fewer than five bytes remain - that's the normal
/// end of a stream, not an error.
///
/// The size byte (byte 3 of the header) selects one of three regimes:
///
/// - below `128`: the size is the big-endian `u16` in header bytes 3-4;
/// - exactly `128`: a marker record with no payload;
/// - `129..=132`: the true size follows the header as a big-endian integer
///   of `size_byte - 128` bytes;
/// - above `132`: malformed.
pub fn read_record(input: &mut &[u8]) -> Result<Option<IptcRecord>, IptcError> {
    if input.len() < 5 {
        log::trace!("Fewer than five bytes remain. No more records.");
        return Ok(None);
    }

    let header = take(5_usize)
        .parse_next(input)
        .map_err(|_: EmptyError| IptcError::TruncatedRecord)?;

    if header[0] != RECORD_MARKER {
        log::error!(
            "Record marker should be `{RECORD_MARKER:#04x}`, \
            but was `{:#04x}`.",
            header[0]
        );
        return Err(IptcError::InvalidRecordMarker(header[0]));
    }

    let tag = IptcTag::new(header[1], header[2]);
    if !tag.valid_record() {
        log::error!("Record number `{}` is outside `1..=9`.", tag.record);
        return Err(IptcError::RecordNumberOutOfRange(tag.record));
    }

    let size_byte = header[3];
    let size: usize = if size_byte > 132 {
        log::error!("Size byte `{size_byte}` is above `132`. Malformed stream.");
        return Err(IptcError::IllegalFieldLength(size_byte));
    } else if size_byte == 128 {
        // a marker record; no payload follows
        0
    } else if size_byte > 128 {
        // extended form: the true size follows the header as a big-endian
        // integer of `size_byte - 128` bytes
        let extension = take((size_byte - 128) as usize)
            .parse_next(input)
            .map_err(|_: EmptyError| {
                log::error!("Record `{tag}` is missing its extended-length field.");
                IptcError::TruncatedRecord
            })?;
        be_int(extension) as usize
    } else {
        u16::from_be_bytes([header[3], header[4]]) as usize
    };

    let payload: Payload = if size > 0 {
        let remaining = input.len();
        let data = take(size).parse_next(input).map_err(|_: EmptyError| {
            log::error!("Record `{tag}` promised `{size}` bytes, but only `{remaining}` remain.");
            IptcError::TruncatedPayload {
                tag,
                expected: size,
                remaining,
            }
        })?;
        Some(data.to_vec())
    } else {
        None
    };

    Ok(Some(IptcRecord { tag, payload }))
}

/// A parsed IPTC/NAA stream: the descriptive record mapping plus, when one
/// was seen, where the embedded image data starts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Iptc {
    /// Descriptive records, keyed by tag.
    pub records: RecordMap,

    /// Byte offset of the first image-data (`8:10`) record, if any.
    pub image_data_offset: Option<usize>,
}

impl Iptc {
    /// Parses a stream strictly: any malformed record is fatal.
    pub fn parse(bytes: &[u8]) -> Result<Self, IptcError> {
        Self::parse_inner(bytes, false)
    }

    /// Parses a stream leniently, for best-effort extraction out of another
    /// container: a malformed record ends parsing but keeps everything
    /// accumulated before it.
    pub fn parse_lenient(bytes: &[u8]) -> Self {
        Self::parse_inner(bytes, true).unwrap_or_default()
    }

    fn parse_inner(bytes: &[u8], lenient: bool) -> Result<Self, IptcError> {
        let mut iptc = Self::default();
        let input: &mut &[u8] = &mut &*bytes;

        loop {
            let offset = bytes.len() - input.len();
            match read_record(input) {
                Ok(None) => break,

                Ok(Some(record)) if record.tag == IptcTag::IMAGE_DATA => {
                    log::trace!("Hit the image-data marker at offset `{offset}`. Stopping.");
                    iptc.image_data_offset = Some(offset);
                    break;
                }

                Ok(Some(record)) => iptc.records.push(record.tag, record.payload),

                // best-effort extraction swallows malformed trailing data
                Err(e) if lenient => {
                    log::warn!(
                        "Malformed trailing IPTC data; keeping the `{}` \
                        records parsed so far. err: {e}",
                        iptc.records.len()
                    );
                    break;
                }

                Err(e) => return Err(e),
            }
        }

        Ok(iptc)
    }

    /// Layer count (byte 0) and component flag (byte 1), from dataset
    /// `3:60`.
    fn layer_info(&self) -> Result<(u8, u8), IptcError> {
        let data = self
            .records
            .first(IptcTag::RECORD_LAYERS)
            .ok_or(IptcError::MissingDataSet(IptcTag::RECORD_LAYERS))?;

        match data {
            [layers, component, ..] => Ok((*layers, *component)),
            _ => Err(IptcError::ShortDataSet(IptcTag::RECORD_LAYERS)),
        }
    }

    /// Zero-based channel selector, from dataset `3:65` (defaults to the
    /// first channel when absent).
    fn channel_id(&self) -> u8 {
        self.records
            .first(IptcTag::CHANNEL_SELECTOR)
            .and_then(|data| data.first())
            .map(|&one_based| one_based.wrapping_sub(1))
            .unwrap_or(0)
    }

    /// Resolves the color mode from the layer info.
    ///
    /// Only a handful of combinations are mapped; anything else stays
    /// undetermined (`Ok(None)`) rather than guessed.
    pub fn mode(&self) -> Result<Option<ColorMode>, IptcError> {
        let (layers, component) = self.layer_info()?;
        let id = self.channel_id();

        Ok(match (layers, component) {
            (1, 0) => Some(ColorMode::Grayscale),
            (3, c) if c != 0 => ColorMode::rgb(id),
            (4, c) if c != 0 => ColorMode::cmyk(id),

            _ => None,
        })
    }

    /// Pixel dimensions, from datasets `3:20` and `3:30`.
    pub fn size(&self) -> Result<(u32, u32), IptcError> {
        let width = self
            .records
            .integer(IptcTag::PIXEL_WIDTH)
            .ok_or(IptcError::MissingDataSet(IptcTag::PIXEL_WIDTH))?;
        let height = self
            .records
            .integer(IptcTag::PIXEL_HEIGHT)
            .ok_or(IptcError::MissingDataSet(IptcTag::PIXEL_HEIGHT))?;
        Ok((width, height))
    }

    /// Compression scheme of the embedded raster, from dataset `3:120`.
    pub fn compression(&self) -> Result<Compression, IptcError> {
        let value = self
            .records
            .integer(IptcTag::COMPRESSION)
            .ok_or(IptcError::MissingDataSet(IptcTag::COMPRESSION))?;

        Compression::try_from(value).map_err(|()| {
            log::error!("Unknown IPTC image compression: `{value}`.");
            IptcError::UnknownCompression(value)
        })
    }
}

/// A standalone IPTC/NAA file.
///
/// Opening is strict: the descriptive records must parse, and the datasets
/// a synthesized image needs (size, compression) must be present. The
/// source bytes are retained so the [`pixels`] extractor can stage the
/// embedded raster later.
#[derive(Clone, Debug)]
pub struct IptcFile {
    source: Vec<u8>,
    iptc: Arc<RwLock<Iptc>>,
    image_data_offset: Option<usize>,
    mode: Option<ColorMode>,
    width: u32,
    height: u32,
    compression: Compression,
}

impl IptcFile {
    /// Opens a standalone stream: parses the descriptive records and
    /// resolves the attributes up front.
    pub fn open(bytes: impl Into<Vec<u8>>) -> Result<Self, IptcError> {
        let source = bytes.into();

        let iptc = Iptc::parse(&source)?;
        let mode = iptc.mode()?;
        let (width, height) = iptc.size()?;
        let compression = iptc.compression()?;
        let image_data_offset = iptc.image_data_offset;

        log::trace!(
            "Opened IPTC file: `{width}x{height}`, mode `{mode:?}`, \
            compression `{compression:?}`."
        );

        Ok(Self {
            source,
            iptc: Arc::new(RwLock::new(iptc)),
            image_data_offset,
            mode,
            width,
            height,
            compression,
        })
    }

    /// The parsed record mapping.
    pub fn iptc(&self) -> Arc<RwLock<Iptc>> {
        Arc::clone(&self.iptc)
    }

    /// Derived color mode, when the layer info mapped to one.
    pub fn mode(&self) -> Option<ColorMode> {
        self.mode
    }

    /// Derived pixel width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Derived pixel height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Derived compression scheme.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Where the first image-data record starts, if the stream has one.
    pub fn image_data_offset(&self) -> Option<usize> {
        self.image_data_offset
    }

    /// The raw source bytes this file was opened from.
    pub fn source(&self) -> &[u8] {
        &self.source
    }
}
