use icometa_types::iptc::IptcTag;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IptcError {
    /// A record header's first byte wasn't the `0x1C` marker.
    InvalidRecordMarker(u8),

    /// Record numbers live in `1..=9`, but this header had another value.
    RecordNumberOutOfRange(u8),

    /// The size byte was above `132`, which no length regime allows.
    IllegalFieldLength(u8),

    /// A record header or its extended-length field was cut short.
    TruncatedRecord,

    /// A record promised more payload bytes than the stream holds.
    TruncatedPayload {
        /// The tag whose payload was cut short.
        tag: IptcTag,

        /// How many payload bytes the header declared.
        expected: usize,

        /// How many bytes were actually left in the stream.
        remaining: usize,
    },

    /// A dataset required to derive image attributes is missing.
    MissingDataSet(IptcTag),

    /// A dataset was present, but its payload was too short to derive
    /// attributes from.
    ShortDataSet(IptcTag),

    /// The compression dataset held a value outside the known table.
    UnknownCompression(u32),
}

impl core::fmt::Display for IptcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidRecordMarker(got) => write!(
                f,
                "invalid IPTC/NAA file: record marker should be `0x1c`, \
                but was `{got:#04x}`"
            ),

            Self::RecordNumberOutOfRange(record) => write!(
                f,
                "invalid IPTC/NAA file: record number `{record}` is \
                outside `1..=9`"
            ),

            Self::IllegalFieldLength(size_byte) => write!(
                f,
                "illegal field length in IPTC/NAA file: size byte \
                `{size_byte}` is above `132`"
            ),

            Self::TruncatedRecord => {
                f.write_str("A record header or extended-length field was cut short.")
            }

            Self::TruncatedPayload {
                tag,
                expected,
                remaining,
            } => write!(
                f,
                "Record `{tag}` promised `{expected}` payload bytes, \
                but only `{remaining}` remain."
            ),

            Self::MissingDataSet(tag) => write!(
                f,
                "Dataset `{tag}` is required to derive image attributes, \
                but it's missing."
            ),

            Self::ShortDataSet(tag) => write!(
                f,
                "Dataset `{tag}` has too few payload bytes to derive \
                image attributes from."
            ),

            Self::UnknownCompression(value) => {
                write!(f, "Unknown IPTC image compression: `{value}`")
            }
        }
    }
}

impl core::error::Error for IptcError {}

/// An error from staging and decoding embedded pixel data.
#[derive(Debug)]
pub enum PixelError<E> {
    /// The stream had no image-data marker, so there's nothing to extract.
    NoImageData,

    /// Re-reading the record stream for pixel framing failed.
    Iptc(IptcError),

    /// Writing the staged buffer failed.
    Staging(std::io::Error),

    /// Both the fast and the generic opener rejected the staged bytes.
    ///
    /// Carries the generic opener's error, since that was the last word.
    Decode(E),
}

impl<E> From<IptcError> for PixelError<E> {
    fn from(value: IptcError) -> Self {
        Self::Iptc(value)
    }
}

impl<E: core::fmt::Display> core::fmt::Display for PixelError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoImageData => f.write_str("The stream has no image-data records to extract."),
            Self::Iptc(e) => write!(f, "Pixel framing failed. err: {e}"),
            Self::Staging(e) => write!(f, "Failed to write the staged raster. err: {e}"),
            Self::Decode(e) => write!(
                f,
                "Both raster openers rejected the staged bytes. last err: {e}"
            ),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for PixelError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::NoImageData => None,
            Self::Iptc(e) => Some(e),
            Self::Staging(e) => Some(e),
            Self::Decode(e) => Some(e),
        }
    }
}
