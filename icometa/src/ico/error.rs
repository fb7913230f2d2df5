#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IcoError {
    /// The 4-byte magic sequence (reserved `0`, type `1`) wasn't there.
    NotIco,

    /// Ran out of data while reading the 6-byte container header.
    TruncatedHeader,

    /// The directory promised more 16-byte entries than the stream holds.
    TruncatedEntry {
        /// Index of the entry that couldn't be read.
        index: u16,

        /// How many entries the header declared.
        count: u16,
    },

    /// The directory declared zero entries, so there's nothing to decode.
    NoEntries,
}

impl core::fmt::Display for IcoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotIco => f.write_str("not an ICO file"),

            Self::TruncatedHeader => {
                f.write_str("Ran out of data while reading the icon container header.")
            }

            Self::TruncatedEntry { index, count } => write!(
                f,
                "Icon directory entry `{index}` of `{count}` is cut short."
            ),

            Self::NoEntries => f.write_str("The icon directory has zero entries."),
        }
    }
}

impl core::error::Error for IcoError {}

/// An error from the full open path, which also covers the delegate bitmap
/// decoder failing on the selected entry.
#[derive(Clone, Debug, PartialEq)]
pub enum IcoOpenError<E> {
    /// The container itself didn't parse.
    Parse(IcoError),

    /// The delegate bitmap decoder rejected the selected entry's data.
    Bitmap(E),
}

impl<E> From<IcoError> for IcoOpenError<E> {
    fn from(value: IcoError) -> Self {
        Self::Parse(value)
    }
}

impl<E: core::fmt::Display> core::fmt::Display for IcoOpenError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Failed to parse the icon container. err: {e}"),
            Self::Bitmap(e) => write!(f, "The bitmap decoder failed. err: {e}"),
        }
    }
}

impl<E: core::error::Error + 'static> core::error::Error for IcoOpenError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Bitmap(e) => Some(e),
        }
    }
}
