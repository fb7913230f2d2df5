//! Pixel extraction for standalone IPTC files.
//!
//! Embedded rasters arrive as a run of image-data (`8:10`) records after
//! the descriptive section. The extractor copies their payloads into a
//! scoped temporary file - prepending a PGM header for raw streams, so the
//! staged bytes are self-describing - and hands the file to the host
//! framework's raster openers.

use std::{io::Write as _, path::Path};

use tempfile::NamedTempFile;

use super::{Compression, IptcFile, IptcTag, error::PixelError, read_record};

/// Payloads are copied in bounded chunks so one huge record can't force a
/// single giant write.
const COPY_CHUNK: usize = 8 * 1024;

/// The host framework's raster openers: a fast path for the PNM family,
/// and a generic fallback for everything else.
pub trait RasterOpener {
    /// The decoded image.
    type Raster;

    /// Why opening failed.
    type Error: core::error::Error;

    /// Fast path: the staged buffer is (or claims to be) a PNM file.
    fn open_pnm(&mut self, path: &Path) -> Result<Self::Raster, Self::Error>;

    /// Slow path: let the generic opener figure the staged bytes out.
    fn open_image(&mut self, path: &Path) -> Result<Self::Raster, Self::Error>;
}

impl IptcFile {
    /// Whether the embedded raster could be memory-mapped in place,
    /// skipping the staged copy.
    ///
    /// Disabled upstream long ago ("the following only slows things
    /// down"), so every load takes the staging path. Kept so the load path
    /// reads the way it historically did.
    fn is_raw(&self) -> bool {
        false
    }

    /// Stages the embedded raster into a temporary file and decodes it via
    /// `opener`.
    ///
    /// The staged file is uniquely named and removed on every exit path -
    /// normal return, decode failure, or I/O error - because it only lives
    /// as long as the [`NamedTempFile`] guard below. A failed removal is
    /// ignored rather than allowed to mask the decode result.
    pub fn load<O: RasterOpener>(&self, opener: &mut O) -> Result<O::Raster, PixelError<O::Error>> {
        debug_assert!(!self.is_raw(), "direct mapping is permanently disabled");

        let Some(offset) = self.image_data_offset() else {
            log::error!("IPTC file has no image-data records to load.");
            return Err(PixelError::NoImageData);
        };

        let mut staged = NamedTempFile::new().map_err(PixelError::Staging)?;
        log::trace!("Staging raster bytes into `{}`.", staged.path().display());

        if self.compression() == Compression::Raw {
            // prepend a PGM header so a generic raster decoder can make
            // sense of the extracted samples
            write!(staged, "P5\n{} {}\n255\n", self.width(), self.height())
                .map_err(PixelError::Staging)?;
        }

        // copy every consecutive image-data record into the staged file
        let input: &mut &[u8] = &mut &self.source()[offset..];
        while let Some(record) = read_record(input)? {
            if record.tag != IptcTag::IMAGE_DATA {
                log::trace!("Hit a non-image-data record (`{}`). Done copying.", record.tag);
                break;
            }
            if let Some(payload) = record.payload {
                for chunk in payload.chunks(COPY_CHUNK) {
                    staged.write_all(chunk).map_err(PixelError::Staging)?;
                }
            }
        }
        staged.flush().map_err(PixelError::Staging)?;

        // fast PNM open first, generic open second
        match opener.open_pnm(staged.path()) {
            Ok(raster) => Ok(raster),
            Err(fast_err) => {
                log::trace!("Fast PNM open failed; retrying generically. err: {fast_err}");
                opener.open_image(staged.path()).map_err(|e| {
                    log::error!("The generic opener also rejected the staged raster! err: {e}");
                    PixelError::Decode(e)
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::util::logger;

    /// Remembers the staged path and returns the staged bytes, or fails,
    /// depending on `mode`.
    struct ProbeOpener {
        mode: ProbeMode,
        staged_path: Option<PathBuf>,
        pnm_calls: usize,
        generic_calls: usize,
    }

    enum ProbeMode {
        FastSucceeds,
        OnlyGenericSucceeds,
        BothFail,
    }

    impl ProbeOpener {
        fn new(mode: ProbeMode) -> Self {
            Self {
                mode,
                staged_path: None,
                pnm_calls: 0,
                generic_calls: 0,
            }
        }

        fn refuse(&self) -> std::io::Error {
            std::io::Error::other("not today")
        }
    }

    impl RasterOpener for ProbeOpener {
        type Raster = Vec<u8>;
        type Error = std::io::Error;

        fn open_pnm(&mut self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
            self.pnm_calls += 1;
            self.staged_path = Some(path.to_path_buf());
            match self.mode {
                ProbeMode::FastSucceeds => std::fs::read(path),
                _ => Err(self.refuse()),
            }
        }

        fn open_image(&mut self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
            self.generic_calls += 1;
            self.staged_path = Some(path.to_path_buf());
            match self.mode {
                ProbeMode::OnlyGenericSucceeds => std::fs::read(path),
                _ => Err(self.refuse()),
            }
        }
    }

    /// Builds a standalone stream: a raw 4x2 grayscale raster split over
    /// two image-data records, followed by one unrelated record.
    fn stream() -> Vec<u8> {
        let mut bytes = Vec::new();
        for (dataset, payload) in [
            (60, vec![1_u8, 0]),
            (20, vec![0, 4]),
            (30, vec![0, 2]),
            (120, vec![1]),
        ] {
            bytes.extend_from_slice(&[0x1C, 3, dataset, 0x00, payload.len() as u8]);
            bytes.extend_from_slice(&payload);
        }
        for payload in [b"ABCD", b"EFGH"] {
            bytes.extend_from_slice(&[0x1C, 8, 10, 0x00, payload.len() as u8]);
            bytes.extend_from_slice(payload);
        }
        // a trailing descriptive record ends the image-data run
        bytes.extend_from_slice(&[0x1C, 2, 5, 0x00, 1, b'x']);
        bytes
    }

    #[test]
    fn staged_raster_gets_a_pgm_header_and_all_payloads() {
        logger();

        let file = IptcFile::open(stream()).unwrap();
        let mut opener = ProbeOpener::new(ProbeMode::FastSucceeds);

        let staged = file.load(&mut opener).unwrap();
        assert_eq!(staged, b"P5\n4 2\n255\nABCDEFGH".to_vec());
        assert_eq!(opener.pnm_calls, 1);
        assert_eq!(opener.generic_calls, 0);
    }

    #[test]
    fn generic_opener_is_the_fallback() {
        logger();

        let file = IptcFile::open(stream()).unwrap();
        let mut opener = ProbeOpener::new(ProbeMode::OnlyGenericSucceeds);

        let staged = file.load(&mut opener).unwrap();
        assert_eq!(staged, b"P5\n4 2\n255\nABCDEFGH".to_vec());
        assert_eq!(opener.pnm_calls, 1);
        assert_eq!(opener.generic_calls, 1);
    }

    #[test]
    fn staged_file_is_gone_after_success() {
        logger();

        let file = IptcFile::open(stream()).unwrap();
        let mut opener = ProbeOpener::new(ProbeMode::FastSucceeds);

        file.load(&mut opener).unwrap();
        let path = opener.staged_path.expect("opener saw the staged path");
        assert!(!path.exists());
    }

    #[test]
    fn staged_file_is_gone_after_failure() {
        logger();

        let file = IptcFile::open(stream()).unwrap();
        let mut opener = ProbeOpener::new(ProbeMode::BothFail);

        let result = file.load(&mut opener);
        assert!(matches!(result, Err(PixelError::Decode(_))));

        let path = opener.staged_path.expect("opener saw the staged path");
        assert!(!path.exists());
    }

    #[test]
    fn streams_without_image_data_refuse_to_load() {
        logger();

        let mut bytes = Vec::new();
        for (dataset, payload) in [
            (60, vec![1_u8, 0]),
            (20, vec![0, 4]),
            (30, vec![0, 2]),
            (120, vec![1]),
        ] {
            bytes.extend_from_slice(&[0x1C, 3, dataset, 0x00, payload.len() as u8]);
            bytes.extend_from_slice(&payload);
        }

        let file = IptcFile::open(bytes).unwrap();
        let mut opener = ProbeOpener::new(ProbeMode::FastSucceeds);
        assert!(matches!(
            file.load(&mut opener),
            Err(PixelError::NoImageData)
        ));
    }

    #[test]
    fn jpeg_compressed_streams_skip_the_pgm_header() {
        logger();

        let mut bytes = Vec::new();
        for (dataset, payload) in [
            (60, vec![3_u8, 1]),
            (65, vec![1]),
            (20, vec![0, 4]),
            (30, vec![0, 2]),
            (120, vec![5]),
        ] {
            bytes.extend_from_slice(&[0x1C, 3, dataset, 0x00, payload.len() as u8]);
            bytes.extend_from_slice(&payload);
        }
        bytes.extend_from_slice(&[0x1C, 8, 10, 0x00, 3]);
        bytes.extend_from_slice(b"JPG");

        let file = IptcFile::open(bytes).unwrap();
        assert_eq!(file.compression(), Compression::Jpeg);

        let mut opener = ProbeOpener::new(ProbeMode::FastSucceeds);
        let staged = file.load(&mut opener).unwrap();
        assert_eq!(staged, b"JPG".to_vec());
    }
}
