use crate::errors::Error;

mod deflate;
#[cfg(feature = "lzw")]
mod lzw;
mod predictor;

pub use predictor::Predictor;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum Compression {
    Raw,
    Deflate,
    #[cfg(feature = "lzw")]
    Lzw,
}

impl Compression {
    pub fn from_compression_tag(value: u16) -> Result<Compression, Error> {
        // https://www.awaresystems.be/imaging/tiff/tifftags/compression.html
        match value {
            1 => Ok(Compression::Raw),
            // Using COMPRESS=DEFLATE with GDAL generates tag 8 which is actually "Adobe deflate",
            // 32946 is the older PKZIP-style code for the same stream format
            8 | 32946 => Ok(Compression::Deflate),
            #[cfg(feature = "lzw")]
            5 => Ok(Compression::Lzw),
            _ => Err(Error::UnsupportedCompression(format!(
                "Unsupported compression {}",
                value
            ))),
        }
    }

    // TODO: Should we expose a weezl-like `into_vec` instead ? That would allow reducing allocations
    // from the caller
    pub fn decompress(&self, data: Vec<u8>) -> Result<Vec<u8>, Error> {
        match self {
            Compression::Raw => Ok(data),
            Compression::Deflate => deflate::decompress_deflate(data),
            #[cfg(feature = "lzw")]
            Compression::Lzw => lzw::decompress_lzw(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_compression_tag() {
        assert_eq!(Compression::from_compression_tag(1).unwrap(), Compression::Raw);
        assert_eq!(Compression::from_compression_tag(8).unwrap(), Compression::Deflate);
        assert_eq!(
            Compression::from_compression_tag(32946).unwrap(),
            Compression::Deflate
        );
        // JPEG
        assert!(matches!(
            Compression::from_compression_tag(7),
            Err(Error::UnsupportedCompression(_))
        ));
    }
}
