use crate::tiff::geo_keys::{KeyID, KeyValue};
use crate::tiff::ifd::{IFDTag, IFDValue};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] io::Error),
    #[error("source error: {0}")]
    SourceError(String),
    /// The raster location could not be opened or read (missing file, network failure,
    /// permission denied, unexpected HTTP status, timeout)
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("required tag not found: {0:?}")]
    RequiredTagNotFound(IFDTag),
    #[error("tag {0:?} has wrong type: {1:?}")]
    TagHasWrongType(IFDTag, IFDValue),
    #[error("unsupported value for tag {0:?}: {1}")]
    UnsupportedTagValue(IFDTag, String),
    #[error("not a COG: {0}")]
    NotACOG(String),
    #[error("unsupported COG: {0}")]
    UnsupportedCOG(String),
    #[error("required geokey not found: {0:?}")]
    RequiredGeoKeyNotFound(KeyID),
    #[error("geokey {0:?} has wrong type: {1:?}")]
    GeoKeyHasWrongType(KeyID, KeyValue),
    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),
    #[error("decompression error: {0}")]
    DecompressionError(String),
    #[error("out of bounds read: {0}")]
    OutOfBoundsRead(String),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// None of the mask geometries overlaps the raster extent
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),
    #[error("crs mismatch: geometries are in EPSG:{geometries}, raster is in EPSG:{raster}")]
    CrsMismatch { geometries: u16, raster: u16 },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("{0}")]
    OtherError(String),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::ResourceUnavailable(format!("http error: {}", value))
    }
}

impl From<shapefile::Error> for Error {
    fn from(value: shapefile::Error) -> Self {
        Error::InvalidGeometry(format!("shapefile error: {}", value))
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::InvalidGeometry(format!("json error: {}", value))
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(value: ndarray::ShapeError) -> Self {
        Error::ShapeMismatch(value.to_string())
    }
}
