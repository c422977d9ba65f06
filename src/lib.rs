mod bbox;
pub mod epsg;
mod errors;
pub mod geometry;
mod hex;
pub mod image;
pub mod mask;
mod math;
pub mod ndvi;
pub mod npy;
mod sources;
pub mod tiff;

pub use bbox::BoundingBox;
pub use epsg::Crs;
pub use errors::Error;
pub use geometry::{GeometrySet, Polygon};
pub use image::{BandData, SampleType};
pub use mask::{mask_cog, read_masked, MaskOptions, MaskedRaster};
pub use math::{vec2f, Vec2f};
pub use ndvi::{ndvi, ndvi_masked, normalized_difference, NdviRaster, NdviStats};
pub use sources::Source;
pub use tiff::cog::{ImageRect, COG};
pub use tiff::georef::Geotransform;

pub async fn open(source_spec: &str) -> Result<COG, Error> {
    COG::open(source_spec).await
}
