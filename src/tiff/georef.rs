use tracing::debug;

use super::cog::ImageRect;
use super::geo_keys::{GeoKeyDirectory, KeyID};
use super::ifd::{IFDTag, ImageFileDirectory};
use crate::bbox::BoundingBox;
use crate::epsg::{Crs, UnitOfMeasure};
use crate::math::{vec2f, Vec2f};
use crate::sources::Source;
use crate::Error;

/// A Geotransform, inspired by GDAL but enforcing north-up images
/// https://gdal.org/tutorials/geotransforms_tut.html
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Geotransform {
    // x coordinate of the upper left corner of the upper left pixel
    pub ul_x: f64,
    // y coordinate of the upper left corner of the upper left pixel
    pub ul_y: f64,
    // pixel dimensions, y_res is negative for the usual north-up rasters
    pub x_res: f64,
    pub y_res: f64,
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-15
}

impl Geotransform {
    /// From a single ModelTiepoint (I, J, K, X, Y, Z) and ModelPixelScale (ScaleX, ScaleY, ScaleZ)
    pub fn decode(tie_points: &[f64], pixel_scale: &[f64]) -> Result<Geotransform, Error> {
        if tie_points.len() != 6 {
            return Err(Error::UnsupportedProjection(format!("Currently only support rasters georeferenced with an affine geotransform. Expected tie_points of len 6, got {}", tie_points.len())));
        }
        if pixel_scale.len() != 3 {
            return Err(Error::UnsupportedProjection(format!("Currently only support rasters georeferenced with an affine geotransform. Expected pixel_scale of len 3, got {}", pixel_scale.len())));
        }
        if !close(tie_points[2], 0.0) || !close(tie_points[5], 0.0) || !close(pixel_scale[2], 0.0)
        {
            return Err(Error::UnsupportedProjection(format!(
                "Vertical crs not supported, expected 0, got tie_points={:?}, pixel_scale={:?}",
                tie_points, pixel_scale
            )));
        }
        if pixel_scale[0] <= 0.0 || pixel_scale[1] <= 0.0 {
            return Err(Error::UnsupportedProjection(format!(
                "Expected positive pixel scale, got {:?}",
                pixel_scale
            )));
        }
        // The tie point can be any raster point, move it to the (0, 0) corner
        let (i, j, x, y) = (tie_points[0], tie_points[1], tie_points[3], tie_points[4]);
        Ok(Geotransform {
            ul_x: x - i * pixel_scale[0],
            ul_y: y + j * pixel_scale[1],
            x_res: pixel_scale[0],
            // Orientation=1 means rows grow downwards while y grows upwards in the CRS
            y_res: -pixel_scale[1],
        })
    }

    /// From a ModelTransformation 4x4 row-major matrix. Only north-up (no rotation/shear)
    /// matrices are supported
    pub fn from_model_transformation(matrix: &[f64]) -> Result<Geotransform, Error> {
        if matrix.len() != 16 {
            return Err(Error::UnsupportedProjection(format!(
                "Expected ModelTransformation of len 16, got {}",
                matrix.len()
            )));
        }
        if !close(matrix[1], 0.0) || !close(matrix[4], 0.0) {
            return Err(Error::UnsupportedProjection(format!(
                "Rotated rasters are not supported, got ModelTransformation={:?}",
                matrix
            )));
        }
        Ok(Geotransform {
            ul_x: matrix[3],
            ul_y: matrix[7],
            x_res: matrix[0],
            y_res: matrix[5],
        })
    }

    /// Coordinates of a (fractional) pixel position. `(0, 0)` is the upper left corner of
    /// the upper left pixel, `(0.5, 0.5)` its centre
    pub fn pixel_to_world(&self, col: f64, row: f64) -> Vec2f {
        vec2f(self.ul_x + col * self.x_res, self.ul_y + row * self.y_res)
    }

    /// Fractional (col, row) of a world position
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Vec2f {
        vec2f((x - self.ul_x) / self.x_res, (y - self.ul_y) / self.y_res)
    }

    /// The geotransform of a window of the raster, whose upper left pixel is `rect`'s
    pub fn window(&self, rect: &ImageRect) -> Geotransform {
        let ul = self.pixel_to_world(rect.j_from as f64, rect.i_from as f64);
        Geotransform {
            ul_x: ul.x,
            ul_y: ul.y,
            x_res: self.x_res,
            y_res: self.y_res,
        }
    }

    /// Extent covered by a `width` x `height` raster
    pub fn bounds(&self, width: u64, height: u64) -> BoundingBox {
        BoundingBox::from_points(&[
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(width as f64, height as f64),
        ])
    }

    /// GDAL ordering: (ul_x, x_res, 0, ul_y, 0, y_res)
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.ul_x, self.x_res, 0.0, self.ul_y, 0.0, self.y_res]
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Georeference {
    pub crs: Crs,
    pub unit: UnitOfMeasure,
    pub geo_transform: Geotransform,
}

impl Georeference {
    pub async fn decode(
        ifd: &ImageFileDirectory,
        source: &mut Source,
        geo_keys: &GeoKeyDirectory,
    ) -> Result<Georeference, Error> {
        let (crs, unit) = match geo_keys.get_short_key_value(KeyID::GTModelType)? {
            1 => {
                let code = geo_keys.get_short_key_value(KeyID::ProjectedCRS)?;
                if code == 32767 {
                    return Err(Error::UnsupportedProjection(
                        "user-defined projected CRS".to_string(),
                    ));
                }
                let unit = geo_keys
                    .get_optional_short_key_value(KeyID::ProjLinearUnits)?
                    .map(UnitOfMeasure::decode)
                    .unwrap_or(UnitOfMeasure::LinearMeter);
                (Crs::decode(code), unit)
            }
            2 => {
                let code = geo_keys.get_short_key_value(KeyID::GeodeticCRS)?;
                if code == 32767 {
                    return Err(Error::UnsupportedProjection(
                        "user-defined geodetic CRS".to_string(),
                    ));
                }
                let unit = geo_keys
                    .get_optional_short_key_value(KeyID::GeodeticAngularUnits)?
                    .map(UnitOfMeasure::decode)
                    .unwrap_or(UnitOfMeasure::Degree);
                (Crs::decode(code), unit)
            }
            model_type => {
                return Err(Error::UnsupportedProjection(format!(
                    "Currently only support projected/geodetic CRS (model_type=1 or 2), got {}",
                    model_type
                )));
            }
        };

        let mut geo_transform = if ifd.has_tag(IFDTag::ModelTiepointTag) {
            let tie_points = ifd
                .get_vec_double_tag_value(source, IFDTag::ModelTiepointTag)
                .await?;
            let pixel_scale = ifd
                .get_vec_double_tag_value(source, IFDTag::ModelPixelScaleTag)
                .await?;
            Geotransform::decode(&tie_points, &pixel_scale)?
        } else {
            let matrix = ifd
                .get_vec_double_tag_value(source, IFDTag::ModelTransformationTag)
                .await?;
            Geotransform::from_model_transformation(&matrix)?
        };

        // RasterPixelIsPoint (2) ties coordinates to pixel centres. Like GDAL, shift by half
        // a pixel so the geotransform references pixel corners
        match geo_keys
            .get_optional_short_key_value(KeyID::GTRasterType)?
            .unwrap_or(1)
        {
            1 => {}
            2 => {
                debug!("RasterPixelIsPoint, shifting geotransform by half a pixel");
                geo_transform.ul_x -= geo_transform.x_res / 2.0;
                geo_transform.ul_y -= geo_transform.y_res / 2.0;
            }
            raster_type => {
                return Err(Error::UnsupportedProjection(format!(
                    "Unknown raster type {}",
                    raster_type
                )));
            }
        }

        Ok(Georeference {
            crs,
            unit,
            geo_transform,
        })
    }
}
