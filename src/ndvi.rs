//! Normalized difference band ratios.
//!
//! All arithmetic is done in f64 after promoting the inputs, following IEEE 754: a zero
//! denominator gives ±inf (or NaN for 0/0). Nothing is clamped, logged or reported as an
//! error for those pixels.
use ndarray::{Array2, Zip};

use crate::epsg::Crs;
use crate::image::BandData;
use crate::mask::MaskedRaster;
use crate::tiff::georef::Geotransform;
use crate::Error;

fn check_same_shape(a: (usize, usize), b: (usize, usize)) -> Result<(), Error> {
    if a != b {
        return Err(Error::ShapeMismatch(format!(
            "bands have different shapes: {:?} != {:?}",
            a, b
        )));
    }
    Ok(())
}

/// Elementwise `(a - b) / (a + b)`
pub fn normalized_difference(a: &BandData, b: &BandData) -> Result<Array2<f64>, Error> {
    check_same_shape(a.shape(), b.shape())?;
    let (a, b) = (a.to_f64(), b.to_f64());
    Ok(Zip::from(&a).and(&b).map_collect(|&a, &b| (a - b) / (a + b)))
}

/// `(nir - red) / (nir + red)`. Pixels where both bands are 0 are NaN
pub fn ndvi(red: &BandData, nir: &BandData) -> Result<Array2<f64>, Error> {
    normalized_difference(nir, red)
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct NdviStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub finite_count: usize,
    /// NaN and infinite pixels, including the masked ones
    pub non_finite_count: usize,
}

/// NDVI over a masked window. `data` is NaN where either input was masked, and may hold
/// ±inf/NaN where both reflectances summed to 0
#[derive(Debug, Clone)]
pub struct NdviRaster {
    pub data: Array2<f64>,
    pub geo_transform: Geotransform,
    pub crs: Crs,
}

impl NdviRaster {
    /// min/max/mean are NaN when there is no finite value
    pub fn stats(&self) -> NdviStats {
        let mut stats = NdviStats {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            finite_count: 0,
            non_finite_count: 0,
        };
        let mut sum = 0.0;
        for v in self.data.iter() {
            if v.is_finite() {
                stats.min = stats.min.min(*v);
                stats.max = stats.max.max(*v);
                sum += v;
                stats.finite_count += 1;
            } else {
                stats.non_finite_count += 1;
            }
        }
        if stats.finite_count == 0 {
            stats.min = f64::NAN;
            stats.max = f64::NAN;
            stats.mean = f64::NAN;
        } else {
            stats.mean = sum / stats.finite_count as f64;
        }
        stats
    }
}

fn same_transform(a: &Geotransform, b: &Geotransform) -> bool {
    a.to_gdal()
        .iter()
        .zip(b.to_gdal().iter())
        .all(|(a, b)| (a - b).abs() <= 1e-9)
}

/// NDVI of two masked reads of the same window
pub fn ndvi_masked(red: &MaskedRaster, nir: &MaskedRaster) -> Result<NdviRaster, Error> {
    check_same_shape(red.shape(), nir.shape())?;
    if red.crs != nir.crs {
        return Err(Error::ShapeMismatch(format!(
            "bands are in different CRS: {} != {}",
            red.crs, nir.crs
        )));
    }
    if !same_transform(&red.geo_transform, &nir.geo_transform) {
        return Err(Error::ShapeMismatch(format!(
            "bands are not aligned: {:?} != {:?}",
            red.geo_transform.to_gdal(),
            nir.geo_transform.to_gdal()
        )));
    }
    let mut data = ndvi(&red.data, &nir.data)?;
    Zip::from(&mut data)
        .and(&red.mask)
        .and(&nir.mask)
        .for_each(|v, &red_valid, &nir_valid| {
            if !(red_valid && nir_valid) {
                *v = f64::NAN;
            }
        });
    Ok(NdviRaster {
        data,
        geo_transform: red.geo_transform.clone(),
        crs: red.crs,
    })
}
