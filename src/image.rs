use ndarray::{Array2, Zip};

use crate::Error;

/// The pixel types we can decode. Samples are kept in their on-disk type and only
/// converted to f64 when computing
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum SampleType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Float64,
}

impl SampleType {
    pub fn size_bytes(&self) -> usize {
        match self {
            SampleType::Uint8 | SampleType::Int8 => 1,
            SampleType::Uint16 | SampleType::Int16 => 2,
            SampleType::Uint32 | SampleType::Int32 | SampleType::Float32 => 4,
            SampleType::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, SampleType::Float32 | SampleType::Float64)
    }
}

/// Conversions between a raster sample and f64
pub trait Sample: Copy {
    const SIZE: usize;
    fn from_ne_slice(buf: &[u8]) -> Self;
    fn to_f64(self) -> f64;
    /// Saturating for integers, NaN becomes 0
    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_sample {
    ($t:ty) => {
        impl Sample for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_ne_slice(buf: &[u8]) -> Self {
                let mut data = [0u8; std::mem::size_of::<$t>()];
                data.copy_from_slice(&buf[..Self::SIZE]);
                <$t>::from_ne_bytes(data)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(v: f64) -> Self {
                v as $t
            }
        }
    };
}

impl_sample!(u8);
impl_sample!(i8);
impl_sample!(u16);
impl_sample!(i16);
impl_sample!(u32);
impl_sample!(i32);
impl_sample!(f32);
impl_sample!(f64);

/// A single band of pixels, shaped (rows, cols)
#[derive(Debug, Clone, PartialEq)]
pub enum BandData {
    Uint8(Array2<u8>),
    Int8(Array2<i8>),
    Uint16(Array2<u16>),
    Int16(Array2<i16>),
    Uint32(Array2<u32>),
    Int32(Array2<i32>),
    Float32(Array2<f32>),
    Float64(Array2<f64>),
}

// Runs `$body` with `$arr` bound to the inner array, whatever its element type
macro_rules! with_array {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            BandData::Uint8($arr) => $body,
            BandData::Int8($arr) => $body,
            BandData::Uint16($arr) => $body,
            BandData::Int16($arr) => $body,
            BandData::Uint32($arr) => $body,
            BandData::Int32($arr) => $body,
            BandData::Float32($arr) => $body,
            BandData::Float64($arr) => $body,
        }
    };
}

fn array_from_ne_bytes<T: Sample>(
    shape: (usize, usize),
    bytes: &[u8],
) -> Result<Array2<T>, Error> {
    let values: Vec<T> = bytes.chunks_exact(T::SIZE).map(T::from_ne_slice).collect();
    Ok(Array2::from_shape_vec(shape, values)?)
}

impl BandData {
    /// Builds a band from row-major, native endian sample bytes
    pub fn from_ne_bytes(
        sample_type: SampleType,
        shape: (usize, usize),
        bytes: &[u8],
    ) -> Result<BandData, Error> {
        let expected = shape.0 * shape.1 * sample_type.size_bytes();
        if bytes.len() != expected {
            return Err(Error::InvalidData(format!(
                "expected {} bytes for a {:?} {:?} band, got {}",
                expected,
                shape,
                sample_type,
                bytes.len()
            )));
        }
        Ok(match sample_type {
            SampleType::Uint8 => BandData::Uint8(array_from_ne_bytes(shape, bytes)?),
            SampleType::Int8 => BandData::Int8(array_from_ne_bytes(shape, bytes)?),
            SampleType::Uint16 => BandData::Uint16(array_from_ne_bytes(shape, bytes)?),
            SampleType::Int16 => BandData::Int16(array_from_ne_bytes(shape, bytes)?),
            SampleType::Uint32 => BandData::Uint32(array_from_ne_bytes(shape, bytes)?),
            SampleType::Int32 => BandData::Int32(array_from_ne_bytes(shape, bytes)?),
            SampleType::Float32 => BandData::Float32(array_from_ne_bytes(shape, bytes)?),
            SampleType::Float64 => BandData::Float64(array_from_ne_bytes(shape, bytes)?),
        })
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            BandData::Uint8(_) => SampleType::Uint8,
            BandData::Int8(_) => SampleType::Int8,
            BandData::Uint16(_) => SampleType::Uint16,
            BandData::Int16(_) => SampleType::Int16,
            BandData::Uint32(_) => SampleType::Uint32,
            BandData::Int32(_) => SampleType::Int32,
            BandData::Float32(_) => SampleType::Float32,
            BandData::Float64(_) => SampleType::Float64,
        }
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        with_array!(self, arr => arr.dim())
    }

    pub fn get_f64(&self, row: usize, col: usize) -> Option<f64> {
        with_array!(self, arr => arr.get((row, col)).map(|v| v.to_f64()))
    }

    pub fn to_f64(&self) -> Array2<f64> {
        with_array!(self, arr => arr.mapv(|v| v.to_f64()))
    }

    /// Sets every pixel where `keep` is false to `value`, cast to the band's sample type
    pub fn fill_where_not(&mut self, keep: &Array2<bool>, value: f64) -> Result<(), Error> {
        if keep.dim() != self.shape() {
            return Err(Error::ShapeMismatch(format!(
                "mask shape {:?} != band shape {:?}",
                keep.dim(),
                self.shape()
            )));
        }
        with_array!(self, arr => {
            Zip::from(arr).and(keep).for_each(|v, &k| {
                if !k {
                    *v = Sample::from_f64(value);
                }
            });
        });
        Ok(())
    }

    /// Per pixel `is_nodata` test against a nodata value given as f64. A NaN nodata matches
    /// NaN pixels
    pub fn nodata_mask(&self, nodata: f64) -> Array2<bool> {
        with_array!(self, arr => arr.mapv(|v| {
            let v = v.to_f64();
            if nodata.is_nan() {
                v.is_nan()
            } else {
                v == nodata
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_ne_bytes() {
        let bytes: Vec<u8> = [1u16, 2, 3, 400, 500, 600]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        let band = BandData::from_ne_bytes(SampleType::Uint16, (2, 3), &bytes).unwrap();
        assert_eq!(band, BandData::Uint16(array![[1, 2, 3], [400, 500, 600]]));
        assert_eq!(band.shape(), (2, 3));
        assert_eq!(band.sample_type(), SampleType::Uint16);
        assert_eq!(band.get_f64(1, 2), Some(600.0));
        assert_eq!(band.get_f64(2, 0), None);
    }

    #[test]
    fn test_from_ne_bytes_wrong_len() {
        let res = BandData::from_ne_bytes(SampleType::Float32, (2, 2), &[0u8; 15]);
        assert!(matches!(res, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_fill_where_not_casts() {
        let mut band = BandData::Uint8(array![[1, 2], [3, 4]]);
        band.fill_where_not(&array![[true, false], [false, true]], 255.0)
            .unwrap();
        assert_eq!(band, BandData::Uint8(array![[1, 255], [255, 4]]));

        let mut band = BandData::Int16(array![[1, 2]]);
        band.fill_where_not(&array![[false, true]], -9999.0).unwrap();
        assert_eq!(band, BandData::Int16(array![[-9999, 2]]));
    }

    #[test]
    fn test_fill_where_not_shape_mismatch() {
        let mut band = BandData::Uint8(array![[1, 2], [3, 4]]);
        let res = band.fill_where_not(&array![[true, false]], 0.0);
        assert!(matches!(res, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_nodata_mask() {
        let band = BandData::Float32(array![[f32::NAN, 1.0], [0.0, -1.0]]);
        assert_eq!(
            band.nodata_mask(f64::NAN),
            array![[true, false], [false, false]]
        );
        assert_eq!(band.nodata_mask(0.0), array![[false, false], [true, false]]);
    }

    #[test]
    fn test_to_f64() {
        let band = BandData::Int8(array![[-3, 4]]);
        assert_eq!(band.to_f64(), array![[-3.0, 4.0]]);
    }
}
