/// TIFF predictors, see section 14 of the TIFF 6.0 spec and Adobe's technical note 3 for
/// the floating point one
use crate::errors::Error;
use crate::tiff::ifd::IFDTag;
use crate::tiff::low_level::{to_native_order, ByteOrder};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum Predictor {
    None,
    Horizontal,
    FloatingPoint,
}

macro_rules! undo_horizontal_as {
    ($t:ty, $row:expr, $stride:expr) => {{
        const SIZE: usize = std::mem::size_of::<$t>();
        let row: &mut [u8] = $row;
        for k in $stride..row.len() / SIZE {
            let mut prev = [0u8; SIZE];
            prev.copy_from_slice(&row[(k - $stride) * SIZE..(k - $stride + 1) * SIZE]);
            let mut cur = [0u8; SIZE];
            cur.copy_from_slice(&row[k * SIZE..(k + 1) * SIZE]);
            let v = <$t>::from_ne_bytes(cur).wrapping_add(<$t>::from_ne_bytes(prev));
            row[k * SIZE..(k + 1) * SIZE].copy_from_slice(&v.to_ne_bytes());
        }
    }};
}

impl Predictor {
    pub fn from_predictor_tag(value: u16) -> Result<Predictor, Error> {
        match value {
            1 => Ok(Predictor::None),
            2 => Ok(Predictor::Horizontal),
            3 => Ok(Predictor::FloatingPoint),
            v => Err(Error::UnsupportedTagValue(IFDTag::Predictor, format!("{}", v))),
        }
    }

    /// Reverts the predictor on a decompressed tile and returns its samples in native
    /// byte order. `samples_per_row` counts samples (pixels * samples per pixel), `stride`
    /// is the number of samples per pixel
    pub fn decode_tile(
        &self,
        mut tile: Vec<u8>,
        samples_per_row: usize,
        stride: usize,
        sample_size: usize,
        byte_order: ByteOrder,
    ) -> Result<Vec<u8>, Error> {
        let row_bytes = samples_per_row * sample_size;
        if row_bytes == 0 || tile.len() % row_bytes != 0 {
            return Err(Error::InvalidData(format!(
                "tile of {} bytes is not a whole number of {} bytes rows",
                tile.len(),
                row_bytes
            )));
        }
        match self {
            Predictor::None => {
                to_native_order(&mut tile, sample_size, byte_order);
                Ok(tile)
            }
            Predictor::Horizontal => {
                to_native_order(&mut tile, sample_size, byte_order);
                for row in tile.chunks_exact_mut(row_bytes) {
                    match sample_size {
                        1 => undo_horizontal_as!(u8, row, stride),
                        2 => undo_horizontal_as!(u16, row, stride),
                        4 => undo_horizontal_as!(u32, row, stride),
                        8 => undo_horizontal_as!(u64, row, stride),
                        s => {
                            return Err(Error::UnsupportedDataType(format!(
                                "horizontal predictor with {} bytes samples",
                                s
                            )))
                        }
                    }
                }
                Ok(tile)
            }
            Predictor::FloatingPoint => {
                let mut out = vec![0u8; tile.len()];
                for (row, out_row) in tile
                    .chunks_exact_mut(row_bytes)
                    .zip(out.chunks_exact_mut(row_bytes))
                {
                    // Byte-wise differencing over the whole row
                    for k in stride..row.len() {
                        row[k] = row[k].wrapping_add(row[k - stride]);
                    }
                    // The row holds byte planes, most significant byte first
                    for s in 0..samples_per_row {
                        for b in 0..sample_size {
                            out_row[s * sample_size + b] = row[b * samples_per_row + s];
                        }
                    }
                }
                to_native_order(&mut out, sample_size, ByteOrder::BigEndian);
                Ok(out)
            }
        }
    }
}
