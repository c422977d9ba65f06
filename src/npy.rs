use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;

/// Small utility functions to write .npy files. Handy to inspect results using python
/// https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html

pub trait NpyElement: Copy {
    /// numpy dtype descriptor, always little endian
    const DESCR: &'static str;
    fn write_le<W: Write>(&self, w: &mut W) -> io::Result<()>;
}

impl NpyElement for f64 {
    const DESCR: &'static str = "<f8";
    fn write_le<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_le_bytes())
    }
}

impl NpyElement for f32 {
    const DESCR: &'static str = "<f4";
    fn write_le<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_le_bytes())
    }
}

impl NpyElement for bool {
    const DESCR: &'static str = "|b1";
    fn write_le<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&[*self as u8])
    }
}

fn header(descr: &str, shape: (usize, usize)) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}), }}",
        descr, shape.0, shape.1
    );
    let magic = [0x93u8, b'N', b'U', b'M', b'P', b'Y', 0x01, 0x00];
    // magic + header len + dict + padding + '\n' must be a multiple of 64
    let size = magic.len() + 2 + dict.len() + 1;
    let padding = (64 - size % 64) % 64;
    let header_len = (dict.len() + padding + 1) as u16;
    let mut out = Vec::with_capacity(size + padding);
    out.extend_from_slice(&magic);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    out
}

/// Writes a 2D array in C order
pub fn write_npy<T: NpyElement>(path: &Path, array: &Array2<T>) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&header(T::DESCR, array.dim()))?;
    // iter() walks in logical (row major) order whatever the memory layout
    for v in array.iter() {
        v.write_le(&mut w)?;
    }
    w.flush()
}

pub fn write_f64_npy(path: &Path, array: &Array2<f64>) -> io::Result<()> {
    write_npy(path, array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_header_alignment() {
        let h = header("<f8", (10980, 10980));
        assert_eq!(h.len() % 64, 0);
        assert_eq!(&h[..6], b"\x93NUMPY");
        assert_eq!(*h.last().unwrap(), b'\n');
        let header_len = u16::from_le_bytes([h[8], h[9]]) as usize;
        assert_eq!(header_len + 10, h.len());
    }

    #[test]
    fn test_write_f64_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ndvi.npy");
        // Transposed view to check we write in logical order
        let arr = array![[1.0, 3.0], [2.0, 4.0], [f64::NAN, 5.0]];
        write_f64_npy(&path, &arr.t().to_owned()).unwrap();
        let data = std::fs::read(&path).unwrap();
        let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
        let header = std::str::from_utf8(&data[10..10 + header_len]).unwrap();
        assert!(header.contains("'descr': '<f8'"));
        assert!(header.contains("'shape': (2, 3)"));
        let values: Vec<f64> = data[10 + header_len..]
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values.len(), 6);
        assert_eq!(&values[..2], &[1.0, 2.0]);
        assert!(values[2].is_nan());
        assert_eq!(&values[3..], &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_write_bool_npy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.npy");
        write_npy(&path, &array![[true, false, true]]).unwrap();
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 128 + 3);
        assert_eq!(&data[128..], &[1, 0, 1]);
    }
}
