use crate::errors::Error;
/// Low-level byte conversion functions

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn native() -> ByteOrder {
        if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }
}

pub fn decode_u16(buf: [u8; 2], byte_order: ByteOrder) -> u16 {
    match byte_order {
        ByteOrder::LittleEndian => u16::from_le_bytes(buf),
        ByteOrder::BigEndian => u16::from_be_bytes(buf),
    }
}

pub fn decode_u32(buf: [u8; 4], byte_order: ByteOrder) -> u32 {
    match byte_order {
        ByteOrder::LittleEndian => u32::from_le_bytes(buf),
        ByteOrder::BigEndian => u32::from_be_bytes(buf),
    }
}

pub fn decode_u64(buf: [u8; 8], byte_order: ByteOrder) -> u64 {
    match byte_order {
        ByteOrder::LittleEndian => u64::from_le_bytes(buf),
        ByteOrder::BigEndian => u64::from_be_bytes(buf),
    }
}

pub fn decode_u16_from_slice(buf: &[u8], byte_order: ByteOrder) -> u16 {
    let mut data = [0u8; 2];
    data.copy_from_slice(&buf[..2]);
    decode_u16(data, byte_order)
}

pub fn decode_u32_from_slice(buf: &[u8], byte_order: ByteOrder) -> u32 {
    let mut data = [0u8; 4];
    data.copy_from_slice(&buf[..4]);
    decode_u32(data, byte_order)
}

pub fn decode_u64_from_slice(buf: &[u8], byte_order: ByteOrder) -> u64 {
    let mut data = [0u8; 8];
    data.copy_from_slice(&buf[..8]);
    decode_u64(data, byte_order)
}

pub fn decode_u32_pair(buf: [u8; 8], byte_order: ByteOrder) -> (u32, u32) {
    (
        decode_u32([buf[0], buf[1], buf[2], buf[3]], byte_order),
        decode_u32([buf[4], buf[5], buf[6], buf[7]], byte_order),
    )
}

pub fn decode_i8(buf: [u8; 1], _byte_order: ByteOrder) -> i8 {
    i8::from_ne_bytes(buf)
}

pub fn decode_i16(buf: [u8; 2], byte_order: ByteOrder) -> i16 {
    match byte_order {
        ByteOrder::LittleEndian => i16::from_le_bytes(buf),
        ByteOrder::BigEndian => i16::from_be_bytes(buf),
    }
}

pub fn decode_i32(buf: [u8; 4], byte_order: ByteOrder) -> i32 {
    match byte_order {
        ByteOrder::LittleEndian => i32::from_le_bytes(buf),
        ByteOrder::BigEndian => i32::from_be_bytes(buf),
    }
}

pub fn decode_i64(buf: [u8; 8], byte_order: ByteOrder) -> i64 {
    match byte_order {
        ByteOrder::LittleEndian => i64::from_le_bytes(buf),
        ByteOrder::BigEndian => i64::from_be_bytes(buf),
    }
}

pub fn decode_i32_pair(buf: [u8; 8], byte_order: ByteOrder) -> (i32, i32) {
    (
        decode_i32([buf[0], buf[1], buf[2], buf[3]], byte_order),
        decode_i32([buf[4], buf[5], buf[6], buf[7]], byte_order),
    )
}

pub fn decode_f32(buf: [u8; 4], byte_order: ByteOrder) -> f32 {
    match byte_order {
        ByteOrder::LittleEndian => f32::from_le_bytes(buf),
        ByteOrder::BigEndian => f32::from_be_bytes(buf),
    }
}

pub fn decode_f64(buf: [u8; 8], byte_order: ByteOrder) -> f64 {
    match byte_order {
        ByteOrder::LittleEndian => f64::from_le_bytes(buf),
        ByteOrder::BigEndian => f64::from_be_bytes(buf),
    }
}

/// Decodes a TIFF ASCII value. Trailing NULs are dropped, GDAL writes one but some
/// writers pad with several
pub fn decode_string(buf: &[u8], _byte_order: ByteOrder) -> Result<String, Error> {
    let end = buf
        .iter()
        .rposition(|v| *v != b'\0')
        .map(|p| p + 1)
        .unwrap_or(0);
    let mut str = String::with_capacity(end);
    for v in &buf[..end] {
        match char::from_u32(*v as u32) {
            None => {
                return Err(Error::InvalidData(format!("invalid character {:?}", v)));
            }
            Some('\0') => {
                return Err(Error::InvalidData(
                    "unexpected EOS character before count".to_string(),
                ))
            }
            Some(c) => str.push(c),
        }
    }
    Ok(str)
}

pub fn decode_vec<T, F, const N: usize>(
    buf: &[u8],
    count: usize,
    decode_fn: F,
    byte_order: ByteOrder,
) -> Vec<T>
where
    F: Fn([u8; N], ByteOrder) -> T,
{
    buf.chunks_exact(N)
        .take(count)
        .map(|chunk| {
            let mut data = [0u8; N];
            data.copy_from_slice(chunk);
            decode_fn(data, byte_order)
        })
        .collect()
}

/// Converts a buffer of `sample_size`-byte samples stored in `byte_order` to native order, in place
pub fn to_native_order(buf: &mut [u8], sample_size: usize, byte_order: ByteOrder) {
    if sample_size <= 1 || byte_order == ByteOrder::native() {
        return;
    }
    for sample in buf.chunks_exact_mut(sample_size) {
        sample.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vec_u16() {
        let buf = [1u8, 0, 2, 0, 3, 0];
        assert_eq!(
            decode_vec(&buf, 3, decode_u16, ByteOrder::LittleEndian),
            vec![1u16, 2, 3]
        );
        assert_eq!(
            decode_vec(&buf, 2, decode_u16, ByteOrder::BigEndian),
            vec![256u16, 512]
        );
    }

    #[test]
    fn test_decode_string_trailing_nuls() {
        let s = decode_string(b"-9999\0\0", ByteOrder::LittleEndian).unwrap();
        assert_eq!(s, "-9999");
    }

    #[test]
    fn test_decode_string_embedded_nul() {
        let res = decode_string(b"ab\0cd\0", ByteOrder::LittleEndian);
        assert!(matches!(res, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_to_native_order() {
        let mut buf = 0x0102u16.to_be_bytes().to_vec();
        buf.extend_from_slice(&0x0304u16.to_be_bytes());
        to_native_order(&mut buf, 2, ByteOrder::BigEndian);
        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 0x0102);
        assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), 0x0304);
    }
}
