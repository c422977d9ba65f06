static HEX_LUT: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Lowercase hex encoding, as used in SigV4 signatures and payload hashes
pub fn bytes_to_hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for v in bytes {
        out.push(HEX_LUT[(v >> 4) as usize]);
        out.push(HEX_LUT[(v & 0xF) as usize]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::bytes_to_hex_string;

    #[test]
    fn test_bytes_to_hex_string() {
        assert_eq!(bytes_to_hex_string(&[]), "");
        assert_eq!(bytes_to_hex_string(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
    }
}
