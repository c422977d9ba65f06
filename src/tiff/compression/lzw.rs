use super::Error;
use weezl::{decode::Decoder, BitOrder};

// TIFF LZW: MSB-first codes, 8 bit symbols, and the code size switches one code
// earlier than in GIF
pub fn decompress_lzw(data: Vec<u8>) -> Result<Vec<u8>, Error> {
    Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .decode(&data)
        .map_err(|e| Error::DecompressionError(format!("lzw decompression error: {}", e)))
}
