use super::ifd::{IFDTag, ImageFileDirectory};
use crate::errors::Error;
use crate::image::SampleType;
use crate::sources::Source;

fn check_all_same(numbers: &[u16]) -> Result<u16, Error> {
    match numbers.split_first() {
        None => Err(Error::InvalidData(
            "Expected at least one value, got an empty list".to_string(),
        )),
        Some((first, rest)) if rest.iter().all(|v| v == first) => Ok(*first),
        Some(_) => Err(Error::InvalidData(format!(
            "Expected same value in whole list, got {:?}",
            numbers
        ))),
    }
}

/// Maps a (SampleFormat, BitsPerSample) pair to the sample type we decode to
pub fn sample_type_from_tags(sample_format: u16, bits_per_sample: u16) -> Result<SampleType, Error> {
    match (sample_format, bits_per_sample) {
        (1, 8) => Ok(SampleType::Uint8),
        (1, 16) => Ok(SampleType::Uint16),
        (1, 32) => Ok(SampleType::Uint32),
        (2, 8) => Ok(SampleType::Int8),
        (2, 16) => Ok(SampleType::Int16),
        (2, 32) => Ok(SampleType::Int32),
        (3, 32) => Ok(SampleType::Float32),
        (3, 64) => Ok(SampleType::Float64),
        _ => Err(Error::UnsupportedDataType(format!(
            "SampleFormat={}, BitsPerSample={}",
            sample_format, bits_per_sample
        ))),
    }
}

pub async fn sample_type_from_ifd(
    ifd: &ImageFileDirectory,
    source: &mut Source,
) -> Result<SampleType, Error> {
    // SampleFormat defaults to 1 (unsigned integer)
    let sample_format = if ifd.has_tag(IFDTag::SampleFormat) {
        check_all_same(
            &ifd.get_vec_short_tag_value(source, IFDTag::SampleFormat)
                .await?,
        )?
    } else {
        1
    };
    let bits_per_sample = check_all_same(
        &ifd.get_vec_short_tag_value(source, IFDTag::BitsPerSample)
            .await?,
    )?;
    sample_type_from_tags(sample_format, bits_per_sample)
}
