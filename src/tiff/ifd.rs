/// Base functionality to read TIFF IFDs (ImageFileDirectory)
///
/// Tag values stored out of line are not loaded when the IFD is parsed, they are fetched
/// from the source on demand. This matters for COGs where TileOffsets/TileByteCounts of
/// the full resolution image can be large.
use std::collections::HashSet;

use tracing::{debug, warn};

use super::low_level::*;
use crate::errors::Error;
use crate::sources::Source;

// Upper bound on the number of entries in a single IFD, to avoid huge allocations on
// corrupted files
const MAX_IFD_ENTRIES: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
enum IFDType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SignedByte,
    SignedShort,
    SignedLong,
    SignedRational,
    Float,
    Double,
    UndefinedRawBytes,
    // BigTIFF only
    Long8,
    SignedLong8,
    Ifd8,
}

impl IFDType {
    fn decode(v: u16) -> Option<IFDType> {
        match v {
            1 => Some(IFDType::Byte),
            2 => Some(IFDType::Ascii),
            3 => Some(IFDType::Short),
            4 => Some(IFDType::Long),
            5 => Some(IFDType::Rational),
            6 => Some(IFDType::SignedByte),
            7 => Some(IFDType::UndefinedRawBytes),
            8 => Some(IFDType::SignedShort),
            9 => Some(IFDType::SignedLong),
            10 => Some(IFDType::SignedRational),
            11 => Some(IFDType::Float),
            12 => Some(IFDType::Double),
            16 => Some(IFDType::Long8),
            17 => Some(IFDType::SignedLong8),
            18 => Some(IFDType::Ifd8),
            _ => None,
        }
    }

    fn size(&self) -> u64 {
        match self {
            IFDType::Byte
            | IFDType::Ascii
            | IFDType::SignedByte
            | IFDType::UndefinedRawBytes => 1,
            IFDType::Short | IFDType::SignedShort => 2,
            IFDType::Long | IFDType::SignedLong | IFDType::Float => 4,
            IFDType::Rational
            | IFDType::SignedRational
            | IFDType::Double
            | IFDType::Long8
            | IFDType::SignedLong8
            | IFDType::Ifd8 => 8,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum IFDValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SignedByte(Vec<i8>),
    UndefinedRawBytes(Vec<u8>), // For arbitrary bytes values
    SignedShort(Vec<i16>),
    SignedLong(Vec<i32>),
    SignedRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Long8(Vec<u64>),
    SignedLong8(Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum IFDTag {
    NewSubfileType,
    ImageWidth,
    ImageLength,
    BitsPerSample,
    Compression,
    PhotometricInterpretation,
    StripOffsets,
    Orientation,
    SamplesPerPixel,
    RowsPerStrip,
    StripByteCounts,
    PlanarConfiguration,
    Predictor,
    Colormap,
    TileWidth,
    TileLength,
    TileOffsets,
    TileByteCounts,
    ExtraSamples,
    SampleFormat,
    // Geotiff tags
    ModelPixelScaleTag,
    ModelTiepointTag,
    ModelTransformationTag,
    GeoKeyDirectoryTag,
    GeoDoubleParamsTag,
    GeoAsciiParamsTag,
    // GDAL specific: https://www.awaresystems.be/imaging/tiff/tifftags/gdal_metadata.html
    GdalMetadata,
    // https://www.awaresystems.be/imaging/tiff/tifftags/gdal_nodata.html
    GdalNodata,
    UnknownTag(u16),
}

fn decode_tag(tag: u16) -> IFDTag {
    match tag {
        254 => IFDTag::NewSubfileType,
        256 => IFDTag::ImageWidth,
        257 => IFDTag::ImageLength,
        258 => IFDTag::BitsPerSample,
        259 => IFDTag::Compression,
        262 => IFDTag::PhotometricInterpretation,
        273 => IFDTag::StripOffsets,
        274 => IFDTag::Orientation,
        277 => IFDTag::SamplesPerPixel,
        278 => IFDTag::RowsPerStrip,
        279 => IFDTag::StripByteCounts,
        284 => IFDTag::PlanarConfiguration,
        317 => IFDTag::Predictor,
        320 => IFDTag::Colormap,
        322 => IFDTag::TileWidth,
        323 => IFDTag::TileLength,
        324 => IFDTag::TileOffsets,
        325 => IFDTag::TileByteCounts,
        338 => IFDTag::ExtraSamples,
        339 => IFDTag::SampleFormat,
        33550 => IFDTag::ModelPixelScaleTag,
        33922 => IFDTag::ModelTiepointTag,
        34264 => IFDTag::ModelTransformationTag,
        34735 => IFDTag::GeoKeyDirectoryTag,
        34736 => IFDTag::GeoDoubleParamsTag,
        34737 => IFDTag::GeoAsciiParamsTag,
        42112 => IFDTag::GdalMetadata,
        42113 => IFDTag::GdalNodata,
        v => IFDTag::UnknownTag(v),
    }
}

/// Classic TIFF (magic 42) or BigTIFF (magic 43). They differ by the width of counts and
/// offsets in the IFDs
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum TIFFVariant {
    Classic,
    BigTIFF,
}

impl TIFFVariant {
    fn offset_size(&self) -> u64 {
        match self {
            TIFFVariant::Classic => 4,
            TIFFVariant::BigTIFF => 8,
        }
    }

    fn count_size(&self) -> u64 {
        match self {
            TIFFVariant::Classic => 2,
            TIFFVariant::BigTIFF => 8,
        }
    }

    fn entry_size(&self) -> u64 {
        match self {
            TIFFVariant::Classic => 12,
            TIFFVariant::BigTIFF => 20,
        }
    }

    fn decode_offset(&self, buf: &[u8], byte_order: ByteOrder) -> u64 {
        match self {
            TIFFVariant::Classic => decode_u32_from_slice(buf, byte_order) as u64,
            TIFFVariant::BigTIFF => decode_u64_from_slice(buf, byte_order),
        }
    }
}

#[derive(Debug, Clone)]
enum OffsetOrInlineValue {
    Offset(u64),
    InlineValue(Vec<u8>),
}

#[derive(Debug, Clone)]
struct IFDEntryMetadata {
    tag: IFDTag,
    field_type: IFDType,
    count: u64,
    value: OffsetOrInlineValue,
}

impl IFDEntryMetadata {
    // Parses one entry from its raw bytes. Returns None for entries we can't interpret
    // (unknown type, zero count) which are ignored
    fn parse(buf: &[u8], byte_order: ByteOrder, variant: TIFFVariant) -> Option<IFDEntryMetadata> {
        let raw_tag = decode_u16_from_slice(&buf[0..2], byte_order);
        let raw_type = decode_u16_from_slice(&buf[2..4], byte_order);
        let Some(field_type) = IFDType::decode(raw_type) else {
            warn!("ignoring tag {} with unknown field type {}", raw_tag, raw_type);
            return None;
        };
        let (count, value_bytes) = match variant {
            TIFFVariant::Classic => (decode_u32_from_slice(&buf[4..8], byte_order) as u64, &buf[8..12]),
            TIFFVariant::BigTIFF => (decode_u64_from_slice(&buf[4..12], byte_order), &buf[12..20]),
        };
        if count == 0 {
            warn!("ignoring tag {} with count 0", raw_tag);
            return None;
        }
        let nbytes = field_type.size().saturating_mul(count);
        let value = if nbytes <= variant.offset_size() {
            OffsetOrInlineValue::InlineValue(value_bytes[..nbytes as usize].to_vec())
        } else {
            OffsetOrInlineValue::Offset(variant.decode_offset(value_bytes, byte_order))
        };
        Some(IFDEntryMetadata {
            tag: decode_tag(raw_tag),
            field_type,
            count,
            value,
        })
    }

    async fn read_value(&self, source: &mut Source, byte_order: ByteOrder) -> Result<IFDValue, Error> {
        let data = match &self.value {
            OffsetOrInlineValue::InlineValue(data) => data.clone(),
            OffsetOrInlineValue::Offset(offset) => {
                let nbytes = usize::try_from(self.field_type.size() * self.count).map_err(|_| {
                    Error::InvalidData(format!("tag {:?} too large: count={}", self.tag, self.count))
                })?;
                let mut data = vec![0u8; nbytes];
                source.read_exact(*offset, &mut data).await?;
                data
            }
        };
        let count = self.count as usize;
        let value = match self.field_type {
            IFDType::Byte => IFDValue::Byte(data),
            IFDType::Ascii => IFDValue::Ascii(decode_string(&data, byte_order)?),
            IFDType::Short => IFDValue::Short(decode_vec(&data, count, decode_u16, byte_order)),
            IFDType::Long => IFDValue::Long(decode_vec(&data, count, decode_u32, byte_order)),
            IFDType::Rational => {
                IFDValue::Rational(decode_vec(&data, count, decode_u32_pair, byte_order))
            }
            IFDType::SignedByte => {
                IFDValue::SignedByte(decode_vec(&data, count, decode_i8, byte_order))
            }
            IFDType::UndefinedRawBytes => IFDValue::UndefinedRawBytes(data),
            IFDType::SignedShort => {
                IFDValue::SignedShort(decode_vec(&data, count, decode_i16, byte_order))
            }
            IFDType::SignedLong => {
                IFDValue::SignedLong(decode_vec(&data, count, decode_i32, byte_order))
            }
            IFDType::SignedRational => {
                IFDValue::SignedRational(decode_vec(&data, count, decode_i32_pair, byte_order))
            }
            IFDType::Float => IFDValue::Float(decode_vec(&data, count, decode_f32, byte_order)),
            IFDType::Double => IFDValue::Double(decode_vec(&data, count, decode_f64, byte_order)),
            IFDType::Long8 | IFDType::Ifd8 => {
                IFDValue::Long8(decode_vec(&data, count, decode_u64, byte_order))
            }
            IFDType::SignedLong8 => {
                IFDValue::SignedLong8(decode_vec(&data, count, decode_i64, byte_order))
            }
        };
        Ok(value)
    }
}

#[derive(Debug, Clone)]
pub struct ImageFileDirectory {
    entries: Vec<IFDEntryMetadata>,
    byte_order: ByteOrder,
}

impl ImageFileDirectory {
    pub fn has_tag(&self, tag: IFDTag) -> bool {
        self.entries.iter().any(|e| e.tag == tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = IFDTag> + '_ {
        self.entries.iter().map(|e| e.tag)
    }

    pub async fn get_tag_value(&self, source: &mut Source, tag: IFDTag) -> Result<IFDValue, Error> {
        match self.entries.iter().find(|e| e.tag == tag) {
            Some(entry) => entry.read_value(source, self.byte_order).await,
            None => Err(Error::RequiredTagNotFound(tag)),
        }
    }

    /// Like `get_tag_value` but a missing tag is `Ok(None)`
    pub async fn get_optional_tag_value(
        &self,
        source: &mut Source,
        tag: IFDTag,
    ) -> Result<Option<IFDValue>, Error> {
        match self.get_tag_value(source, tag).await {
            Ok(v) => Ok(Some(v)),
            Err(Error::RequiredTagNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_usize_tag_value(&self, source: &mut Source, tag: IFDTag) -> Result<usize, Error> {
        let values = self.get_vec_usize_tag_value(source, tag).await?;
        match values[..] {
            [v] => Ok(v),
            _ => Err(Error::UnsupportedTagValue(
                tag,
                format!("expected a single value, got {:?}", values),
            )),
        }
    }

    pub async fn get_vec_usize_tag_value(
        &self,
        source: &mut Source,
        tag: IFDTag,
    ) -> Result<Vec<usize>, Error> {
        Ok(self
            .get_vec_u64_tag_value(source, tag)
            .await?
            .into_iter()
            .map(|v| v as usize)
            .collect())
    }

    pub async fn get_vec_u64_tag_value(
        &self,
        source: &mut Source,
        tag: IFDTag,
    ) -> Result<Vec<u64>, Error> {
        match self.get_tag_value(source, tag).await? {
            IFDValue::Short(values) => Ok(values.iter().map(|v| *v as u64).collect()),
            IFDValue::Long(values) => Ok(values.iter().map(|v| *v as u64).collect()),
            IFDValue::Long8(values) => Ok(values),
            value => Err(Error::TagHasWrongType(tag, value)),
        }
    }

    pub async fn get_vec_short_tag_value(
        &self,
        source: &mut Source,
        tag: IFDTag,
    ) -> Result<Vec<u16>, Error> {
        match self.get_tag_value(source, tag).await? {
            IFDValue::Short(values) => Ok(values),
            value => Err(Error::TagHasWrongType(tag, value)),
        }
    }

    pub async fn get_vec_double_tag_value(
        &self,
        source: &mut Source,
        tag: IFDTag,
    ) -> Result<Vec<f64>, Error> {
        match self.get_tag_value(source, tag).await? {
            IFDValue::Double(values) => Ok(values),
            value => Err(Error::TagHasWrongType(tag, value)),
        }
    }

    pub async fn get_string_tag_value(&self, source: &mut Source, tag: IFDTag) -> Result<String, Error> {
        match self.get_tag_value(source, tag).await? {
            IFDValue::Ascii(s) => Ok(s),
            value => Err(Error::TagHasWrongType(tag, value)),
        }
    }
}

async fn read_image_file_directory(
    source: &mut Source,
    offset: u64,
    byte_order: ByteOrder,
    variant: TIFFVariant,
) -> Result<(ImageFileDirectory, u64), Error> {
    let fields_count = {
        let mut buf = vec![0u8; variant.count_size() as usize];
        source.read_exact(offset, &mut buf).await?;
        match variant {
            TIFFVariant::Classic => decode_u16_from_slice(&buf, byte_order) as u64,
            TIFFVariant::BigTIFF => decode_u64_from_slice(&buf, byte_order),
        }
    };
    if fields_count > MAX_IFD_ENTRIES {
        return Err(Error::InvalidData(format!(
            "IFD at offset {} has too many entries: {}",
            offset, fields_count
        )));
    }
    // Entries and next IFD offset are contiguous so we read them at once
    let entries_size = fields_count * variant.entry_size();
    let mut buf = vec![0u8; (entries_size + variant.offset_size()) as usize];
    source
        .read_exact(offset + variant.count_size(), &mut buf)
        .await?;
    let entries: Vec<IFDEntryMetadata> = buf[..entries_size as usize]
        .chunks_exact(variant.entry_size() as usize)
        .filter_map(|raw| IFDEntryMetadata::parse(raw, byte_order, variant))
        .collect();
    let next_ifd_offset = variant.decode_offset(&buf[entries_size as usize..], byte_order);
    Ok((
        ImageFileDirectory {
            entries,
            byte_order,
        },
        next_ifd_offset,
    ))
}

#[derive(Debug)]
pub struct TIFFReader {
    pub ifds: Vec<ImageFileDirectory>,
    pub byte_order: ByteOrder,
    pub variant: TIFFVariant,
    pub source: Source,
}

impl TIFFReader {
    pub async fn open_from_source(mut source: Source) -> Result<TIFFReader, Error> {
        let mut header = [0u8; 8];
        source.read_exact(0, &mut header).await?;
        // Byte order & magic number check
        let byte_order = match header[0..2] {
            [0x49, 0x49] => ByteOrder::LittleEndian,
            [0x4D, 0x4D] => ByteOrder::BigEndian,
            _ => {
                return Err(Error::InvalidData(format!(
                    "Invalid byte_order {:?}",
                    &header[0..2]
                )))
            }
        };
        let (variant, first_ifd_offset) = match decode_u16_from_slice(&header[2..4], byte_order) {
            42 => (
                TIFFVariant::Classic,
                decode_u32_from_slice(&header[4..8], byte_order) as u64,
            ),
            43 => {
                let offset_size = decode_u16_from_slice(&header[4..6], byte_order);
                if offset_size != 8 {
                    return Err(Error::InvalidData(format!(
                        "Unsupported BigTIFF offset size {}",
                        offset_size
                    )));
                }
                let mut buf = [0u8; 8];
                source.read_exact(8, &mut buf).await?;
                (TIFFVariant::BigTIFF, decode_u64(buf, byte_order))
            }
            magic_number => {
                return Err(Error::InvalidData(format!(
                    "Invalid magic_number {:?}",
                    magic_number
                )))
            }
        };

        let mut ifds = vec![];
        let mut visited = HashSet::new();
        let mut ifd_offset = first_ifd_offset;
        while ifd_offset > 0 {
            if !visited.insert(ifd_offset) {
                return Err(Error::InvalidData(format!(
                    "IFD loop detected at offset {}",
                    ifd_offset
                )));
            }
            let (ifd, next_ifd_offset) =
                read_image_file_directory(&mut source, ifd_offset, byte_order, variant).await?;
            ifd_offset = next_ifd_offset;
            ifds.push(ifd);
        }
        debug!(
            "read {} IFDs ({:?}, {:?}) from {:?}",
            ifds.len(),
            variant,
            byte_order,
            source
        );

        Ok(TIFFReader {
            ifds,
            byte_order,
            variant,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testutils::geotiff::{GeoTiffBuilder, SampleKind};

    fn small_tiff(bigtiff: bool, big_endian: bool) -> Vec<u8> {
        GeoTiffBuilder::new(20, 10, SampleKind::U16)
            .tile_size(16, 16)
            .values((0..200).map(|v| v as f64).collect())
            .bigtiff(bigtiff)
            .big_endian(big_endian)
            .nodata("65535")
            .build()
    }

    #[tokio::test]
    async fn test_read_classic_ifd() {
        let mut reader = TIFFReader::open_from_source(Source::from_memory(small_tiff(false, false)))
            .await
            .unwrap();
        assert_eq!(reader.variant, TIFFVariant::Classic);
        assert_eq!(reader.byte_order, ByteOrder::LittleEndian);
        assert_eq!(reader.ifds.len(), 1);
        let ifd = reader.ifds[0].clone();
        assert_eq!(
            ifd.get_usize_tag_value(&mut reader.source, IFDTag::ImageWidth)
                .await
                .unwrap(),
            20
        );
        assert_eq!(
            ifd.get_string_tag_value(&mut reader.source, IFDTag::GdalNodata)
                .await
                .unwrap(),
            "65535"
        );
        // 2 x 1 tiles
        assert_eq!(
            ifd.get_vec_u64_tag_value(&mut reader.source, IFDTag::TileByteCounts)
                .await
                .unwrap(),
            vec![16 * 16 * 2, 16 * 16 * 2]
        );
    }

    #[tokio::test]
    async fn test_read_bigtiff_big_endian_ifd() {
        let mut reader = TIFFReader::open_from_source(Source::from_memory(small_tiff(true, true)))
            .await
            .unwrap();
        assert_eq!(reader.variant, TIFFVariant::BigTIFF);
        assert_eq!(reader.byte_order, ByteOrder::BigEndian);
        let ifd = reader.ifds[0].clone();
        assert_eq!(
            ifd.get_usize_tag_value(&mut reader.source, IFDTag::ImageLength)
                .await
                .unwrap(),
            10
        );
        let scale = ifd
            .get_vec_double_tag_value(&mut reader.source, IFDTag::ModelPixelScaleTag)
            .await
            .unwrap();
        assert_eq!(scale.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_tag() {
        let mut reader = TIFFReader::open_from_source(Source::from_memory(small_tiff(false, false)))
            .await
            .unwrap();
        let ifd = reader.ifds[0].clone();
        assert!(!ifd.has_tag(IFDTag::Predictor));
        assert!(ifd
            .get_optional_tag_value(&mut reader.source, IFDTag::Predictor)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            ifd.get_tag_value(&mut reader.source, IFDTag::Predictor).await,
            Err(Error::RequiredTagNotFound(IFDTag::Predictor))
        ));
    }

    #[tokio::test]
    async fn test_not_a_tiff() {
        let res = TIFFReader::open_from_source(Source::from_memory(b"GIF89a\0\0\0\0".to_vec())).await;
        assert!(matches!(res, Err(Error::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_ifd_loop_detected() {
        // Header pointing at an IFD with no entries whose next offset points back at itself
        let mut data = vec![0x49, 0x49, 42, 0, 8, 0, 0, 0];
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        let res = TIFFReader::open_from_source(Source::from_memory(data)).await;
        assert!(matches!(res, Err(Error::InvalidData(_))));
    }
}
