/// GeoKeyDirectory decoding, see section 7.1.4 of the OGC GeoTIFF standard
/// https://docs.ogc.org/is/19-008r4/19-008r4.html
use super::ifd::{IFDTag, ImageFileDirectory};
use crate::{sources::Source, Error};

// TIFFTagLocation values a key can point at
const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
const GEO_DOUBLE_PARAMS_TAG: u16 = 34736;
const GEO_ASCII_PARAMS_TAG: u16 = 34737;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum KeyID {
    GTModelType,
    GTRasterType,
    GTCitation,
    GeodeticCRS,
    GeogCitation,
    GeodeticLinearUnits,
    GeodeticAngularUnits,
    EllipsoidSemiMajorAxis,
    EllipsoidInvFlattening,
    ProjectedCRS,
    ProjectedCitation,
    ProjLinearUnits,
    UnknownKey(u16),
}

fn decode_key_id(v: u16) -> KeyID {
    match v {
        1024 => KeyID::GTModelType,
        1025 => KeyID::GTRasterType,
        1026 => KeyID::GTCitation,
        2048 => KeyID::GeodeticCRS,
        2049 => KeyID::GeogCitation,
        2052 => KeyID::GeodeticLinearUnits,
        2054 => KeyID::GeodeticAngularUnits,
        2057 => KeyID::EllipsoidSemiMajorAxis,
        2059 => KeyID::EllipsoidInvFlattening,
        3072 => KeyID::ProjectedCRS,
        3073 => KeyID::ProjectedCitation,
        3076 => KeyID::ProjLinearUnits,
        v => KeyID::UnknownKey(v),
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum KeyValue {
    Short(Vec<u16>),
    Ascii(String),
    Double(Vec<f64>),
}

// Parameter arrays keys can reference. Loaded once per directory
struct Params {
    directory: Vec<u16>,
    doubles: Option<Vec<f64>>,
    ascii: Option<String>,
}

fn param_range(
    name: &str,
    value_offset: u16,
    count: u16,
    len: usize,
) -> Result<std::ops::Range<usize>, Error> {
    let start = value_offset as usize;
    let end = start + count as usize;
    if end > len {
        return Err(Error::NotACOG(format!(
            "Out of bounds read on {}, got range {} to {}, len is {}",
            name, start, end, len
        )));
    }
    Ok(start..end)
}

fn decode_key(data: &[u16], params: &Params) -> Result<(KeyID, KeyValue), Error> {
    let id = decode_key_id(data[0]);
    let (location, count, value_offset) = (data[1], data[2], data[3]);
    let value = match location {
        0 => {
            if count != 1 {
                return Err(Error::NotACOG(format!(
                    "Got TIFFTagLocation=0, but count != 1, got {}",
                    count
                )));
            }
            KeyValue::Short(vec![value_offset])
        }
        GEO_DOUBLE_PARAMS_TAG => {
            let values = params
                .doubles
                .as_ref()
                .ok_or(Error::RequiredTagNotFound(IFDTag::GeoDoubleParamsTag))?;
            let range = param_range("GeoDoubleParamsTag", value_offset, count, values.len())?;
            KeyValue::Double(values[range].to_vec())
        }
        GEO_ASCII_PARAMS_TAG => {
            let values = params
                .ascii
                .as_ref()
                .ok_or(Error::RequiredTagNotFound(IFDTag::GeoAsciiParamsTag))?;
            let range = param_range("GeoAsciiParamsTag", value_offset, count, values.len())?;
            // '|' terminates each string in GeoAsciiParams (B.1.4 "Note on ASCII Keys")
            let val = &values[range];
            KeyValue::Ascii(val.strip_suffix('|').unwrap_or(val).to_string())
        }
        GEO_KEY_DIRECTORY_TAG => {
            let range = param_range(
                "GeoKeyDirectoryTag",
                value_offset,
                count,
                params.directory.len(),
            )?;
            KeyValue::Short(params.directory[range].to_vec())
        }
        v => {
            return Err(Error::NotACOG(format!(
                "Got invalid TIFFTagLocation: {}",
                v
            )))
        }
    };
    Ok((id, value))
}

#[derive(Debug)]
pub struct GeoKeyDirectory {
    keys: Vec<(KeyID, KeyValue)>,
}

impl GeoKeyDirectory {
    pub fn keys(&self) -> impl Iterator<Item = &(KeyID, KeyValue)> {
        self.keys.iter()
    }

    pub fn get_key_value(&self, id: KeyID) -> Result<&KeyValue, Error> {
        self.keys
            .iter()
            .find(|(key_id, _)| *key_id == id)
            .map(|(_, value)| value)
            .ok_or(Error::RequiredGeoKeyNotFound(id))
    }

    pub fn get_short_key_value(&self, id: KeyID) -> Result<u16, Error> {
        match self.get_key_value(id)? {
            KeyValue::Short(values) if values.len() == 1 => Ok(values[0]),
            value => Err(Error::GeoKeyHasWrongType(id, value.clone())),
        }
    }

    pub fn get_optional_short_key_value(&self, id: KeyID) -> Result<Option<u16>, Error> {
        match self.get_short_key_value(id) {
            Ok(v) => Ok(Some(v)),
            Err(Error::RequiredGeoKeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn from_ifd(
        ifd: &ImageFileDirectory,
        source: &mut Source,
    ) -> Result<GeoKeyDirectory, Error> {
        let directory = ifd
            .get_vec_short_tag_value(source, IFDTag::GeoKeyDirectoryTag)
            .await?;
        if directory.len() < 4 {
            return Err(Error::NotACOG(format!(
                "GeoKeyDirectoryTag len < 4: {}",
                directory.len(),
            )));
        }
        // Header is KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys
        let (version, revision, minor) = (directory[0], directory[1], directory[2]);
        if version != 1 || revision != 1 || minor > 1 {
            return Err(Error::NotACOG(format!(
                "Unsupported GeoKeyDirectoryTag version {}.{}.{}",
                version, revision, minor
            )));
        }
        let keys_count = directory[3] as usize;
        let expected_min_len = 4 + keys_count * 4;
        if directory.len() < expected_min_len {
            return Err(Error::NotACOG(format!(
                "GeoKeyDirectoryTag keys_count={}, so expected a min len of {}; got {}",
                keys_count,
                expected_min_len,
                directory.len()
            )));
        }

        let doubles = if ifd.has_tag(IFDTag::GeoDoubleParamsTag) {
            Some(
                ifd.get_vec_double_tag_value(source, IFDTag::GeoDoubleParamsTag)
                    .await?,
            )
        } else {
            None
        };
        let ascii = if ifd.has_tag(IFDTag::GeoAsciiParamsTag) {
            Some(
                ifd.get_string_tag_value(source, IFDTag::GeoAsciiParamsTag)
                    .await?,
            )
        } else {
            None
        };
        let params = Params {
            directory,
            doubles,
            ascii,
        };
        let keys = params.directory[4..expected_min_len]
            .chunks_exact(4)
            .map(|key_data| decode_key(key_data, &params))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(GeoKeyDirectory { keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        Params {
            directory: vec![1, 1, 0, 2, 3072, 0, 1, 32636, 1026, 34737, 7, 0],
            doubles: Some(vec![6378137.0, 298.257223563]),
            ascii: Some("UTM 36N|WGS 84|".to_string()),
        }
    }

    #[test]
    fn test_decode_inline_key() {
        let (id, value) = decode_key(&[3072, 0, 1, 32636], &params()).unwrap();
        assert_eq!(id, KeyID::ProjectedCRS);
        assert!(matches!(value, KeyValue::Short(v) if v == vec![32636]));
    }

    #[test]
    fn test_decode_ascii_key() {
        let (id, value) = decode_key(&[2049, GEO_ASCII_PARAMS_TAG, 7, 8], &params()).unwrap();
        assert_eq!(id, KeyID::GeogCitation);
        assert!(matches!(value, KeyValue::Ascii(s) if s == "WGS 84"));
    }

    #[test]
    fn test_decode_double_key() {
        let (_, value) = decode_key(&[2059, GEO_DOUBLE_PARAMS_TAG, 1, 1], &params()).unwrap();
        assert!(matches!(value, KeyValue::Double(v) if v == vec![298.257223563]));
    }

    #[test]
    fn test_decode_out_of_bounds_key() {
        let res = decode_key(&[2059, GEO_DOUBLE_PARAMS_TAG, 2, 1], &params());
        assert!(matches!(res, Err(Error::NotACOG(_))));
    }

    #[test]
    fn test_short_key_wrong_type() {
        let directory = GeoKeyDirectory {
            keys: vec![(KeyID::GTCitation, KeyValue::Ascii("x".to_string()))],
        };
        assert!(matches!(
            directory.get_short_key_value(KeyID::GTCitation),
            Err(Error::GeoKeyHasWrongType(KeyID::GTCitation, _))
        ));
        assert!(directory
            .get_optional_short_key_value(KeyID::GTRasterType)
            .unwrap()
            .is_none());
    }
}
