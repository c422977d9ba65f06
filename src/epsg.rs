/// Utilities related to EPSG
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum UnitOfMeasure {
    LinearMeter, // https://epsg.io/9001-units
    Degree,      // https://epsg.io/9102-units
    Unknown(u16),
}

impl UnitOfMeasure {
    pub fn decode(v: u16) -> UnitOfMeasure {
        match v {
            9001 => UnitOfMeasure::LinearMeter,
            9102 => UnitOfMeasure::Degree,
            v => UnitOfMeasure::Unknown(v),
        }
    }
}

/// A coordinate reference system identified by its EPSG code. A few common ones get a
/// variant of their own, `Crs::decode` normalizes so two `Crs` for the same code compare equal
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum Crs {
    Wgs84,
    PseudoMercator,
    UtmNorth(u8),
    UtmSouth(u8),
    Other(u16),
}

impl Crs {
    pub fn decode(v: u16) -> Crs {
        match v {
            4326 => Crs::Wgs84,
            3857 => Crs::PseudoMercator,
            32601..=32660 => Crs::UtmNorth((v - 32600) as u8),
            32701..=32760 => Crs::UtmSouth((v - 32700) as u8),
            v => Crs::Other(v),
        }
    }

    pub fn epsg_code(&self) -> u16 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::PseudoMercator => 3857,
            Crs::UtmNorth(zone) => 32600 + *zone as u16,
            Crs::UtmSouth(zone) => 32700 + *zone as u16,
            Crs::Other(v) => *v,
        }
    }

    /// Parses the usual textual forms: `EPSG:32636`, `epsg:4326`,
    /// `urn:ogc:def:crs:EPSG::32636`, `urn:ogc:def:crs:OGC:1.3:CRS84` or a bare code
    pub fn from_name(name: &str) -> Option<Crs> {
        let name = name.trim();
        if name.ends_with("CRS84") {
            return Some(Crs::Wgs84);
        }
        let code = match name.rsplit_once(':') {
            Some((prefix, code)) if prefix.to_ascii_uppercase().contains("EPSG") => code,
            Some(_) => return None,
            None => name,
        };
        code.parse::<u16>().ok().map(Crs::decode)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_roundtrips_code() {
        for code in [4326, 3857, 32636, 32736, 2154] {
            assert_eq!(Crs::decode(code).epsg_code(), code);
        }
        assert_eq!(Crs::decode(32636), Crs::UtmNorth(36));
        assert_eq!(Crs::decode(32736), Crs::UtmSouth(36));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Crs::from_name("EPSG:32636"), Some(Crs::UtmNorth(36)));
        assert_eq!(Crs::from_name("epsg:4326"), Some(Crs::Wgs84));
        assert_eq!(
            Crs::from_name("urn:ogc:def:crs:EPSG::3857"),
            Some(Crs::PseudoMercator)
        );
        assert_eq!(
            Crs::from_name("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(Crs::Wgs84)
        );
        assert_eq!(Crs::from_name("2154"), Some(Crs::Other(2154)));
        assert_eq!(Crs::from_name("ESRI:102100"), None);
        assert_eq!(Crs::from_name("EPSG:abc"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Crs::UtmNorth(36).to_string(), "EPSG:32636");
    }
}
