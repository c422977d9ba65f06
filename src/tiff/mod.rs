pub mod cog;
pub mod compression;
pub mod data_types;
pub mod geo_keys;
pub mod georef;
pub mod ifd;
pub mod low_level;
