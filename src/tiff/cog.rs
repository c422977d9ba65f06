use tracing::{debug, warn};

use super::compression::{Compression, Predictor};
use super::data_types::sample_type_from_ifd;
use super::geo_keys::GeoKeyDirectory;
use super::georef::{Georeference, Geotransform};
use super::ifd::{IFDTag, IFDValue, ImageFileDirectory, TIFFReader};
use super::low_level::ByteOrder;
use crate::image::{BandData, SampleType};
use crate::sources::Source;
use crate::Error;

/// Functionality specific to reading Cloud Optimized Geotiffs
#[derive(Debug)]
pub struct COG {
    // overviews[0] is the full resolution image
    pub overviews: Vec<Overview>,
    pub geo_keys: GeoKeyDirectory,
    pub source: Source,
    pub georeference: Georeference,
    // From the GDAL_NODATA tag
    pub nodata: Option<f64>,
    byte_order: ByteOrder,
}

#[derive(Debug)]
pub struct Overview {
    pub width: u64,
    pub height: u64,
    pub tile_width: u64,
    pub tile_height: u64,
    pub samples_per_pixel: u64,
    pub sample_type: SampleType,
    pub compression: Compression,
    pub predictor: Predictor,
    pub ifd: ImageFileDirectory,
    pub is_full_resolution: bool,
}

#[derive(Debug)]
pub struct OverviewDataReader {
    pub width: u64,
    pub height: u64,
    pub samples_per_pixel: u64,
    pub sample_type: SampleType,
    tile_width: u64,
    tile_height: u64,
    compression: Compression,
    predictor: Predictor,
    byte_order: ByteOrder,
    tile_offsets: Vec<u64>,
    tile_bytes_counts: Vec<u64>,
}

async fn optional_short(
    ifd: &ImageFileDirectory,
    source: &mut Source,
    tag: IFDTag,
) -> Result<Option<u16>, Error> {
    match ifd.get_optional_tag_value(source, tag).await? {
        None => Ok(None),
        Some(IFDValue::Short(v)) if !v.is_empty() => Ok(Some(v[0])),
        Some(value) => Err(Error::TagHasWrongType(tag, value)),
    }
}

// A mask IFD (GDAL internal mask) is flagged by NewSubfileType bit 2 and/or
// PhotometricInterpretation=4
async fn is_mask_ifd(ifd: &ImageFileDirectory, source: &mut Source) -> Result<bool, Error> {
    let subfile_type = match ifd
        .get_optional_tag_value(source, IFDTag::NewSubfileType)
        .await?
    {
        Some(IFDValue::Long(v)) if !v.is_empty() => v[0],
        _ => 0,
    };
    let photometric = optional_short(ifd, source, IFDTag::PhotometricInterpretation).await?;
    Ok(subfile_type & 0x4 != 0 || photometric == Some(4))
}

impl Overview {
    pub async fn from_ifd(ifd: ImageFileDirectory, source: &mut Source) -> Result<Overview, Error> {
        if !ifd.has_tag(IFDTag::TileWidth) || !ifd.has_tag(IFDTag::TileOffsets) {
            return Err(Error::NotACOG(
                "image is not tiled, strip layouts are not supported".to_string(),
            ));
        }
        let samples_per_pixel = ifd
            .get_usize_tag_value(source, IFDTag::SamplesPerPixel)
            .await? as u64;

        // Check planar configuration is contiguous pixels. It defaults to 1 and doesn't
        // matter for single sample images
        if let Some(v) = optional_short(&ifd, source, IFDTag::PlanarConfiguration).await? {
            if v != 1 && samples_per_pixel > 1 {
                return Err(Error::UnsupportedTagValue(
                    IFDTag::PlanarConfiguration,
                    format!("{:?}", v),
                ));
            }
        }
        // We only support Orientation = 1 which means the image has origin at top-left
        // (usual image processing axes)
        if let Some(v) = optional_short(&ifd, source, IFDTag::Orientation).await? {
            if v != 1 {
                return Err(Error::UnsupportedTagValue(
                    IFDTag::Orientation,
                    format!("{:?}", v),
                ));
            }
        }

        let sample_type = sample_type_from_ifd(&ifd, source).await?;
        let compression = Compression::from_compression_tag(
            optional_short(&ifd, source, IFDTag::Compression)
                .await?
                .unwrap_or(1),
        )?;
        let predictor = Predictor::from_predictor_tag(
            optional_short(&ifd, source, IFDTag::Predictor)
                .await?
                .unwrap_or(1),
        )?;
        if predictor == Predictor::FloatingPoint && !sample_type.is_float() {
            return Err(Error::UnsupportedTagValue(
                IFDTag::Predictor,
                format!("floating point predictor with {:?} samples", sample_type),
            ));
        }

        let is_full_resolution = match ifd
            .get_optional_tag_value(source, IFDTag::NewSubfileType)
            .await?
        {
            Some(IFDValue::Long(v)) if !v.is_empty() => v[0] & 0x1 == 0,
            Some(value) => return Err(Error::TagHasWrongType(IFDTag::NewSubfileType, value)),
            None => true,
        };

        Ok(Overview {
            width: ifd.get_usize_tag_value(source, IFDTag::ImageWidth).await? as u64,
            height: ifd.get_usize_tag_value(source, IFDTag::ImageLength).await? as u64,
            tile_width: ifd.get_usize_tag_value(source, IFDTag::TileWidth).await? as u64,
            tile_height: ifd.get_usize_tag_value(source, IFDTag::TileLength).await? as u64,
            samples_per_pixel,
            sample_type,
            compression,
            predictor,
            ifd,
            is_full_resolution,
        })
    }

    pub async fn make_reader(
        &self,
        source: &mut Source,
        byte_order: ByteOrder,
    ) -> Result<OverviewDataReader, Error> {
        // Note that as per the COG spec, those two arrays are likely *not* stored compactly next
        // to the header, so this will cause additional reads to the source
        let tile_offsets = self
            .ifd
            .get_vec_u64_tag_value(source, IFDTag::TileOffsets)
            .await?;
        let tile_bytes_counts = self
            .ifd
            .get_vec_u64_tag_value(source, IFDTag::TileByteCounts)
            .await?;
        let expected_tiles = self.tiles_across() * self.tiles_down();
        if (tile_offsets.len() as u64) < expected_tiles
            || tile_bytes_counts.len() != tile_offsets.len()
        {
            return Err(Error::InvalidData(format!(
                "expected {} tiles, got {} offsets and {} byte counts",
                expected_tiles,
                tile_offsets.len(),
                tile_bytes_counts.len()
            )));
        }
        Ok(OverviewDataReader {
            width: self.width,
            height: self.height,
            samples_per_pixel: self.samples_per_pixel,
            sample_type: self.sample_type,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            compression: self.compression,
            predictor: self.predictor,
            byte_order,
            tile_offsets,
            tile_bytes_counts,
        })
    }

    pub fn tiles_across(&self) -> u64 {
        (self.width + self.tile_width - 1) / self.tile_width
    }

    pub fn tiles_down(&self) -> u64 {
        (self.height + self.tile_height - 1) / self.tile_height
    }
}

/// A pixel window, `i` being rows and `j` columns. The `_to` bounds are exclusive
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRect {
    pub i_from: u64,
    pub j_from: u64,
    pub i_to: u64,
    pub j_to: u64,
}

impl ImageRect {
    pub fn full(width: u64, height: u64) -> ImageRect {
        ImageRect {
            i_from: 0,
            j_from: 0,
            i_to: height,
            j_to: width,
        }
    }

    pub fn width(&self) -> u64 {
        self.j_to - self.j_from
    }

    pub fn height(&self) -> u64 {
        self.i_to - self.i_from
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl OverviewDataReader {
    // Pastes the given tile at the right location in the output array. Both tile_rect and out_rect
    // define the area covered by out/tile in the whole image. Works on whole samples of
    // `sample_size` bytes
    fn paste_tile(
        &self,
        out_data: &mut [u8],
        tile_data: &[u8],
        out_rect: &ImageRect,
        tile_rect: &ImageRect,
    ) {
        let sample_size = self.sample_type.size_bytes() as u64;
        // Note that tiles can be larger than the image, so we need to ignore out of bounds pixels
        let j_from = tile_rect.j_from.max(out_rect.j_from);
        let j_to = tile_rect.j_to.min(out_rect.j_to);
        if j_from >= j_to {
            return;
        }
        let row_nbytes = ((j_to - j_from) * sample_size) as usize;
        for ti in tile_rect.i_from.max(out_rect.i_from)..tile_rect.i_to.min(out_rect.i_to) {
            let out_offset = (((ti - out_rect.i_from) * out_rect.width() + (j_from - out_rect.j_from))
                * sample_size) as usize;
            let tile_offset = (((ti - tile_rect.i_from) * self.tile_width + (j_from - tile_rect.j_from))
                * sample_size) as usize;
            out_data[out_offset..out_offset + row_nbytes]
                .copy_from_slice(&tile_data[tile_offset..tile_offset + row_nbytes]);
        }
    }

    async fn read_tile(&self, source: &mut Source, tile_index: usize) -> Result<Option<Vec<u8>>, Error> {
        let offset = self.tile_offsets[tile_index];
        let byte_count = self.tile_bytes_counts[tile_index];
        if byte_count == 0 {
            // Sparse tile (GDAL SPARSE_OK), left as zeros
            return Ok(None);
        }
        let mut tile_data = vec![0u8; byte_count as usize];
        // We use read_direct here to read the whole tile at once
        source.read_exact_direct(offset, &mut tile_data).await?;
        let mut tile_data = self.compression.decompress(tile_data)?;

        let sample_size = self.sample_type.size_bytes();
        let expected_nbytes = (self.tile_width * self.tile_height) as usize * sample_size;
        if tile_data.len() < expected_nbytes {
            // Either the tile is truncated in the file or something is wrong with the
            // decompression
            return Err(Error::InvalidData(format!(
                "tile {} data shorter than expected. {} instead of {}. Is there some compression issue ?",
                tile_index,
                tile_data.len(),
                expected_nbytes
            )));
        }
        tile_data.truncate(expected_nbytes);
        Ok(Some(self.predictor.decode_tile(
            tile_data,
            self.tile_width as usize,
            1,
            sample_size,
            self.byte_order,
        )?))
    }

    /// Reads the given window of a single band image. Only the tiles intersecting the window
    /// are fetched, each with a single direct read
    pub async fn read_image_part(
        &self,
        source: &mut Source,
        rect: &ImageRect,
    ) -> Result<BandData, Error> {
        if self.samples_per_pixel != 1 {
            return Err(Error::UnsupportedCOG(format!(
                "expected a single band raster, got {} samples per pixel",
                self.samples_per_pixel
            )));
        }
        if rect.j_to > self.width || rect.j_from > rect.j_to {
            return Err(Error::OutOfBoundsRead(format!(
                "columns {}..{} out of bounds for width {}",
                rect.j_from, rect.j_to, self.width
            )));
        }
        if rect.i_to > self.height || rect.i_from > rect.i_to {
            return Err(Error::OutOfBoundsRead(format!(
                "rows {}..{} out of bounds for height {}",
                rect.i_from, rect.i_to, self.height
            )));
        }
        let shape = (rect.height() as usize, rect.width() as usize);
        let nbytes = rect.width() * rect.height() * self.sample_type.size_bytes() as u64;
        let mut out_data = vec![0u8; nbytes as usize];
        if rect.is_empty() {
            return BandData::from_ne_bytes(self.sample_type, shape, &out_data);
        }
        let start_tile_j = rect.j_from / self.tile_width;
        let start_tile_i = rect.i_from / self.tile_height;
        let end_tile_j = (rect.j_to + self.tile_width - 1) / self.tile_width;
        let end_tile_i = (rect.i_to + self.tile_height - 1) / self.tile_height;

        let tiles_across = (self.width + self.tile_width - 1) / self.tile_width;

        for tile_i in start_tile_i..end_tile_i {
            for tile_j in start_tile_j..end_tile_j {
                // As per the spec, tiles are ordered left to right and top to bottom
                let tile_index = (tile_i * tiles_across + tile_j) as usize;
                let Some(tile_data) = self.read_tile(source, tile_index).await? else {
                    continue;
                };
                let tile_rect = ImageRect {
                    i_from: tile_i * self.tile_height,
                    j_from: tile_j * self.tile_width,
                    i_to: (tile_i + 1) * self.tile_height,
                    j_to: (tile_j + 1) * self.tile_width,
                };
                self.paste_tile(&mut out_data, &tile_data, rect, &tile_rect);
            }
        }
        debug!(
            "read window {:?} ({} x {} tiles)",
            rect,
            end_tile_i - start_tile_i,
            end_tile_j - start_tile_j
        );
        BandData::from_ne_bytes(self.sample_type, shape, &out_data)
    }
}

fn parse_nodata(value: &str) -> Result<f64, Error> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::InvalidData(format!("invalid GDAL_NODATA value {:?}", value)))
}

impl COG {
    pub async fn open(source_spec: &str) -> Result<COG, Error> {
        let source = Source::new_from_source_spec(source_spec).await?;
        COG::open_from_source(source).await
    }

    pub async fn open_from_source(source: Source) -> Result<COG, Error> {
        let tiff_reader = TIFFReader::open_from_source(source).await?;
        let byte_order = tiff_reader.byte_order;
        let mut source = tiff_reader.source;
        // https://docs.ogc.org/is/21-026/21-026.html#_requirement_reduced_resolution_subfiles
        let mut overviews: Vec<Overview> = vec![];
        for ifd in tiff_reader.ifds {
            if is_mask_ifd(&ifd, &mut source).await? {
                debug!("skipping mask IFD");
                continue;
            }
            overviews.push(Overview::from_ifd(ifd, &mut source).await?);
        }
        if overviews.is_empty() {
            return Err(Error::NotACOG("no image IFD".to_string()));
        }

        // COG requirement 3: first IFD must be full res image
        if !overviews[0].is_full_resolution {
            return Err(Error::NotACOG(
                "overview 0 is not full resolution".to_string(),
            ));
        }

        // COG requirement 3: IFD must be ordered by decreasing resolution
        // We also check that
        // - samples are consistent
        // - this isn't a multi image COG - which we don't support
        for i in 1..overviews.len() {
            let (prev, ovr) = (&overviews[i - 1], &overviews[i]);
            if ovr.width >= prev.width || ovr.height >= prev.height {
                return Err(Error::NotACOG(format!(
                    "Wrong overview ordering. Got overview i={} with size {}x{} >= previous {}x{}",
                    i, ovr.width, ovr.height, prev.width, prev.height
                )));
            }
            if ovr.samples_per_pixel != overviews[0].samples_per_pixel
                || ovr.sample_type != overviews[0].sample_type
            {
                return Err(Error::NotACOG(format!(
                    "Overview {} has inconsistent samples ({} x {:?}), expected {} x {:?}",
                    i,
                    ovr.samples_per_pixel,
                    ovr.sample_type,
                    overviews[0].samples_per_pixel,
                    overviews[0].sample_type
                )));
            }
            if ovr.is_full_resolution {
                return Err(Error::NotACOG(format!(
                    "Got a second full resolution overview (i={}). This library doesn't support multi image COGs",
                    i
                )));
            }
        }
        // As per the COG spec, the overview contains the projection/geokey data
        let geo_keys = GeoKeyDirectory::from_ifd(&overviews[0].ifd, &mut source).await?;
        let georeference = Georeference::decode(&overviews[0].ifd, &mut source, &geo_keys).await?;

        let nodata = match overviews[0]
            .ifd
            .get_optional_tag_value(&mut source, IFDTag::GdalNodata)
            .await?
        {
            Some(IFDValue::Ascii(v)) => Some(parse_nodata(&v)?),
            Some(value) => {
                warn!("ignoring GDAL_NODATA tag of unexpected type: {:?}", value);
                None
            }
            None => None,
        };
        debug!(
            "opened COG {}x{} {:?}, {} overviews, crs={}, nodata={:?}",
            overviews[0].width,
            overviews[0].height,
            overviews[0].sample_type,
            overviews.len() - 1,
            georeference.crs,
            nodata
        );

        Ok(COG {
            overviews,
            source,
            geo_keys,
            georeference,
            nodata,
            byte_order,
        })
    }

    pub fn width(&self) -> u64 {
        self.overviews[0].width
    }

    pub fn height(&self) -> u64 {
        self.overviews[0].height
    }

    pub fn samples_per_pixel(&self) -> u64 {
        self.overviews[0].samples_per_pixel
    }

    pub fn sample_type(&self) -> SampleType {
        self.overviews[0].sample_type
    }

    pub fn compression(&self) -> Compression {
        self.overviews[0].compression
    }

    pub async fn make_reader(&mut self, overview_index: usize) -> Result<OverviewDataReader, Error> {
        let overview = self.overviews.get(overview_index).ok_or_else(|| {
            Error::OtherError(format!(
                "overview {} out of range, got {} overviews",
                overview_index,
                self.overviews.len()
            ))
        })?;
        overview.make_reader(&mut self.source, self.byte_order).await
    }

    /// Reads a window of the full resolution image
    pub async fn read_window(&mut self, rect: &ImageRect) -> Result<BandData, Error> {
        let reader = self.make_reader(0).await?;
        reader.read_image_part(&mut self.source, rect).await
    }

    /// Georeference of an overview: same origin and extent, coarser pixels
    pub fn compute_georeference_for_overview(&self, overview: &Overview) -> Georeference {
        let x_scale = overview.width as f64 / self.width() as f64;
        let y_scale = overview.height as f64 / self.height() as f64;
        Georeference {
            crs: self.georeference.crs,
            unit: self.georeference.unit,
            geo_transform: Geotransform {
                ul_x: self.georeference.geo_transform.ul_x,
                ul_y: self.georeference.geo_transform.ul_y,
                x_res: self.georeference.geo_transform.x_res / x_scale,
                y_res: self.georeference.geo_transform.y_res / y_scale,
            },
        }
    }

    // Obtain some statistics to be reported to the user
    pub fn get_stats(&self) -> String {
        self.source.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epsg::Crs;
    use flate2::write::ZlibEncoder;
    use ndarray::Array2;
    use std::io::Write;
    use testutils::assert_float_eq;
    use testutils::geotiff::{GeoTiffBuilder, SampleKind};

    // 37 x 21 raster, value = row * 100 + col
    fn ramp(width: usize, height: usize) -> Vec<f64> {
        (0..height)
            .flat_map(|i| (0..width).map(move |j| (i * 100 + j) as f64))
            .collect()
    }

    fn expected_window(rect: &ImageRect) -> Array2<f64> {
        Array2::from_shape_fn(
            (rect.height() as usize, rect.width() as usize),
            |(i, j)| ((i as u64 + rect.i_from) * 100 + j as u64 + rect.j_from) as f64,
        )
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(vec![], flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    async fn open(builder: GeoTiffBuilder) -> COG {
        COG::open_from_source(Source::from_memory(builder.build()))
            .await
            .unwrap()
    }

    const WINDOW: ImageRect = ImageRect {
        i_from: 3,
        j_from: 5,
        i_to: 20,
        j_to: 36,
    };

    #[tokio::test]
    async fn test_open_metadata() {
        let cog = open(
            GeoTiffBuilder::new(37, 21, SampleKind::U16)
                .values(ramp(37, 21))
                .nodata("0")
                .with_overview(),
        )
        .await;
        assert_eq!(cog.width(), 37);
        assert_eq!(cog.height(), 21);
        assert_eq!(cog.overviews.len(), 2);
        assert_eq!(cog.overviews[1].width, 19);
        assert_eq!(cog.sample_type(), SampleType::Uint16);
        assert_eq!(cog.compression(), Compression::Raw);
        assert_eq!(cog.nodata, Some(0.0));
        assert_eq!(cog.georeference.crs, Crs::UtmNorth(36));
        assert_eq!(
            cog.georeference.geo_transform.to_gdal(),
            [500000.0, 10.0, 0.0, 4000000.0, 0.0, -10.0]
        );
        let ovr_georef = cog.compute_georeference_for_overview(&cog.overviews[1]);
        assert!((ovr_georef.geo_transform.x_res - 10.0 * 37.0 / 19.0).abs() < 1e-9);
        assert!((ovr_georef.geo_transform.y_res + 10.0 * 21.0 / 11.0).abs() < 1e-9);
        // The overview covers the same extent as the full resolution image
        let ovr_bounds = ovr_georef.geo_transform.bounds(19, 11);
        let bounds = cog.georeference.geo_transform.bounds(37, 21);
        assert_float_eq(ovr_bounds.xmax, bounds.xmax, 1e-6);
        assert_float_eq(ovr_bounds.ymin, bounds.ymin, 1e-6);
    }

    #[tokio::test]
    async fn test_read_window_across_tiles() {
        let mut cog = open(GeoTiffBuilder::new(37, 21, SampleKind::U16).values(ramp(37, 21))).await;
        let band = cog.read_window(&WINDOW).await.unwrap();
        assert_eq!(band.shape(), (17, 31));
        assert_eq!(band.to_f64(), expected_window(&WINDOW));
    }

    #[tokio::test]
    async fn test_read_window_deflate_predictor_big_endian() {
        let mut cog = open(
            GeoTiffBuilder::new(37, 21, SampleKind::I16)
                .values(ramp(37, 21))
                .compression(8, zlib)
                .predictor(2)
                .big_endian(true),
        )
        .await;
        assert_eq!(cog.compression(), Compression::Deflate);
        let band = cog.read_window(&WINDOW).await.unwrap();
        assert_eq!(band.to_f64(), expected_window(&WINDOW));
    }

    #[tokio::test]
    async fn test_read_window_float_predictor_bigtiff() {
        let mut cog = open(
            GeoTiffBuilder::new(37, 21, SampleKind::F32)
                .values(ramp(37, 21))
                .compression(8, zlib)
                .predictor(3)
                .bigtiff(true),
        )
        .await;
        let band = cog.read_window(&WINDOW).await.unwrap();
        assert_eq!(band.sample_type(), SampleType::Float32);
        assert_eq!(band.to_f64(), expected_window(&WINDOW));
    }

    #[cfg(feature = "lzw")]
    #[tokio::test]
    async fn test_read_window_lzw_f64() {
        fn lzw(data: &[u8]) -> Vec<u8> {
            weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                .encode(data)
                .unwrap()
        }
        let mut cog = open(
            GeoTiffBuilder::new(37, 21, SampleKind::F64)
                .values(ramp(37, 21))
                .compression(5, lzw),
        )
        .await;
        let band = cog.read_window(&WINDOW).await.unwrap();
        assert_eq!(band.to_f64(), expected_window(&WINDOW));
    }

    #[tokio::test]
    async fn test_overview_reader_direct_reads() {
        // Test that reading from overview uses direct reads and not chunked once
        let mut cog = open(
            GeoTiffBuilder::new(37, 21, SampleKind::U8)
                .values(ramp(37, 21).iter().map(|v| v % 256.0).collect())
                .with_overview(),
        )
        .await;
        let reader = cog.make_reader(1).await.unwrap();
        reader
            .read_image_part(&mut cog.source, &ImageRect::full(19, 11))
            .await
            .unwrap();
        // One chunked read for the header and IFDs (the whole file fits in a chunk), then
        // one direct read per tile of the 19x11 overview (2 x 1 tiles of 16x16)
        assert_eq!(cog.get_stats(), "read_counts=3");
    }

    #[tokio::test]
    async fn test_multi_sample_unsupported() {
        let mut cog = open(GeoTiffBuilder::new(8, 8, SampleKind::U8).samples_per_pixel(3)).await;
        assert_eq!(cog.samples_per_pixel(), 3);
        let res = cog.read_window(&ImageRect::full(8, 8)).await;
        assert!(matches!(res, Err(Error::UnsupportedCOG(_))));
    }

    #[tokio::test]
    async fn test_out_of_bounds_window() {
        let mut cog = open(GeoTiffBuilder::new(8, 8, SampleKind::U8)).await;
        let res = cog
            .read_window(&ImageRect {
                i_from: 0,
                j_from: 0,
                i_to: 9,
                j_to: 8,
            })
            .await;
        assert!(matches!(res, Err(Error::OutOfBoundsRead(_))));
    }

    #[tokio::test]
    async fn test_pixel_is_point_shifts_half_pixel() {
        let cog = open(GeoTiffBuilder::new(8, 8, SampleKind::U8).pixel_is_point(true)).await;
        let gt = &cog.georeference.geo_transform;
        assert_eq!(gt.ul_x, 499995.0);
        assert_eq!(gt.ul_y, 4000005.0);
    }

    #[tokio::test]
    async fn test_nan_nodata() {
        let cog = open(GeoTiffBuilder::new(8, 8, SampleKind::F32).nodata("nan")).await;
        assert!(cog.nodata.unwrap().is_nan());
    }
}
