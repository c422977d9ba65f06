//! Reading a COG band restricted to polygon geometries.
//!
//! The window covering the geometries is the only part of the raster that gets fetched,
//! pixels outside the polygons are set to a nodata value.
use std::time::Duration;

use ndarray::{Array2, Zip};
use tracing::{debug, warn};

use crate::bbox::BoundingBox;
use crate::epsg::Crs;
use crate::geometry::rasterize::rasterize;
use crate::geometry::GeometrySet;
use crate::image::BandData;
use crate::tiff::cog::{ImageRect, COG};
use crate::tiff::georef::Geotransform;
use crate::Error;

/// How a raster gets masked. The default crops to the geometries, includes pixels whose
/// centre is inside a polygon and has no timeout
#[derive(Debug, Clone)]
pub struct MaskOptions {
    /// Restrict the output to the window covering the geometries
    pub crop: bool,
    /// Include every pixel touched by a polygon rather than only those whose centre is inside
    pub all_touched: bool,
    /// Mask the inside of the polygons instead of the outside. Incompatible with `crop`
    pub invert: bool,
    /// Value written to masked pixels when the raster doesn't declare a nodata value
    pub nodata: Option<f64>,
    /// Bounds the whole open and read
    pub timeout: Option<Duration>,
}

impl Default for MaskOptions {
    fn default() -> Self {
        MaskOptions {
            crop: true,
            all_touched: false,
            invert: false,
            nodata: None,
            timeout: None,
        }
    }
}

impl MaskOptions {
    pub fn crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    pub fn all_touched(mut self, all_touched: bool) -> Self {
        self.all_touched = all_touched;
        self
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A window of a raster band, with the pixels outside the geometries set to `nodata`
#[derive(Debug, Clone)]
pub struct MaskedRaster {
    pub data: BandData,
    /// true for pixels inside the geometries that are not nodata in the raster
    pub mask: Array2<bool>,
    /// Maps pixel (0, 0) of `data` to world coordinates
    pub geo_transform: Geotransform,
    pub crs: Crs,
    pub nodata: f64,
    /// Where `data` is in the full resolution raster
    pub window: ImageRect,
}

impl MaskedRaster {
    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|v| **v).count()
    }

    /// The data as f64, NaN where masked
    pub fn to_f64_masked(&self) -> Array2<f64> {
        let mut out = self.data.to_f64();
        Zip::from(&mut out).and(&self.mask).for_each(|v, &valid| {
            if !valid {
                *v = f64::NAN;
            }
        });
        out
    }
}

// Snaps values within rounding noise of an integer, so exactly aligned bounds don't grow
// the window by a pixel
fn snap(v: f64) -> f64 {
    let rounded = v.round();
    if (v - rounded).abs() < 1e-6 {
        rounded
    } else {
        v
    }
}

fn clamp_pixel(v: f64, len: u64) -> u64 {
    v.max(0.0).min(len as f64) as u64
}

/// The pixel window of a `width` x `height` raster covering `bounds`. The start is floored
/// and the end ceiled so every pixel touched by the bounds is included
pub fn geometry_window(
    geo_transform: &Geotransform,
    bounds: &BoundingBox,
    width: u64,
    height: u64,
) -> Result<ImageRect, Error> {
    let a = geo_transform.world_to_pixel(bounds.xmin, bounds.ymax);
    let b = geo_transform.world_to_pixel(bounds.xmax, bounds.ymin);
    let (col_min, col_max) = (snap(a.x.min(b.x)), snap(a.x.max(b.x)));
    let (row_min, row_max) = (snap(a.y.min(b.y)), snap(a.y.max(b.y)));
    let rect = ImageRect {
        i_from: clamp_pixel(row_min.floor(), height),
        j_from: clamp_pixel(col_min.floor(), width),
        i_to: clamp_pixel(row_max.ceil(), height),
        j_to: clamp_pixel(col_max.ceil(), width),
    };
    if rect.is_empty() {
        return Err(Error::GeometryMismatch(format!(
            "geometry bounds {:?} don't cover any pixel of the {}x{} raster",
            bounds, width, height
        )));
    }
    Ok(rect)
}

fn check_crs(geometries: &GeometrySet, raster_crs: Crs) -> Result<(), Error> {
    match geometries.crs() {
        Some(crs) if crs != raster_crs => Err(Error::CrsMismatch {
            geometries: crs.epsg_code(),
            raster: raster_crs.epsg_code(),
        }),
        Some(_) => Ok(()),
        None => {
            warn!(
                "geometries have no CRS, assuming they are in the raster's {}",
                raster_crs
            );
            Ok(())
        }
    }
}

/// Masks an already opened COG. See [`read_masked`]
pub async fn mask_cog(
    cog: &mut COG,
    geometries: &GeometrySet,
    options: &MaskOptions,
) -> Result<MaskedRaster, Error> {
    if options.invert && options.crop {
        return Err(Error::OtherError(
            "invert=true cannot be combined with crop=true".to_string(),
        ));
    }
    let geometry_bounds = match geometries.bounds() {
        Some(bounds) => bounds,
        None => {
            return Err(Error::GeometryMismatch(
                "no geometries to mask with".to_string(),
            ))
        }
    };
    let raster_crs = cog.georeference.crs;
    check_crs(geometries, raster_crs)?;

    let geo_transform = cog.georeference.geo_transform.clone();
    let (width, height) = (cog.width(), cog.height());
    let raster_bounds = geo_transform.bounds(width, height);
    if !geometries
        .polygons()
        .iter()
        .any(|p| p.intersects_bbox(&raster_bounds))
    {
        return Err(Error::GeometryMismatch(format!(
            "geometries {:?} don't overlap the raster extent {:?}",
            geometry_bounds, raster_bounds
        )));
    }

    let window = if options.crop {
        geometry_window(&geo_transform, &geometry_bounds, width, height)?
    } else {
        ImageRect::full(width, height)
    };
    debug!(?window, "reading masked window");

    let mut data = cog.read_window(&window).await?;
    let window_transform = geo_transform.window(&window);
    let inside = rasterize(
        geometries.polygons(),
        &window_transform,
        data.shape(),
        options.all_touched,
    );
    let mut mask = inside.mapv(|v| v != options.invert);
    if let Some(raster_nodata) = cog.nodata {
        Zip::from(&mut mask)
            .and(&data.nodata_mask(raster_nodata))
            .for_each(|valid, &is_nodata| *valid = *valid && !is_nodata);
    }

    let nodata = cog.nodata.or(options.nodata).unwrap_or(0.0);
    data.fill_where_not(&mask, nodata)?;
    debug!(
        "masked {}x{} window, {} valid pixels, {}",
        window.width(),
        window.height(),
        mask.iter().filter(|v| **v).count(),
        cog.get_stats()
    );

    Ok(MaskedRaster {
        data,
        mask,
        geo_transform: window_transform,
        crs: raster_crs,
        nodata,
        window,
    })
}

/// Reads the band at `location` (a local path, `http(s)://`, `/vsicurl/`, `s3://` or
/// `/vsis3/` locator) masked by `geometries`.
///
/// With `options.crop`, only the window covering the geometries is returned (and
/// fetched), otherwise the full extent. The source is closed on return, whatever the
/// outcome.
pub async fn read_masked(
    location: &str,
    geometries: &GeometrySet,
    options: &MaskOptions,
) -> Result<MaskedRaster, Error> {
    let work = async {
        let mut cog = COG::open(location).await?;
        mask_cog(&mut cog, geometries, options).await
    };
    match options.timeout {
        Some(timeout) => tokio::time::timeout(timeout, work).await.map_err(|_| {
            Error::ResourceUnavailable(format!(
                "reading {} timed out after {:?}",
                location, timeout
            ))
        })?,
        None => work.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::rect_ring;
    use crate::geometry::Polygon;
    use crate::math::vec2f;
    use crate::sources::Source;
    use ndarray::array;
    use testutils::geotiff::{GeoTiffBuilder, SampleKind};
    use testutils::http::{Reply, TestServer};

    const WIDTH: usize = 8;
    const HEIGHT: usize = 6;

    // 8x6 raster of 10m pixels with its upper left corner at (0, 100), value = row * 100 + col
    fn builder() -> GeoTiffBuilder {
        let values = (0..HEIGHT)
            .flat_map(|i| (0..WIDTH).map(move |j| (i * 100 + j) as f64))
            .collect();
        GeoTiffBuilder::new(WIDTH, HEIGHT, SampleKind::U16)
            .tile_size(16, 16)
            .geotransform(0.0, 100.0, 10.0, 10.0)
            .values(values)
    }

    async fn open(builder: GeoTiffBuilder) -> COG {
        COG::open_from_source(Source::from_memory(builder.build()))
            .await
            .unwrap()
    }

    fn geometries(rings: &[Vec<crate::math::Vec2f>]) -> GeometrySet {
        GeometrySet::new(
            rings
                .iter()
                .map(|r| Polygon::new(r.clone(), vec![]).unwrap())
                .collect(),
            Some(Crs::UtmNorth(36)),
        )
    }

    #[tokio::test]
    async fn test_single_pixel_crop() {
        let mut cog = open(builder()).await;
        // Pixel at row 2, col 3
        let set = geometries(&[rect_ring(30.0, 70.0, 40.0, 80.0)]);
        let masked = mask_cog(&mut cog, &set, &MaskOptions::default())
            .await
            .unwrap();
        assert_eq!(masked.shape(), (1, 1));
        assert_eq!(masked.data, BandData::Uint16(array![[203]]));
        assert_eq!(masked.mask, array![[true]]);
        assert_eq!(masked.geo_transform.to_gdal(), [30.0, 10.0, 0.0, 80.0, 0.0, -10.0]);
        assert_eq!(
            masked.window,
            ImageRect {
                i_from: 2,
                j_from: 3,
                i_to: 3,
                j_to: 4
            }
        );
        assert_eq!(masked.crs, Crs::UtmNorth(36));
    }

    #[tokio::test]
    async fn test_geometry_outside_extent() {
        let mut cog = open(builder()).await;
        let set = geometries(&[rect_ring(1000.0, 1000.0, 1010.0, 1010.0)]);
        let res = mask_cog(&mut cog, &set, &MaskOptions::default()).await;
        assert!(matches!(res, Err(Error::GeometryMismatch(_))));
    }

    #[tokio::test]
    async fn test_triangle_outside_extent_corner() {
        // Its bounding box overlaps the raster's top right corner, the triangle doesn't
        let mut cog = open(builder()).await;
        let set = geometries(&[vec![
            vec2f(75.0, 110.0),
            vec2f(90.0, 110.0),
            vec2f(90.0, 95.0),
        ]]);
        let res = mask_cog(&mut cog, &set, &MaskOptions::default()).await;
        assert!(matches!(res, Err(Error::GeometryMismatch(_))));
        let res = mask_cog(&mut cog, &set, &MaskOptions::default().crop(false)).await;
        assert!(matches!(res, Err(Error::GeometryMismatch(_))));

        // A larger one reaches over the corner up to the top right pixel's centre
        let set = geometries(&[vec![
            vec2f(55.0, 110.0),
            vec2f(90.0, 110.0),
            vec2f(90.0, 75.0),
        ]]);
        let masked = mask_cog(&mut cog, &set, &MaskOptions::default())
            .await
            .unwrap();
        assert_eq!(masked.shape(), (3, 3));
        assert_eq!(masked.valid_count(), 1);
        assert_eq!(masked.data.get_f64(0, 2), Some(7.0));
    }

    #[tokio::test]
    async fn test_empty_geometries() {
        let mut cog = open(builder()).await;
        let res = mask_cog(&mut cog, &GeometrySet::default(), &MaskOptions::default()).await;
        assert!(matches!(res, Err(Error::GeometryMismatch(_))));
    }

    #[tokio::test]
    async fn test_hole_is_masked() {
        let mut cog = open(builder()).await;
        let set = GeometrySet::new(
            vec![Polygon::new(
                rect_ring(0.0, 40.0, 50.0, 100.0),
                vec![rect_ring(20.0, 70.0, 30.0, 80.0)],
            )
            .unwrap()],
            None,
        );
        let masked = mask_cog(&mut cog, &set, &MaskOptions::default())
            .await
            .unwrap();
        assert_eq!(masked.shape(), (6, 5));
        assert_eq!(masked.valid_count(), 29);
        assert!(!masked.mask[(2, 2)]);
        assert_eq!(masked.data.get_f64(2, 2), Some(0.0));
        assert_eq!(masked.data.get_f64(2, 3), Some(203.0));
        assert!(masked.to_f64_masked()[(2, 2)].is_nan());
    }

    #[tokio::test]
    async fn test_no_crop_keeps_full_extent() {
        let mut cog = open(builder()).await;
        let set = geometries(&[rect_ring(30.0, 70.0, 40.0, 80.0)]);
        let masked = mask_cog(&mut cog, &set, &MaskOptions::default().crop(false).nodata(9.0))
            .await
            .unwrap();
        assert_eq!(masked.shape(), (HEIGHT, WIDTH));
        assert_eq!(masked.geo_transform, cog.georeference.geo_transform);
        assert_eq!(masked.valid_count(), 1);
        assert_eq!(masked.nodata, 9.0);
        assert_eq!(masked.data.get_f64(2, 3), Some(203.0));
        assert_eq!(masked.data.get_f64(0, 0), Some(9.0));
        assert_eq!(masked.data.get_f64(5, 7), Some(9.0));
    }

    #[tokio::test]
    async fn test_crs_mismatch() {
        let mut cog = open(builder()).await;
        let set = geometries(&[rect_ring(30.0, 70.0, 40.0, 80.0)]).with_crs(Crs::Wgs84);
        let res = mask_cog(&mut cog, &set, &MaskOptions::default()).await;
        assert!(matches!(
            res,
            Err(Error::CrsMismatch {
                geometries: 4326,
                raster: 32636
            })
        ));
    }

    #[tokio::test]
    async fn test_raster_nodata_wins() {
        let mut cog = open(builder().nodata("1")).await;
        // Row 0, cols 0..3: the pixel at col 1 holds the raster's nodata
        let set = geometries(&[rect_ring(0.0, 90.0, 30.0, 100.0)]);
        let masked = mask_cog(&mut cog, &set, &MaskOptions::default().crop(false).nodata(7.0))
            .await
            .unwrap();
        assert_eq!(masked.nodata, 1.0);
        assert_eq!(masked.data.get_f64(0, 2), Some(2.0));
        assert_eq!(masked.data.get_f64(3, 3), Some(1.0));
        assert_eq!(masked.mask.row(0).to_vec()[..3], [true, false, true]);
        assert_eq!(masked.valid_count(), 2);
    }

    #[tokio::test]
    async fn test_all_touched() {
        let mut cog = open(builder()).await;
        let set = geometries(&[rect_ring(12.0, 76.0, 38.0, 88.0)]);
        let masked = mask_cog(&mut cog, &set, &MaskOptions::default())
            .await
            .unwrap();
        assert_eq!(masked.shape(), (2, 3));
        assert_eq!(masked.mask, array![[true, true, true], [false, false, false]]);

        let masked = mask_cog(&mut cog, &set, &MaskOptions::default().all_touched(true))
            .await
            .unwrap();
        assert_eq!(masked.valid_count(), 6);
        assert_eq!(masked.data, BandData::Uint16(array![[101, 102, 103], [201, 202, 203]]));
    }

    #[tokio::test]
    async fn test_invert() {
        let mut cog = open(builder()).await;
        let set = geometries(&[rect_ring(30.0, 70.0, 40.0, 80.0)]);
        let res = mask_cog(&mut cog, &set, &MaskOptions::default().invert(true)).await;
        assert!(matches!(res, Err(Error::OtherError(_))));

        let masked = mask_cog(&mut cog, &set, &MaskOptions::default().crop(false).invert(true))
            .await
            .unwrap();
        assert_eq!(masked.valid_count(), WIDTH * HEIGHT - 1);
        assert_eq!(masked.data.get_f64(2, 3), Some(0.0));
        assert_eq!(masked.data.get_f64(2, 4), Some(204.0));
    }

    #[test]
    fn test_geometry_window_snaps_and_clamps() {
        let gt = Geotransform {
            ul_x: 0.0,
            ul_y: 100.0,
            x_res: 10.0,
            y_res: -10.0,
        };
        let bounds = BoundingBox {
            xmin: 30.0000000001,
            xmax: 39.9999999999,
            ymin: 70.0,
            ymax: 80.0,
        };
        assert_eq!(
            geometry_window(&gt, &bounds, 8, 6).unwrap(),
            ImageRect {
                i_from: 2,
                j_from: 3,
                i_to: 3,
                j_to: 4
            }
        );
        let bounds = BoundingBox {
            xmin: -50.0,
            xmax: 15.0,
            ymin: 95.0,
            ymax: 500.0,
        };
        assert_eq!(
            geometry_window(&gt, &bounds, 8, 6).unwrap(),
            ImageRect {
                i_from: 0,
                j_from: 0,
                i_to: 1,
                j_to: 2
            }
        );
    }

    #[tokio::test]
    async fn test_read_masked_missing_file() {
        let set = geometries(&[rect_ring(30.0, 70.0, 40.0, 80.0)]);
        let res = read_masked("/nonexistent/red.tif", &set, &MaskOptions::default()).await;
        assert!(matches!(res, Err(Error::ResourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_read_masked_over_http() {
        let server = TestServer::start(builder().build(), Reply::Ranges).await;
        let set = geometries(&[rect_ring(10.0, 70.0, 30.0, 90.0)]);
        let masked = read_masked(&server.url("b.tif"), &set, &MaskOptions::default())
            .await
            .unwrap();
        assert_eq!(masked.data, BandData::Uint16(array![[101, 102], [201, 202]]));
        assert_eq!(masked.valid_count(), 4);
        // The whole file fits in the first chunk, then one direct read for the only tile
        assert_eq!(server.request_count(), 2);
    }

    #[tokio::test]
    async fn test_read_masked_http_errors() {
        let set = geometries(&[rect_ring(10.0, 70.0, 30.0, 90.0)]);
        for reply in [Reply::Status(404), Reply::Status(200)] {
            let server = TestServer::start(builder().build(), reply).await;
            let res = read_masked(&server.url("b.tif"), &set, &MaskOptions::default()).await;
            assert!(
                matches!(res, Err(Error::ResourceUnavailable(_))),
                "{:?}",
                reply
            );
        }
    }

    #[tokio::test]
    async fn test_read_masked_timeout() {
        // The server accepts the connection and the request but never answers
        let server = TestServer::start(builder().build(), Reply::Silent).await;
        let set = geometries(&[rect_ring(30.0, 70.0, 40.0, 80.0)]);
        let res = read_masked(
            &server.url("b.tif"),
            &set,
            &MaskOptions::default().timeout(Duration::from_millis(200)),
        )
        .await;
        match res {
            Err(Error::ResourceUnavailable(msg)) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("expected a timeout, got {:?}", other),
        }
        assert_eq!(server.request_count(), 1);
    }
}
