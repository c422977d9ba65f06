use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use cogndvi::npy::write_f64_npy;
use cogndvi::{ndvi_masked, read_masked, Crs, Error, GeometrySet, MaskOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ndvi")]
#[command(about = "Computes the NDVI of the area covered by polygons from red and NIR COG bands")]
struct Args {
    /// Red band locator (local path, http(s)://, /vsicurl/, s3:// or /vsis3/)
    red: String,

    /// Near infrared band locator
    nir: String,

    /// Polygons to mask with (.shp, .geojson or .json)
    geometries: PathBuf,

    /// Output .npy file (float64)
    #[arg(short, long, default_value = "ndvi.npy")]
    out: PathBuf,

    /// Keep the full raster extent instead of cropping to the geometries
    #[arg(long)]
    no_crop: bool,

    /// Include every pixel touched by the polygons
    #[arg(long)]
    all_touched: bool,

    /// Value for masked pixels when the rasters don't declare one
    #[arg(long)]
    nodata: Option<f64>,

    /// CRS of the geometries when the file doesn't say, e.g. EPSG:32636
    #[arg(long)]
    geometries_crs: Option<String>,

    /// Gives up reading a band after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut geometries = GeometrySet::from_path(&args.geometries)?;
    if let Some(name) = &args.geometries_crs {
        let crs = Crs::from_name(name)
            .ok_or_else(|| Error::UnsupportedProjection(format!("unknown CRS {:?}", name)))?;
        geometries = geometries.with_crs(crs);
    }
    info!(
        "loaded {} polygons from {:?}",
        geometries.len(),
        args.geometries
    );

    let mut options = MaskOptions::default()
        .crop(!args.no_crop)
        .all_touched(args.all_touched);
    if let Some(nodata) = args.nodata {
        options = options.nodata(nodata);
    }
    if let Some(secs) = args.timeout_secs {
        options = options.timeout(Duration::from_secs(secs));
    }

    let red = read_masked(&args.red, &geometries, &options).await?;
    info!(
        "red: {:?} {:?} window, {} valid pixels",
        red.shape(),
        red.data.sample_type(),
        red.valid_count()
    );
    let nir = read_masked(&args.nir, &geometries, &options).await?;
    info!(
        "nir: {:?} {:?} window, {} valid pixels",
        nir.shape(),
        nir.data.sample_type(),
        nir.valid_count()
    );

    let ndvi = ndvi_masked(&red, &nir)?;
    let stats = ndvi.stats();
    info!(
        "ndvi min={:.4} max={:.4} mean={:.4} ({} pixels, {} non finite)",
        stats.min, stats.max, stats.mean, stats.finite_count, stats.non_finite_count
    );
    info!(
        "transform={:?} crs={}",
        ndvi.geo_transform.to_gdal(),
        ndvi.crs
    );

    write_f64_npy(&args.out, &ndvi.data)?;
    info!("wrote {:?}", args.out);
    Ok(())
}
