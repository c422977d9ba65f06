use clap::Parser;
use cogndvi::{Error, COG};
use tracing_subscriber::EnvFilter;

/// Prints the structure and georeferencing of a COG
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Local path, http(s):// URL, /vsicurl/ or s3:// locator
    location: String,
    /// Print the georeference as JSON
    #[arg(long)]
    json: bool,
}

#[cfg(feature = "json")]
fn print_json(cog: &COG) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(&cog.georeference)?);
    Ok(())
}

#[cfg(not(feature = "json"))]
fn print_json(_cog: &COG) -> Result<(), Error> {
    Err(Error::OtherError(
        "built without the json feature".to_string(),
    ))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let cog = cogndvi::open(&args.location).await?;

    if args.json {
        return print_json(&cog);
    }

    println!(
        "cog width={}, height={}, samples_per_pixel={}, sample_type={:?}, compression={:?}, overviews={}",
        cog.width(),
        cog.height(),
        cog.samples_per_pixel(),
        cog.sample_type(),
        cog.compression(),
        cog.overviews.len()
    );
    for (i, overview) in cog.overviews.iter().enumerate() {
        let georef = cog.compute_georeference_for_overview(overview);
        println!(
            "overview i={}, width={}, height={}, tile_width={}, tile_height={}, predictor={:?}, resolution=({}, {})",
            i,
            overview.width,
            overview.height,
            overview.tile_width,
            overview.tile_height,
            overview.predictor,
            georef.geo_transform.x_res,
            georef.geo_transform.y_res
        );
    }
    println!("nodata: {:?}", cog.nodata);
    println!("crs: {}, unit: {:?}", cog.georeference.crs, cog.georeference.unit);
    println!("geotransform: {:?}", cog.georeference.geo_transform.to_gdal());
    println!(
        "bounds: {:?}",
        cog.georeference
            .geo_transform
            .bounds(cog.width(), cog.height())
    );
    println!("geo_key_directory: {:?}", cog.geo_keys);
    println!("stats: {}", cog.get_stats());
    Ok(())
}
