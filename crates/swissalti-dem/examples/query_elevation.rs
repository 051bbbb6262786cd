//! Example: Query swissALTI3D elevation at a coordinate.
//!
//! Usage: cargo run --example query_elevation -- [lat] [lon] [cache_dir]
//!
//! Defaults to the Dent de Morcles summit (~2969 m). Tiles are fetched
//! on first use and reused from the cache directory afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Instant;
use swissalti_dem::{ElevationProvider, SwissAlti3dProvider};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,swissalti_dem=debug".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    // Dent de Morcles:
    // echo "2571970 1116492" | gdaltransform -t_srs EPSG:4326 -s_srs EPSG:2056
    let lat: f64 = args
        .get(1)
        .map(|s| s.parse().expect("Invalid latitude"))
        .unwrap_or(46.1992990818056);
    let lon: f64 = args
        .get(2)
        .map(|s| s.parse().expect("Invalid longitude"))
        .unwrap_or(7.07552341505788);
    let cache_dir = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(SwissAlti3dProvider::default_cache_dir);

    println!("Caching tiles under {}", cache_dir.display());
    let provider = match SwissAlti3dProvider::new(&cache_dir) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Querying elevation at ({}, {})...", lat, lon);
    let start = Instant::now();
    let elevation = provider.elevation(lat, lon);
    println!(
        "Elevation: {:.2} meters (resolved in {:.2}s)",
        elevation,
        start.elapsed().as_secs_f64()
    );

    // Second query should be fast (raster already decoded in memory).
    let start = Instant::now();
    let cached = provider.elevation(lat, lon);
    println!(
        "Elevation (cached): {:.2} meters ({:.6}s)",
        cached,
        start.elapsed().as_secs_f64()
    );
}
