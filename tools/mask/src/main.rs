/// Mask extraction tool: reads a catchment GeoTIFF, saves the cell values
/// together with the no-data sentinel, and writes a small manifest with the
/// valid-cell count a parameter vector has to match.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use distparams_core::{get_raster_data, save, GeoTiff, ParameterLayout, RasterMask};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "mask", about = "Extract the catchment mask and no-data value from a raster")]
struct Args {
    /// Catchment raster (GeoTIFF)
    #[arg(short, long)]
    raster: PathBuf,

    /// Output name; writes <output>.json and <output>_manifest.json
    #[arg(short, long, default_value = "mask")]
    output: String,

    /// Parameters per cell, used to report the expected vector length
    #[arg(short, long, default_value = "21")]
    no_parameters: usize,

    /// Number of lumped parameters, used to report the expected vector length
    #[arg(short = 'l', long, default_value = "0")]
    no_lumped_par: usize,
}

#[derive(Serialize)]
struct Manifest {
    raster: String,
    rows: usize,
    cols: usize,
    no_data: f64,
    valid_cells: usize,
    no_parameters: usize,
    no_lumped_par: usize,
    expected_vector_len: usize,
}

fn manifest(
    raster: &str,
    mask: &RasterMask,
    no_data: f64,
    no_parameters: usize,
    no_lumped_par: usize,
) -> Manifest {
    let valid_cells = mask.valid_count();
    let layout = ParameterLayout {
        no_parameters,
        no_lumped_par,
        ..ParameterLayout::distributed(no_parameters)
    };
    Manifest {
        raster: raster.to_string(),
        rows: mask.height,
        cols: mask.width,
        no_data,
        valid_cells,
        no_parameters,
        no_lumped_par,
        expected_vector_len: layout.expected_len(valid_cells),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.no_lumped_par > args.no_parameters {
        anyhow::bail!(
            "--no-lumped-par ({}) cannot exceed --no-parameters ({})",
            args.no_lumped_par,
            args.no_parameters
        );
    }

    let raster = GeoTiff::open(&args.raster)
        .with_context(|| format!("Cannot open raster {}", args.raster.display()))?;
    let (mask, no_data) = get_raster_data(&raster)
        .with_context(|| format!("No catchment mask in {}", args.raster.display()))?;

    let mask_path = save(&mask, &args.output)?;
    let m = manifest(
        &args.raster.to_string_lossy(),
        &mask,
        no_data.value(),
        args.no_parameters,
        args.no_lumped_par,
    );
    let manifest_path = save(&m, &format!("{}_manifest", args.output))?;

    eprintln!(
        "[mask] {}x{} raster, {} valid cells (nodata {}) -> {}",
        m.rows,
        m.cols,
        m.valid_cells,
        m.no_data,
        mask_path.display()
    );
    eprintln!(
        "[mask] parameter vector must hold {} values -> {}",
        m.expected_vector_len,
        manifest_path.display()
    );
    Ok(())
}
