/// Parameter distribution tool: reads a catchment GeoTIFF and a flat
/// parameter vector, scatters the vector onto the valid cells and saves the
/// resulting (rows, cols, parameters) grid as JSON.
///
/// Parameter files are either a JSON array of numbers or plain text with
/// values separated by newlines / whitespace (one column from an optimiser).
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use distparams_core::parameters::lumped_positions;
use distparams_core::{
    par3d, par3d_with_lake, save, GeoTiff, HbvParameter, ParameterLayout, RasterSource,
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "distribute",
    about = "Distribute a flat parameter vector onto the cells of a catchment raster"
)]
struct Args {
    /// Catchment raster (DEM, flow accumulation or flow direction GeoTIFF)
    #[arg(short, long)]
    raster: PathBuf,

    /// Parameter vector: JSON array or whitespace-separated text
    #[arg(short, long)]
    params: PathBuf,

    /// JSON layout file (no_parameters, no_lumped_par, lumped_par_pos, kub, klb).
    /// Overrides the layout flags below.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Parameters per cell, lumped ones included (default: 21-parameter HBV)
    #[arg(short, long)]
    no_parameters: Option<usize>,

    /// Comma-separated insertion positions of lumped parameters, e.g. 6,8
    #[arg(long, value_delimiter = ',', conflicts_with = "lumped")]
    lumped_pos: Vec<usize>,

    /// Comma-separated HBV names of lumped parameters, e.g. k1,perc.
    /// Their trailing values must follow HBV slot order (ltt ... x_muskingum),
    /// whatever order the names are listed in.
    #[arg(long, value_delimiter = ',')]
    lumped: Vec<String>,

    /// Upper bound of Muskingum k
    #[arg(long, default_value = "1.0")]
    kub: f64,

    /// Lower bound of Muskingum k
    #[arg(long, default_value = "0.5")]
    klb: f64,

    /// Number of lake parameters at the end of the vector (0 = no lake)
    #[arg(long, default_value = "0")]
    lake_parameters: usize,

    /// Output name; the grid is written to <output>.json
    #[arg(short, long, default_value = "par3d")]
    output: String,
}

// ── Input helpers ─────────────────────────────────────────────────────────────

/// Parse a parameter vector from JSON (`[1.0, 2.0]`) or plain text.
fn parse_params(text: &str) -> Result<Vec<f64>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Invalid JSON parameter array");
    }
    trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(i, s)| {
            s.parse::<f64>()
                .with_context(|| format!("Value {} ({s:?}) is not a number", i + 1))
        })
        .collect()
}

fn read_params(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_params(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse the `--lumped` names.
fn lumped_names(args: &Args) -> Result<Vec<HbvParameter>> {
    Ok(args
        .lumped
        .iter()
        .map(|s| s.parse::<HbvParameter>())
        .collect::<Result<Vec<_>, _>>()?)
}

/// Order the trailing lumped values must be supplied in: HBV slot order,
/// duplicates removed.
fn lumped_value_order(names: &[HbvParameter]) -> Vec<HbvParameter> {
    lumped_positions(names).0
}

/// Resolve the layout from a file or from the command-line flags.
fn resolve_layout(args: &Args) -> Result<ParameterLayout> {
    if let Some(path) = &args.layout {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse layout {}", path.display()));
    }

    let layout = if !args.lumped.is_empty() {
        let names = lumped_names(args)?;
        if let Some(n) = args.no_parameters {
            if n != HbvParameter::ALL.len() {
                bail!(
                    "--lumped names HBV parameters, which needs --no-parameters 21 (got {n})"
                );
            }
        }
        ParameterLayout::hbv(&names)
    } else {
        let n = args.no_parameters.unwrap_or(HbvParameter::ALL.len());
        ParameterLayout::distributed(n).with_lumped(args.lumped_pos.clone())
    };
    Ok(layout.with_k_bounds(args.kub, args.klb))
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();

    let layout = resolve_layout(&args)?;
    if args.layout.is_none() && !args.lumped.is_empty() {
        let order: Vec<&str> = lumped_value_order(&lumped_names(&args)?)
            .into_iter()
            .map(HbvParameter::name)
            .collect();
        eprintln!("[distribute] lumped order: {}", order.join(", "));
    }
    let par_g = read_params(&args.params)?;
    let raster = GeoTiff::open(&args.raster)
        .with_context(|| format!("Cannot open raster {}", args.raster.display()))?;

    eprintln!(
        "[distribute] {}x{} raster, nodata = {:?}, {} values, \
         {} parameters/cell ({} lumped at {:?})",
        raster.height(),
        raster.width(),
        raster.no_data_value(),
        par_g.len(),
        layout.no_parameters,
        layout.no_lumped_par,
        layout.lumped_par_pos
    );

    let grid = if args.lake_parameters > 0 {
        let (grid, lake) = par3d_with_lake(&par_g, &raster, &layout, args.lake_parameters)?;
        let lake_path = save(&lake, &format!("{}_lake", args.output))?;
        eprintln!("  lake parameters -> {}", lake_path.display());
        grid
    } else {
        par3d(&par_g, &raster, &layout)?
    };

    let path = save(&grid, &args.output)?;
    eprintln!(
        "[distribute] {} cells populated -> {}",
        grid.populated_cells(),
        path.display()
    );
    Ok(())
}
