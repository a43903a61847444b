//! Raster masks and the raster-access collaborator.
//!
//! A catchment raster (DEM, flow accumulation, flow direction, ...) is only
//! used for its geometry: which cells hold data and which hold the no-data
//! sentinel. Values are stored as f64, row-major, row 0 = first TIFF row.
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::{invalid, DistError, Result};
use crate::persist::null_as_nan_vec;

// ── Sentinel ─────────────────────────────────────────────────────────────────

/// The value marking cells outside the catchment.
///
/// Comparison is exact floating-point equality, with no tolerance. Raster
/// writers store the sentinel bit-for-bit, so any tolerance would only risk
/// misclassifying real data near the sentinel. A NaN sentinel matches NaN
/// cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoData(pub f64);

impl NoData {
    #[inline]
    pub fn matches(self, value: f64) -> bool {
        if self.0.is_nan() {
            value.is_nan()
        } else {
            value == self.0
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

// ── In-memory mask ───────────────────────────────────────────────────────────

/// A single-band raster held in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterMask {
    /// Row-major cell values.
    #[serde(deserialize_with = "null_as_nan_vec")]
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
    pub no_data: Option<NoData>,
}

impl RasterMask {
    /// Build a mask from row-major values. Fails if `data` does not hold
    /// exactly `width * height` values.
    pub fn new(
        data: Vec<f64>,
        width: usize,
        height: usize,
        no_data: Option<f64>,
    ) -> Result<Self> {
        let mask = Self { data, width, height, no_data: no_data.map(NoData) };
        mask.check_shape()?;
        Ok(mask)
    }

    /// Build a mask from a list of rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>], no_data: Option<f64>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return invalid!("raster row {i} has {} columns, expected {width}", row.len());
        }
        let data = rows.iter().flatten().copied().collect();
        Self::new(data, width, height, no_data)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    /// Whether the cell lies inside the catchment. Without a sentinel every
    /// cell counts as valid.
    #[inline]
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        match self.no_data {
            Some(nd) => !nd.matches(self.get(row, col)),
            None => true,
        }
    }

    /// Check that `data` holds exactly `width * height` values. Masks built
    /// by field or loaded from JSON skip [`RasterMask::new`].
    pub fn check_shape(&self) -> Result<()> {
        if self.data.len() != self.width * self.height {
            return invalid!(
                "raster data holds {} values but {}x{} = {} were expected",
                self.data.len(),
                self.height,
                self.width,
                self.width * self.height
            );
        }
        Ok(())
    }

    /// Coordinates of all valid cells in canonical order: row-major, then
    /// column. This order defines how a flat parameter vector maps to cells.
    pub fn valid_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for r in 0..self.height {
            for c in 0..self.width {
                if self.is_valid(r, c) {
                    cells.push((r, c));
                }
            }
        }
        cells
    }

    pub fn valid_count(&self) -> usize {
        match self.no_data {
            Some(nd) => self.data.iter().filter(|&&v| !nd.matches(v)).count(),
            None => self.data.len(),
        }
    }
}

// ── Collaborator trait ───────────────────────────────────────────────────────

/// Anything that can hand over a 2-D array and its no-data value.
pub trait RasterSource {
    /// Read the full first band.
    fn read_array(&self) -> Result<RasterMask>;

    /// The band's no-data sentinel, if the raster declares one.
    fn no_data_value(&self) -> Option<f64>;
}

impl RasterSource for RasterMask {
    fn read_array(&self) -> Result<RasterMask> {
        Ok(self.clone())
    }

    fn no_data_value(&self) -> Option<f64> {
        self.no_data.map(NoData::value)
    }
}

/// Read the mask and its sentinel in one call.
///
/// Fails with `InvalidInput` when the raster does not declare a no-data
/// value, since the catchment geometry is undefined without one, or when the
/// array does not match its declared shape.
pub fn get_raster_data<R: RasterSource + ?Sized>(raster: &R) -> Result<(RasterMask, NoData)> {
    let Some(nd) = raster.no_data_value() else {
        return invalid!(
            "raster has no no-data value; cannot tell catchment cells from empty ones"
        );
    };
    let mut mask = raster.read_array()?;
    mask.check_shape()?;
    let nd = NoData(nd);
    mask.no_data = Some(nd);
    Ok((mask, nd))
}

// ── GeoTIFF reader ───────────────────────────────────────────────────────────

/// A single-band GeoTIFF decoded into memory.
///
/// GDAL stores the band no-data value as ASCII text in its private
/// `GDAL_NODATA` tag (42113).
///
/// Every sample type the `tiff` crate decodes is widened to f64. For float32
/// rasters the sentinel is rounded to f32 precision first so that it compares
/// equal to the stored cells.
#[derive(Debug, Clone)]
pub struct GeoTiff {
    path: Option<PathBuf>,
    mask: RasterMask,
}

impl GeoTiff {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| DistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut tiff = Self::from_reader(Cursor::new(bytes))?;
        tiff.path = Some(path.to_path_buf());
        Ok(tiff)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut decoder = Decoder::new(reader)?;
        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);

        let no_data = decoder
            .find_tag(Tag::GdalNodata)?
            .map(|v| v.into_string())
            .transpose()?
            .map(|s| parse_no_data(&s))
            .transpose()?;

        let (samples, is_f32) = match decoder.read_image()? {
            DecodingResult::U8(v) => (v.into_iter().map(f64::from).collect::<Vec<_>>(), false),
            DecodingResult::U16(v) => (v.into_iter().map(f64::from).collect(), false),
            DecodingResult::U32(v) => (v.into_iter().map(f64::from).collect(), false),
            DecodingResult::U64(v) => (v.into_iter().map(|x| x as f64).collect(), false),
            DecodingResult::I8(v) => (v.into_iter().map(f64::from).collect(), false),
            DecodingResult::I16(v) => (v.into_iter().map(f64::from).collect(), false),
            DecodingResult::I32(v) => (v.into_iter().map(f64::from).collect(), false),
            DecodingResult::I64(v) => (v.into_iter().map(|x| x as f64).collect(), false),
            DecodingResult::F32(v) => (v.into_iter().map(f64::from).collect(), true),
            DecodingResult::F64(v) => (v, false),
            #[allow(unreachable_patterns)]
            _ => return invalid!("unsupported TIFF sample type"),
        };

        let data = first_band(samples, width, height)?;
        let no_data = if is_f32 { no_data.map(|v| v as f32 as f64) } else { no_data };

        Ok(Self {
            path: None,
            mask: RasterMask::new(data, width, height, no_data)?,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn width(&self) -> usize {
        self.mask.width
    }

    pub fn height(&self) -> usize {
        self.mask.height
    }
}

impl RasterSource for GeoTiff {
    fn read_array(&self) -> Result<RasterMask> {
        Ok(self.mask.clone())
    }

    fn no_data_value(&self) -> Option<f64> {
        self.mask.no_data.map(NoData::value)
    }
}

/// GDAL writes the sentinel as text, sometimes NUL-terminated.
fn parse_no_data(raw: &str) -> Result<f64> {
    let s = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    s.parse::<f64>()
        .or_else(|_| invalid!("cannot parse no-data value {s:?}"))
}

/// Keep band 1 of a chunky (pixel-interleaved) image.
fn first_band(samples: Vec<f64>, width: usize, height: usize) -> Result<Vec<f64>> {
    let n_cells = width * height;
    if samples.len() == n_cells {
        return Ok(samples);
    }
    if n_cells == 0 || samples.len() % n_cells != 0 {
        return invalid!(
            "TIFF holds {} samples, not a multiple of {height}x{width} cells",
            samples.len()
        );
    }
    let bands = samples.len() / n_cells;
    Ok(samples.into_iter().step_by(bands).collect())
}
