//! Parameter distributor: scatter a flat parameter vector onto raster cells.
//!
//! The vector is read in canonical cell order (row-major over valid cells):
//!
//! ```text
//! [ cell 0 block | cell 1 block | ... | cell n-1 block | lumped 0 | ... | lumped L-1 ]
//!   P - L values each                                    one value each
//! ```
//!
//! Each cell block gets the lumped values inserted, is written to the cell's
//! (row, col) position, and finally has its Muskingum `k` slot replaced by
//! the derived travel time.
use serde::{Deserialize, Serialize};

use crate::error::{invalid, DistError, Result};
use crate::layout::ParameterLayout;
use crate::muskingum::calculate_k;
use crate::persist::null_as_nan_vec;
use crate::raster::{get_raster_data, RasterMask, RasterSource};

// ── Output grid ───────────────────────────────────────────────────────────────

/// Per-cell parameter vectors on the raster grid, shaped
/// (rows, cols, n_params). Cells outside the catchment hold NaN in every slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterGrid {
    /// Row-major over cells, parameters contiguous within a cell.
    #[serde(deserialize_with = "null_as_nan_vec")]
    pub data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
    pub n_params: usize,
}

impl ParameterGrid {
    /// A grid with every slot set to NaN.
    pub fn empty(rows: usize, cols: usize, n_params: usize) -> Self {
        Self {
            data: vec![f64::NAN; rows * cols * n_params],
            rows,
            cols,
            n_params,
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.n_params)
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        (row * self.cols + col) * self.n_params
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, param: usize) -> f64 {
        self.data[self.offset(row, col) + param]
    }

    /// The parameter vector of one cell.
    pub fn cell(&self, row: usize, col: usize) -> &[f64] {
        let o = self.offset(row, col);
        &self.data[o..o + self.n_params]
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> &mut [f64] {
        let o = self.offset(row, col);
        let n = self.n_params;
        &mut self.data[o..o + n]
    }

    /// One parameter across the whole grid, row-major.
    pub fn layer(&self, param: usize) -> Vec<f64> {
        self.data.iter().skip(param).step_by(self.n_params.max(1)).copied().collect()
    }

    /// Number of cells whose slots are all real numbers.
    pub fn populated_cells(&self) -> usize {
        self.data
            .chunks(self.n_params.max(1))
            .filter(|c| c.iter().all(|v| !v.is_nan()))
            .count()
    }
}

// ── Distribution ──────────────────────────────────────────────────────────────

/// Distribute `par_g` over the valid cells of `raster`.
///
/// Fails with `InvalidInput` before building the grid when the layout is
/// inconsistent, the raster has no no-data value, or `par_g` does not hold
/// `no_elem * (no_parameters - no_lumped_par) + no_lumped_par` values.
/// A cell whose Muskingum `x` or position cannot produce a travel time also
/// fails the whole call.
pub fn par3d<R: RasterSource + ?Sized>(
    par_g: &[f64],
    raster: &R,
    layout: &ParameterLayout,
) -> Result<ParameterGrid> {
    layout.validate()?;
    let (mask, _) = get_raster_data(raster)?;
    let cells = mask.valid_cells();

    let expected = layout.expected_len(cells.len());
    if par_g.len() != expected {
        return invalid!(
            "parameter vector holds {} values but {} are needed: {} cells * ({} - {}) + {} lumped",
            par_g.len(),
            expected,
            cells.len(),
            layout.no_parameters,
            layout.no_lumped_par,
            layout.no_lumped_par
        );
    }

    scatter(par_g, &mask, &cells, layout)
}

/// Like [`par3d`], with a trailing block of lake parameters after the
/// catchment segment.
///
/// Returns the catchment grid and the lake parameters, whose second-to-last
/// value (the lake's Muskingum `k` position) is replaced by the derived
/// travel time computed from the last value (`x`).
pub fn par3d_with_lake<R: RasterSource + ?Sized>(
    par_g: &[f64],
    raster: &R,
    layout: &ParameterLayout,
    no_lake_parameters: usize,
) -> Result<(ParameterGrid, Vec<f64>)> {
    layout.validate()?;
    if no_lake_parameters < 2 {
        return invalid!(
            "lake parameters must include Muskingum k and x, \
             got {no_lake_parameters} lake parameters"
        );
    }
    let (mask, _) = get_raster_data(raster)?;
    let cells = mask.valid_cells();

    let catchment_len = layout.expected_len(cells.len());
    if par_g.len() != catchment_len + no_lake_parameters {
        return invalid!(
            "parameter vector holds {} values but {} are needed: {} catchment + {} lake",
            par_g.len(),
            catchment_len + no_lake_parameters,
            catchment_len,
            no_lake_parameters
        );
    }

    let (catchment, lake) = par_g.split_at(catchment_len);
    let grid = scatter(catchment, &mask, &cells, layout)?;

    let mut lake = lake.to_vec();
    let n = lake.len();
    lake[n - 2] = calculate_k(lake[n - 1], lake[n - 2], layout.kub, layout.klb)
        .map_err(|e| locate(e, "lake"))?;

    Ok((grid, lake))
}

/// Core scatter. `par_g` has already been length-checked against `cells`.
fn scatter(
    par_g: &[f64],
    mask: &RasterMask,
    cells: &[(usize, usize)],
    layout: &ParameterLayout,
) -> Result<ParameterGrid> {
    let n_params = layout.no_parameters;
    let per_cell = layout.per_cell();
    let (distributed, lumped) = par_g.split_at(cells.len() * per_cell);

    let mut grid = ParameterGrid::empty(mask.height, mask.width, n_params);
    let mut block = Vec::with_capacity(n_params);

    for (i, &(r, c)) in cells.iter().enumerate() {
        block.clear();
        block.extend_from_slice(&distributed[i * per_cell..(i + 1) * per_cell]);
        // Sequential insertion: later positions index the block as already
        // grown by earlier insertions. Positions past the end append.
        for (&pos, &value) in layout.lumped_par_pos.iter().zip(lumped) {
            block.insert(pos.min(block.len()), value);
        }
        grid.cell_mut(r, c).copy_from_slice(&block);
    }

    // Derived k reads the freshly scattered (position, x) pair.
    for &(r, c) in cells {
        let cell = grid.cell_mut(r, c);
        let x = cell[n_params - 1];
        let position = cell[n_params - 2];
        cell[n_params - 2] = calculate_k(x, position, layout.kub, layout.klb)
            .map_err(|e| locate(e, &format!("cell ({r}, {c})")))?;
    }

    Ok(grid)
}

fn locate(err: DistError, at: &str) -> DistError {
    match err {
        DistError::InvalidInput(msg) => DistError::InvalidInput(format!("{at}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f64 = -9999.0;

    fn l_shape() -> RasterMask {
        RasterMask::from_rows(&[vec![ND, 5.0], vec![5.0, 5.0]], Some(ND)).unwrap()
    }

    #[test]
    fn blocks_follow_canonical_order() {
        // Slot 2 is x = 0.5 everywhere, so k collapses to 1.0 regardless of
        // the position in slot 1.
        let par = [1.0, 2.0, 0.5, 4.0, 5.0, 0.5, 7.0, 8.0, 0.5];
        let layout = ParameterLayout::distributed(3).with_k_bounds(1.0, 0.0);
        let grid = par3d(&par, &l_shape(), &layout).unwrap();

        assert_eq!(grid.shape(), (2, 2, 3));
        assert_eq!(grid.cell(0, 1), &[1.0, 1.0, 0.5]);
        assert_eq!(grid.cell(1, 0), &[4.0, 1.0, 0.5]);
        assert_eq!(grid.cell(1, 1), &[7.0, 1.0, 0.5]);
        assert!(grid.cell(0, 0).iter().all(|v| v.is_nan()));
        assert_eq!(grid.populated_cells(), 3);
    }

    #[test]
    fn lumped_value_shared_by_every_cell() {
        // P = 4, one lumped value at slot 1.
        let par = [10.0, 0.0, 0.5, 20.0, 0.0, 0.5, 30.0, 0.0, 0.5, 99.0];
        let layout = ParameterLayout::distributed(4).with_lumped(vec![1]);
        let grid = par3d(&par, &l_shape(), &layout).unwrap();
        for (r, c) in l_shape().valid_cells() {
            assert_eq!(grid.get(r, c, 1), 99.0);
        }
        assert_eq!(grid.get(0, 1, 0), 10.0);
        assert_eq!(grid.get(1, 1, 0), 30.0);
    }

    #[test]
    fn all_lumped_layout_copies_vector() {
        let layout = ParameterLayout::distributed(3).with_lumped(vec![0, 1, 2]);
        let grid = par3d(&[7.0, 100.0, 0.5], &l_shape(), &layout).unwrap();
        for (r, c) in l_shape().valid_cells() {
            assert_eq!(grid.cell(r, c)[0], 7.0);
            assert_eq!(grid.cell(r, c)[2], 0.5);
        }
    }

    #[test]
    fn short_vector_fails() {
        let layout = ParameterLayout::distributed(3);
        let err = par3d(&[0.5; 8], &l_shape(), &layout).unwrap_err();
        match err {
            DistError::InvalidInput(msg) => {
                assert!(msg.contains("8") && msg.contains("9"), "{msg}")
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn bad_x_names_the_cell() {
        let par = [1.0, 2.0, 0.5, 4.0, 5.0, 0.0, 7.0, 8.0, 0.5];
        let err = par3d(&par, &l_shape(), &ParameterLayout::distributed(3)).unwrap_err();
        assert!(err.to_string().contains("cell (1, 0)"), "{err}");
    }

    #[test]
    fn layer_extracts_one_parameter() {
        let par = [1.0, 2.0, 0.5, 4.0, 5.0, 0.5, 7.0, 8.0, 0.5];
        let layout = ParameterLayout::distributed(3).with_k_bounds(1.0, 0.0);
        let grid = par3d(&par, &l_shape(), &layout).unwrap();
        let first = grid.layer(0);
        assert!(first[0].is_nan());
        assert_eq!(&first[1..], &[1.0, 4.0, 7.0]);
    }

    #[test]
    fn lake_block_gets_derived_k() {
        let layout = ParameterLayout::distributed(3).with_k_bounds(1.0, 0.0);
        let mut par = vec![1.0, 2.0, 0.5, 4.0, 5.0, 0.5, 7.0, 8.0, 0.5];
        par.extend([3.0, 40.0, 0.5]);
        let (grid, lake) = par3d_with_lake(&par, &l_shape(), &layout, 3).unwrap();
        assert_eq!(grid.populated_cells(), 3);
        assert_eq!(lake, vec![3.0, 1.0, 0.5]);
    }

    #[test]
    fn lake_needs_two_parameters() {
        let layout = ParameterLayout::distributed(3);
        let par = [0.5; 10];
        assert!(par3d_with_lake(&par, &l_shape(), &layout, 1).is_err());
    }
}
