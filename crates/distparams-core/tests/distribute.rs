//! End-to-end behaviour of the parameter distributor.
use distparams_core::muskingum::calculate_k;
use distparams_core::{
    load, par3d, save, DistError, HbvParameter, ParameterGrid, ParameterLayout, RasterMask,
};

const ND: f64 = -9999.0;

fn l_shape() -> RasterMask {
    RasterMask::from_rows(&[vec![ND, 5.0], vec![5.0, 5.0]], Some(ND)).unwrap()
}

/// A 4×5 catchment with an irregular outline (9 empty cells, 11 valid).
fn catchment() -> RasterMask {
    RasterMask::from_rows(
        &[
            vec![ND, ND, 12.0, 13.0, ND],
            vec![ND, 21.0, 22.0, 23.0, 24.0],
            vec![30.0, 31.0, 32.0, 33.0, ND],
            vec![ND, ND, 42.0, ND, ND],
        ],
        Some(ND),
    )
    .unwrap()
}

/// Deterministic pseudo-random values in [lo, hi).
fn lcg_values(n: usize, mut state: u64, lo: f64, hi: f64) -> Vec<f64> {
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            lo + (state >> 11) as f64 / (1u64 << 53) as f64 * (hi - lo)
        })
        .collect()
}

/// Build a per-cell vector whose last two slots are a valid (position, x).
fn cell_vectors(no_elem: usize, n: usize, seed: u64) -> Vec<f64> {
    let raw = lcg_values(no_elem * n, seed, 0.0, 1.0);
    raw.chunks(n)
        .flat_map(|c| {
            let mut v = c.to_vec();
            v[n - 2] = c[n - 2] * 100.0;
            v[n - 1] = 0.05 + c[n - 1] * 0.9;
            v
        })
        .collect()
}

#[test]
fn two_by_two_example() {
    // x = 0.5 with (kub, klb) = (1, 0) makes derived k 1.0 for every cell, so
    // only slot 1 differs from the raw input.
    let par = [1.0, 2.0, 0.5, 4.0, 5.0, 0.5, 7.0, 8.0, 0.5];
    let layout = ParameterLayout::distributed(3).with_k_bounds(1.0, 0.0);
    let grid = par3d(&par, &l_shape(), &layout).unwrap();

    assert_eq!(grid.cell(0, 1), &[1.0, 1.0, 0.5]);
    assert_eq!(grid.cell(1, 0), &[4.0, 1.0, 0.5]);
    assert_eq!(grid.cell(1, 1), &[7.0, 1.0, 0.5]);
    assert!(grid.cell(0, 0).iter().all(|v| v.is_nan()));
}

#[test]
fn valid_cells_populated_and_empty_cells_nan() {
    let mask = catchment();
    let no_elem = mask.valid_count();
    assert_eq!(no_elem, 11);

    let layout = ParameterLayout::distributed(5);
    let grid = par3d(&cell_vectors(no_elem, 5, 7), &mask, &layout).unwrap();

    assert_eq!(grid.shape(), (4, 5, 5));
    assert_eq!(grid.populated_cells(), no_elem);
    for r in 0..mask.height {
        for c in 0..mask.width {
            let cell = grid.cell(r, c);
            if mask.is_valid(r, c) {
                assert!(cell.iter().all(|v| v.is_finite()), "({r}, {c}) = {cell:?}");
            } else {
                assert!(cell.iter().all(|v| v.is_nan()), "({r}, {c}) = {cell:?}");
            }
        }
    }
}

#[test]
fn distributed_blocks_round_trip_except_k() {
    let mask = catchment();
    let n = 4;
    let par = cell_vectors(mask.valid_count(), n, 42);
    let layout = ParameterLayout::distributed(n);
    let grid = par3d(&par, &mask, &layout).unwrap();

    for (block, (r, c)) in par.chunks(n).zip(mask.valid_cells()) {
        let cell = grid.cell(r, c);
        assert_eq!(&cell[..n - 2], &block[..n - 2]);
        assert_eq!(cell[n - 1], block[n - 1]);
        let k = calculate_k(block[n - 1], block[n - 2], layout.kub, layout.klb).unwrap();
        assert_eq!(cell[n - 2], k);
    }
}

#[test]
fn lumped_positions_insert_sequentially() {
    // Per-cell block [a, b, pos, x]; lumped L0 at 2 then L1 at 0.
    // Sequential: [a, b, L0, pos, x] -> [L1, a, b, L0, pos, x].
    // Fixed final slots would instead give [L1, a, L0, b, pos, x].
    let par = [
        1.0, 2.0, 50.0, 0.5, // cell (0, 1)
        3.0, 4.0, 50.0, 0.5, // cell (1, 0)
        5.0, 6.0, 50.0, 0.5, // cell (1, 1)
        55.0, 66.0, // lumped
    ];
    let layout = ParameterLayout::distributed(6).with_lumped(vec![2, 0]);
    let grid = par3d(&par, &l_shape(), &layout).unwrap();

    assert_eq!(grid.cell(0, 1), &[66.0, 1.0, 2.0, 55.0, 1.0, 0.5]);
    assert_eq!(grid.cell(1, 0), &[66.0, 3.0, 4.0, 55.0, 1.0, 0.5]);
    assert_eq!(grid.cell(1, 1), &[66.0, 5.0, 6.0, 55.0, 1.0, 0.5]);
}

#[test]
fn ascending_lumped_positions_land_on_final_slots() {
    // [a, b, pos, x] -> [a, L0, b, pos, x] -> [a, L0, b, L1, pos, x]
    let par = [
        1.0, 2.0, 50.0, 0.5, //
        3.0, 4.0, 50.0, 0.5, //
        5.0, 6.0, 50.0, 0.5, //
        55.0, 66.0,
    ];
    let layout = ParameterLayout::distributed(6).with_lumped(vec![1, 3]);
    let grid = par3d(&par, &l_shape(), &layout).unwrap();
    assert_eq!(grid.cell(1, 0), &[3.0, 55.0, 4.0, 66.0, 1.0, 0.5]);
}

#[test]
fn hbv_layout_places_named_lumped_parameters() {
    let mask = l_shape();
    let layout = ParameterLayout::hbv(&[HbvParameter::Perc, HbvParameter::K1]);
    let mut par = cell_vectors(mask.valid_count(), 19, 3);
    par.extend([0.11, 2.2]); // k1, perc in slot order

    let grid = par3d(&par, &mask, &layout).unwrap();
    for (r, c) in mask.valid_cells() {
        assert_eq!(grid.get(r, c, HbvParameter::K1.index()), 0.11);
        assert_eq!(grid.get(r, c, HbvParameter::Perc.index()), 2.2);
    }
}

#[test]
fn one_short_fails_before_output() {
    let err = par3d(&[0.5; 8], &l_shape(), &ParameterLayout::distributed(3)).unwrap_err();
    assert!(matches!(err, DistError::InvalidInput(_)));
}

#[test]
fn lumped_without_positions_fails() {
    let layout = ParameterLayout {
        no_lumped_par: 1,
        lumped_par_pos: vec![],
        ..ParameterLayout::distributed(3)
    };
    let err = par3d(&[0.5; 7], &l_shape(), &layout).unwrap_err();
    assert!(matches!(err, DistError::InvalidInput(_)));
}

#[test]
fn malformed_mask_fails_instead_of_panicking() {
    let short = RasterMask {
        data: vec![5.0, 5.0],
        width: 2,
        height: 2,
        no_data: Some(distparams_core::NoData(ND)),
    };
    let err = par3d(&[0.5; 6], &short, &ParameterLayout::distributed(3)).unwrap_err();
    assert!(matches!(err, DistError::InvalidInput(_)));

    let loaded: RasterMask =
        serde_json::from_str(r#"{"data":[5.0],"width":3,"height":3,"no_data":-9999.0}"#).unwrap();
    let err = par3d(&[0.5; 27], &loaded, &ParameterLayout::distributed(3)).unwrap_err();
    assert!(matches!(err, DistError::InvalidInput(_)));
}

#[test]
fn raster_without_sentinel_fails() {
    let mask = RasterMask::from_rows(&[vec![1.0, 2.0]], None).unwrap();
    let err = par3d(&[0.5; 6], &mask, &ParameterLayout::distributed(3)).unwrap_err();
    assert!(matches!(err, DistError::InvalidInput(_)));
}

#[test]
fn empty_catchment_gives_all_nan_grid() {
    let mask = RasterMask::from_rows(&[vec![ND, ND], vec![ND, ND]], Some(ND)).unwrap();
    let grid = par3d(&[], &mask, &ParameterLayout::distributed(3)).unwrap();
    assert_eq!(grid.populated_cells(), 0);
    assert!(grid.data.iter().all(|v| v.is_nan()));
}

#[test]
fn inputs_are_left_untouched() {
    let mask = l_shape();
    let par = vec![1.0, 2.0, 0.5, 4.0, 5.0, 0.5, 7.0, 8.0, 0.5];
    let before = par.clone();
    par3d(&par, &mask, &ParameterLayout::distributed(3)).unwrap();
    assert_eq!(par, before);
    assert_eq!(mask.valid_cells(), vec![(0, 1), (1, 0), (1, 1)]);
}

#[test]
fn grid_survives_save_and_load() {
    let dir = std::env::temp_dir().join(format!("distparams-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let name = dir.join("par3d").to_string_lossy().into_owned();

    let mask = catchment();
    let par = cell_vectors(mask.valid_count(), 4, 9);
    let grid = par3d(&par, &mask, &ParameterLayout::distributed(4)).unwrap();
    save(&grid, &name).unwrap();
    let back: ParameterGrid = load(&name).unwrap();

    assert_eq!(back.shape(), grid.shape());
    for (a, b) in grid.data.iter().zip(&back.data) {
        assert!(a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()), "{a} != {b}");
    }
}
