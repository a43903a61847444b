//! How a flat parameter vector is laid out across catchment cells.
use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};
use crate::muskingum::{DEFAULT_KLB, DEFAULT_KUB};
use crate::parameters::{lumped_positions, HbvParameter, N_HBV_PARAMS};

/// Layout metadata for [`crate::distribute::par3d`].
///
/// The parameter vector holds one block of `no_parameters - no_lumped_par`
/// values per valid cell (canonical cell order), followed by one value per
/// lumped parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterLayout {
    /// Parameters per cell, lumped ones included.
    pub no_parameters: usize,
    #[serde(default)]
    pub no_lumped_par: usize,
    /// Slot each lumped value is inserted at, applied in list order into the
    /// growing per-cell block.
    #[serde(default)]
    pub lumped_par_pos: Vec<usize>,
    /// Upper bound of the Muskingum travel time `k`.
    #[serde(default = "default_kub")]
    pub kub: f64,
    /// Lower bound of the Muskingum travel time `k`.
    #[serde(default = "default_klb")]
    pub klb: f64,
}

fn default_kub() -> f64 {
    DEFAULT_KUB
}

fn default_klb() -> f64 {
    DEFAULT_KLB
}

impl ParameterLayout {
    /// Fully distributed layout: every parameter has its own value per cell.
    pub fn distributed(no_parameters: usize) -> Self {
        Self {
            no_parameters,
            no_lumped_par: 0,
            lumped_par_pos: Vec::new(),
            kub: DEFAULT_KUB,
            klb: DEFAULT_KLB,
        }
    }

    /// Mark parameters as lumped at the given insertion positions.
    pub fn with_lumped(mut self, positions: Vec<usize>) -> Self {
        self.no_lumped_par = positions.len();
        self.lumped_par_pos = positions;
        self
    }

    pub fn with_k_bounds(mut self, kub: f64, klb: f64) -> Self {
        self.kub = kub;
        self.klb = klb;
        self
    }

    /// The 21-parameter HBV layout with the named parameters lumped.
    /// Lumped values go at the end of the vector in slot order.
    pub fn hbv(lumped: &[HbvParameter]) -> Self {
        let (_, positions) = lumped_positions(lumped);
        Self::distributed(N_HBV_PARAMS).with_lumped(positions)
    }

    /// Values each cell owns in the parameter vector.
    pub fn per_cell(&self) -> usize {
        self.no_parameters - self.no_lumped_par
    }

    /// Required vector length for a raster with `no_elem` valid cells.
    pub fn expected_len(&self, no_elem: usize) -> usize {
        no_elem * self.per_cell() + self.no_lumped_par
    }

    /// Check the layout on its own, before any raster is touched.
    pub fn validate(&self) -> Result<()> {
        if self.no_parameters < 2 {
            return invalid!(
                "no_parameters must be at least 2 \
                 (Muskingum k and x occupy the last two slots), got {}",
                self.no_parameters
            );
        }
        if self.no_lumped_par > self.no_parameters {
            return invalid!(
                "no_lumped_par = {} exceeds no_parameters = {}",
                self.no_lumped_par,
                self.no_parameters
            );
        }
        if self.lumped_par_pos.len() != self.no_lumped_par {
            return invalid!(
                "{} lumped parameters declared but {} positions given in lumped_par_pos",
                self.no_lumped_par,
                self.lumped_par_pos.len()
            );
        }
        if let Some(&pos) = self.lumped_par_pos.iter().find(|&&p| p >= self.no_parameters) {
            return invalid!(
                "lumped position {pos} is outside [0, {})",
                self.no_parameters
            );
        }
        if !self.kub.is_finite() || !self.klb.is_finite() {
            return invalid!("k bounds must be finite, got kub = {}, klb = {}", self.kub, self.klb);
        }
        Ok(())
    }
}
