//! Named parameters of the distributed HBV model with Muskingum routing.
//!
//! Per-cell parameter vectors follow the order of [`HbvParameter::ALL`].
//! The last two slots are always the Muskingum pair (`k`, `x`), which is
//! what the derived-k step relies on.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DistError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HbvParameter {
    /// Lower temperature threshold (°C).
    Ltt,
    /// Upper temperature threshold (°C).
    Utt,
    /// Rainfall correction factor.
    Rfcf,
    /// Snowfall correction factor.
    Sfcf,
    /// Melt threshold temperature (°C).
    Ttm,
    /// Degree-day factor (mm/°C/day).
    Cfmax,
    /// Water holding capacity of snow.
    Cwh,
    /// Refreezing coefficient.
    Cfr,
    /// Maximum soil moisture storage (mm).
    Fc,
    /// Soil routine shape coefficient.
    Beta,
    /// Evapotranspiration correction factor.
    ECorr,
    /// Temperature anomaly correction of potential evapotranspiration.
    Etf,
    /// Soil moisture fraction above which ET is potential.
    Lp,
    /// Capillary flux coefficient.
    CFlux,
    /// Upper zone recession coefficient.
    K,
    /// Lower zone recession coefficient.
    K1,
    /// Upper zone response nonlinearity.
    Alpha,
    /// Percolation to the lower zone (mm/day).
    Perc,
    /// Precipitation correction factor.
    Pcorr,
    /// Muskingum travel time `k`.
    KMuskingum,
    /// Muskingum weighting coefficient `x`.
    XMuskingum,
}

/// Number of parameters in the full per-cell vector.
pub const N_HBV_PARAMS: usize = 21;

impl HbvParameter {
    /// All parameters in per-cell slot order.
    pub const ALL: [HbvParameter; N_HBV_PARAMS] = [
        Self::Ltt,
        Self::Utt,
        Self::Rfcf,
        Self::Sfcf,
        Self::Ttm,
        Self::Cfmax,
        Self::Cwh,
        Self::Cfr,
        Self::Fc,
        Self::Beta,
        Self::ECorr,
        Self::Etf,
        Self::Lp,
        Self::CFlux,
        Self::K,
        Self::K1,
        Self::Alpha,
        Self::Perc,
        Self::Pcorr,
        Self::KMuskingum,
        Self::XMuskingum,
    ];

    /// Slot of this parameter in the full per-cell vector.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ltt => "ltt",
            Self::Utt => "utt",
            Self::Rfcf => "rfcf",
            Self::Sfcf => "sfcf",
            Self::Ttm => "ttm",
            Self::Cfmax => "cfmax",
            Self::Cwh => "cwh",
            Self::Cfr => "cfr",
            Self::Fc => "fc",
            Self::Beta => "beta",
            Self::ECorr => "e_corr",
            Self::Etf => "etf",
            Self::Lp => "lp",
            Self::CFlux => "c_flux",
            Self::K => "k",
            Self::K1 => "k1",
            Self::Alpha => "alpha",
            Self::Perc => "perc",
            Self::Pcorr => "pcorr",
            Self::KMuskingum => "k_muskingum",
            Self::XMuskingum => "x_muskingum",
        }
    }
}

impl fmt::Display for HbvParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HbvParameter {
    type Err = DistError;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == key)
            .ok_or_else(|| DistError::InvalidInput(format!("unknown HBV parameter {s:?}")))
    }
}

/// Insertion positions for a set of lumped parameters.
///
/// Lumped values are inserted one after another into a growing per-cell
/// block. Inserting in ascending slot order makes each position equal to
/// the parameter's final slot, so the sorted, de-duplicated slots are
/// returned together with the parameters in matching order.
pub fn lumped_positions(lumped: &[HbvParameter]) -> (Vec<HbvParameter>, Vec<usize>) {
    let mut sorted = lumped.to_vec();
    sorted.sort();
    sorted.dedup();
    let positions = sorted.iter().map(|p| p.index()).collect();
    (sorted, positions)
}
