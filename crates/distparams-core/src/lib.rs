//! Distribute hydrological-model parameters onto the cells of a catchment
//! raster for distributed HBV + Muskingum runs.
pub mod distribute;
pub mod error;
pub mod layout;
pub mod muskingum;
pub mod parameters;
pub mod persist;
pub mod raster;

pub use distribute::{par3d, par3d_with_lake, ParameterGrid};
pub use error::{DistError, Result};
pub use layout::ParameterLayout;
pub use muskingum::calculate_k;
pub use parameters::HbvParameter;
pub use persist::{load, save};
pub use raster::{get_raster_data, GeoTiff, NoData, RasterMask, RasterSource};
