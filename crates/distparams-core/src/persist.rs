//! Save and load arbitrary serialisable objects as JSON files.
//!
//! `save(&obj, "out/flow_acc_table")` writes `out/flow_acc_table.json`;
//! `load("out/flow_acc_table")` reads it back.
use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DistError, Result};

/// Extension appended to every saved name.
pub const EXTENSION: &str = "json";

/// Path a given name is saved under.
pub fn saved_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.{EXTENSION}"))
}

/// Serialise `obj` to `<name>.json`, returning the written path.
pub fn save<T: Serialize + ?Sized>(obj: &T, name: &str) -> Result<PathBuf> {
    let path = saved_path(name);
    let json = serde_json::to_string(obj)?;
    fs::write(&path, json).map_err(|source| DistError::Io { path: path.clone(), source })?;
    Ok(path)
}

/// Deserialise the object previously saved under `name`.
pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
    let path = saved_path(name);
    let text = fs::read_to_string(&path).map_err(|source| DistError::Io { path, source })?;
    Ok(serde_json::from_str(&text)?)
}

// ── Serde helpers ─────────────────────────────────────────────────────────────

/// JSON has no NaN: serde_json writes it as `null`. Read `null` back as NaN.
pub fn null_as_nan_vec<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<Vec<f64>, D::Error> {
    let v: Vec<Option<f64>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
}
