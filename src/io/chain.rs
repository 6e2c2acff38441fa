//! Read/write MCMC chain JSON files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::domain::Chain;
use crate::error::AppError;

/// Chain file saved alongside a curve: `{base}_ext.json` -> `{base}_chain.json`.
pub fn chain_path_for(curve: &Path) -> PathBuf {
    let name = curve.file_name().and_then(|s| s.to_str()).unwrap_or_default();
    let base = name
        .strip_suffix("_ext.json")
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name);
    curve.with_file_name(format!("{base}_chain.json"))
}

pub fn write_chain_json(path: &Path, chain: &Chain) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create chain file '{}': {e}", path.display())))?;
    serde_json::to_writer(BufWriter::new(file), chain)
        .map_err(|e| AppError::new(2, format!("Failed to write chain file '{}': {e}", path.display())))
}

/// Read a chain file and check that its arrays agree in shape.
pub fn read_chain_json(path: &Path) -> Result<Chain, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open chain file '{}': {e}", path.display())))?;
    let chain: Chain = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid chain file '{}': {e}", path.display())))?;

    let nsteps = chain.nsteps();
    let ndim = chain.ndim();
    let shape_ok = chain.lnprob.len() == chain.nwalkers()
        && chain.acceptance_fraction.len() == chain.nwalkers()
        && chain
            .samples
            .iter()
            .zip(&chain.lnprob)
            .all(|(w, lp)| w.len() == nsteps && lp.len() == nsteps && w.iter().all(|s| s.len() == ndim));
    if !shape_ok {
        return Err(AppError::new(
            2,
            format!("Chain file '{}' has inconsistent array shapes.", path.display()),
        ));
    }
    Ok(chain)
}
