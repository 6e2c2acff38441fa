//! Lists of saved curves for `multi` and `summary`.

use std::path::{Path, PathBuf};

use crate::error::AppError;

/// One curve file per line, relative to the list's directory.
pub fn parse_filelist(text: &str, base: &Path) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| base.join(l))
        .collect()
}

pub fn read_filelist(path: &Path) -> Result<Vec<PathBuf>, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read file list '{}': {e}", path.display())))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let files = parse_filelist(&text, base);
    if files.is_empty() {
        return Err(AppError::new(3, format!("File list '{}' names no curves.", path.display())));
    }
    Ok(files)
}

/// Sightline name of a saved curve: the file stem up to the first `_`.
pub fn sightline_name(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    stem.split('_').next().unwrap_or(stem).to_string()
}

/// Output path next to the list: `{dir}/{list stem}{suffix}.{ext}`, or no
/// extension when `ext` is empty.
pub fn sibling_output(list: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = list.file_stem().and_then(|s| s.to_str()).unwrap_or("curves");
    if ext.is_empty() {
        list.with_file_name(format!("{stem}{suffix}"))
    } else {
        list.with_file_name(format!("{stem}{suffix}.{ext}"))
    }
}
