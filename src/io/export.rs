//! Export the sightline summary table to CSV.
//!
//! One row per sightline; every estimate becomes `value,plus,minus` columns so
//! the file is easy to load in spreadsheets or downstream scripts. Missing NUV
//! estimates are left empty.

use std::path::Path;

use crate::error::AppError;
use crate::report::summary::{Estimate, SightlineSummary};

const ESTIMATES: [&str; 10] = [
    "AV",
    "EBV",
    "RV",
    "SIL1_amp",
    "SIL1_lambda",
    "SIL1_b",
    "SIL1_width",
    "SIL2_amp",
    "SIL_ratio",
    "NUV_ceninten",
];

fn header() -> Vec<String> {
    let mut cols = vec!["name".to_string(), "dense".to_string()];
    for e in ESTIMATES {
        cols.push(e.to_string());
        cols.push(format!("{e}_plus"));
        cols.push(format!("{e}_minus"));
    }
    cols
}

fn push_estimate(row: &mut Vec<String>, e: Option<Estimate>) {
    match e {
        Some(e) => {
            row.push(format!("{:.6e}", e.value));
            row.push(format!("{:.6e}", e.plus));
            row.push(format!("{:.6e}", e.minus));
        }
        None => row.extend(std::iter::repeat_n(String::new(), 3)),
    }
}

fn record(s: &SightlineSummary) -> Vec<String> {
    let mut row = vec![s.name.clone(), s.dense.to_string()];
    for e in [
        s.av,
        s.ebv,
        s.rv,
        s.sil1_amp,
        s.sil1_lambda,
        s.sil1_b,
        s.sil1_width,
        s.sil2_amp,
        s.sil_ratio,
    ] {
        push_estimate(&mut row, Some(e));
    }
    push_estimate(&mut row, s.nuv_ceninten);
    row
}

/// Write the summary table to a CSV file.
pub fn write_summary_csv(path: &Path, rows: &[SightlineSummary]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary CSV '{}': {e}", path.display())))?;

    writer
        .write_record(header())
        .map_err(|e| AppError::new(2, format!("Failed to write summary CSV header: {e}")))?;
    for s in rows {
        writer
            .write_record(record(s))
            .map_err(|e| AppError::new(2, format!("Failed to write summary CSV row for {}: {e}", s.name)))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush summary CSV '{}': {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(nuv: bool) -> SightlineSummary {
        let e = Estimate {
            value: 1.5,
            plus: 0.1,
            minus: 0.2,
        };
        SightlineSummary {
            name: "hd283809".to_string(),
            dense: true,
            av: e,
            ebv: e,
            rv: e,
            sil1_amp: e,
            sil1_lambda: e,
            sil1_b: e,
            sil1_width: e,
            sil2_amp: e,
            sil_ratio: e,
            nuv_ceninten: nuv.then_some(e),
        }
    }

    #[test]
    fn writes_one_row_per_sightline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list_silicate.csv");
        write_summary_csv(&path, &[summary(true), summary(false)]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 2 + 3 * ESTIMATES.len());
        assert_eq!(&headers[2], "AV");
        assert_eq!(&headers[3], "AV_plus");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "hd283809");
        assert_eq!(&rows[0][1], "true");
        assert_eq!(rows[0][2].parse::<f64>().unwrap(), 1.5);
        assert_eq!(&rows[1][headers.len() - 1], "");
    }
}
