//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitConfig, FitData};
use crate::fit::{FitSelection, LsqFit, McmcFit};
use crate::io::ExtData;
use crate::models::shapes::p92_width;
use crate::models::{CurveModel, FEATURES};
use crate::report::summary::{Estimate, SightlineSummary};

/// Header for an `ext fit` run: star pair, sources and data extent.
pub fn format_run_header(config: &FitConfig, ext: &ExtData, data: &FitData) -> String {
    let mut out = String::new();
    out.push_str("=== ext - extinction curve fit ===\n");
    out.push_str(&format!("Reddened: {}\n", config.red_star));
    out.push_str(&format!("Comparison: {}\n", config.comp_star));
    let available: Vec<&str> = ext.segments.keys().map(String::as_str).collect();
    out.push_str(&format!(
        "Sources: fit [{}] of [{}]\n",
        config.sources.join(", "),
        available.join(", ")
    ));
    if let (Some(first), Some(last)) = (data.wave.first(), data.wave.last()) {
        out.push_str(&format!("Points: n={} | λ=[{first:.4}, {last:.2}] micron\n", data.len()));
    }
    if let Some(ebv) = ext.columns.get("EBV") {
        out.push_str(&format!("E(B-V): {:.3}\n", ebv.value));
    }
    out
}

/// Model comparison table; the preferred model is starred.
pub fn format_model_comparison(selection: &FitSelection) -> String {
    let mut out = String::new();
    out.push_str("Model diagnostics:\n");
    let best = selection.best().kind;
    for fit in &selection.fits {
        let chosen = if fit.kind == best { "*" } else { " " };
        let q = &fit.lsq.quality;
        out.push_str(&format!(
            "{chosen} {:<12} chi2={:.3} red_chi2={:.3} BIC={:.3} k={} iter={}\n",
            fit.kind.display_name(),
            q.chi2,
            q.reduced_chi2,
            q.bic,
            q.k,
            fit.lsq.iterations
        ));
        if !fit.lsq.converged {
            out.push_str(&format!("  ({}) {}\n", fit.kind.display_name(), fit.lsq.message));
        }
    }
    for (kind, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }
    out
}

/// Parameter table of a least-squares fit.
pub fn format_parameters(fit: &LsqFit) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} parameters:\n", fit.model.name));
    for p in fit.model.params.iter() {
        let note = if let Some(tie) = &p.tie {
            format!("(= {} x {})", fmt_num(tie.factor), tie.source)
        } else if p.fixed {
            "(fixed)".to_string()
        } else {
            fit.uncertainty(&p.name).map(|s| format!("+/- {}", fmt_num(s))).unwrap_or_default()
        };
        out.push_str(format!("{:12} {} {note}\n", p.name, fmt_num(p.value)).trim_end());
        out.push('\n');
    }
    out.push_str(&format_p92_widths(&fit.model));
    out
}

/// P92 feature widths `λ0 √(2 + b)`; empty for models without them.
pub fn format_p92_widths(model: &CurveModel) -> String {
    let mut out = String::new();
    for feature in FEATURES {
        let lam = model.params.value(&format!("{feature}_lambda"));
        let b = model.params.value(&format!("{feature}_b"));
        if let (Ok(lam), Ok(b)) = (lam, b) {
            if out.is_empty() {
                out.push_str("Feature widths:\n");
            }
            out.push_str(&format!("{:12} {}\n", format!("{feature}_width"), fmt_num(p92_width(lam, b))));
        }
    }
    out
}

/// Marginal posterior table.
pub fn format_mcmc(fit: &McmcFit) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} MCMC: {} walkers x {} steps, mean acceptance {:.3}\n",
        fit.chain.model,
        fit.chain.nwalkers(),
        fit.chain.nsteps(),
        fit.mean_acceptance()
    ));
    out.push_str(&format!(
        "{:<12} {:>12} {:>12} {:>12} {:>12}\n",
        "param", "p50", "+", "-", "best"
    ));
    out.push_str(&format!("{:-<12} {:-<12} {:-<12} {:-<12} {:-<12}\n", "", "", "", "", ""));
    for p in &fit.params {
        out.push_str(&format!(
            "{:<12} {:>12} {:>12} {:>12} {:>12}\n",
            p.name,
            fmt_num(p.p50),
            fmt_num(p.plus),
            fmt_num(p.minus),
            fmt_num(p.best)
        ));
    }
    out.push_str(&format!("best ln p: {:.3}\n", fit.best_lnprob));
    out
}

/// Sightline summary table.
pub fn format_summary_table(rows: &[SightlineSummary]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:<6} {:>22} {:>22} {:>22} {:>22} {:>22}\n",
        "name", "cloud", "A(V)", "R(V)", "A(S1)/A(V)", "λ0(S1)", "A(S1)/A(S2)"
    ));
    for r in rows {
        out.push_str(&format!(
            "{:<12} {:<6} {:>22} {:>22} {:>22} {:>22} {:>22}\n",
            truncate(&r.name, 12),
            if r.dense { "dense" } else { "diff" },
            fmt_estimate(r.av),
            fmt_estimate(r.rv),
            fmt_estimate(r.sil1_amp),
            fmt_estimate(r.sil1_lambda),
            fmt_estimate(r.sil_ratio),
        ));
    }
    out
}

fn fmt_estimate(e: Estimate) -> String {
    if (e.plus - e.minus).abs() <= 1e-12 * e.plus.abs().max(1e-300) {
        format!("{:.3} ± {:.3}", e.value, e.plus)
    } else {
        format!("{:.3} +{:.3} -{:.3}", e.value, e.plus, e.minus)
    }
}

fn fmt_num(v: f64) -> String {
    format!("{v:6.4e}")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
