use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::Parser;
use ext_curves::app::pipeline::{run_figure, run_fit, saved_figure};
use ext_curves::cli::{Cli, Command, fit_config_from_args};
use ext_curves::domain::{FigureOptions, FitConfig, ModelKind, ModelSpec, SummaryConfig};
use ext_curves::io::{ExtData, read_chain_json, write_summary_csv};
use ext_curves::models::{CurveModel, PresetOptions, initial_model};
use ext_curves::plot::Figure;
use ext_curves::report::summarize_filelist;

const COMP_V: f64 = 6.0;
const RED_V: f64 = 9.0;

const BANDS: [(&str, f64, f64); 6] = [
    ("U", 0.366, 5.6),
    ("B", 0.438, 5.8),
    ("V", 0.545, COMP_V),
    ("J", 1.22, 6.4),
    ("H", 1.63, 6.5),
    ("K", 2.19, 6.6),
];

fn logspace_waves(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| lo * (hi / lo).powf(i as f64 / (n - 1) as f64))
        .collect()
}

fn write_spectrum(path: &Path, waves: &[f64], flux: impl Fn(f64) -> f64) {
    let mut text = String::from("# wave flux unc\n");
    for &w in waves {
        let f = flux(w);
        writeln!(text, "{w:.6} {f:.10e} {:.10e}", 0.01 * f).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

/// Comparison and reddened stars whose E(λ - V) follows `model`.
fn write_stars(root: &Path, model: &CurveModel) {
    let dat = root.join("DAT_files");
    std::fs::create_dir_all(&dat).unwrap();
    std::fs::create_dir_all(root.join("spectra")).unwrap();

    let elx = |w: f64| model.evaluate(&[1.0 / w]).unwrap()[0];
    let comp_flux = |w: f64| 1e-10 * w.powf(-3.0);
    let red_flux = |w: f64| comp_flux(w) * 10f64.powf(-0.4 * (elx(w) + RED_V - COMP_V));

    let uv = logspace_waves(0.12, 0.32, 60);
    let nir = logspace_waves(0.8, 2.4, 40);
    let ir = logspace_waves(5.0, 35.0, 80);
    write_spectrum(&root.join("spectra/comp_iue.txt"), &uv, comp_flux);
    write_spectrum(&root.join("spectra/red_iue.txt"), &uv, red_flux);
    write_spectrum(&root.join("spectra/comp_sxd.txt"), &nir, comp_flux);
    write_spectrum(&root.join("spectra/red_sxd.txt"), &nir, red_flux);
    write_spectrum(&root.join("spectra/comp_irs.txt"), &ir, comp_flux);
    write_spectrum(&root.join("spectra/red_irs.txt"), &ir, red_flux);

    let mut comp = String::from("# comparison\nsptype = B2 V\n");
    let mut red = String::from("# reddened\nsptype = B2 V\n");
    for (name, wave, mag) in BANDS {
        writeln!(comp, "{name} = {mag} +/- 0.01").unwrap();
        let e = if name == "V" { 0.0 } else { elx(wave) };
        writeln!(red, "{name} = {:.6} +/- 0.01", mag + e + RED_V - COMP_V).unwrap();
    }
    comp.push_str("IUE = spectra/comp_iue.txt\nSpeX_SXD = spectra/comp_sxd.txt\nIRS = spectra/comp_irs.txt\n");
    red.push_str("IUE = spectra/red_iue.txt\nSpeX_SXD = spectra/red_sxd.txt\nIRS = spectra/red_irs.txt\n");
    std::fs::write(dat.join("hdcomp.dat"), comp).unwrap();
    std::fs::write(dat.join("hdred.dat"), red).unwrap();
}

fn config(root: &Path, outdir: PathBuf, emcee: bool) -> FitConfig {
    FitConfig {
        red_star: "hdred".to_string(),
        comp_star: "hdcomp".to_string(),
        data_path: root.to_path_buf(),
        outdir,
        model_spec: ModelSpec::P92,
        sources: vec!["BAND".to_string(), "IUE".to_string(), "IRS".to_string()],
        remove_uvwind: true,
        remove_lya: true,
        tie_fir: false,
        maxiter: Some(50),
        emcee,
        nburn: 5,
        nsteps: 20,
        seed: 7,
        figures: FigureOptions::default(),
    }
}

#[test]
fn fit_saves_curve_and_replots_it() {
    let dir = tempfile::tempdir().unwrap();
    let truth = initial_model(ModelKind::P92, PresetOptions { av_guess: 2.0, tie_fir: false }).unwrap();
    write_stars(dir.path(), &truth);

    let run = run_fit(&config(dir.path(), dir.path().join("fits"), false)).unwrap();

    assert!(run.chain_path.is_none());
    assert_eq!(run.curve_path, dir.path().join("fits/hdred_hdcomp_ext.json"));
    assert!(run.selection.best().lsq.quality.reduced_chi2.is_finite());
    // wavelength-sorted, wind/Lyα points removed
    assert!(run.data.wave.windows(2).all(|w| w[0] <= w[1]));
    assert!(run.data.len() < 6 + 60 + 80);

    let saved = ExtData::load(&run.curve_path).unwrap();
    assert_eq!(saved, run.ext);
    assert!(saved.saved_model("P92").is_some());
    assert!(saved.column("AV").unwrap() > 0.0);
    assert!(saved.column("RV").is_some());

    let fitted = run_figure(&run).unwrap().preview(80, 20);
    assert!(fitted.starts_with("hdred / hdcomp"));
    let replot = saved_figure(&saved).unwrap().preview(80, 20);
    assert!(replot.lines().skip(1).any(|l| l.contains('o')));
}

#[test]
fn sampled_fit_feeds_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let truth = initial_model(ModelKind::P92, PresetOptions { av_guess: 1.5, tie_fir: false }).unwrap();
    write_stars(dir.path(), &truth);

    let run = run_fit(&config(dir.path(), dir.path().to_path_buf(), true)).unwrap();
    let chain_path = run.chain_path.clone().unwrap();
    let chain = read_chain_json(&chain_path).unwrap();
    assert_eq!(chain.nsteps(), 20);
    assert_eq!(chain.nwalkers(), 10 * chain.ndim());
    let mcmc = run.mcmc.as_ref().unwrap();
    assert!(mcmc.params.iter().all(|p| p.plus >= 0.0 && p.minus >= 0.0));

    let list = dir.path().join("sightlines.dat");
    std::fs::write(&list, "# curves\nhdred_hdcomp_ext.json\n").unwrap();
    let rows = summarize_filelist(&SummaryConfig {
        filelist: list,
        burn_frac: 0.4,
        dense: vec!["hdred".to_string()],
        seed: 3,
        figures: FigureOptions::default(),
    })
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "hdred");
    assert!(rows[0].dense);
    assert!(rows[0].av.value > 0.0);

    let csv = dir.path().join("sightlines_silicate.csv");
    write_summary_csv(&csv, &rows).unwrap();
    let text = std::fs::read_to_string(csv).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn command_line_sources_select_the_spex_segment() {
    let dir = tempfile::tempdir().unwrap();
    let truth = initial_model(ModelKind::P92, PresetOptions { av_guess: 1.0, tie_fir: false }).unwrap();
    write_stars(dir.path(), &truth);
    let root = dir.path().to_str().unwrap();

    let cli = Cli::try_parse_from([
        "ext", "fit", "hdred", "hdcomp", "--path", root, "--outdir", root, "--sources", "band,spex_sxd",
        "--maxiter", "50",
    ])
    .unwrap();
    let Command::Fit(args) = cli.command else {
        panic!("expected the fit subcommand");
    };
    let config = fit_config_from_args(&args, None).unwrap();
    assert_eq!(config.sources, ["BAND", "SpeX_SXD"]);

    let run = run_fit(&config).unwrap();
    assert_eq!(run.ext.segments["SpeX_SXD"].waves.len(), 40);
    // six bands plus the SpeX points; IUE and IRS stay out
    assert_eq!(run.data.len(), 6 + 40);
    assert!(run.data.wave.iter().all(|&w| (0.3..=2.5).contains(&w)));

    let saved = ExtData::load(&run.curve_path).unwrap();
    assert_eq!(saved.segments["SpeX_SXD"], run.ext.segments["SpeX_SXD"]);
}

#[test]
fn missing_star_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_fit(&config(dir.path(), dir.path().to_path_buf(), false)).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
