//! Exoplanet classifier CLI
//!
//! Command-line interface for training, prediction, diagnostics, validation,
//! catalog generation and serving.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{load_catalog, load_observations, write_catalog, Catalog, ClassLabel, Observation, FEATURE_COLUMNS};
use crate::diagnostics::{diagnose, DiagnosticReport};
use crate::synthetic::{reference_planets, training_catalog, CatalogGenerator};
use crate::system::{ClassificationSystem, Prediction, SystemConfig};
use crate::validation::ModelValidator;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn wait_enter() {
    println!();
    println!("  {}", dim("press enter to continue"));
    let mut input = String::new();
    let _ = std::io::stdin().read_line(&mut input);
}

fn label_colored(label: ClassLabel) -> ColoredString {
    match label {
        ClassLabel::ConfirmedExoplanet => label.as_str().green().bold(),
        ClassLabel::PlanetaryCandidate => label.as_str().yellow().bold(),
        ClassLabel::FalsePositive => label.as_str().red().bold(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "exoplanet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exoplanet transit classification and property estimation")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the pipeline and save the model bundle
    Train {
        /// Labeled catalog CSV; a generated catalog is used when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Synthetic rows to generate when no catalog is given
        #[arg(long, default_value = "5000")]
        samples: usize,

        /// Random seed for generation, splitting and models
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Directory the bundle is written to
        #[arg(short, long, default_value = "./models")]
        models_dir: PathBuf,

        /// Use reduced model sizes
        #[arg(long)]
        fast: bool,
    },

    /// Classify observations with a saved bundle
    Predict {
        /// Directory holding the bundle
        #[arg(short, long, default_value = "./models")]
        models_dir: PathBuf,

        /// CSV with the 7 observation columns
        #[arg(short, long, conflicts_with = "observation")]
        data: Option<PathBuf>,

        /// A single observation as a JSON object
        #[arg(long, required_unless_present = "data")]
        observation: Option<String>,

        /// Write predictions as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Explain the classification of one observation
    Diagnose {
        #[arg(short, long, default_value = "./models")]
        models_dir: PathBuf,

        /// The observation as a JSON object
        #[arg(long)]
        observation: String,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cross-validate and evaluate on a hold-out split
    Validate {
        /// Labeled catalog CSV; a generated catalog is used when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,

        #[arg(long, default_value = "5000")]
        samples: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of cross-validation folds
        #[arg(long, default_value = "5")]
        folds: usize,

        #[arg(long)]
        fast: bool,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic labeled catalog to CSV
    Generate {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "5000")]
        samples: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Leave out the reference planets
        #[arg(long)]
        no_reference: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        models_dir: Option<PathBuf>,

        /// Fail instead of training when no bundle exists
        #[arg(long)]
        no_train: bool,

        /// Use reduced model sizes when training on startup
        #[arg(long)]
        fast: bool,
    },
}

// ─── Shared helpers ────────────────────────────────────────────────────────────

fn system_config(fast: bool, seed: u64, samples: usize) -> SystemConfig {
    let base = if fast { SystemConfig::fast() } else { SystemConfig::default() };
    base.with_random_state(seed).with_synthetic_samples(samples)
}

fn catalog_source(data: Option<&Path>, samples: usize, seed: u64) -> anyhow::Result<Catalog> {
    match data {
        Some(path) => load_catalog(path).with_context(|| format!("loading catalog {}", path.display())),
        None => Ok(training_catalog(samples, seed)?),
    }
}

fn parse_observation(raw: &str) -> anyhow::Result<Observation> {
    let value: serde_json::Value = serde_json::from_str(raw).context("observation is not valid JSON")?;
    Ok(Observation::from_json(&value)?)
}

fn load_system(models_dir: &Path) -> anyhow::Result<ClassificationSystem> {
    ClassificationSystem::load(models_dir)
        .with_context(|| format!("loading model bundle from {}", models_dir.display()))
}

fn print_prediction(prediction: &Prediction) {
    let result = &prediction.result;
    println!("  {:<22} {}", muted("Classification"), label_colored(result.label));
    println!("  {:<22} {:.3}", muted("Confidence"), result.confidence);
    for (name, p) in result.class_probabilities() {
        println!("  {:<22} {:.3}", muted(&format!("  p({})", name)), p);
    }
    println!("  {:<22} {:.3}", muted("Entropy"), result.uncertainty);
    println!("  {:<22} {:.3}", muted("Model agreement"), result.model_agreement);
    if let Some(original) = prediction.original_classification {
        println!("  {:<22} {} → {}", muted("Correction"), original.as_str(), result.label.as_str());
    }
    if let (Some(properties), Some(uncertainties)) = (&prediction.properties, &prediction.property_uncertainties) {
        for (name, value) in properties {
            let spread = uncertainties.get(name).copied().flatten();
            match (value, spread) {
                (Some(v), Some(s)) => println!("  {:<22} {:.4} ± {:.4}", muted(name), v, s),
                (Some(v), None) => println!("  {:<22} {:.4}", muted(name), v),
                (None, _) => println!("  {:<22} {}", muted(name), dim("not estimated")),
            }
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data: Option<&Path>,
    samples: usize,
    seed: u64,
    models_dir: &Path,
    fast: bool,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading catalog");
    let start = Instant::now();
    let catalog = catalog_source(data, samples, seed)?;
    let counts = catalog.class_counts();
    step_done(&format!(
        "{} rows ({} confirmed, {} false positive, {} candidate) in {:?}",
        catalog.len(), counts[0], counts[1], counts[2], start.elapsed()
    ));

    let config = system_config(fast, seed, samples);
    step_run("Training ensemble and property regressors");
    let mut system = ClassificationSystem::new();
    let report = system.train(&catalog, &config)?;
    step_done(&format!("{:.1}s", report.training_secs));

    let path = system.save(models_dir)?;
    step_ok(&format!("Bundle saved to {}", path.display()));

    println!();
    println!("  {:<22} {}", muted("Train / test rows"), format!("{} / {}", report.train_rows, report.test_rows).white());
    println!(
        "  {:<22} {}",
        muted("Test accuracy"),
        format!("{:.4}", report.evaluation.metrics.accuracy).white().bold()
    );
    println!("  {:<22} {:.4}", muted("Macro F1"), report.evaluation.metrics.macro_f1);
    for (name, acc) in &report.evaluation.member_accuracy {
        println!("  {:<22} {:.4}", muted(&format!("  {}", name)), acc);
    }
    for (name, metrics) in &report.property_metrics {
        println!("  {:<22} MAE {:.4}  R² {:.4}", muted(name), metrics.mae, metrics.r2);
    }
    println!();

    Ok(())
}

pub fn cmd_predict(
    models_dir: &Path,
    data: Option<&Path>,
    observation: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let system = load_system(models_dir)?;
    let observations = match (data, observation) {
        (Some(path), _) => load_observations(path)?,
        (None, Some(raw)) => vec![parse_observation(raw)?],
        (None, None) => anyhow::bail!("either --data or --observation is required"),
    };

    let start = Instant::now();
    let predictions = system.predict_batch(&observations)?;
    step_ok(&format!("{} predictions in {:?}", predictions.len(), start.elapsed()));

    if predictions.len() == 1 {
        println!();
        print_prediction(&predictions[0]);
    } else {
        println!();
        println!("  {:>6}  {:<22} {:>10} {:>10}", muted("Row"), muted("Classification"), muted("Confidence"), muted("Corrected"));
        println!("  {}", dim(&"─".repeat(52)));
        for (i, p) in predictions.iter().enumerate() {
            println!(
                "  {:>6}  {:<22} {:>10.3} {:>10}",
                i,
                p.result.label.as_str(),
                p.result.confidence,
                if p.correction_applied { "yes" } else { "" }
            );
        }
    }

    if let Some(path) = output {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &predictions)?;
        step_ok(&format!("Predictions written to {}", path.display()));
    }
    println!();
    Ok(())
}

fn print_diagnostic(report: &DiagnosticReport) {
    section("Observation");
    for (name, value) in FEATURE_COLUMNS.iter().zip(report.observation.values()) {
        println!("  {:<26} {}", muted(name), value);
    }

    section("Physics cross-check");
    let physics = &report.physics;
    println!("  {:<26} {:.2} R⊕ ({})", muted("Planet radius"), physics.physical.planet_radius, physics.size_class);
    println!("  {:<26} {:.3} AU ({})", muted("Semi-major axis"), physics.physical.semi_major_axis, physics.orbit_class);
    println!("  {:<26} {:.0} K", muted("Equilibrium temperature"), physics.physical.planet_temp);
    println!("  {:<26} {}/6", muted("Planet indicators"), physics.planet_indicators);
    println!("  {:<26} {}/4", muted("False-positive indicators"), physics.false_positive_indicators);
    println!("  {:<26} {}", muted("Assessment"), physics.assessment);
    for warning in &physics.warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
    for note in &physics.notes {
        println!("  {} {}", accent("·"), note);
    }

    section("Key features");
    for (name, value) in &report.key_features {
        println!("  {:<26} {:.6}", muted(name), value);
    }

    section("Ensemble");
    for vote in &report.member_votes {
        let detail = vote
            .probabilities
            .as_ref()
            .and_then(|p| p.get(vote.label.as_str()))
            .map(|p| format!("{:.3}", p))
            .unwrap_or_default();
        println!("  {:<26} {} {}", muted(&vote.name), label_colored(vote.label), dim(&detail));
    }
    println!(
        "  {:<26} {} ({:.3})",
        muted("Soft vote"),
        label_colored(report.ensemble.label),
        report.ensemble.confidence
    );

    section("Confirmation score");
    for adjustment in &report.score_breakdown {
        println!("  {:>+5}  {}", adjustment.points, adjustment.reason);
    }
    if let Some(score) = report.confirmation_score {
        println!("  {:<26} {}/100", muted("Score"), score);
    }
    for flag in &report.red_flags {
        println!("  {} {}", "✗".red(), flag);
    }
    println!("  {}", report.correction_explanation);

    section("Final");
    print_prediction(&report.prediction);
    println!();
}

pub fn cmd_diagnose(models_dir: &Path, observation: &str, json: bool) -> anyhow::Result<()> {
    let system = load_system(models_dir)?;
    let obs = parse_observation(observation)?;
    let report = diagnose(&system, &obs)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_diagnostic(&report);
    }
    Ok(())
}

pub fn cmd_validate(
    data: Option<&Path>,
    samples: usize,
    seed: u64,
    folds: usize,
    fast: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Validate");

    let catalog = catalog_source(data, samples, seed)?;
    step_ok(&format!("{} catalog rows", catalog.len()));

    step_run(&format!("Running {}-fold cross-validation and hold-out evaluation", folds));
    let start = Instant::now();
    let validator = ModelValidator::new(system_config(fast, seed, samples)).with_folds(folds);
    let (_, report) = validator.run(&catalog)?;
    step_done(&format!("{:?}", start.elapsed()));

    let cv = &report.cross_validation;
    let holdout = &report.holdout;
    println!();
    println!("  {:<26} {:.4} ± {:.4}", muted("CV accuracy"), cv.mean_score, cv.std_score);
    println!("  {:<26} {:.4}", muted("Hold-out accuracy"), holdout.metrics.accuracy);
    println!(
        "  {:<26} {:.4} ({} corrections)",
        muted("Served accuracy"),
        holdout.corrected_accuracy,
        holdout.corrections_applied
    );
    println!("  {:<26} {:.4}", muted("ECE"), holdout.calibration.ece);
    println!("  {:<26} {:.4}", muted("Brier score"), holdout.calibration.brier_score);
    if let Some(r) = holdout.uncertainty.error_correlation {
        println!("  {:<26} {:.4}", muted("Uncertainty/error corr."), r);
    }
    for confusion in &holdout.errors.confusions {
        println!(
            "  {:<26} {}",
            muted(&format!("{} → {}", confusion.actual.as_str(), confusion.predicted.as_str())),
            confusion.count
        );
    }
    for (name, metrics) in &holdout.property_metrics {
        println!("  {:<26} MAE {:.4}  RMSE {:.4}  R² {:.4}", muted(name), metrics.mae, metrics.rmse, metrics.r2);
    }

    if let Some(path) = output {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &report)?;
        step_ok(&format!("Report written to {}", path.display()));
    }
    println!();
    Ok(())
}

pub fn cmd_generate(output: &Path, samples: usize, seed: u64, no_reference: bool) -> anyhow::Result<()> {
    section("Generate");

    let mut catalog = CatalogGenerator::new().with_n_samples(samples).with_seed(seed).generate()?;
    if !no_reference {
        catalog.extend(reference_planets(seed)?);
    }
    write_catalog(output, &catalog)?;

    let counts = catalog.class_counts();
    step_ok(&format!(
        "{} rows written to {} ({} confirmed, {} false positive, {} candidate)",
        catalog.len(),
        output.display(),
        counts[0],
        counts[1],
        counts[2]
    ));
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    models_dir: Option<PathBuf>,
    no_train: bool,
    fast: bool,
) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let mut config = ServerConfig::default();
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(dir) = models_dir {
        config = config.with_models_dir(dir);
    }
    if no_train {
        config.train_if_missing = false;
    }

    let base = format!("http://{}:{}", config.host, config.port);
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Exoplanet Classifier".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &base));
    line_box(&kv("Health ", &format!("{}/health", base)));
    line_box(&kv("Models ", &config.models_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let system_config = if fast { SystemConfig::fast() } else { SystemConfig::default() };
    run_server(config, system_config).await
}

// ─── Interactive mode ──────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("       {}", "·  ○  ·   exoplanet".truecolor(120, 170, 255));
    println!();
    println!("       {}", dim(&format!("Transit classifier  ·  v{}  ·  rust", env!("CARGO_PKG_VERSION"))));
    println!();
}

fn show_help() {
    section("Commands");

    let cmds: &[(&str, &str)] = &[
        ("exoplanet", "Interactive launcher (default)"),
        ("exoplanet train", "Train on a generated catalog"),
        ("exoplanet train -d catalog.csv", "Train on a labeled catalog"),
        ("exoplanet predict -d obs.csv", "Classify observations"),
        ("exoplanet diagnose --observation '{..}'", "Explain one classification"),
        ("exoplanet validate --folds 5", "Cross-validate the pipeline"),
        ("exoplanet generate -o catalog.csv", "Write a synthetic catalog"),
        ("exoplanet serve -p 3000", "Serve the API on a custom port"),
    ];

    for (cmd, desc) in cmds {
        println!("  {:<44} {}", cmd.white(), muted(desc));
    }

    section("Endpoints");

    let endpoints: &[(&str, &str)] = &[
        ("GET  /health", "Health check"),
        ("POST /predict", "Classify one observation"),
        ("POST /analyze", "Alias of /predict"),
        ("POST /predict/batch", "Classify a list of observations"),
    ];

    for (route, desc) in endpoints {
        println!("  {:<44} {}", route.truecolor(120, 170, 255), muted(desc));
    }

    println!();
}

fn prompt_observation(theme: &dialoguer::theme::ColorfulTheme) -> anyhow::Result<Observation> {
    use dialoguer::Input;

    let defaults = [289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7];
    let mut values = [0.0; 7];
    for (j, name) in FEATURE_COLUMNS.iter().enumerate() {
        values[j] = Input::<f64>::with_theme(theme)
            .with_prompt(*name)
            .default(defaults[j])
            .interact_text()?;
    }
    Ok(Observation::from_values(values))
}

pub async fn cmd_interactive() -> anyhow::Result<()> {
    use dialoguer::{theme::ColorfulTheme, Select};

    print_banner();

    let theme = ColorfulTheme {
        active_item_prefix: dialoguer::console::style("  ›".to_string()).for_stderr().cyan(),
        active_item_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        inactive_item_prefix: dialoguer::console::style("   ".to_string()).for_stderr(),
        inactive_item_style: dialoguer::console::Style::new().for_stderr().color256(245),
        prompt_prefix: dialoguer::console::style("  ?".to_string()).for_stderr().color256(111),
        prompt_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        ..ColorfulTheme::default()
    };
    let models_dir = PathBuf::from("./models");

    loop {
        let items = &[
            "Start Server          rest api on :8080",
            "Train                 generated catalog → ./models",
            "Classify              enter one observation",
            "Help                  commands & endpoints",
            "Exit",
        ];

        println!();
        let sel = Select::with_theme(&theme)
            .with_prompt("What would you like to do")
            .items(items)
            .default(0)
            .interact_opt()?;

        match sel {
            Some(0) => {
                cmd_serve(None, None, None, false, false).await?;
                break;
            }
            Some(1) => {
                cmd_train(None, 5000, 42, &models_dir, false)?;
                wait_enter();
            }
            Some(2) => {
                let obs = prompt_observation(&theme)?;
                match load_system(&models_dir) {
                    Ok(system) => {
                        let report = diagnose(&system, &obs)?;
                        print_diagnostic(&report);
                    }
                    Err(e) => println!("  {} {:#}", "✗".red(), e),
                }
                wait_enter();
            }
            Some(3) => {
                show_help();
                wait_enter();
            }
            Some(4) | None => {
                println!();
                println!("  {}", dim("goodbye"));
                println!();
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_train_defaults() {
        let cli = Cli::try_parse_from(["exoplanet", "train", "--fast"]).unwrap();
        match cli.command {
            Some(Commands::Train { data, samples, seed, fast, .. }) => {
                assert!(data.is_none());
                assert_eq!(samples, 5000);
                assert_eq!(seed, 42);
                assert!(fast);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_predict_requires_input() {
        assert!(Cli::try_parse_from(["exoplanet", "predict"]).is_err());
        assert!(Cli::try_parse_from(["exoplanet", "predict", "-d", "obs.csv"]).is_ok());
    }

    #[test]
    fn test_parse_observation_reports_missing_fields() {
        let err = parse_observation(r#"{"orbital_period": 3.5}"#).unwrap_err();
        assert!(err.to_string().starts_with("Missing required fields"));
        assert!(parse_observation("not json").is_err());
    }

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "text".red());
        assert_eq!(strip_ansi(&colored), "text");
    }
}
