//! Run CLI command.
//!
//! Loads configuration, scene universe, cost scenarios and observations,
//! runs validator v2 and writes the artifact set.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use orderflow_validator_core::{ConfigLoader, ValidatorConfig};
use orderflow_validator_data::{load_observations, ArtifactPaths};
use orderflow_validator_signals::{PipelineOutput, ValidatorV2};
use std::path::PathBuf;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Validator generation: v1, v2 (default: v2)
    #[arg(long, default_value = "v2")]
    pub mode: String,

    /// Validator configuration file
    #[arg(short, long, default_value = "config/validator_v2.toml")]
    pub config: PathBuf,

    /// Profile overlay, read from `<config stem>.<profile>.toml`
    #[arg(long)]
    pub profile: Option<String>,
}

/// Validator generation selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    V1,
    V2,
}

impl Mode {
    /// Parses a mode from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "v1" => Ok(Mode::V1),
            "v2" => Ok(Mode::V2),
            _ => Err(anyhow!("Unknown mode: '{}'. Valid modes: v1, v2", s)),
        }
    }
}

/// Console summary of one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub samples: usize,
    pub tests: usize,
    pub passing: usize,
    pub whitelist: Vec<String>,
    pub blacklisted: usize,
    pub stability: f64,
    pub frequency_model: String,
    pub qc_valid: bool,
    pub failing_checks: Vec<String>,
}

impl RunSummary {
    #[must_use]
    pub fn from_output(output: &PipelineOutput) -> Self {
        Self {
            samples: output.data.len(),
            tests: output.univariate.records.len(),
            passing: output.univariate.passing().count(),
            whitelist: output.lists.whitelist.clone(),
            blacklisted: output.lists.blacklist.len(),
            stability: output.stability.score,
            frequency_model: output.multivariate.frequency_model.model.clone(),
            qc_valid: output.qc.is_valid(),
            failing_checks: output
                .qc
                .failing_checks()
                .map(|c| c.name.clone())
                .collect(),
        }
    }

    /// Formats the summary as a text box.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str("║                 VALIDATOR V2 RUN SUMMARY                     ║\n");
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!("║  Samples:                  {:>33} ║\n", self.samples));
        output.push_str(&format!("║  Univariate tests:         {:>33} ║\n", self.tests));
        output.push_str(&format!("║  Passing tests:            {:>33} ║\n", self.passing));
        output.push_str(&format!(
            "║  Stability score:          {:>33.2} ║\n",
            self.stability
        ));
        output.push_str(&format!(
            "║  Frequency model:          {:>33} ║\n",
            self.frequency_model
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  WHITELIST:                {:>33} ║\n",
            self.whitelist.len()
        ));
        output.push_str(&format!(
            "║  BLACKLIST:                {:>33} ║\n",
            self.blacklisted
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        if !self.whitelist.is_empty() {
            output.push_str(&format!("\n  Whitelisted: {}\n", self.whitelist.join(", ")));
        }
        if !self.failing_checks.is_empty() {
            output.push_str(&format!(
                "  Failing QC checks: {}\n",
                self.failing_checks.join(", ")
            ));
        }

        output
    }
}

/// Runs the run command.
///
/// # Errors
/// Returns an error if configuration or input cannot be loaded, the
/// pipeline fails, or an artifact cannot be written.
pub async fn run_validator(args: RunArgs) -> Result<()> {
    match Mode::parse(&args.mode)? {
        Mode::V1 => {
            return Err(anyhow!(
                "Validator v1 is a legacy mode and is not available in this build; use --mode v2"
            ))
        }
        Mode::V2 => {}
    }

    let config = load_config(&args)?;
    tracing::info!(
        config = %args.config.display(),
        profile = args.profile.as_deref().unwrap_or("default"),
        "Starting validator v2"
    );

    let universe = ConfigLoader::load_scene_universe(&config.scenes_whitelist).with_context(|| {
        format!(
            "Failed to load scene whitelist {}",
            config.scenes_whitelist.display()
        )
    })?;
    let costs = ConfigLoader::load_cost_scenarios(&config.costs_config).with_context(|| {
        format!(
            "Failed to load cost scenarios {}",
            config.costs_config.display()
        )
    })?;
    let table = load_observations(&config.input, &universe)
        .context("Failed to load observations")?;

    let validator = ValidatorV2::new(config, universe, costs);
    let (summary, paths) = tokio::task::spawn_blocking(move || -> Result<_> {
        let output = validator.run(table).context("Validator v2 run failed")?;
        let paths = validator.write(&output, Utc::now().date_naive())?;
        Ok((RunSummary::from_output(&output), paths))
    })
    .await
    .context("Validator task panicked")??;

    print_outcome(&summary, &paths);
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<ValidatorConfig> {
    let config = match &args.profile {
        Some(profile) => ConfigLoader::load_with_profile(&args.config, profile),
        None => ConfigLoader::load_from(&args.config),
    };
    config.with_context(|| format!("Failed to load config from {}", args.config.display()))
}

fn print_outcome(summary: &RunSummary, paths: &ArtifactPaths) {
    println!("{}", summary.to_text());

    let status = if summary.qc_valid {
        "QC PASS".black().on_green()
    } else {
        "QC FAIL".black().on_red()
    };
    println!("{status}");

    println!("\nArtifacts:");
    for (label, path) in paths.entries() {
        println!("  {:<9} {}", label, path.display());
    }

    if summary.qc_valid {
        tracing::info!("Validation complete: QC passed");
    } else {
        tracing::warn!(
            failing = summary.failing_checks.len(),
            "Validation complete: QC checks failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // ============================================
    // Mode Tests
    // ============================================

    #[test]
    fn mode_parse_accepts_both_generations() {
        assert_eq!(Mode::parse("v2").unwrap(), Mode::V2);
        assert_eq!(Mode::parse("V1").unwrap(), Mode::V1);
    }

    #[test]
    fn mode_parse_rejects_unknown() {
        let err = Mode::parse("v3").unwrap_err();
        assert!(err.to_string().contains("Unknown mode"));
    }

    // ============================================
    // RunSummary Tests
    // ============================================

    fn summary() -> RunSummary {
        RunSummary {
            samples: 1200,
            tests: 48,
            passing: 3,
            whitelist: vec!["SCENE_007".to_string()],
            blacklisted: 19,
            stability: 0.8667,
            frequency_model: "poisson".to_string(),
            qc_valid: false,
            failing_checks: vec!["regime_coverage".to_string()],
        }
    }

    #[test]
    fn summary_text_lists_counts_and_scenes() {
        let text = summary().to_text();
        assert!(text.contains("VALIDATOR V2 RUN SUMMARY"));
        assert!(text.contains("1200"));
        assert!(text.contains("0.87"));
        assert!(text.contains("poisson"));
        assert!(text.contains("Whitelisted: SCENE_007"));
        assert!(text.contains("Failing QC checks: regime_coverage"));
    }

    #[test]
    fn summary_text_omits_empty_sections() {
        let mut s = summary();
        s.whitelist.clear();
        s.failing_checks.clear();
        let text = s.to_text();
        assert!(!text.contains("Whitelisted:"));
        assert!(!text.contains("Failing QC checks"));
    }

    // ============================================
    // Command Tests
    // ============================================

    #[tokio::test]
    async fn v1_mode_is_unavailable() {
        let args = RunArgs {
            mode: "v1".to_string(),
            config: PathBuf::from("config/validator_v2.toml"),
            profile: None,
        };
        let err = run_validator(args).await.unwrap_err();
        assert!(err.to_string().contains("not available"));
    }

    #[tokio::test]
    async fn synthetic_run_writes_artifacts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(
            root.join("costs.toml"),
            "[base]\ntaker_fee_bps = 4.0\nmaker_fee_bps = 1.0\nslippage_bps = 1.0\n",
        )
        .unwrap();
        let config_path = root.join("validator_v2.toml");
        fs::write(
            &config_path,
            format!(
                "results_dir = {:?}\nrule_sync_path = {:?}\nscenes_whitelist = {:?}\ncosts_config = {:?}\n",
                root.join("results"),
                root.join("trade_rules.json"),
                root.join("scenes_whitelist.toml"),
                root.join("costs.toml"),
            ),
        )
        .unwrap();

        run_validator(RunArgs {
            mode: "v2".to_string(),
            config: config_path,
            profile: None,
        })
        .await
        .unwrap();

        assert!(root.join("trade_rules.json").exists());
        let results: Vec<_> = fs::read_dir(root.join("results")).unwrap().collect();
        assert!(!results.is_empty());
    }
}
