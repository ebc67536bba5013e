use std::fs;
use std::path::Path;
use std::process::Command;

fn of_validator() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_of-validator"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn write_config(root: &Path, csv: &Path) -> std::path::PathBuf {
    fs::write(
        root.join("costs.toml"),
        "[base]\ntaker_fee_bps = 4.0\nmaker_fee_bps = 1.0\nslippage_bps = 1.0\n\n\
         [stress]\ntaker_fee_bps = 7.5\nmaker_fee_bps = 2.0\nslippage_bps = 5.0\n",
    )
    .unwrap();
    let config = root.join("validator_v2.toml");
    fs::write(
        &config,
        format!(
            "results_dir = {:?}\nrule_sync_path = {:?}\nscenes_whitelist = {:?}\n\
             costs_config = {:?}\n\n[input]\nkind = \"csv\"\npath = {:?}\n",
            root.join("results"),
            root.join("configs").join("trade_rules.json"),
            root.join("scenes_whitelist.toml"),
            root.join("costs.toml"),
            csv,
        ),
    )
    .unwrap();
    config
}

#[test]
fn synthesize_then_run_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("observations.csv");

    let status = of_validator()
        .args(["synthesize", "--output"])
        .arg(&csv)
        .args(["--rows", "600", "--seed", "11"])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(csv.exists());

    let config = write_config(dir.path(), &csv);
    let output = of_validator()
        .args(["run", "--mode", "v2", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("VALIDATOR V2 RUN SUMMARY"));
    assert!(stdout.contains("markdown"));
    assert!(dir.path().join("configs").join("trade_rules.json").exists());
}

#[test]
fn legacy_mode_exits_with_error() {
    let output = of_validator().args(["run", "--mode", "v1"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not available"));
}
