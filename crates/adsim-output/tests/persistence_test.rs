//! Persistence and reporting over simulated runs.

use std::path::PathBuf;

use adsim_design::{NoiseSpec, RunConfig, Scenario};
use adsim_inference::{GridSearchEngine, InferenceEngine};
use adsim_output::{
    ExportFormat, Exporter, RecoveryReport, ToDataFrame, load_dataset_csv, save_dataset_csv,
};
use adsim_series::Channel;
use approx::assert_abs_diff_eq;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("adsim-{}-{name}", std::process::id()))
}

#[test]
fn test_ten_period_dataset_file_round_trip() {
    let run = Scenario::run(&RunConfig::default().with_periods(13).with_window(4)).unwrap();
    let dataset = run.dataset();
    assert_eq!(dataset.len(), 10);

    let path = temp_path("round_trip.csv");
    save_dataset_csv(dataset, &path).unwrap();
    let read = load_dataset_csv(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(read.channels(), dataset.channels());
    assert_eq!(read.num_controls(), dataset.num_controls());
    for (a, b) in read.rows().iter().zip(dataset.rows()) {
        assert_eq!(a.date, b.date);
        assert_abs_diff_eq!(a.outcome, b.outcome, epsilon = 1e-9);
        assert_abs_diff_eq!(a.noise, b.noise, epsilon = 1e-9);
        for (x, y) in a.responses.iter().zip(&b.responses) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
        for (x, y) in a.controls.iter().zip(&b.controls) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_export_to_file_by_extension() {
    let run = Scenario::run(&RunConfig::default().with_periods(20)).unwrap();
    let path = temp_path("payload.json");
    let format = ExportFormat::from_path(&path).unwrap();
    run.payload().export_to_file(&path, format).unwrap();
    let json = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(json.contains("\"raw_tensor\""));
    assert!(json.contains("\"N\": 8"));
}

#[test]
fn test_recovery_report_from_grid_fit() {
    let mut config = RunConfig::default();
    config.generation.channels.retain(|c| c.channel == Channel::Radio);
    config.transform.channels.retain(|t| t.channel == Channel::Radio);
    config.composition.noise = NoiseSpec::None;
    let run = Scenario::run(&config).unwrap();

    let posterior = GridSearchEngine::default().fit(run.payload()).unwrap();
    let report = RecoveryReport::new(&run, &posterior).unwrap();
    assert!(report.max_rate_error() < 1e-12);
    assert!(report.max_k_error() < 1e-12);
    assert!(report.to_ascii_table().contains("radio"));

    let frame = posterior.to_dataframe().unwrap();
    assert_eq!(frame.height(), 1);
    assert_eq!(frame.width(), 7);
}
