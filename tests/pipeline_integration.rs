// tests/pipeline_integration.rs
//! End-to-end filter stages over synthetic recording trees

mod common;

use common::{init_tracing, mix, noise, read_column, sine, write_recording, RATE};
use emg_batch::error::ErrorKind;
use emg_batch::io::CsvStore;
use emg_batch::processing::spectral::{SpectrumComparison, WelchConfig};
use emg_batch::processing::{
    run_stages, BatchOptions, FilterSpec, FilterStage, NotchParams, OverrideMode, SubjectOverrides,
};
use regex::Regex;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

const SAMPLES: usize = 8000;

fn contaminated(seed: u64) -> Vec<f64> {
    mix(&[sine(50.0, 1.0, SAMPLES), sine(100.0, 1.0, SAMPLES), noise(seed, 0.05, SAMPLES)])
}

fn build_two_subject_tree(root: &Path) {
    let mut seed = 0;
    for subject in ["S01", "S08"] {
        for trial in ["trial_1", "trial_2"] {
            seed += 1;
            write_recording(root, &format!("{}/{}.csv", subject, trial), vec![("EMG1", contaminated(seed))]);
        }
    }
}

fn attenuation(input: &Path, output: &Path, relative: &str, low: f64, high: f64) -> f64 {
    let before = read_column(&input.join(relative), "EMG1");
    let after = read_column(&output.join(relative), "EMG1");
    SpectrumComparison::between(&before, &after, RATE, &WelchConfig::default())
        .unwrap()
        .attenuation_db(low, high)
}

fn powerline_stage() -> FilterStage {
    FilterStage::new(
        "powerline",
        FilterSpec::notch(vec![NotchParams::new(50.0, 30.0)]),
        vec!["EMG1".to_string()],
    )
}

#[test]
fn test_subject_override_end_to_end() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("raw");
    let output = dir.path().join("notched");
    build_two_subject_tree(&input);

    let overrides = SubjectOverrides::new(OverrideMode::Append)
        .with_subject("S08", FilterSpec::notch(vec![NotchParams::new(100.0, 30.0)]));
    let report = powerline_stage()
        .with_overrides(overrides)
        .run(&input, &output, RATE, &CsvStore::default(), &BatchOptions::default())
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.written.len(), 4);
    let overridden: Vec<String> = report.overridden.iter().map(|f| f.key()).collect();
    assert_eq!(overridden, vec!["S08/trial_1.csv", "S08/trial_2.csv"]);

    for relative in ["S01/trial_1.csv", "S01/trial_2.csv", "S08/trial_1.csv", "S08/trial_2.csv"] {
        assert!(attenuation(&input, &output, relative, 46.0, 54.0) < -10.0, "{} kept 50 Hz", relative);
    }
    for relative in ["S08/trial_1.csv", "S08/trial_2.csv"] {
        assert!(attenuation(&input, &output, relative, 96.0, 104.0) < -10.0, "{} kept 100 Hz", relative);
    }
    for relative in ["S01/trial_1.csv", "S01/trial_2.csv"] {
        assert!(attenuation(&input, &output, relative, 96.0, 104.0) > -1.0, "{} lost 100 Hz", relative);
    }
}

#[test]
fn test_staged_mixed_subject_processing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("raw");
    let work = dir.path().join("work");
    build_two_subject_tree(&input);

    // Everyone gets the 50 Hz notch, only S08 gets an extra 100 Hz pass
    let stages = vec![
        powerline_stage(),
        FilterStage::new(
            "harmonic",
            FilterSpec::notch(vec![NotchParams::new(100.0, 30.0)]),
            vec!["EMG1".to_string()],
        )
        .with_match(Regex::new("^S08/").unwrap()),
    ];
    let reports = run_stages(&stages, &input, &work, RATE, &CsvStore::default(), &BatchOptions::default()).unwrap();

    assert_eq!(reports[1].written.len(), 2);
    assert_eq!(reports[1].copied.len(), 2);
    let first = work.join("01_powerline");
    let second = work.join("02_harmonic");
    assert_eq!(
        std::fs::read(first.join("S01/trial_1.csv")).unwrap(),
        std::fs::read(second.join("S01/trial_1.csv")).unwrap()
    );
    assert!(attenuation(&input, &second, "S08/trial_2.csv", 96.0, 104.0) < -10.0);
}

fn tree_bytes(root: &Path) -> Vec<(String, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned();
            (relative, std::fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn test_reruns_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("raw");
    build_two_subject_tree(&input);

    let stage = FilterStage::new("bandpass", FilterSpec::bandpass(20.0, 450.0), vec!["EMG1".to_string()]);
    let options = BatchOptions::default().with_threads(4);
    stage.run(&input, &dir.path().join("a"), RATE, &CsvStore::default(), &options).unwrap();
    stage.run(&input, &dir.path().join("b"), RATE, &CsvStore::default(), &options).unwrap();

    let a = tree_bytes(&dir.path().join("a"));
    assert_eq!(a.len(), 4);
    assert_eq!(a, tree_bytes(&dir.path().join("b")));
}

#[test]
fn test_one_corrupt_file_among_ten() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("raw");
    for i in 0..10 {
        write_recording(&input, &format!("S{:02}/trial.csv", i), vec![("EMG1", noise(i, 1.0, 1000))]);
    }
    std::fs::write(input.join("S04/trial.csv"), "Time,EMG1\n0.0,0.5\n0.001,garbage\n").unwrap();

    let report = powerline_stage()
        .run(&input, &dir.path().join("out"), RATE, &CsvStore::default(), &BatchOptions::default())
        .unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.written.len(), 9);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file.key(), "S04/trial.csv");
    assert_eq!(report.failures[0].error.kind(), ErrorKind::Data);
    assert!(!dir.path().join("out/S04/trial.csv").exists());
}

#[test]
fn test_failure_threshold_aborts_remaining_files() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("raw");
    for i in 0..6 {
        std::fs::create_dir_all(input.join(format!("S{:02}", i))).unwrap();
        std::fs::write(input.join(format!("S{:02}/bad.csv", i)), "Time,EMG1\n0.0,x\n").unwrap();
    }

    let options = BatchOptions::default().with_threads(1).with_max_failures(2);
    let report = powerline_stage()
        .run(&input, &dir.path().join("out"), RATE, &CsvStore::default(), &options)
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.skipped.len(), 4);
}
