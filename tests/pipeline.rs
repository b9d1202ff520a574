use std::fmt::Write as _;

use ppgcal::io::{read_series, read_waveform, write_aligned_table, write_calibration_table};
use ppgcal::log::silent;
use ppgcal::mock::PulseTrain;
use ppgcal::{Analysis, Error, PipelineConfig, TimeSeries};

fn waveform_csv(train: &PulseTrain) -> String {
    let wf = train.waveform().unwrap();
    let mut text = String::from("Time,PPG\n");
    for s in wf.samples() {
        writeln!(text, "{:.3},{:.6}", s.time, s.value).unwrap();
    }
    text
}

#[test]
fn csv_waveform_to_calibration_table() {
    let train = PulseTrain {
        duration: 200.0,
        beat_hz: 1.8,
        ..PulseTrain::default()
    };
    let wf = read_waveform(waveform_csv(&train).as_bytes(), "Time", "PPG").unwrap();
    assert!((wf.sampling_rate() - 200.0).abs() < 1e-6);

    let analysis = Analysis::new(PipelineConfig::default(), silent());
    let run = analysis.calibrate(&wf).unwrap();
    assert!((run.rate_summary.mean - 108.0).abs() < 5.0);
    assert_eq!(run.windows.len(), run.extraction.rates.len() / 200);
    assert_eq!(run.windows.len(), 1);

    let mut out = Vec::new();
    write_calibration_table(&mut out, &run.windows).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Time (s),Heart_Rate (BPM),Raw_Signal,Filtered_Signal");
}

#[test]
fn configured_window_size_changes_aggregation() {
    let config = PipelineConfig::from_toml_str("[window]\nwindow_size = 20\n").unwrap();
    let analysis = Analysis::new(config, silent());
    let run = analysis
        .calibrate(&PulseTrain::default().waveform().unwrap())
        .unwrap();
    assert_eq!(run.windows.len(), run.extraction.rates.len() / 20);
    assert!(run.windows.len() >= 3);
    assert!(run.window_summary.is_some());
}

#[test]
fn sensor_and_reference_csvs_compare() {
    let sensor_csv = "Time (s),Sensor\n0,80\n2,82\n4,84\n6,86\n8,88\n";
    let reference_csv = "t,Reference\n0.5,81\n1.5,\n2.5,83\n4.2,85\n6.1,87\n7.9,89\n";
    let sensor = read_series(sensor_csv.as_bytes(), "Time (s)", "Sensor").unwrap();
    let reference = read_series(reference_csv.as_bytes(), "t", "Reference").unwrap();
    assert_eq!(reference.len(), 5);

    let analysis = Analysis::new(PipelineConfig::default(), silent());
    let cmp = analysis
        .compare("sensor", &sensor, "reference", &reference, 0.0, 8.0)
        .unwrap();
    assert_eq!(cmp.pairs.len(), 5);
    assert_eq!(cmp.report.errors.mean_absolute_error, 1.0);

    let map = cmp.report.to_map();
    assert_eq!(map["error.mean_absolute_error"], 1.0);

    let mut out = Vec::new();
    write_aligned_table(&mut out, &cmp.pairs, "Sensor", "Reference").unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Time (s),Sensor,Reference\n0,80,81\n"));
}

#[test]
fn reference_outside_span_is_rejected() {
    let analysis = Analysis::new(PipelineConfig::default(), silent());
    let sensor = TimeSeries::from_pairs(&[(0.0, 80.0), (2.0, 81.0)]);
    let err = analysis
        .compare("sensor", &sensor, "reference", &TimeSeries::default(), 0.0, 2.0)
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientSamples { .. }));
}
