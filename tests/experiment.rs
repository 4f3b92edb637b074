//! Integration tests: dataset file to scored report.

use evonnet::config::{ExperimentConfig, Strategy};
use evonnet::{Dataset, Experiment};

/// Noise-free `y = sin(x0) + 0.5 * x1` sampled on a grid, as whitespace text.
fn dataset_text() -> String {
    let mut text = String::new();
    for i in 0..8 {
        for j in 0..5 {
            let x0 = i as f64 / 4.0 - 1.0;
            let x1 = j as f64 / 2.0 - 1.0;
            let y = x0.sin() + 0.5 * x1;
            text.push_str(&format!("{} {} {}\n", x0, x1, y));
        }
    }
    text
}

fn load() -> Dataset {
    Dataset::parse(&dataset_text()).unwrap()
}

fn small_config(strategy: Strategy) -> ExperimentConfig {
    let mut config = ExperimentConfig {
        seed: Some(2024),
        strategy,
        ..ExperimentConfig::default()
    };
    config.backprop.epochs = 200;
    config.backprop.learning_rate = 0.01;
    config.evolution.population_size = 30;
    config.evolution.generations = 40;
    config
}

#[test]
fn test_backprop_experiment() {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = std::env::temp_dir().join(format!("evonnet-data-{}.txt", std::process::id()));
    std::fs::write(&path, dataset_text()).unwrap();
    let data = Dataset::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(data, load());
    assert_eq!(data.row_count(), 40);
    assert_eq!(data.input_count(), 2);

    let report = Experiment::new(small_config(Strategy::Backprop))
        .unwrap()
        .run(&data)
        .unwrap();

    assert_eq!(report.training.len(), 20);
    assert_eq!(report.test.len(), 20);
    assert_eq!(report.net.geometry(), &[2, 5, 1]);
    for partition in &[&report.training, &report.test] {
        assert!(partition.r2 >= 0.0 && partition.r2 <= 1.0 + 1e-9);
    }
    assert!(report.fit.is_finite());
}

#[test]
fn test_evolution_experiment() {
    let _ = env_logger::builder().is_test(true).try_init();
    let data = load();
    let report = Experiment::new(small_config(Strategy::Evolution))
        .unwrap()
        .run(&data)
        .unwrap();

    // training R^2 of the rescaled predictions is the fitness that was maximized
    assert!((report.training.r2 - report.fit).abs() < 1e-9);
    assert!(report.test.r2 >= 0.0 && report.test.r2 <= 1.0 + 1e-9);
}

#[test]
fn test_runs_reproduce_with_seed() {
    let data = load();
    let experiment = Experiment::new(small_config(Strategy::Evolution)).unwrap();
    let first = experiment.run(&data).unwrap();
    let second = experiment.run(&data).unwrap();
    assert_eq!(first.net.weights(), second.net.weights());
    assert_eq!(first.test.pairs, second.test.pairs);

    let unseeded = Experiment::new(ExperimentConfig {
        seed: None,
        ..small_config(Strategy::Backprop)
    })
    .unwrap()
    .run(&data)
    .unwrap();
    let replay = Experiment::new(ExperimentConfig {
        seed: Some(unseeded.seed),
        ..small_config(Strategy::Backprop)
    })
    .unwrap()
    .run(&data)
    .unwrap();
    assert_eq!(unseeded.net.weights(), replay.net.weights());
}

#[test]
fn test_config_file_drives_experiment() {
    let path = std::env::temp_dir().join(format!("evonnet-experiment-{}.yaml", std::process::id()));
    small_config(Strategy::Backprop).save(&path).unwrap();
    let config = ExperimentConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let report = Experiment::new(config).unwrap().run(&load()).unwrap();
    assert_eq!(report.strategy, Strategy::Backprop);
    assert_eq!(report.seed, 2024);
}

#[test]
fn test_pairs_written_per_partition() {
    let report = Experiment::new(small_config(Strategy::Backprop))
        .unwrap()
        .run(&load())
        .unwrap();

    let dir = std::env::temp_dir();
    let training = dir.join(format!("evonnet-training-{}.out", std::process::id()));
    let test = dir.join(format!("evonnet-test-{}.out", std::process::id()));
    report.training.write_pairs(&training).unwrap();
    report.test.write_pairs(&test).unwrap();

    let written = Dataset::from_file(&training).unwrap();
    assert_eq!(written.row_count(), report.training.len());
    let written = Dataset::from_file(&test).unwrap();
    assert_eq!(written.row_count(), report.test.len());

    std::fs::remove_file(&training).unwrap();
    std::fs::remove_file(&test).unwrap();
}

#[test]
fn test_non_finite_input_is_rejected() {
    let mut text = dataset_text();
    text.push_str("nan 1.0 0.5\n");
    assert!(matches!(
        Dataset::parse(&text),
        Err(evonnet::dataset::DatasetError::NonFinite { row: 40, column: 0 })
    ));
}
