//! Integration test: Training pipeline end-to-end

mod common;

use stargal::catalog;
use stargal::error::StargalError;
use stargal::model::ModelArtifact;
use stargal::training::{BdtConfig, Method, TrainEngine};

fn small_config() -> BdtConfig {
    BdtConfig::default()
        .with_n_trees(20)
        .with_max_depth(3)
        .with_min_node_events(5)
        .with_n_cuts(20)
        .with_train_sizes(60, 60)
}

#[test]
fn test_train_every_method() {
    let dir = tempfile::tempdir().unwrap();
    let df = common::catalog(120, 120, 7);

    let engine = TrainEngine::new(small_config(), Method::ALL.to_vec()).with_weights_dir(dir.path());
    let outcome = engine.run(&df).expect("training should succeed");

    assert_eq!(outcome.artifacts.len(), 4);
    assert!(outcome.report_path.exists(), "evaluation report should be written");
    for (method, path) in &outcome.artifacts {
        assert!(path.exists(), "{} artifact missing", method);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, format!("StarGalaxy_BDT_20_5_3_20_60_60_{}.weights.json", method.name()));
    }

    for eval in &outcome.report.methods {
        assert_eq!(eval.test.n_signal, 60);
        assert_eq!(eval.test.n_background, 60);
        assert!(
            eval.test.roc_integral > 0.9,
            "{} should separate the synthetic catalog, roc = {}",
            eval.method,
            eval.test.roc_integral
        );
    }
}

#[test]
fn test_artifact_reloads_with_same_scores() {
    let dir = tempfile::tempdir().unwrap();
    let df = common::catalog(100, 100, 11);

    let engine = TrainEngine::new(small_config(), vec![Method::Bdtd]).with_weights_dir(dir.path());
    let outcome = engine.run(&df).unwrap();
    let (_, path) = &outcome.artifacts[0];

    let artifact = ModelArtifact::load(path).unwrap();
    assert_eq!(artifact.method(), Method::Bdtd);
    assert!(artifact.decorrelation.is_some());
    assert_eq!(artifact.metadata.hyperparameters, small_config());
    assert_eq!(artifact.metadata.summary.n_train_signal, 60);

    let rows = catalog::rows_from_frame(&df, true).unwrap();
    let fv = stargal::features::derive(&rows[0]).unwrap();
    let score = artifact.evaluate(&fv).unwrap();
    assert!((-1.0..=1.0).contains(&score));

    let again = ModelArtifact::load(path).unwrap().evaluate(&fv).unwrap();
    assert_eq!(score, again);
}

#[test]
fn test_training_is_reproducible() {
    let df = common::catalog(100, 100, 3);
    let config = small_config().with_seed(5);

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = TrainEngine::new(config.clone(), vec![Method::Bdtg, Method::Bdtb])
        .with_weights_dir(dir_a.path())
        .run(&df)
        .unwrap();
    let b = TrainEngine::new(config, vec![Method::Bdtg, Method::Bdtb])
        .with_weights_dir(dir_b.path())
        .run(&df)
        .unwrap();

    for (ea, eb) in a.report.methods.iter().zip(b.report.methods.iter()) {
        assert_eq!(ea.test, eb.test);
        assert_eq!(ea.ranking, eb.ranking);
    }
}

#[test]
fn test_distinct_hyperparameters_get_distinct_names() {
    let base = BdtConfig::default();
    let mut variants = vec![
        base.clone().with_n_trees(400),
        base.clone().with_min_node_events(100),
        base.clone().with_max_depth(5),
        base.clone().with_n_cuts(50),
        base.clone().with_train_sizes(1000, 6000),
        base.clone().with_train_sizes(30000, 1000),
        base.clone().with_test_sizes(2000, 2000),
        base.clone().with_seed(7),
    ];
    for field in 0..4 {
        let mut config = base.clone();
        match field {
            0 => config.shrinkage = 0.5,
            1 => config.ada_beta = 0.5,
            2 => config.bagging_fraction = 0.8,
            _ => config.max_magnitude = 21.0,
        }
        assert_ne!(config, base);
        variants.push(config);
    }
    let mut names: Vec<String> = variants.iter().map(|c| c.weights_file_name(Method::Bdt)).collect();
    names.push(base.weights_file_name(Method::Bdt));
    names.push(base.weights_file_name(Method::Bdtd));
    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total, "distinct settings must not share an artifact");
}

#[test]
fn test_seed_keeps_runs_apart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let df = common::catalog(80, 80, 5);

    let a = TrainEngine::new(small_config(), vec![Method::Bdtb]).with_weights_dir(dir.path()).run(&df).unwrap();
    let b = TrainEngine::new(small_config().with_seed(7), vec![Method::Bdtb])
        .with_weights_dir(dir.path())
        .run(&df)
        .unwrap();

    assert_ne!(a.artifacts[0].1, b.artifacts[0].1);
    assert_ne!(a.report_path, b.report_path);
    assert!(a.artifacts[0].1.exists() && b.artifacts[0].1.exists());
}

#[test]
fn test_unknown_method_rejected() {
    let err = Method::parse_list("BDT,Fisher").unwrap_err();
    assert!(matches!(err, StargalError::UnknownMethod { ref name, .. } if name == "Fisher"));
}

#[test]
fn test_too_few_stars() {
    let dir = tempfile::tempdir().unwrap();
    let df = common::catalog(100, 30, 1);
    let engine = TrainEngine::new(small_config(), vec![Method::Bdt]).with_weights_dir(dir.path());
    let err = engine.run(&df).unwrap_err();
    assert!(matches!(
        err,
        StargalError::InsufficientEvents { class: "star", requested: 60, available: 30 }
    ));
}

#[test]
fn test_missing_label_column() {
    let dir = tempfile::tempdir().unwrap();
    let df = common::catalog(10, 10, 1).drop(catalog::LABEL_COLUMN).unwrap();
    let engine = TrainEngine::new(small_config(), vec![Method::Bdt]).with_weights_dir(dir.path());
    assert!(engine.run(&df).is_err());
}

#[test]
fn test_train_from_csv_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_csv(&common::catalog(80, 80, 9), dir.path(), "train.csv");
    let df = catalog::load_frame(&path).unwrap();
    assert_eq!(df.height(), 160);

    let engine = TrainEngine::new(small_config(), vec![Method::Bdt]).with_weights_dir(dir.path().join("w"));
    let outcome = engine.run(&df).unwrap();
    assert!(outcome.artifacts[0].1.starts_with(dir.path().join("w")));
}
