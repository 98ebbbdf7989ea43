//! Integration tests for Kiln.

use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

use kiln::cells::load_updates;
use kiln::{
    ErrorCells, FunctionalDeps, KilnError, Parser, RepairConfig, RepairMode, RepairModel,
    RepairOutput, TrainedModels,
};

/// Helper to create a temporary file with given content.
fn create_test_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");
    file
}

fn load(content: &str, errors: &str) -> (kiln::DataTable, ErrorCells) {
    let input = create_test_file(content);
    let errors = create_test_file(errors);
    let (table, _) = Parser::new().parse_file(input.path()).expect("Parse failed");
    let cells = ErrorCells::load(errors.path(), "tid").expect("Error cells failed");
    (table, cells)
}

const CITIES: [&str; 4] = ["Boston", "Austin", "Denver", "Seattle"];

/// 40 rows where `zip` determines `city`. Rows 0..10 hold corrupted cities
/// whose edit distance to the right value is `row + 1`.
fn zip_city_data() -> String {
    let mut content = String::from("tid,zip,city\n");
    for i in 0..40 {
        let city = CITIES[i % 4];
        let value = if i < 10 {
            format!("{}{}", city, "x".repeat(i + 1))
        } else {
            city.to_string()
        };
        content.push_str(&format!("{},z{},{}\n", i, i % 4, value));
    }
    content
}

fn zip_city_errors() -> String {
    let mut content = String::from("tid,attribute\n");
    for i in 0..10 {
        content.push_str(&format!("{},city\n", i));
    }
    content
}

fn zip_city_model() -> RepairModel {
    RepairModel::new()
        .with_row_id("tid")
        .with_functional_deps(FunctionalDeps::new().with("zip", "city"))
}

// =============================================================================
// Best-Guess Repairs
// =============================================================================

#[test]
fn test_constant_column_best_guess() {
    let (input, cells) = load("tid,a,y\n1,p,X\n2,q,X\n3,r,\n", "tid,attribute\n3,y\n");

    let model = RepairModel::new().with_row_id("tid");
    let output = model.run(&input, &cells).expect("Repair failed");

    let RepairOutput::Candidates(repairs) = output else {
        panic!("expected candidates");
    };
    assert_eq!(repairs.len(), 1);
    assert_eq!(repairs[0].row_id, "3");
    assert_eq!(repairs[0].attribute, "y");
    assert_eq!(repairs[0].current_value, None);
    assert_eq!(repairs[0].repaired.as_deref(), Some("X"));
}

#[test]
fn test_functional_dependency_candidates() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());

    let RepairOutput::Candidates(repairs) = zip_city_model().run(&input, &cells).unwrap() else {
        panic!("expected candidates");
    };
    assert_eq!(repairs.len(), 10);
    for repair in &repairs {
        let row: usize = repair.row_id.parse().unwrap();
        assert_eq!(repair.repaired.as_deref(), Some(CITIES[row % 4]));
    }
}

#[test]
fn test_statistical_classifier_repair() {
    let mut content = String::from("tid,kind,label\n");
    for i in 0..40 {
        let (kind, label) = if i % 2 == 0 { ("p", "P") } else { ("q", "Q") };
        let label = if i == 0 { "" } else { label };
        content.push_str(&format!("{},{},{}\n", i, kind, label));
    }
    let (input, cells) = load(&content, "tid,attribute\n0,label\n");

    let model = RepairModel::new().with_row_id("tid");
    let RepairOutput::Candidates(repairs) = model.run(&input, &cells).unwrap() else {
        panic!("expected candidates");
    };
    assert_eq!(repairs.len(), 1);
    assert_eq!(repairs[0].repaired.as_deref(), Some("P"));
}

#[test]
fn test_integral_regression_repair() {
    let mut content = String::from("tid,x,score\n");
    for i in 0..50 {
        let x = i % 5 + 1;
        let score = if i == 2 { String::new() } else { (x * 10).to_string() };
        content.push_str(&format!("{},{},{}\n", i, x, score));
    }
    let (input, cells) = load(&content, "tid,attribute\n2,score\n");

    let model = RepairModel::new().with_row_id("tid");
    let RepairOutput::Candidates(repairs) = model.run(&input, &cells).unwrap() else {
        panic!("expected candidates");
    };
    assert_eq!(repairs[0].repaired.as_deref(), Some("30"));
}

// =============================================================================
// Probability-Based Outputs
// =============================================================================

#[test]
fn test_pmf_output() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());

    let model = zip_city_model().with_output(RepairMode::Pmf);
    let RepairOutput::Pmf(pmfs) = model.run(&input, &cells).unwrap() else {
        panic!("expected pmf");
    };
    assert_eq!(pmfs.len(), 10);
    for pmf in &pmfs {
        let total: f64 = pmf.pmf.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
        let row: usize = pmf.row_id.parse().unwrap();
        assert_eq!(pmf.pmf[0].0, CITIES[row % 4]);
    }
}

#[test]
fn test_maximal_likelihood_budget() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());

    let model = zip_city_model()
        .with_output(RepairMode::MaximalLikelihood)
        .with_repair_delta(3);
    let RepairOutput::MaximalLikelihood(selection) = model.run(&input, &cells).unwrap() else {
        panic!("expected maximal likelihood selection");
    };

    assert_eq!(selection.repairs.len(), 10);
    assert_eq!(selection.selected, 3);
    let changed: Vec<&str> = selection
        .repairs
        .iter()
        .filter(|r| r.is_change())
        .map(|r| r.row_id.as_str())
        .collect();
    // The cheapest fixes score highest
    assert_eq!(changed.len(), 3);
    for id in ["0", "1", "2"] {
        assert!(changed.contains(&id));
    }
}

#[test]
fn test_data_mode_with_budget() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());

    let model = zip_city_model()
        .with_output(RepairMode::Data)
        .with_repair_delta(3);
    let RepairOutput::Data(table) = model.run(&input, &cells).unwrap() else {
        panic!("expected data");
    };

    assert_eq!(table.row_count(), 40);
    let city = table.column_index("city").unwrap();
    assert_eq!(table.get(0, city), Some("Boston"));
    assert_eq!(table.get(2, city), Some("Denver"));
    assert_eq!(table.get(5, city), Some("Austinxxxxxx"));
    assert_eq!(table.get(20, city), Some("Boston"));
}

#[test]
fn test_data_mode_repairs_everything() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());

    let model = zip_city_model().with_output(RepairMode::Data);
    let RepairOutput::Data(table) = model.run(&input, &cells).unwrap() else {
        panic!("expected data");
    };

    let city = table.column_index("city").unwrap();
    for row in 0..40 {
        assert_eq!(table.get(row, city), Some(CITIES[row % 4]));
        assert_eq!(table.get(row, 0), Some(row.to_string().as_str()));
    }
}

#[test]
fn test_histogram_output() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());

    let model = zip_city_model().with_output(RepairMode::Histogram);
    let RepairOutput::Histogram(hist) = model.run(&input, &cells).unwrap() else {
        panic!("expected histogram");
    };
    assert_eq!(hist.len(), 1);
    assert_eq!(hist[0].attribute, "city");
    let total: usize = hist[0].histogram.iter().map(|(_, n)| n).sum();
    assert_eq!(total, 30);
}

#[test]
fn test_pmf_rejects_continuous_targets() {
    let mut content = String::from("tid,x,score\n");
    for i in 0..20 {
        content.push_str(&format!("{},{},{}.5\n", i, i % 3, i));
    }
    let (input, cells) = load(&content, "tid,attribute\n1,score\n");

    let model = RepairModel::new().with_row_id("tid").with_output(RepairMode::Pmf);
    assert!(matches!(model.run(&input, &cells), Err(KilnError::Config(_))));
}

// =============================================================================
// Rule-Based Repairs
// =============================================================================

#[test]
fn test_nearest_value_rule() {
    let content = zip_city_data().replace("0,z0,Bostonx\n", "0,z0,Bostn\n");
    let (input, cells) = load(&content, "tid,attribute\n0,city\n");

    let mut config = RepairConfig {
        row_id: Some("tid".into()),
        ..Default::default()
    };
    config.rules.nearest_value = true;
    let RepairOutput::Candidates(repairs) = RepairModel::with_config(config).run(&input, &cells).unwrap() else {
        panic!("expected candidates");
    };
    assert_eq!(repairs.len(), 1);
    assert_eq!(repairs[0].current_value.as_deref(), Some("Bostn"));
    assert_eq!(repairs[0].repaired.as_deref(), Some("Boston"));
}

// =============================================================================
// Guards
// =============================================================================

#[test]
fn test_missing_row_id() {
    let (input, cells) = load("tid,a,y\n1,p,X\n", "tid,attribute\n1,y\n");
    assert!(matches!(
        RepairModel::new().run(&input, &cells),
        Err(KilnError::Config(_))
    ));
}

#[test]
fn test_unknown_error_attribute() {
    let (input, cells) = load("tid,a,y\n1,p,X\n2,q,X\n", "tid,attribute\n1,income\n");
    assert!(matches!(
        RepairModel::new().with_row_id("tid").run(&input, &cells),
        Err(KilnError::MissingColumn(_))
    ));
}

#[test]
fn test_no_features() {
    let (input, cells) = load("tid,y\n1,X\n2,X\n3,\n", "tid,attribute\n3,y\n");
    assert!(matches!(
        RepairModel::new().with_row_id("tid").run(&input, &cells),
        Err(KilnError::NoFeatures)
    ));
}

#[test]
fn test_insufficient_training_rows() {
    let (input, cells) = load(
        "tid,a,y\n1,p,X\n2,q,\n3,r,\n",
        "tid,attribute\n2,y\n3,y\n1,a\n",
    );
    let mut config = RepairConfig {
        row_id: Some("tid".into()),
        ..Default::default()
    };
    config.min_training_row_ratio = 0.5;
    assert!(matches!(
        RepairModel::with_config(config).run(&input, &cells),
        Err(KilnError::InsufficientTrainingRows { found: 0, required: 1 })
    ));
}

#[test]
fn test_dependency_cycle() {
    let mut content = String::from("tid,a,b,c\n");
    for i in 0..20 {
        let a = if i == 0 { "" } else { ["a1", "a2"][i % 2] };
        let b = if i == 1 { "" } else { ["b1", "b2"][i % 2] };
        content.push_str(&format!("{},{},{},c{}\n", i, a, b, i % 3));
    }
    let (input, cells) = load(&content, "tid,attribute\n0,a\n1,b\n");

    let fds = FunctionalDeps::new().with("a", "b").with("b", "a");
    let model = RepairModel::new().with_row_id("tid").with_functional_deps(fds);
    assert!(matches!(
        model.run(&input, &cells),
        Err(KilnError::DependencyCycle { .. })
    ));
}

#[test]
fn test_invalid_inference_order() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());
    let model = zip_city_model().with_inference_order("alphabetical");
    assert!(matches!(model.run(&input, &cells), Err(KilnError::Config(_))));
}

#[test]
fn test_error_order_and_parallel_training_agree() {
    let mut content = String::from("tid,zip,city,kind,label\n");
    for i in 0..40 {
        let city = if i == 3 { "" } else { CITIES[i % 4] };
        let label = if i == 4 { "" } else if i % 2 == 0 { "P" } else { "Q" };
        content.push_str(&format!("{},z{},{},k{},{}\n", i, i % 4, city, i % 2, label));
    }
    let (input, cells) = load(&content, "tid,attribute\n3,city\n4,label\n");

    let serial = zip_city_model().with_inference_order("error");
    let parallel = zip_city_model()
        .with_inference_order("error")
        .with_parallel_training(true);

    let RepairOutput::Candidates(a) = serial.run(&input, &cells).unwrap() else {
        panic!("expected candidates");
    };
    let RepairOutput::Candidates(b) = parallel.run(&input, &cells).unwrap() else {
        panic!("expected candidates");
    };
    assert_eq!(a, b);
}

// =============================================================================
// Saved Models and Updates
// =============================================================================

#[test]
fn test_train_save_and_reuse() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("models.json");

    let models = zip_city_model().train(&input, &cells).unwrap();
    assert_eq!(models.order, vec!["city".to_string()]);
    assert_eq!(models.get("city").unwrap().kind(), "functional_dependency");
    models.save(&path).unwrap();

    let loaded = TrainedModels::load(&path).unwrap();
    let output = zip_city_model().run_with_models(&loaded, &input, &cells).unwrap();
    let RepairOutput::Candidates(repairs) = output else {
        panic!("expected candidates");
    };
    assert_eq!(repairs.len(), 10);
}

#[test]
fn test_reuse_requires_model_per_target() {
    let (input, cells) = load(&zip_city_data(), &zip_city_errors());
    let models = TrainedModels::default();
    assert!(matches!(
        zip_city_model().run_with_models(&models, &input, &cells),
        Err(KilnError::Config(_))
    ));
}

#[test]
fn test_apply_updates_from_file() {
    let (input, _) = load(&zip_city_data(), &zip_city_errors());
    let updates = create_test_file("tid,attribute,repaired\n0,city,Boston\n7,city,Seattle\n");

    let updates = load_updates(updates.path(), "tid").unwrap();
    let repaired = RepairModel::apply_updates(&input, "tid", &updates).unwrap();

    let city = repaired.column_index("city").unwrap();
    assert_eq!(repaired.get(0, city), Some("Boston"));
    assert_eq!(repaired.get(7, city), Some("Seattle"));
    assert_eq!(repaired.get(1, city), Some("Austinxx"));
    assert_eq!(repaired.row_count(), input.row_count());
}

#[test]
fn test_config_from_json() {
    let file = create_test_file(
        r#"{"row_id": "tid", "output": "maximal_likelihood", "repair_delta": 2,
            "inference_order": "domain", "training": {"max_training_column_num": 3}}"#,
    );
    let config = RepairConfig::load(file.path()).unwrap();
    assert_eq!(config.output, RepairMode::MaximalLikelihood);
    assert_eq!(config.training.max_training_column_num, Some(3));
    assert!(RepairModel::with_config(config).validate().is_ok());
}
