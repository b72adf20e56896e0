//! End-to-end driver scenarios over synthetic well data.

use chrono::{Months, NaiveDate};
use wellfill_data::{GapConfig, SeriesMatrix};
use wellfill_training::{DriverConfig, IterationDriver, MemorySink, TrainConfig};

/// Monthly date index starting at `start_year`-01-01.
fn monthly_index(start_year: i32, months: u32) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap();
    (0..months)
        .map(|m| start.checked_add_months(Months::new(m)).unwrap())
        .collect()
}

/// A smooth seasonal signal with a trend; the shared shape all wells follow.
fn signal(i: usize) -> f64 {
    let t = i as f64;
    t / 120.0 + 0.3 * (std::f64::consts::TAU * t / 12.0).sin()
}

fn full_column(n: usize, scale: f64, offset: f64) -> Vec<Option<f64>> {
    (0..n).map(|i| Some(scale * signal(i) + offset)).collect()
}

fn quick_train_config() -> TrainConfig {
    TrainConfig::default()
        .with_hidden_units(12)
        .with_max_epochs(25)
}

#[test]
fn clean_entity_gets_test_metrics_and_full_coverage() {
    let n = 360; // 1990..2020 monthly
    let index = monthly_index(1990, n as u32);

    let mut observed = SeriesMatrix::new(index.clone()).unwrap();
    // Target with a real 30-month gap in 1994-1996.
    let mut target = full_column(n, 1.0, 10.0);
    for slot in target.iter_mut().skip(50).take(30) {
        *slot = None;
    }
    observed.insert_column("target", target.clone()).unwrap();
    for p in 0..5 {
        observed
            .insert_column(
                format!("p{}", p),
                full_column(n, 0.8 + 0.1 * p as f64, p as f64),
            )
            .unwrap();
    }

    // The pretrained matrix is fully observed.
    let mut pretrained = SeriesMatrix::new(index).unwrap();
    pretrained
        .insert_column("target", full_column(n, 1.0, 10.0))
        .unwrap();
    for p in 0..5 {
        pretrained
            .insert_column(
                format!("p{}", p),
                full_column(n, 0.8 + 0.1 * p as f64, p as f64),
            )
            .unwrap();
    }

    let config = DriverConfig {
        rounds: 1,
        train: quick_train_config(),
        ..DriverConfig::default()
    };
    let mut driver = IterationDriver::new(config, MemorySink::new()).unwrap();
    let imputed = driver.run(&observed, &pretrained).unwrap();

    let sink = driver.into_sink();
    assert_eq!(sink.rounds.len(), 1);
    let (summary, _) = &sink.rounds[0];

    // The clean entity produced a complete row of metrics.
    let row = summary.get("target").expect("target should succeed");
    assert!(row.train_points > 0);
    assert!(row.validation_points > 0);
    assert!(row.test.is_some(), "a holdout window should be placeable");
    assert!(row.test_points > 0);
    assert!(row.r2.is_some());

    // Full coverage: the predictors are complete, so every missing date
    // received a prediction.
    let filled = imputed.column("target").unwrap();
    assert!(filled.iter().all(|v| v.is_some()));

    // Imputation never overwrites an observation, for any entity.
    for (entity, observed_column) in observed.iter_columns() {
        let imputed_column = imputed.column(entity).unwrap();
        for (obs, imp) in observed_column.iter().zip(imputed_column.iter()) {
            if let Some(v) = obs {
                assert_eq!(imp, &Some(*v), "observed value changed for {}", entity);
            }
        }
    }
}

#[test]
fn data_poor_entities_degrade_without_aborting_the_round() {
    let n = 300; // 1990..2015 monthly
    let index = monthly_index(1990, n as u32);

    let mut observed = SeriesMatrix::new(index.clone()).unwrap();
    for p in 0..4 {
        observed
            .insert_column(
                format!("p{}", p),
                full_column(n, 1.0 + 0.2 * p as f64, p as f64),
            )
            .unwrap();
    }
    // Too few observations to train at all: skipped entirely.
    let sparse: Vec<Option<f64>> = (0..n)
        .map(|i| if i % 50 == 0 { Some(signal(i)) } else { None })
        .collect();
    observed.insert_column("sparse", sparse.clone()).unwrap();
    // Observed only before the cut-left boundary: trains, but no holdout fits.
    let early: Vec<Option<f64>> = (0..n)
        .map(|i| if i < 100 { Some(signal(i) + 5.0) } else { None })
        .collect();
    observed.insert_column("early", early).unwrap();

    let mut pretrained = SeriesMatrix::new(index).unwrap();
    for (entity, _) in observed.iter_columns() {
        let scale = 1.0 + entity.len() as f64 * 0.05;
        pretrained
            .insert_column(entity, full_column(n, scale, 0.0))
            .unwrap();
    }

    let config = DriverConfig {
        rounds: 1,
        train: quick_train_config(),
        ..DriverConfig::default()
    };
    let mut driver = IterationDriver::new(config, MemorySink::new()).unwrap();
    let imputed = driver.run(&observed, &pretrained).unwrap();

    let sink = driver.into_sink();
    let (summary, _) = &sink.rounds[0];

    // The sparse entity contributes no row and keeps its missingness.
    assert!(summary.get("sparse").is_none());
    assert_eq!(imputed.column("sparse").unwrap(), sparse.as_slice());

    // The early entity succeeds with absent test metrics.
    let row = summary.get("early").expect("early should still train");
    assert!(row.test.is_none());
    assert_eq!(row.test_points, 0);
    assert!(row.test_r2.is_none());

    // Healthy entities are unaffected by their neighbors' failures.
    for p in 0..4 {
        assert!(summary.get(&format!("p{}", p)).is_some());
    }
}

#[test]
fn later_rounds_consume_the_previous_rounds_output() {
    let n = 240; // 1995..2015 monthly
    let index = monthly_index(1995, n as u32);

    // All observed columns are complete and mutually correlated.
    let mut observed = SeriesMatrix::new(index.clone()).unwrap();
    let entities = ["x", "p1", "p2", "p3", "p4"];
    for (k, entity) in entities.iter().enumerate() {
        observed
            .insert_column(*entity, full_column(n, 1.0 + 0.1 * k as f64, k as f64))
            .unwrap();
    }

    // The pretrained matrix starves feature selection: only two columns
    // have enough observations to be scoreable, so no target can reach the
    // three scoreable predictors selection requires.
    let mut pretrained = SeriesMatrix::new(index).unwrap();
    for (k, entity) in entities.iter().enumerate() {
        let column = if k < 2 {
            full_column(n, 1.0 + 0.1 * k as f64, k as f64)
        } else {
            let mut sparse: Vec<Option<f64>> = vec![None; n];
            sparse[0] = Some(1.0);
            sparse[1] = Some(2.0);
            sparse
        };
        pretrained.insert_column(*entity, column).unwrap();
    }

    let config = DriverConfig {
        rounds: 2,
        use_test_holdout: false,
        gap: GapConfig::default(),
        train: quick_train_config(),
        ..DriverConfig::default()
    };
    let mut driver = IterationDriver::new(config, MemorySink::new()).unwrap();
    let final_matrix = driver.run(&observed, &pretrained).unwrap();

    let sink = driver.into_sink();
    assert_eq!(sink.rounds.len(), 2);

    // Round 0 scored against the starved pretrained matrix: every entity
    // saw only two usable predictors and was skipped.
    assert!(sink.rounds[0].0.is_empty());

    // Round 0's output passes the observed (complete) columns through, so
    // round 1 must have scored against it, not the pretrained matrix:
    // every entity now succeeds.
    assert_eq!(sink.rounds[1].0.len(), entities.len());

    // The driver's return value is the final round's artifact.
    for entity in entities {
        assert_eq!(
            final_matrix.column(entity).unwrap(),
            sink.rounds[1].1.column(entity).unwrap()
        );
    }
}
