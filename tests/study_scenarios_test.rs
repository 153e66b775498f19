//! End-to-end study scenarios
//!
//! 1. Null correlation: the sampling distribution of Pearson's r
//! 2. Independence: each row depends only on its own trial stream
//! 3. Failure path: abort vs skip on degenerate datasets
//! 4. Deadline: a slow synthesizer hits the time limit
//! 5. Meta-analysis: regress the estimator on the factor that drives it
//!
//! Toyota Way: Jidoka (no NaN row ever enters a table)

use std::time::Duration;

use rand::Rng;
use trueno_study::config::StudyFile;
use trueno_study::factor::{FactorSpec, FactorValue, SamplingRule};
use trueno_study::rng::SeedStream;
use trueno_study::study::NoFactors;
use trueno_study::synth::{
    CorrelatedNormalPairs, Correlation, LineFitStatistic, PairedSample, UniformPairs,
};
use trueno_study::{
    run_study, DatasetSynthesizer, Error, Execution, FailurePolicy, Factors, Result, Study,
    TrialRng,
};

/// Uniform pairs, except that roughly 30% of datasets have a constant `y`.
fn sometimes_flat(_factors: &Factors, rng: &mut TrialRng) -> Result<PairedSample> {
    let flat = rng.gen_bool(0.3);
    let x: Vec<f64> = (0..20).map(|_| rng.gen::<f64>()).collect();
    let y = if flat {
        vec![1.0; 20]
    } else {
        (0..20).map(|_| rng.gen::<f64>()).collect()
    };
    PairedSample::new(x, y)
}

/// Trials for which `sometimes_flat` produces a constant `y`.
fn flat_trials(seed: u64, trials: u64) -> Vec<u64> {
    let stream = SeedStream::new(seed);
    (0..trials)
        .filter(|&trial| stream.trial_rng(trial).gen_bool(0.3))
        .collect()
}

#[test]
fn test_null_correlation_distribution() {
    let table = run_study(100, &NoFactors, &UniformPairs::new(50), &Correlation::new()).unwrap();

    assert_eq!(table.len(), 100);
    assert_eq!(table.schema().column_names(), ["trial", "corr"]);

    // Under independence r is centred on 0 with sd close to 1/sqrt(n - 1)
    let summary = table.summarize("corr").unwrap();
    assert_eq!(summary.count, 100);
    assert!(summary.mean.abs() < 0.06, "mean r = {}", summary.mean);
    let sd = summary.std_dev.unwrap();
    assert!((0.10..0.19).contains(&sd), "sd r = {sd}");
    assert!(summary.min >= -1.0 && summary.max <= 1.0);
}

#[test]
fn test_rows_depend_only_on_their_trial_stream() {
    let sampler = |rng: &mut TrialRng| -> Result<Factors> {
        Ok(Factors::new().with("draw", i64::from(rng.gen::<u32>())))
    };
    let table = Study::builder()
        .trials(25)
        .seed(1234)
        .build()
        .unwrap()
        .run(&sampler, &UniformPairs::new(5), &Correlation::new())
        .unwrap();

    let stream = SeedStream::new(1234);
    for record in table.records() {
        let expected = i64::from(stream.trial_rng(record.trial()).gen::<u32>());
        assert_eq!(
            record.factors().get("draw"),
            Some(&FactorValue::Int(expected)),
            "trial {}",
            record.trial()
        );
    }
}

#[test]
fn test_different_seeds_differ() {
    let run = |seed: u64| {
        Study::builder()
            .trials(10)
            .seed(seed)
            .build()
            .unwrap()
            .run(&NoFactors, &UniformPairs::new(10), &Correlation::new())
            .unwrap()
    };
    assert_ne!(run(1).column("corr"), run(2).column("corr"));
}

#[test]
fn test_degenerate_trial_aborts_study() {
    let expected = flat_trials(7, 50);
    assert!(!expected.is_empty());

    let err = Study::builder()
        .trials(50)
        .seed(7)
        .build()
        .unwrap()
        .run(&NoFactors, &sometimes_flat, &Correlation::new())
        .unwrap_err();

    match &err {
        Error::TrialFailed { trial, factors, .. } => {
            assert_eq!(*trial, expected[0]);
            assert_eq!(factors, "(none)");
        }
        other => panic!("expected TrialFailed, got {other}"),
    }
    assert!(matches!(err.root_cause(), Error::DegenerateData(_)));
}

#[test]
fn test_parallel_abort_reports_lowest_failing_trial() {
    let expected = flat_trials(7, 200);

    let err = Study::builder()
        .trials(200)
        .seed(7)
        .execution(Execution::Parallel)
        .build()
        .unwrap()
        .run(&NoFactors, &sometimes_flat, &Correlation::new())
        .unwrap_err();

    assert!(matches!(err, Error::TrialFailed { trial, .. } if trial == expected[0]));
}

#[test]
fn test_skip_policy_lists_failed_trials() {
    let expected = flat_trials(7, 50);

    for execution in [Execution::Sequential, Execution::Parallel] {
        let table = Study::builder()
            .trials(50)
            .seed(7)
            .on_failure(FailurePolicy::Skip)
            .execution(execution)
            .build()
            .unwrap()
            .run(&NoFactors, &sometimes_flat, &Correlation::new())
            .unwrap();

        let skipped: Vec<u64> = table.skipped().iter().map(|s| s.trial).collect();
        assert_eq!(skipped, expected, "{execution:?}");
        assert_eq!(table.len() + skipped.len(), 50);
        assert!(table.skipped()[0].reason.contains("zero variance"));

        let corr = table.column("corr").unwrap();
        assert!(corr.iter().all(|r| r.is_finite()));
        assert!(table
            .records()
            .iter()
            .all(|record| !expected.contains(&record.trial())));
    }
}

#[test]
fn test_deadline_stops_slow_study() {
    let slow = |factors: &Factors, rng: &mut TrialRng| -> Result<PairedSample> {
        std::thread::sleep(Duration::from_millis(20));
        UniformPairs::new(10).synthesize(factors, rng)
    };

    let err = Study::builder()
        .trials(1_000)
        .time_limit(Duration::from_millis(100))
        .build()
        .unwrap()
        .run(&NoFactors, &slow, &Correlation::new())
        .unwrap_err();

    match err {
        Error::DeadlineExceeded {
            completed,
            requested,
        } => {
            assert!(completed >= 1 && completed < 1_000, "completed {completed}");
            assert_eq!(requested, 1_000);
        }
        other => panic!("expected DeadlineExceeded, got {other}"),
    }
}

#[test]
fn test_slope_tracks_true_correlation() {
    let factors = FactorSpec::new()
        .factor(
            "n",
            SamplingRule::Fixed {
                value: FactorValue::Int(200),
            },
        )
        .factor("rho", SamplingRule::Uniform { low: -0.9, high: 0.9 });

    let table = Study::builder()
        .trials(200)
        .seed(2024)
        .execution(Execution::Parallel)
        .build()
        .unwrap()
        .run(&factors, &CorrelatedNormalPairs::new(), &LineFitStatistic::new())
        .unwrap();

    assert_eq!(
        table.schema().column_names(),
        ["trial", "n", "rho", "intercept", "slope"]
    );

    // For standard normal x the population slope equals rho
    let meta = table.fit_columns("rho", "slope").unwrap();
    assert!((meta.slope - 1.0).abs() < 0.1, "meta slope {}", meta.slope);
    assert!(meta.intercept.abs() < 0.05, "meta intercept {}", meta.intercept);
    assert!(meta.r_squared.unwrap() > 0.9);

    let intercepts = table.summarize("intercept").unwrap();
    assert!(intercepts.mean.abs() < 0.05);
}

#[test]
fn test_study_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.toml");
    std::fs::write(
        &path,
        r#"
        [study]
        trials = 40
        seed = 99
        on_failure = "skip"
        execution = "parallel"

        [factors.n]
        dist = "int_uniform"
        low = 10
        high = 40

        [factors.rho]
        dist = "uniform"
        low = -0.5
        high = 0.5
        "#,
    )
    .unwrap();

    let file = StudyFile::load(&path).unwrap();
    let table = Study::new(file.study)
        .unwrap()
        .run(&file.factors, &CorrelatedNormalPairs::new(), &Correlation::new())
        .unwrap();

    assert_eq!(table.len(), 40);
    assert_eq!(table.metadata().seed, 99);
    assert_eq!(table.metadata().execution, Execution::Parallel);
    assert!(table
        .column("n")
        .unwrap()
        .iter()
        .all(|n| (10.0..=40.0).contains(n)));
}

#[test]
fn test_invalid_factor_rule_rejected_before_any_trial() {
    let factors = FactorSpec::new().factor("rho", SamplingRule::Uniform { low: 1.0, high: -1.0 });
    let err = run_study(10, &factors, &CorrelatedNormalPairs::new(), &Correlation::new())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_out_of_domain_factor_aborts_under_skip() {
    let factors = FactorSpec::new()
        .factor("n", SamplingRule::IntUniform { low: 10, high: 20 })
        .factor("rho", SamplingRule::Uniform { low: -3.0, high: 3.0 });

    for execution in [Execution::Sequential, Execution::Parallel] {
        let err = Study::builder()
            .trials(20)
            .on_failure(FailurePolicy::Skip)
            .execution(execution)
            .build()
            .unwrap()
            .run(&factors, &CorrelatedNormalPairs::new(), &Correlation::new())
            .unwrap_err();

        assert!(
            matches!(err, Error::InvalidFactor { ref name, .. } if name == "rho"),
            "{execution:?}: expected InvalidFactor, got {err}"
        );
        assert!(err.is_configuration());
    }
}

#[test]
fn test_overflowing_uniform_width_rejected_before_any_trial() {
    let factors = FactorSpec::new().factor("x", SamplingRule::Uniform { low: -1e308, high: 1e308 });
    let err = run_study(3, &factors, &UniformPairs::new(10), &Correlation::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("factor 'x'")));
}

#[test]
fn test_unbounded_trials_stop_at_deadline() {
    for execution in [Execution::Sequential, Execution::Parallel] {
        let err = Study::builder()
            .trials(usize::MAX)
            .time_limit(Duration::from_millis(50))
            .execution(execution)
            .build()
            .unwrap()
            .run(&NoFactors, &UniformPairs::new(10), &Correlation::new())
            .unwrap_err();

        match err {
            Error::DeadlineExceeded { requested, .. } => assert_eq!(requested, usize::MAX),
            other => panic!("{execution:?}: expected DeadlineExceeded, got {other}"),
        }
    }
}
