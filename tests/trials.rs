//! Resampled trials.

mod common;

use std::num::NonZeroUsize;

use common::{assert_evidence_eq, CountingTrainer};
use stratx::evidence::Evidence::Measured;
use stratx::testing::{synthetic_additive, ExactMatchTrainer, GridTrainer, STATE_EFFECTS};
use stratx::{
    assert_approx_eq_f64, compute_cat_pd, compute_pd, run_cat_pd_trials, run_pd_trials,
    CategoryAlignment, ConfigError, Evidence, Resampling, StratConfig, StratError, TrialConfig,
};

fn config() -> StratConfig {
    StratConfig::builder().min_evidence(1).build().unwrap()
}

/// Every trial sees all rows, in a different order.
fn full_subsample(n_trials: usize) -> TrialConfig {
    TrialConfig::builder()
        .n_trials(n_trials)
        .resampling(Resampling::Subsample { fraction: 1.0 })
        .build()
        .unwrap()
}

mod continuous {
    use super::*;

    #[test]
    fn single_trial_matches_direct_call() {
        let ds = synthetic_additive(400, 81, 0.3);
        let direct = compute_pd(&ds, "x1", &config(), &ExactMatchTrainer).unwrap();
        let trials = run_pd_trials(&ds, "x1", &config(), &TrialConfig::default(), &ExactMatchTrainer).unwrap();

        assert_eq!(trials.trials.len(), 1);
        assert_eq!(trials.pdpx, direct.pdpx);
        assert_eq!(trials.pdpy, direct.pdpy);
        assert_eq!(trials.support, vec![1; direct.n_points()]);
        assert_eq!(trials.ignored, direct.ignored as f64);
    }

    #[test]
    fn full_subsamples_recover_quadratic() {
        let ds = synthetic_additive(400, 82, 0.0);
        let trials = run_pd_trials(&ds, "x1", &config(), &full_subsample(4), &ExactMatchTrainer).unwrap();

        assert_eq!(trials.support, vec![4; 10]);
        for (&x, &y) in trials.pdpx.iter().zip(&trials.pdpy) {
            assert_approx_eq_f64!(y, x * x, 1e-9);
        }
    }

    #[test]
    fn bootstrap_curves_are_averaged() {
        let ds = synthetic_additive(1000, 83, 0.2);
        let trial_config = TrialConfig::builder().n_trials(6).build().unwrap();
        let trials = run_pd_trials(&ds, "x1", &config(), &trial_config, &GridTrainer::default()).unwrap();

        assert_eq!(trials.trials.len(), 6);
        assert!(trials.pdpx.windows(2).all(|w| w[0] < w[1]));
        assert!(trials.support.iter().all(|&s| (1..=6).contains(&s)));
        for (i, &x) in trials.pdpx.iter().enumerate() {
            let ys: Vec<f64> = trials
                .trials
                .iter()
                .filter_map(|pd| pd.points().find(|&(px, _)| px == x).map(|(_, y)| y))
                .collect();
            assert_eq!(ys.len(), trials.support[i]);
            assert_approx_eq_f64!(trials.pdpy[i], ys.iter().sum::<f64>() / ys.len() as f64, 1e-12);
        }
        // Still close to x² after averaging noisy bootstraps.
        for (&x, &y) in trials.pdpx.iter().zip(&trials.pdpy) {
            assert!((y - x * x).abs() < 4.0, "x = {x}: {y}");
        }
    }

    #[test]
    fn seeded_and_thread_independent() {
        let ds = synthetic_additive(600, 84, 0.5);
        let trial_config = TrialConfig::builder().n_trials(5).seed(9).build().unwrap();
        let serial = StratConfig::builder()
            .min_evidence(1)
            .n_threads(NonZeroUsize::new(1).unwrap())
            .build()
            .unwrap();
        let parallel = StratConfig::builder()
            .min_evidence(1)
            .n_threads(NonZeroUsize::new(3).unwrap())
            .build()
            .unwrap();

        let a = run_pd_trials(&ds, "x1", &serial, &trial_config, &ExactMatchTrainer).unwrap();
        let b = run_pd_trials(&ds, "x1", &parallel, &trial_config, &ExactMatchTrainer).unwrap();
        assert_eq!(a.pdpx, b.pdpx);
        assert_eq!(a.pdpy, b.pdpy);
        assert_eq!(a.support, b.support);

        let other_seed = TrialConfig::builder().n_trials(5).seed(10).build().unwrap();
        let c = run_pd_trials(&ds, "x1", &serial, &other_seed, &ExactMatchTrainer).unwrap();
        assert_ne!(a.pdpy, c.pdpy);
    }

    #[test]
    fn one_fit_per_trial() {
        let ds = synthetic_additive(300, 85, 0.0);
        let trainer = CountingTrainer::default();
        run_pd_trials(&ds, "x1", &config(), &full_subsample(3), &trainer).unwrap();
        assert_eq!(trainer.fits(), 3);
    }

    #[test]
    fn failing_trial_fails_the_run() {
        let ds = synthetic_additive(400, 86, 0.0);
        let strict = StratConfig::builder().min_evidence(21).build().unwrap();
        let err = run_pd_trials(&ds, "x1", &strict, &full_subsample(2), &ExactMatchTrainer).unwrap_err();
        assert!(matches!(err, StratError::EmptyCurve { .. }));
    }
}

mod categorical {
    use super::*;

    #[test]
    fn full_subsamples_recover_effects() {
        let ds = synthetic_additive(400, 91, 0.0);
        let trials = run_cat_pd_trials(&ds, "state", &config(), &full_subsample(3), &ExactMatchTrainer).unwrap();

        let expected: Vec<Evidence> = STATE_EFFECTS.iter().map(|&v| Measured(v)).collect();
        assert_evidence_eq(&trials.values, &expected, 1e-9, "state");
        assert_eq!(trials.support, vec![3; 4]);
        assert_eq!(trials.uniq_categories, vec![0, 1, 2, 3]);
        assert_eq!(trials.merge_ignored, 0.0);
    }

    #[test]
    fn min_zero_alignment() {
        let ds = synthetic_additive(400, 92, 0.0);
        let trial_config = TrialConfig::builder()
            .n_trials(2)
            .resampling(Resampling::Subsample { fraction: 1.0 })
            .category_alignment(CategoryAlignment::MinZero)
            .build()
            .unwrap();
        let trials = run_cat_pd_trials(&ds, "state", &config(), &trial_config, &ExactMatchTrainer).unwrap();

        let expected: Vec<Evidence> = STATE_EFFECTS.iter().map(|&v| Measured(v + 3.0)).collect();
        assert_evidence_eq(&trials.values, &expected, 1e-9, "min zero");
    }

    #[test]
    fn single_trial_matches_direct_call() {
        let ds = synthetic_additive(400, 93, 0.4);
        let direct = compute_cat_pd(&ds, "state", &config(), &ExactMatchTrainer).unwrap();
        let trials =
            run_cat_pd_trials(&ds, "state", &config(), &TrialConfig::default(), &ExactMatchTrainer).unwrap();
        assert_evidence_eq(&trials.values, direct.vector.values(), 1e-12, "single trial");
    }

    #[test]
    fn vectors_line_up_across_bootstraps() {
        let ds = synthetic_additive(220, 94, 0.3);
        let trial_config = TrialConfig::builder()
            .n_trials(8)
            .category_alignment(CategoryAlignment::LeftmostZero)
            .build()
            .unwrap();
        let trials = run_cat_pd_trials(&ds, "state", &config(), &trial_config, &GridTrainer::default()).unwrap();

        assert!(trials.trials.iter().all(|pd| pd.vector.len() == 4));
        assert_eq!(trials.values.len(), 4);
        assert!(trials.support.iter().all(|&s| s <= 8));
    }

    #[test]
    fn invalid_codes_rejected_before_any_trial() {
        let ds = synthetic_additive(200, 95, 0.0);
        let capped = StratConfig::builder().max_catcode(1).build().unwrap();
        let trainer = CountingTrainer::default();
        let err = run_cat_pd_trials(&ds, "state", &capped, &full_subsample(3), &trainer).unwrap_err();
        assert!(matches!(err, StratError::CategoryOutOfRange { code: 3, .. }));
        assert_eq!(trainer.fits(), 0);
    }
}

#[test]
fn trial_config_validation() {
    assert_eq!(
        TrialConfig::builder().n_trials(0).build().unwrap_err(),
        ConfigError::InvalidNTrials
    );
    assert_eq!(
        TrialConfig::builder()
            .resampling(Resampling::Subsample { fraction: 1.5 })
            .build()
            .unwrap_err(),
        ConfigError::InvalidFraction(1.5)
    );
}

#[test]
fn unvalidated_trial_config_rejected() {
    let ds = synthetic_additive(100, 98, 0.0);
    let zero = TrialConfig {
        n_trials: 0,
        ..TrialConfig::default()
    };
    let trainer = CountingTrainer::default();

    let err = run_pd_trials(&ds, "x1", &config(), &zero, &trainer).unwrap_err();
    assert_eq!(err, StratError::Config(ConfigError::InvalidNTrials));
    let err = run_cat_pd_trials(&ds, "state", &config(), &zero, &trainer).unwrap_err();
    assert_eq!(err, StratError::Config(ConfigError::InvalidNTrials));

    let bad_fraction = TrialConfig {
        n_trials: 2,
        resampling: Resampling::Subsample { fraction: 0.0 },
        ..TrialConfig::default()
    };
    let err = run_pd_trials(&ds, "x1", &config(), &bad_fraction, &trainer).unwrap_err();
    assert_eq!(err, StratError::Config(ConfigError::InvalidFraction(0.0)));
    assert_eq!(trainer.fits(), 0);
}

#[test]
fn unknown_column() {
    let ds = synthetic_additive(50, 99, 0.0);
    let err = run_pd_trials(&ds, "zz", &config(), &TrialConfig::default(), &ExactMatchTrainer).unwrap_err();
    assert_eq!(err, StratError::UnknownColumn("zz".into()));
}
