mod common;

use approx::assert_relative_eq;
use common::{learner, Probe};
use learnkit_core::utils::testing::{labeled_batch, EventLog, MeanAbsoluteError, MockLoss, MockModel};
use learnkit_core::{LearnError, Phase};
use learnkit_train::{EarlyStopping, FitOutcome, History, Lr, Termination};

fn lr() -> Option<Lr> {
    Some(Lr::Scalar(0.1))
}

#[test]
fn test_two_training_batches_without_validation() {
    let mut learn = learner(
        vec![labeled_batch(2.0, 4), labeled_batch(1.0, 6)],
        None,
        MockModel::with_layers(1),
        MockLoss::new().batch_means(),
    );
    let log = EventLog::new();
    learn
        .fit(1, lr(), None, vec![Box::new(Probe::new(log.clone()))])
        .expect("fit");

    assert_eq!(log.count("epoch_end:None"), 1);
    let recorder = learn.recorder();
    assert!(recorder.base().val_losses.is_empty());
    assert_eq!(
        recorder.loss_history().get(Phase::Train, 0, "L1Loss"),
        Some(&[2.0, 1.0][..])
    );
    assert!(recorder.metric_history().is_empty());
    assert_eq!(recorder.base().losses.len(), 2);
}

#[test]
fn test_per_sample_components_hold_one_value_per_sample() {
    let mut learn = learner(
        vec![labeled_batch(2.0, 4), labeled_batch(1.0, 6)],
        None,
        MockModel::with_layers(1),
        MockLoss::with_components(&[("focal", 1.0), ("l1", 0.5)]),
    );
    learn.fit(1, lr(), None, Vec::new()).expect("fit");
    let history = learn.recorder().loss_history();
    let focal = history.get(Phase::Train, 0, "focal").expect("focal");
    assert_eq!(focal.len(), 10);
    assert_eq!(&focal[..5], &[2.0, 2.0, 2.0, 2.0, 1.0]);
    assert_eq!(history.get(Phase::Train, 0, "l1").map(|v| v[0]), Some(1.0));
}

#[test]
fn test_validation_loss_is_size_weighted() {
    let mut learn = learner(
        vec![labeled_batch(1.0, 2)],
        Some(vec![labeled_batch(2.0, 4), labeled_batch(1.0, 6)]),
        MockModel::with_layers(1),
        MockLoss::new(),
    );
    learn.fit(1, lr(), None, Vec::new()).expect("fit");
    let val_losses = &learn.recorder().base().val_losses;
    assert_eq!(val_losses.len(), 1);
    assert_relative_eq!(val_losses[0], 1.4, epsilon = 1e-6);
}

#[test]
fn test_batch_stop_ends_the_epoch_but_validation_runs() {
    let mut learn = learner(
        vec![labeled_batch(1.0, 2), labeled_batch(1.0, 2), labeled_batch(1.0, 2)],
        Some(vec![labeled_batch(1.0, 2)]),
        MockModel::with_layers(1),
        MockLoss::new(),
    );
    let log = EventLog::new();
    let probe = Probe {
        stop_on_train_batch: Some(2),
        ..Probe::new(log.clone())
    };
    let outcome = learn.fit(2, lr(), None, vec![Box::new(probe)]).expect("fit");

    assert_eq!(
        outcome,
        FitOutcome {
            epochs_completed: 2,
            termination: Termination::Completed,
        }
    );
    assert_eq!(log.count("batch_end:train"), 4);
    assert_eq!(log.count("batch_end:valid"), 2);
    assert_eq!(learn.recorder().base().nb_batches, vec![2, 2]);
    assert_eq!(learn.recorder().base().val_losses.len(), 2);
}

#[test]
fn test_error_mid_fit_finalizes_once() {
    let mut learn = learner(
        vec![labeled_batch(1.0, 2), labeled_batch(1.0, 2)],
        Some(vec![labeled_batch(1.0, 2)]),
        MockModel::with_layers(1).fail_after(3),
        MockLoss::new(),
    );
    let log = EventLog::new();
    let err = learn
        .fit(3, lr(), None, vec![Box::new(Probe::new(log.clone()))])
        .unwrap_err();

    let expected = LearnError::Engine("forward failed on call 4".to_string());
    assert_eq!(err, expected);
    let ends: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("train_end"))
        .collect();
    assert_eq!(ends, vec![format!("train_end:{}", expected)]);
    assert_eq!(log.entries().last().map(String::as_str), Some(ends[0].as_str()));
    assert_eq!(log.count("epoch_end:Some(1.0)"), 1);
}

#[test]
fn test_stop_votes_are_or_aggregated_without_short_circuit() {
    let mut learn = learner(
        vec![labeled_batch(1.0, 2)],
        None,
        MockModel::with_layers(1),
        MockLoss::new(),
    );
    let first = EventLog::new();
    let second = EventLog::new();
    let stopper = Probe {
        stop_on_epoch: Some(0),
        ..Probe::new(first.clone())
    };
    let outcome = learn
        .fit(
            3,
            lr(),
            None,
            vec![Box::new(stopper), Box::new(Probe::new(second.clone()))],
        )
        .expect("fit");

    assert_eq!(outcome.termination, Termination::CallbackStop { epoch: 0 });
    assert_eq!(outcome.epochs_completed, 1);
    assert_eq!(first.count("epoch_end:None"), 1);
    assert_eq!(second.count("epoch_end:None"), 1);
    assert_eq!(second.count("train_end"), 1);
}

#[test]
fn test_early_stopping_on_flat_validation_loss() {
    let mut learn = learner(
        vec![labeled_batch(1.0, 2)],
        Some(vec![labeled_batch(1.0, 2)]),
        MockModel::with_layers(1),
        MockLoss::new(),
    );
    let outcome = learn
        .fit(5, lr(), None, vec![Box::new(EarlyStopping::new().patience(1))])
        .expect("fit");
    assert_eq!(outcome.termination, Termination::CallbackStop { epoch: 1 });
    assert_eq!(learn.recorder().base().val_losses.len(), 2);
}

#[test]
fn test_history_export_after_fit() {
    let mut learn = learner(
        vec![labeled_batch(2.0, 2)],
        Some(vec![labeled_batch(1.0, 2)]),
        MockModel::with_layers(1),
        MockLoss::new(),
    )
    .with_metric(Box::new(MeanAbsoluteError));
    learn.fit(2, lr(), None, Vec::new()).expect("fit");

    let recorder = learn.recorder();
    assert_eq!(recorder.metric_history().get(Phase::Val, 1, "mae"), Some(&[1.0][..]));
    assert_eq!(recorder.loss_history().get(Phase::Val, 0, "L1Loss"), Some(&[1.0, 1.0][..]));
    let json = recorder.history_json().expect("json");
    assert!(json.contains("\"VAL\""));
    let parsed: History = serde_json::from_str(&json).expect("parse");
    assert_eq!(parsed.len(), 4);
}
