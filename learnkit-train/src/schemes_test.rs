use super::*;
use crate::callbacks::{Callback, CallbackState};
use crate::learner::{CallbackFn, FitContext};
use approx::assert_relative_eq;
use learnkit_core::optim::read_optimizer;
use learnkit_core::utils::testing::{labeled_batch, MockLoss, MockModel, MockOptimizer, MockTensor};
use learnkit_core::{Batch, SharedOptimizer};
use learnkit_data::DataBunch;
use std::sync::{Arc, Mutex};

fn learner(n_layers: usize) -> Learner<MockTensor> {
    let data = DataBunch::from_batches(
        vec![labeled_batch(2.0, 4), labeled_batch(1.0, 6)],
        Some(vec![labeled_batch(1.0, 2)]),
    );
    Learner::new(
        data,
        Box::new(MockModel::with_layers(n_layers)),
        Box::new(MockLoss::new()),
        MockOptimizer::factory(None),
    )
}

/// Copies every group's learning rate at the first training batch.
struct StartingLrs {
    opt: SharedOptimizer,
    seen: Arc<Mutex<Vec<f32>>>,
}

impl Callback<MockTensor> for StartingLrs {
    fn on_batch_begin(
        &mut self,
        batch: Batch<MockTensor>,
        state: &CallbackState,
    ) -> Result<Batch<MockTensor>, LearnError> {
        let mut seen = self.seen.lock().map_err(|e| LearnError::lock("seen", e))?;
        if state.train && seen.is_empty() {
            seen.extend_from_slice(read_optimizer(&self.opt)?.lrs());
        }
        Ok(batch)
    }
}

fn starting_lrs(seen: &Arc<Mutex<Vec<f32>>>) -> CallbackFn<MockTensor> {
    let seen = seen.clone();
    Arc::new(move |ctx: &FitContext| {
        Ok(Box::new(StartingLrs {
            opt: ctx.opt.clone(),
            seen: seen.clone(),
        }) as Box<dyn Callback<MockTensor>>)
    })
}

fn all_trainable(learner: &Learner<MockTensor>) -> bool {
    learner
        .layer_group_summary()
        .expect("summary")
        .iter()
        .all(|row| row.trainable)
}

#[test]
fn test_discriminative_lrs() {
    let lrs = discriminative_lrs(0.3, 3);
    assert_relative_eq!(lrs[0], 0.03, max_relative = 1e-5);
    assert_relative_eq!(lrs[1], 0.1, max_relative = 1e-5);
    assert_relative_eq!(lrs[2], 0.3);
    assert_eq!(discriminative_lrs(0.3, 1), vec![0.3]);
    assert_eq!(discriminative_lrs(0.3, 4).len(), 4);
    assert_relative_eq!(discriminative_lrs(0.3, 4)[0], 0.03, max_relative = 1e-5);
    assert!(discriminative_lrs(0.3, 0).is_empty());
}

#[test]
fn test_three_tier_layer_groups() {
    let mut learn = learner(6);
    three_tier_layer_groups(&mut learn, 2, 3).expect("split");
    let groups: Vec<usize> = learn
        .layer_group_summary()
        .expect("summary")
        .iter()
        .map(|row| row.group)
        .collect();
    assert_eq!(groups, vec![0, 0, 1, 1, 1, 2]);
    assert!(matches!(
        three_tier_layer_groups(&mut learn, 4, 3),
        Err(LearnError::LayerPartition(_))
    ));
}

#[test]
fn test_one_cycle_unfreezes_first() {
    let mut learn = learner(4);
    three_tier_layer_groups(&mut learn, 1, 2).expect("split");
    learn.freeze().expect("freeze");
    let outcome = one_cycle(&mut learn, 0.01, 1, 10.0).expect("fit");
    assert_eq!(outcome.epochs_completed, 1);
    assert!(all_trainable(&learn));
    assert_relative_eq!(learn.recorder().base().lrs[0], 0.001, max_relative = 1e-5);
}

#[test]
fn test_discriminative_one_cycle_peaks_per_group() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut learn = learner(3).with_callback_fn(starting_lrs(&seen));
    three_tier_layer_groups(&mut learn, 1, 1).expect("split");
    discriminative_one_cycle(&mut learn, 0.4, 1, 4.0).expect("fit");

    // the recorder follows the last group
    assert_relative_eq!(learn.recorder().base().lrs[0], 0.1 / 25.0, max_relative = 1e-5);
    let starts = seen.lock().expect("seen").clone();
    let expected: Vec<f32> = discriminative_lrs(0.1, 3).iter().map(|lr| lr / 25.0).collect();
    assert_eq!(starts.len(), 3);
    for (start, want) in starts.iter().zip(&expected) {
        assert_relative_eq!(*start, *want, max_relative = 1e-5);
    }
}

#[test]
fn test_lr_warmup_starts_near_zero() {
    let mut learn = learner(2);
    lr_warmup(&mut learn, 4, None, 1e-3).expect("fit");
    assert_relative_eq!(learn.recorder().base().lrs[0], WARMUP_START_LR, max_relative = 1e-3);
}

#[test]
fn test_lr_warmup_must_be_shorter_than_the_run() {
    let mut learn = learner(2);
    assert!(matches!(
        lr_warmup(&mut learn, 1, None, 1e-3),
        Err(LearnError::PreconditionViolation(_))
    ));
    assert!(matches!(
        lr_warmup(&mut learn, 5, Some(5), 1e-3),
        Err(LearnError::PreconditionViolation(_))
    ));
    assert!(learn.opt().is_none());
}

#[test]
fn test_gradual_unfreeze_runs_every_stage() {
    let mut learn = learner(3);
    three_tier_layer_groups(&mut learn, 1, 1).expect("split");
    let outcomes = gradual_unfreeze(&mut learn, 0.02).expect("fit");
    let epochs: Vec<usize> = outcomes.iter().map(|o| o.epochs_completed).collect();
    assert_eq!(epochs, vec![1, 2, 2, 2, 2, 4, 4, 8]);
    assert!(all_trainable(&learn));
}
