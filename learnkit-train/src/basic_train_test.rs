use super::*;
use crate::callbacks::{Callback, CallbackState};
use approx::assert_relative_eq;
use learnkit_core::utils::testing::{labeled_batch, EventLog, MockLoss, MockModel, MockOptimizer, MockTensor};
use learnkit_core::{LayerGroups, OptimWrapper};
use learnkit_data::InMemoryBatches;

#[derive(Debug)]
struct EventProbe {
    log: EventLog,
    replace_loss: Option<f32>,
}

impl Callback<MockTensor> for EventProbe {
    fn on_loss_begin(&mut self, output: MockTensor, _state: &CallbackState) -> Result<MockTensor, LearnError> {
        self.log.push("cb:loss_begin");
        Ok(output)
    }

    fn on_backward_begin(&mut self, loss: MockTensor, _state: &CallbackState) -> Result<MockTensor, LearnError> {
        self.log.push("cb:backward_begin");
        Ok(match self.replace_loss {
            Some(v) => MockTensor::scalar(v).requiring_grad(true),
            None => loss,
        })
    }

    fn on_backward_end(&mut self, _state: &CallbackState) -> Result<(), LearnError> {
        self.log.push("cb:backward_end");
        Ok(())
    }

    fn on_step_end(&mut self, _state: &CallbackState) -> Result<(), LearnError> {
        self.log.push("cb:step_end");
        Ok(())
    }
}

fn shared_opt(model: &MockModel, log: Option<EventLog>) -> SharedOptimizer {
    use learnkit_core::Model;
    let groups = LayerGroups::single(model.layers());
    OptimWrapper::create(&MockOptimizer::factory(log), &[0.1], &groups, &[0.0], true, true)
        .expect("create")
        .into_shared()
}

#[test]
fn test_loss_batch_event_order_with_optimizer() {
    let log = EventLog::new();
    let model = MockModel::with_layers(2).with_log(log.clone());
    let opt = shared_opt(&model, Some(log.clone()));
    let mut probe = EventProbe {
        log: log.clone(),
        replace_loss: None,
    };
    let cbs: Vec<&mut dyn Callback<MockTensor>> = vec![&mut probe];
    let mut handler = CallbackHandler::new(cbs, Vec::new());
    let mut loss = MockLoss::new();

    let batch = handler.on_batch_begin(labeled_batch(2.0, 4), true).expect("batch begin");
    let out = loss_batch(&model, &batch, Some(&mut loss), Some(&opt), &mut handler).expect("loss batch");

    assert_relative_eq!(out.loss_value().expect("loss"), 2.0);
    assert_eq!(
        log.entries(),
        vec![
            "forward",
            "cb:loss_begin",
            "cb:backward_begin",
            "backward",
            "cb:backward_end",
            "step",
            "cb:step_end",
            "zero_grad"
        ]
    );
    match out {
        BatchOutput::Loss(t) => assert!(!t.requires_grad()),
        other => panic!("unexpected output {:?}", other),
    }
    assert_eq!(handler.state().last_components.len(), 1);
    assert_eq!(handler.state().last_components[0].per_sample, vec![2.0; 4]);
}

#[test]
fn test_loss_batch_returns_loss_transformed_by_callbacks() {
    let model = MockModel::with_layers(1);
    let opt = shared_opt(&model, None);
    let mut probe = EventProbe {
        log: EventLog::new(),
        replace_loss: Some(10.0),
    };
    let cbs: Vec<&mut dyn Callback<MockTensor>> = vec![&mut probe];
    let mut handler = CallbackHandler::new(cbs, Vec::new());
    let mut loss = MockLoss::new();
    let batch = handler.on_batch_begin(labeled_batch(2.0, 4), true).expect("batch begin");
    let out = loss_batch(&model, &batch, Some(&mut loss), Some(&opt), &mut handler).expect("loss batch");
    assert_relative_eq!(out.loss_value().expect("loss"), 10.0);
}

#[test]
fn test_loss_batch_without_optimizer_skips_backward() {
    let log = EventLog::new();
    let model = MockModel::with_layers(1).with_log(log.clone());
    let mut handler = CallbackHandler::empty();
    let mut loss = MockLoss::new();
    let batch = labeled_batch(3.0, 2);
    let out = loss_batch(&model, &batch, Some(&mut loss), None, &mut handler).expect("loss batch");
    assert_relative_eq!(out.loss_value().expect("loss"), 3.0);
    assert_eq!(log.entries(), vec!["forward"]);
}

#[test]
fn test_loss_batch_without_loss_function_returns_prediction() {
    let model = MockModel::with_layers(1).scale(2.0);
    let mut handler = CallbackHandler::empty();
    let out = loss_batch(&model, &labeled_batch(1.5, 3), None, None, &mut handler).expect("loss batch");
    assert!(out.loss_value().is_err());
    match out {
        BatchOutput::Prediction { output, target } => {
            assert_eq!(output.data(), &[3.0, 3.0, 3.0]);
            assert!(!output.requires_grad());
            assert_eq!(target.map(|t| t.data().to_vec()), Some(vec![0.0, 0.0, 0.0]));
        }
        other => panic!("unexpected output {:?}", other),
    }
}

#[test]
fn test_validate_is_size_weighted_mean() {
    let mut model = MockModel::with_layers(1);
    let dl = InMemoryBatches::new(vec![labeled_batch(2.0, 4), labeled_batch(1.0, 6)]);
    let mut loss = MockLoss::new();
    let mut handler = CallbackHandler::empty();
    let val = validate(&mut model, &dl, &mut loss, &mut handler, None).expect("validate");
    assert_relative_eq!(val.unwrap_or(f32::NAN), 1.4, epsilon = 1e-6);
    assert!(!model.is_training());
    assert!(model.grad_enabled());

    let raw = validate_batches(&mut model, &dl, &mut loss, &mut handler, None).expect("validate");
    assert_eq!(raw, vec![(2.0, 4), (1.0, 6)]);
}

#[test]
fn test_validate_respects_n_batch() {
    let mut model = MockModel::with_layers(1);
    let dl = InMemoryBatches::new(vec![labeled_batch(2.0, 4), labeled_batch(1.0, 6), labeled_batch(9.0, 1)]);
    let mut loss = MockLoss::new();
    let mut handler = CallbackHandler::empty();
    let raw = validate_batches(&mut model, &dl, &mut loss, &mut handler, Some(2)).expect("validate");
    assert_eq!(raw.len(), 2);
}

#[test]
fn test_validate_empty_source_is_none() {
    let mut model = MockModel::with_layers(1);
    let dl: InMemoryBatches<MockTensor> = InMemoryBatches::new(Vec::new());
    let mut loss = MockLoss::new();
    let mut handler = CallbackHandler::empty();
    assert_eq!(validate(&mut model, &dl, &mut loss, &mut handler, None), Ok(None));
}

#[test]
fn test_validate_restores_grad_on_error() {
    let mut model = MockModel::with_layers(1).fail_after(1);
    let dl = InMemoryBatches::new(vec![labeled_batch(2.0, 4), labeled_batch(1.0, 6)]);
    let mut loss = MockLoss::new();
    let mut handler = CallbackHandler::empty();
    let err = validate(&mut model, &dl, &mut loss, &mut handler, None).unwrap_err();
    assert!(matches!(err, LearnError::Engine(_)));
    assert!(model.grad_enabled());
}

#[test]
fn test_weighted_mean_ignores_empty_batches() {
    assert_eq!(weighted_mean(&[]), None);
    assert_eq!(weighted_mean(&[(5.0, 0)]), None);
    assert_eq!(weighted_mean(&[(5.0, 0), (2.0, 2)]), Some(2.0));
}
