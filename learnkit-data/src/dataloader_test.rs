use super::*;
use crate::datasets::VecDataset;
use crate::samplers::{RandomSampler, SequentialSampler};
use learnkit_core::utils::testing::MockTensor;
use proptest::prelude::*;

fn collate() -> CollateFn<f32, MockTensor> {
    Box::new(|samples: Vec<f32>| {
        let n = samples.len();
        Ok(Batch::from_pair(
            MockTensor::new(samples, vec![n]),
            MockTensor::filled(0.0, n),
        ))
    })
}

fn inputs(loader: &impl BatchSource<MockTensor>) -> Vec<Vec<f32>> {
    loader
        .batches()
        .map(|b| b.expect("batch").inputs[0].data().to_vec())
        .collect()
}

#[test]
fn test_dataloader_sequential() {
    let dataset = VecDataset::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let loader = DataLoader::new(dataset, 2, SequentialSampler::new(), false, collate()).expect("loader");
    assert_eq!(loader.len(), 3);
    assert_eq!(
        inputs(&loader),
        vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]
    );
}

#[test]
fn test_dataloader_keeps_incomplete_last_batch() {
    let dataset = VecDataset::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let loader = DataLoader::new(dataset, 2, SequentialSampler::new(), false, collate()).expect("loader");
    assert_eq!(loader.len(), 3);
    assert_eq!(inputs(&loader).last(), Some(&vec![5.0]));
}

#[test]
fn test_dataloader_drop_last() {
    let dataset = VecDataset::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let loader = DataLoader::new(dataset, 2, SequentialSampler::new(), true, collate()).expect("loader");
    assert_eq!(loader.len(), 2);
    assert_eq!(inputs(&loader), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
}

#[test]
fn test_dataloader_is_restartable() {
    let dataset = VecDataset::new(vec![1.0, 2.0, 3.0]);
    let loader = DataLoader::new(dataset, 2, SequentialSampler::new(), false, collate()).expect("loader");
    assert_eq!(inputs(&loader), inputs(&loader));
}

#[test]
fn test_dataloader_rejects_zero_batch_size() {
    let dataset = VecDataset::new(vec![1.0]);
    let err = DataLoader::new(dataset, 0, SequentialSampler::new(), false, collate()).unwrap_err();
    assert!(matches!(err, LearnError::PreconditionViolation(_)));
}

#[test]
fn test_collate_errors_are_yielded() {
    let dataset = VecDataset::new(vec![1.0, 2.0]);
    let failing: CollateFn<f32, MockTensor> =
        Box::new(|_| Err(LearnError::Data("cannot stack".to_string())));
    let loader = DataLoader::new(dataset, 1, SequentialSampler::new(), false, failing).expect("loader");
    assert!(loader.batches().all(|b| b.is_err()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_shuffled_pass_visits_every_sample_once(len in 1usize..60, batch_size in 1usize..9, seed in any::<u64>()) {
        let data: Vec<f32> = (0..len).map(|i| i as f32).collect();
        let loader = DataLoader::new(
            VecDataset::new(data),
            batch_size,
            RandomSampler::new(false, None).with_seed(seed),
            false,
            collate(),
        ).expect("loader");
        let batches = inputs(&loader);
        prop_assert_eq!(batches.len(), loader.len());
        let mut seen: Vec<f32> = batches.into_iter().flatten().collect();
        seen.sort_by(|a, b| a.total_cmp(b));
        let expected: Vec<f32> = (0..len).map(|i| i as f32).collect();
        prop_assert_eq!(seen, expected);
    }
}
