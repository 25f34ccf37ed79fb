use learnkit_core::utils::testing::{labeled_batch, unlabeled_batch, MockTensor};
use learnkit_core::Device;
use learnkit_data::{BatchSource, DataBunch, InMemoryBatches};

#[test]
fn test_from_batches_sets_train_and_valid() {
    let bunch = DataBunch::from_batches(
        vec![labeled_batch(1.0, 4), labeled_batch(2.0, 4)],
        Some(vec![labeled_batch(3.0, 2)]),
    );
    assert_eq!(bunch.train_dl().len(), 2);
    assert_eq!(bunch.valid_dl().map(|dl| dl.len()), Some(1));
    assert!(bunch.test_dl().is_none());
    assert_eq!(bunch.device, Device::Cpu);
}

#[test]
fn test_builder_adds_test_source_and_device() {
    let bunch: DataBunch<MockTensor> = DataBunch::from_batches(vec![labeled_batch(1.0, 4)], None)
        .with_test(Box::new(InMemoryBatches::new(vec![unlabeled_batch(1.0, 3)])))
        .with_device(Device::Gpu(1));
    assert!(bunch.valid_dl().is_none());
    let test_sizes: Vec<usize> = bunch
        .test_dl()
        .map(|dl| dl.batches().map(|b| b.map(|b| b.size()).unwrap_or(0)).collect())
        .unwrap_or_default();
    assert_eq!(test_sizes, vec![3]);
    assert_eq!(bunch.device.to_string(), "gpu:1");
    assert!(format!("{:?}", bunch).contains("test_batches: Some(1)"));
}
