use super::*;

#[test]
fn test_sequential_sampler_yields_in_order() {
    let sampler = SequentialSampler::new();
    assert_eq!(sampler.iter(4).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(sampler.len(4), 4);
}

#[test]
fn test_sequential_sampler_restarts() {
    let sampler = SequentialSampler::new();
    let first: Vec<usize> = sampler.iter(3).collect();
    let second: Vec<usize> = sampler.iter(3).collect();
    assert_eq!(first, second);
}

#[test]
fn test_sequential_sampler_stops_after_num_samples() {
    let sampler = SequentialSampler::new().with_num_samples(2);
    assert_eq!(sampler.iter(5).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(sampler.len(5), 2);
    // never past the end of the dataset
    assert_eq!(sampler.iter(1).collect::<Vec<_>>(), vec![0]);
    assert_eq!(sampler.len(0), 0);
}
