use super::*;
use proptest::prelude::*;

fn train(epoch: usize) -> HistoryKey {
    HistoryKey::new(Phase::Train, epoch)
}

#[test]
fn test_extend_keeps_insertion_order_at_both_levels() {
    let mut history = History::new();
    history.extend(train(1), "b", &[1.0]);
    history.extend(train(0), "a", &[2.0]);
    history.extend(train(1), "a", &[3.0]);
    history.extend(train(1), "b", &[4.0, 5.0]);

    assert_eq!(history.keys().collect::<Vec<_>>(), vec![train(1), train(0)]);
    let entry = history.entry(Phase::Train, 1).expect("entry");
    assert_eq!(entry.names().collect::<Vec<_>>(), vec!["b", "a"]);
    assert_eq!(history.get(Phase::Train, 1, "b"), Some(&[1.0, 4.0, 5.0][..]));
    assert_eq!(history.get(Phase::Val, 1, "b"), None);
}

#[test]
fn test_merged_puts_own_series_first() {
    let mut losses = History::new();
    losses.extend(HistoryKey::new(Phase::Val, 0), "L1Loss", &[1.0]);
    let mut metrics = History::new();
    metrics.push(HistoryKey::new(Phase::Val, 0), "mae", 0.5);
    metrics.push(HistoryKey::new(Phase::Val, 1), "mae", 0.4);

    let merged = losses.merged(&metrics);
    assert_eq!(merged.len(), 2);
    let names: Vec<&str> = merged.entry(Phase::Val, 0).expect("entry").names().collect();
    assert_eq!(names, vec!["L1Loss", "mae"]);
    assert!(merged.contains_name("mae"));
    assert!(!losses.contains_name("mae"));
}

#[test]
fn test_serializes_phase_in_upper_case() {
    let mut history = History::new();
    history.push(HistoryKey::new(Phase::Val, 2), "mae", 0.25);
    let json = serde_json::to_value(&history).expect("json");
    assert_eq!(
        json,
        serde_json::json!({
            "entries": [{"phase": "VAL", "epoch": 2, "series": [{"name": "mae", "values": [0.25]}]}]
        })
    );
}

fn arb_events() -> impl Strategy<Value = Vec<(usize, u8, Vec<f32>)>> {
    prop::collection::vec(
        (0usize..3, 0u8..3, prop::collection::vec(-10.0f32..10.0, 1..4)),
        0..20,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_replaying_events_doubles_every_series(events in arb_events()) {
        let mut once = History::new();
        let mut twice = History::new();
        for round in 0..2 {
            for (epoch, name, values) in &events {
                let name = format!("c{}", name);
                if round == 0 {
                    once.extend(train(*epoch), &name, values);
                }
                twice.extend(train(*epoch), &name, values);
            }
        }
        prop_assert_eq!(once.keys().collect::<Vec<_>>(), twice.keys().collect::<Vec<_>>());
        for entry in once.entries() {
            for series in &entry.series {
                let doubled = twice.get(entry.key.phase, entry.key.epoch, &series.name).unwrap_or(&[]);
                prop_assert_eq!(doubled.len(), 2 * series.values.len());
                prop_assert_eq!(&doubled[..series.values.len()], series.values.as_slice());
            }
        }
    }
}
