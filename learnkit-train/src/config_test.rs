use super::*;

#[test]
fn test_defaults() {
    let config = LearnerConfig::default();
    assert!(config.true_wd);
    assert!(config.bn_wd);
    assert!(config.train_bn);
    assert_eq!(config.wd, 1e-2);
    assert_eq!(config.default_lr, 3e-3);
    assert_eq!(config.model_dir, PathBuf::from("model"));
    assert_eq!(config.label_key, "label");
    assert_eq!(config.smooth_beta, 0.98);
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = LearnerConfig::from_json_str(r#"{"wd": 0.1, "train_bn": false}"#).expect("parse");
    assert_eq!(config, LearnerConfig::new().wd(0.1).train_bn(false));
}

#[test]
fn test_json_round_trip() {
    let config = LearnerConfig::new().label_key("y").model_dir("ckpt").bn_wd(false);
    let json = config.to_json_string().expect("serialize");
    assert_eq!(LearnerConfig::from_json_str(&json), Ok(config));
}

#[test]
fn test_invalid_json_is_a_serialization_error() {
    assert!(matches!(
        LearnerConfig::from_json_str("{\"wd\": "),
        Err(LearnError::Serialization(_))
    ));
    assert!(matches!(
        LearnerConfig::from_json_str(r#"{"smooth_beta": 1.0}"#),
        Err(LearnError::Serialization(_))
    ));
}
