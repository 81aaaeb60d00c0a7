use qg_errors::{ConfigError, Entry, PlannerError, PlannerErrorCode, ValidationError};

#[test]
fn config_error_wire_format() {
    let err = ConfigError::new(vec![Entry::new("DUPLICATE_API_NAME", "orders is used twice")]);
    let v = serde_json::to_value(&err).unwrap();
    assert_eq!(v["code"], "CONFIG_INVALID");
    assert_eq!(v["errors"][0]["code"], "DUPLICATE_API_NAME");
}

#[test]
fn validation_error_wire_format() {
    let err = ValidationError::new(
        Some("orders".into()),
        vec![Entry::new("UNKNOWN_COLUMN", "no such column")],
    );
    let v = serde_json::to_value(&err).unwrap();
    assert_eq!(v["code"], "VALIDATION_FAILED");
    assert_eq!(v["fromTable"], "orders");
    assert_eq!(v["errors"][0]["code"], "UNKNOWN_COLUMN");
}

#[test]
fn planner_error_wire_format() {
    let err = PlannerError::new(
        PlannerErrorCode::FreshnessUnmet {
            required_freshness: "seconds".into(),
            available_lag: "hours".into(),
        },
        None,
    );
    let v = serde_json::to_value(&err).unwrap();
    assert_eq!(v["code"], "FRESHNESS_UNMET");
    assert_eq!(v["details"]["requiredFreshness"], "seconds");
    assert_eq!(v["details"]["availableLag"], "hours");
}
