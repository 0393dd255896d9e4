use cdt_core::errors::{CdtError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("kind", "(2,3)")
        .with_context("pass", "1")
}

#[test]
fn precondition_error_surface() {
    let err = CdtError::Precondition(sample_info("P001", "ratio before seeding"));
    assert_eq!(err.info().code, "P001");
    assert_eq!(err.family(), "precondition");
    assert!(err.info().context.contains_key("kind"));
}

#[test]
fn collaborator_error_surface() {
    let err = CdtError::Collaborator(sample_info("C001", "invalid triangulation"));
    assert_eq!(err.info().code, "C001");
    assert!(err.info().context.contains_key("pass"));
}

#[test]
fn numerical_error_surface() {
    let err = CdtError::Numerical(sample_info("N001", "exp underflow"));
    assert_eq!(err.info().code, "N001");
    assert_eq!(err.family(), "numerical");
}

#[test]
fn context_does_not_overwrite_inner_values() {
    let err = CdtError::Collaborator(sample_info("C002", "executor failed"))
        .with_context("pass", "99")
        .with_context("attempt", "4");
    assert_eq!(err.info().context["pass"], "1");
    assert_eq!(err.info().context["attempt"], "4");
}

#[test]
fn display_lists_context_and_hint() {
    let err = CdtError::Config(
        ErrorInfo::new("K001", "bad coupling")
            .with_context("coupling", "k")
            .with_hint("use a finite value"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("config error: bad coupling (code: K001)"));
    assert!(rendered.contains("coupling=k"));
    assert!(rendered.contains("hint: use a finite value"));
}

#[test]
fn errors_round_trip_through_json() {
    let err = CdtError::Cancelled(sample_info("X001", "stopped"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Cancelled\""));
    let restored: CdtError = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, err);
}
