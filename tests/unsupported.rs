use serde_json::Value;
use skills_rs::{ErrorKind, Skill, SkillError, UnsupportedKind, function, registered};

#[function]
/// Echo an arbitrary payload.
fn echo(label: String, payload: Value) -> Value {
    serde_json::json!({ "label": label, "payload": payload })
}

#[test]
fn test_untyped_parameter_fails_registration() {
    let err = registered("echo").unwrap_err();
    let SkillError::UnsupportedType(err) = err else {
        panic!("expected an unsupported type error, got {err:?}");
    };
    assert_eq!(err.parameter.as_deref(), Some("payload"));
    assert_eq!(err.kind, UnsupportedKind::Untyped);
}

#[test]
fn test_collect_aborts_on_build_errors() {
    let err = Skill::collect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
}
