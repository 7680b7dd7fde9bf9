use kvsession::SessionConfig;

mod state;

#[test]
fn all_fields_have_a_default_value() {
    assert!(serde_json::from_str::<SessionConfig>("{}").is_ok());
}

#[test]
fn the_key_prefix_can_be_changed() {
    let config: SessionConfig = serde_json::from_str(r#"{ "prefix": "app:sess:" }"#).unwrap();
    assert_eq!(config.prefix, "app:sess:");
}
