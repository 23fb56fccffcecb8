use std::collections::HashMap;

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn missing_file_and_env_fall_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_with(&dir.path().join("absent.toml"), env_from(&[]));

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.debounce_wait(), Duration::from_millis(1500));
    assert!(settings.credentials().is_none());
}

#[test]
fn file_values_are_read_and_env_overrides_them() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("signup.toml");
    fs::write(
        &path,
        r#"
api_base = "http://file.example"
client_id = "42"
client_secret = "from-file"
debounce_ms = 250
progress_path = "state/progress.json"
"#,
    )
    .expect("write config");

    let from_file = load_settings_with(&path, env_from(&[]));
    assert_eq!(from_file.api_base, "http://file.example");
    assert_eq!(from_file.debounce_ms, 250);
    assert_eq!(from_file.progress_path, PathBuf::from("state/progress.json"));
    assert_eq!(
        from_file.credentials().map(|c| c.client_secret),
        Some("from-file".to_owned())
    );

    let overridden = load_settings_with(
        &path,
        env_from(&[
            ("SIGNUP_API_BASE", "http://bare.example"),
            ("APP__API_BASE", "http://app.example"),
            ("APP__DEBOUNCE_MS", "10"),
        ]),
    );
    assert_eq!(overridden.api_base, "http://app.example");
    assert_eq!(overridden.debounce_ms, 10);
}

#[test]
fn malformed_numbers_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("signup.toml");
    fs::write(&path, "debounce_ms = -5\n").expect("write config");

    let settings = load_settings_with(&path, env_from(&[("APP__DEBOUNCE_MS", "soon")]));
    assert_eq!(settings.debounce_ms, Settings::default().debounce_ms);
}
