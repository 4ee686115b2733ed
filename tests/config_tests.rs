// Tests for config loading and store construction.

use callsheet::{Config, RecordStore};

fn write_config(dir: &std::path::Path, body: &str) -> String {
    let path = dir.join("callsheet.toml");
    std::fs::write(&path, body).unwrap();
    dir.join("callsheet").to_str().unwrap().to_string()
}

#[tokio::test]
async fn memory_backend_loads_records_from_fixture() {
    let dir = tempfile::tempdir().unwrap();

    let fixture = dir.path().join("records.json");
    std::fs::write(
        &fixture,
        r#"[
            {
                "row": "2",
                "url": "https://example.com/in/ada",
                "company": "Analytical Engines Ltd",
                "connected_on": "2026-01-12",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "recording": ""
            }
        ]"#,
    )
    .unwrap();

    let path = write_config(
        dir.path(),
        &format!(
            r#"
[service]
name = "callsheet"

[service.http]
bind = "127.0.0.1"
port = 8080

[store]
backend = "memory"
fixture_path = "{}"

[transcription]
"#,
            fixture.display()
        ),
    );

    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.service.name, "callsheet");
    assert_eq!(cfg.service.http.port, 8080);
    assert_eq!(cfg.transcription.api_key_env, "OPENAI_API_KEY");

    let store = cfg.store.build().unwrap();
    let first = store.first_unprocessed().await.unwrap().unwrap();
    assert_eq!(first.first_name, "Ada");
    assert!(!first.is_processed());
}

#[test]
fn non_numeric_fixture_row_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();

    let fixture = dir.path().join("records.json");
    std::fs::write(
        &fixture,
        r#"[
            {
                "row": "row-A",
                "url": "https://example.com/in/ada",
                "company": "",
                "connected_on": "",
                "first_name": "Ada",
                "last_name": "",
                "recording": ""
            }
        ]"#,
    )
    .unwrap();

    let path = write_config(
        dir.path(),
        &format!(
            r#"
[service]
name = "callsheet"

[service.http]
bind = "127.0.0.1"
port = 8080

[store]
backend = "memory"
fixture_path = "{}"

[transcription]
"#,
            fixture.display()
        ),
    );

    let cfg = Config::load(&path).unwrap();
    let err = cfg.store.build().unwrap_err();
    assert!(format!("{:#}", err).contains("not numeric"));
}

#[test]
fn sheets_backend_requires_sheets_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[service]
name = "callsheet"

[service.http]
bind = "127.0.0.1"
port = 8080

[store]
backend = "sheets"

[transcription]
"#,
    );

    let cfg = Config::load(&path).unwrap();
    let err = cfg.store.build().unwrap_err();
    assert!(err.to_string().contains("store.sheets"));
}

#[test]
fn missing_fixture_path_yields_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[service]
name = "callsheet"

[service.http]
bind = "0.0.0.0"
port = 9000

[store]
backend = "memory"

[transcription]
api_key_env = "MY_KEY"
"#,
    );

    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.transcription.api_key_env, "MY_KEY");
    cfg.store.build().unwrap();
}
