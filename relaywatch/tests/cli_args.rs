//! CLI arg parsing tests for relaywatch
use assert_cmd::Command;

fn run(args: &[&str]) -> (bool, String) {
    let td = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("relaywatch")
        .unwrap()
        .env("XDG_CONFIG_HOME", td.path())
        .args(args)
        .output()
        .expect("run relaywatch");
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output.status.success(), text)
}

#[test]
fn test_help_mentions_short_and_long_flags() {
    let (ok, text) = run(&["--help"]);
    assert!(ok);
    for flag in ["--tls-ca", "-t", "--profile", "-P", "--password", "-p", "--interval", "--config", "--log", "--dry-run"] {
        assert!(text.contains(flag), "help text missing {flag}\n{text}");
    }
}

#[test]
fn test_flags_accepted_before_help() {
    for args in [
        &["--tls-ca", "/tmp/cert.pem", "--help"][..],
        &["-t", "/tmp/cert.pem", "--help"],
        &["--profile", "dev", "--help"],
        &["-i", "500", "--help"],
    ] {
        let (ok, text) = run(args);
        assert!(ok, "{args:?} did not succeed");
        assert!(text.contains("Usage:"), "{args:?}: {text}");
    }
}

#[test]
fn test_dry_run_prints_resolved_endpoint() {
    let (ok, text) = run(&["--dry-run", "http://relay.local:2333"]);
    assert!(ok, "{text}");
    assert!(text.contains("poll http://relay.local:2333/stats"), "{text}");

    let (ok, text) = run(&["--dry-run", "wss://relay.local/ws"]);
    assert!(ok, "{text}");
    assert!(text.contains("stream wss://relay.local/ws"), "{text}");
}

#[test]
fn test_config_file_is_used_without_url() {
    let td = tempfile::tempdir().unwrap();
    let path = td.path().join("feed.json");
    std::fs::write(&path, r#"{ "endpoint": "http://10.0.0.5:2333/v4/stats" }"#).unwrap();
    let (ok, text) = run(&["--dry-run", "--config", path.to_str().unwrap()]);
    assert!(ok, "{text}");
    assert!(text.contains("poll http://10.0.0.5:2333/v4/stats"), "{text}");
}

#[test]
fn test_invalid_url_fails() {
    let (ok, text) = run(&["--dry-run", "ftp://relay.local"]);
    assert!(!ok, "unsupported scheme accepted: {text}");
}
