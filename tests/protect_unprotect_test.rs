use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use predicates::prelude::*;

/// Run data-protector inside `dir`, isolated from the caller's
/// environment and user-level configuration.
fn data_protector(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("data-protector");
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"))
        .env_remove("DP_CONFIG")
        .env_remove("DP_KEY_LOCATION")
        .env_remove("DP_APPLICATION_NAME")
        .env_remove("DP_KEY_ENCRYPTION_KEY")
        .env_remove("RUST_LOG");
    cmd
}

/// Protect `plaintext` silently and return the payload.
fn protect(dir: &TempDir, namespace: &str, plaintext: &str, extra: &[&str]) -> String {
    let output = data_protector(dir)
        .args(["E", namespace, plaintext, "true"])
        .args(extra)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).unwrap().trim().to_string()
}

fn record_field(dir: &TempDir, file: &str, field: &str) -> String {
    let content = std::fs::read_to_string(dir.path().join(file)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();
    json[field].as_str().unwrap().to_string()
}

#[test]
fn missing_arguments_print_usage() {
    let dir = TempDir::new().unwrap();

    data_protector(&dir)
        .args(["E", "billing"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_mode_is_rejected() {
    let dir = TempDir::new().unwrap();

    data_protector(&dir)
        .args(["X", "billing", "data", "true"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Unknown operation mode 'X'"));
}

#[test]
fn round_trip_across_processes() {
    let dir = TempDir::new().unwrap();
    let payload = protect(&dir, "billing", "4111-invoice-9", &["--key-location", "keys"]);
    assert!(!payload.is_empty());
    assert!(!payload.contains("4111-invoice-9"));

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true", "--key-location", "keys"])
        .assert()
        .success()
        .stdout("4111-invoice-9\n");

    dir.child("keys/key-0000000001.json")
        .assert(predicate::path::exists());
}

#[test]
fn other_namespace_recovers_nothing() {
    let dir = TempDir::new().unwrap();
    let payload = protect(&dir, "billing", "4111-invoice-9", &["--key-location", "keys"]);

    data_protector(&dir)
        .args(["D", "shipping", payload.as_str(), "true", "--key-location", "keys"])
        .assert()
        .success()
        .stdout("\n")
        .stderr(predicate::str::contains("no plaintext recovered"));
}

#[test]
fn unprotect_never_creates_keys() {
    let dir = TempDir::new().unwrap();
    let payload = protect(&dir, "billing", "4111-invoice-9", &["--key-location", "elsewhere"]);

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true", "--key-location", "keys"])
        .assert()
        .success()
        .stdout("\n");

    dir.child("keys/key-0000000001.json")
        .assert(predicate::path::missing());
}

#[test]
fn tampered_payload_recovers_nothing() {
    let dir = TempDir::new().unwrap();
    let payload = protect(&dir, "billing", "4111-invoice-9", &["--key-location", "keys"]);
    let mut tampered = payload.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    data_protector(&dir)
        .args(["D", "billing", tampered.as_str(), "true", "--key-location", "keys"])
        .assert()
        .success()
        .stdout("\n");
}

#[test]
fn banner_is_shown_unless_silenced() {
    let dir = TempDir::new().unwrap();

    data_protector(&dir)
        .args(["E", "billing", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome to Data-Protector!"));

    data_protector(&dir)
        .args(["E", "billing", "secret", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome").not());
}

#[test]
fn key_location_from_dp_json() {
    let dir = TempDir::new().unwrap();
    dir.child("dp.json")
        .write_str(r#"{ "DataProtectorConfig": { "KeyOutputLocation": "from-config" } }"#)
        .unwrap();

    let payload = protect(&dir, "billing", "4111-invoice-9", &[]);
    dir.child("from-config/key-0000000001.json")
        .assert(predicate::path::exists());

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true"])
        .assert()
        .success()
        .stdout("4111-invoice-9\n");
}

#[test]
fn explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();

    data_protector(&dir)
        .args(["E", "billing", "secret", "true", "--config", "missing.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn ephemeral_keys_do_not_survive_the_process() {
    let dir = TempDir::new().unwrap();
    let payload = protect(&dir, "billing", "4111-invoice-9", &[]);

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true"])
        .assert()
        .success()
        .stdout("\n");
}

#[test]
fn empty_plaintext_fails() {
    let dir = TempDir::new().unwrap();

    data_protector(&dir)
        .args(["E", "billing", "", "true", "--key-location", "keys"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("empty plaintext"));

    dir.child("keys").assert(predicate::path::missing());
}

#[test]
fn application_name_isolates_rings() {
    let dir = TempDir::new().unwrap();
    let payload = protect(
        &dir,
        "billing",
        "4111-invoice-9",
        &["--key-location", "keys", "--application", "erp"],
    );

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true", "--key-location", "keys"])
        .args(["--application", "crm"])
        .assert()
        .success()
        .stdout("\n");

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true", "--key-location", "keys"])
        .env("DP_APPLICATION_NAME", "erp")
        .assert()
        .success()
        .stdout("4111-invoice-9\n");
}

#[test]
fn rotated_keys_keep_old_payloads_readable() {
    let dir = TempDir::new().unwrap();
    let old = protect(&dir, "billing", "before rotation", &["--key-location", "keys"]);

    data_protector(&dir)
        .args(["keys", "rotate", "--key-location", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("generation 2"));

    assert_eq!(record_field(&dir, "keys/key-0000000001.json", "status"), "retired");
    assert_eq!(record_field(&dir, "keys/key-0000000002.json", "status"), "active");

    data_protector(&dir)
        .args(["D", "billing", old.as_str(), "true", "--key-location", "keys"])
        .assert()
        .success()
        .stdout("before rotation\n");
}

#[test]
fn revoked_key_stops_unprotecting() {
    let dir = TempDir::new().unwrap();
    let payload = protect(&dir, "billing", "4111-invoice-9", &["--key-location", "keys"]);
    let id = record_field(&dir, "keys/key-0000000001.json", "id");

    data_protector(&dir)
        .args(["keys", "revoke", id.as_str(), "--key-location", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Revoked key {id}")));

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true", "--key-location", "keys"])
        .assert()
        .success()
        .stdout("\n")
        .stderr(predicate::str::contains("revoked"));

    data_protector(&dir)
        .args(["keys", "list", "--key-location", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("revoked"));

    // The next protect replaces the revoked key.
    protect(&dir, "billing", "after revocation", &["--key-location", "keys"]);
    dir.child("keys/key-0000000002.json")
        .assert(predicate::path::exists());
}

#[test]
fn revoking_an_unknown_key_fails() {
    let dir = TempDir::new().unwrap();

    data_protector(&dir)
        .args(["keys", "revoke", "7d444840-9dc0-11d1-b245-5ffdce74fad2"])
        .args(["--key-location", "keys"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("was not found"));
}

#[test]
fn wrapped_keys_need_the_key_encryption_key() {
    let dir = TempDir::new().unwrap();
    let kek = STANDARD.encode([42u8; 32]);

    let output = data_protector(&dir)
        .args(["E", "billing", "4111-invoice-9", "true", "--key-location", "keys"])
        .env("DP_KEY_ENCRYPTION_KEY", &kek)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let payload = String::from_utf8(output).unwrap().trim().to_string();

    assert_eq!(
        record_field(&dir, "keys/key-0000000001.json", "wrapping"),
        "xchacha20poly1305"
    );

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true", "--key-location", "keys"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("key-encryption key"));

    data_protector(&dir)
        .args(["D", "billing", payload.as_str(), "true", "--key-location", "keys"])
        .env("DP_KEY_ENCRYPTION_KEY", &kek)
        .assert()
        .success()
        .stdout("4111-invoice-9\n");
}
