use assert_cmd::Command;

#[test]
fn help_lists_the_overrides() {
    let output = Command::cargo_bin("bookstore")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--config", "--bind", "--port"] {
        assert!(stdout.contains(flag), "missing {} in help:\n{}", flag, stdout);
    }
}

#[test]
fn unknown_environment_fails_before_connecting() {
    let config = tempfile::tempdir().unwrap();

    Command::cargo_bin("bookstore")
        .unwrap()
        .env("BOOKSTORE_ENV", "qa")
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure();
}
