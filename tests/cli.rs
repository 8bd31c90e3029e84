// Non-interactive command line paths.

use assert_cmd::Command;

#[test]
fn list_plans_prints_builtins() {
    Command::cargo_bin("bellwork")
        .unwrap()
        .arg("--list-plans")
        .assert()
        .success()
        .stdout("boxing-basic\nfull-body\ninterval-run\n");
}

#[test]
fn empty_history() {
    let home = tempfile::tempdir().unwrap();
    Command::cargo_bin("bellwork")
        .unwrap()
        .env("HOME", home.path())
        .arg("--history")
        .assert()
        .success()
        .stdout("no workouts recorded yet\n");
}

#[test]
fn refuses_to_run_without_a_tty() {
    let output = Command::cargo_bin("bellwork")
        .unwrap()
        .arg("--builtin")
        .arg("boxing-basic")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("stdin must be a tty"));
}

#[test]
fn conflicting_plan_flags() {
    Command::cargo_bin("bellwork")
        .unwrap()
        .args(["--plan", "mine.json", "--builtin", "boxing-basic"])
        .assert()
        .failure();
}
