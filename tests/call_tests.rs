use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use std::fs;
mod test_env;

fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = test_env::lock_test_env();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let config_dir = temp_dir.path().join(".callq");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("rc"),
        format!("data.location={}\nagent=alice\n", db_path.display()),
    )
    .unwrap();

    std::env::set_var("HOME", temp_dir.path().to_str().unwrap());
    (temp_dir, guard)
}

fn get_callq_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("callq").unwrap();
    cmd.env("HOME", temp_dir.path());
    cmd
}

fn seed(temp_dir: &TempDir) {
    get_callq_cmd(temp_dir).args(&["agents", "add", "alice"]).assert().success();
    get_callq_cmd(temp_dir).args(&["agents", "add", "bob"]).assert().success();
    get_callq_cmd(temp_dir).args(&["lists", "add", "Q1", "--field", "company"]).assert().success();
    get_callq_cmd(temp_dir)
        .args(&["leads", "add", "--list", "Q1", "company=Acme", "phone=60012345"])
        .assert()
        .success();
}

fn lead_json(temp_dir: &TempDir, id: &str) -> serde_json::Value {
    let output = get_callq_cmd(temp_dir).args(&["leads", "show", id, "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_call_claims_and_counts_attempt() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["call", "1", "answered", "--notes", "Spoke to the CEO", "--duration", "2m"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged answered call on lead 1 (attempt 1, status contacted, 2m)"));

    let shown = lead_json(&temp_dir, "1");
    assert_eq!(shown["lead"]["call_attempts"], 1);
    assert_eq!(shown["lead"]["claimed_by"], 1);
    assert_eq!(shown["calls"][0]["outcome"], "answered");
    assert_eq!(shown["calls"][0]["notes"], "Spoke to the CEO");
    assert_eq!(shown["calls"][0]["duration_secs"], 120);
}

#[test]
fn test_won_call_closes_lead() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir).args(&["call", "1", "busy"]).assert().success();
    get_callq_cmd(&temp_dir)
        .args(&["call", "1", "won"])
        .assert()
        .success()
        .stdout(predicate::str::contains("attempt 2, status won"));

    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));
}

#[test]
fn test_call_with_callback() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["call", "1", "callback", "--callback", "+2h"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status callback"))
        .stdout(predicate::str::contains("Callback scheduled at"));

    let shown = lead_json(&temp_dir, "1");
    assert!(shown["lead"]["callback_scheduled_at"].is_i64());
}

#[test]
fn test_call_on_other_agents_lead_is_rejected() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir).args(&["claim", "1"]).assert().success();
    get_callq_cmd(&temp_dir)
        .args(&["--agent", "bob", "call", "1", "answered"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("is claimed by agent 1"));

    // Nothing was logged
    let shown = lead_json(&temp_dir, "1");
    assert_eq!(shown["lead"]["call_attempts"], 0);
    assert_eq!(shown["calls"].as_array().unwrap().len(), 0);
}

#[test]
fn test_invalid_outcome() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["call", "1", "ringing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid call outcome 'ringing'"));
}

#[test]
fn test_sms_is_logged() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["sms", "1", "Hello", "from", "callq"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged SMS to lead 1"));

    let shown = lead_json(&temp_dir, "1");
    assert_eq!(shown["sms"][0]["message"], "Hello from callq");
    assert_eq!(shown["lead"]["call_attempts"], 0);
    assert!(shown["lead"]["last_contacted_at"].is_i64());

    get_callq_cmd(&temp_dir)
        .args(&["leads", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lead 1: Acme"))
        .stdout(predicate::str::contains("Hello from callq"));
}

#[test]
fn test_due_callbacks() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);
    get_callq_cmd(&temp_dir)
        .args(&["leads", "add", "--list", "Q1", "company=Beta"])
        .assert()
        .success();

    get_callq_cmd(&temp_dir)
        .args(&["callbacks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No callbacks due."));

    get_callq_cmd(&temp_dir).args(&["leads", "callback", "1", "2020-01-01"]).assert().success();
    get_callq_cmd(&temp_dir).args(&["leads", "callback", "2", "+1d"]).assert().success();

    let output = get_callq_cmd(&temp_dir).args(&["callbacks", "--json"]).output().unwrap();
    let due: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let due = due.as_array().unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0]["id"], 1);

    // bob holds it, so it is no longer alice's to call back
    get_callq_cmd(&temp_dir).args(&["--agent", "bob", "claim", "1"]).assert().success();
    get_callq_cmd(&temp_dir)
        .args(&["callbacks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No callbacks due."));
    get_callq_cmd(&temp_dir)
        .args(&["callbacks", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme"));
}

#[test]
fn test_clear_callback() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir).args(&["leads", "callback", "1", "tomorrow"]).assert().success();
    get_callq_cmd(&temp_dir)
        .args(&["leads", "callback", "1", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared callback for lead 1"));
    assert!(lead_json(&temp_dir, "1")["lead"]["callback_scheduled_at"].is_null());

    get_callq_cmd(&temp_dir)
        .args(&["leads", "callback", "1", "someday"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unrecognized time 'someday'"));
}

#[test]
fn test_oversized_duration_and_callback() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["call", "1", "busy", "--duration", "999999999999999d"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Duration too large"));
    get_callq_cmd(&temp_dir)
        .args(&["call", "1", "busy", "--callback", "+999999999999999d"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Duration too large"));
    get_callq_cmd(&temp_dir)
        .args(&["leads", "callback", "1", "+999999999999999d"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Duration too large"));

    let shown = lead_json(&temp_dir, "1");
    assert_eq!(shown["lead"]["call_attempts"], 0);
    assert!(shown["lead"]["callback_scheduled_at"].is_null());
}
