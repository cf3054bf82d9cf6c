use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use std::fs;
mod test_env;

/// Temporary database with `alice` as the configured agent
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

/// Two agents and a list with Acme, Beta and Gamma, in that order
fn seed(temp_dir: &TempDir) {
    get_callq_cmd(temp_dir).args(&["agents", "add", "alice"]).assert().success();
    get_callq_cmd(temp_dir).args(&["agents", "add", "bob"]).assert().success();
    get_callq_cmd(temp_dir)
        .args(&["lists", "add", "Q1", "--field", "company", "--field", "phone:phone"])
        .assert()
        .success();
    for (company, phone) in [("Acme", "111111"), ("Beta", "222222"), ("Gamma", "333333")] {
        get_callq_cmd(temp_dir)
            .args(&["leads", "add", "--list", "Q1", &format!("company={}", company), &format!("phone={}", phone)])
            .assert()
            .success();
    }
}

#[test]
fn test_queue_next_shows_oldest_lead() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/3] Acme (new)"))
        .stdout(predicate::str::contains("phone  111111"));
}

#[test]
fn test_queue_index_is_stable() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    for _ in 0..2 {
        get_callq_cmd(&temp_dir)
            .args(&["queue", "next", "--list", "Q1", "--index", "2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[3/3] Gamma"))
            .stdout(predicate::str::contains("(last in queue)"));
    }

    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1", "--index", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queue 'Q1' complete"));
}

#[test]
fn test_claimed_lead_leaves_other_agents_queue() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1", "--claim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/3] Acme"))
        .stdout(predicate::str::contains("Claimed."));

    // Still in alice's queue
    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/3] Acme"));

    get_callq_cmd(&temp_dir)
        .args(&["--agent", "bob", "queue", "next", "--list", "Q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/2] Beta"));
}

#[test]
fn test_terminal_leads_leave_queue() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir).args(&["leads", "status", "1", "won"]).assert().success();
    get_callq_cmd(&temp_dir).args(&["leads", "status", "3", "archived"]).assert().success();

    let output = get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["has_next"], false);
    assert_eq!(json["lead"]["data"]["company"], "Beta");
}

#[test]
fn test_prioritise_new_leads() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir).args(&["call", "1", "no-answer"]).assert().success();
    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/3] Acme"));

    get_callq_cmd(&temp_dir)
        .args(&["lists", "set", "Q1", "prioritise_new_leads", "true"])
        .assert()
        .success();
    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/3] Beta"));
    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1", "--index", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[3/3] Acme (contacted)"));
}

#[test]
fn test_campaign_queue() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir).args(&["campaigns", "add", "Spring"]).assert().success();
    get_callq_cmd(&temp_dir)
        .args(&["leads", "assign", "2", "--campaign", "Spring"])
        .assert()
        .success();

    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--campaign", "Spring"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/1] Beta"));
}

#[test]
fn test_queue_requires_source() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["queue", "next"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--list"));
}

#[test]
fn test_queue_claimed_and_scheduled() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir).args(&["claim", "2"]).assert().success();
    get_callq_cmd(&temp_dir).args(&["leads", "callback", "2", "+2d"]).assert().success();

    get_callq_cmd(&temp_dir)
        .args(&["queue", "claimed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Beta"))
        .stdout(predicate::str::contains("Acme").not());
    get_callq_cmd(&temp_dir)
        .args(&["queue", "scheduled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Beta"))
        .stdout(predicate::str::contains("in 1d"));
}

#[test]
fn test_huge_index_is_complete_and_claims_nothing() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    for index in ["9223372036854775808", "18446744073709551615"] {
        get_callq_cmd(&temp_dir)
            .args(&["queue", "next", "--list", "Q1", "--index", index, "--claim"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Queue 'Q1' complete"))
            .stdout(predicate::str::contains("Claimed.").not());
    }

    let output = get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1", "--index", "18446744073709551615", "--json"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["complete"], true);
    assert_eq!(json["has_next"], false);
    assert_eq!(json["total"], 3);

    let output = get_callq_cmd(&temp_dir).args(&["queue", "claimed", "--json"]).output().unwrap();
    let claimed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(claimed.as_array().unwrap().len(), 0);
}

#[test]
fn test_claim_from_queue_twice() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1", "--claim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Claimed."));
    get_callq_cmd(&temp_dir)
        .args(&["queue", "next", "--list", "Q1", "--claim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/3] Acme"))
        .stdout(predicate::str::contains("Already yours."))
        .stdout(predicate::str::contains("Claimed.").not());
}
