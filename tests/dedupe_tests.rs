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
        format!("data.location={}\nagent=alice\nphone.country_prefix=370\n", db_path.display()),
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

/// Leads 1 and 2 share a phone number written two ways; lead 3 is unrelated
fn seed(temp_dir: &TempDir) {
    get_callq_cmd(temp_dir).args(&["agents", "add", "alice"]).assert().success();
    get_callq_cmd(temp_dir)
        .args(&["lists", "add", "Q1", "--field", "company", "--field", "phone:phone", "--field", "email:email"])
        .assert()
        .success();
    get_callq_cmd(temp_dir)
        .args(&["leads", "add", "--list", "Q1", "company=Acme", "phone=+370 600 12345", "email="])
        .assert()
        .success();
    get_callq_cmd(temp_dir)
        .args(&["leads", "add", "--list", "Q1", "company=", "phone=60012345", "email=sales@acme.lt"])
        .assert()
        .success();
    get_callq_cmd(temp_dir)
        .args(&["leads", "add", "--list", "Q1", "company=Beta", "phone=+370 611 99999"])
        .assert()
        .success();
}

fn lead_count(temp_dir: &TempDir) -> usize {
    let output = get_callq_cmd(temp_dir).args(&["leads", "list", "--json"]).output().unwrap();
    let leads: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    leads.as_array().unwrap().len()
}

#[test]
fn test_find_groups_normalized_phones() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "find", "--fields", "phone"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Matching on: phone"))
        .stdout(predicate::str::contains("Group 1 (2 leads)"))
        .stdout(predicate::str::contains("1 groups, 2 leads"));

    let output = get_callq_cmd(&temp_dir)
        .args(&["dupes", "find", "--fields", "phone", "--json"])
        .output()
        .unwrap();
    let groups: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    let ids: Vec<i64> = groups[0]["leads"].as_array().unwrap().iter().map(|l| l["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_find_uses_list_dedupe_fields() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "find", "--list", "Q1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("At least one comparison field is required"));

    get_callq_cmd(&temp_dir)
        .args(&["lists", "set", "Q1", "dedupe_fields", "phone"])
        .assert()
        .success();
    get_callq_cmd(&temp_dir)
        .args(&["dupes", "find", "--list", "Q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Group 1 (2 leads)"));
}

#[test]
fn test_no_duplicates_on_email() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "find", "--fields", "email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No duplicates found."));
}

#[test]
fn test_bulk_dry_run_changes_nothing() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "bulk", "--strategy", "merge", "--fields", "phone"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would resolve 1 groups, 1 leads removed."))
        .stdout(predicate::str::contains("Dry run"));
    assert_eq!(lead_count(&temp_dir), 3);
}

#[test]
fn test_bulk_merge_execute() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    // History on the lead that goes away follows the survivor
    get_callq_cmd(&temp_dir).args(&["call", "2", "answered"]).assert().success();

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "bulk", "--strategy", "merge", "--fields", "phone", "--execute"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolved 1 groups, 1 leads removed."))
        .stdout(predicate::str::contains("1 groups merged."));
    assert_eq!(lead_count(&temp_dir), 2);

    let output = get_callq_cmd(&temp_dir).args(&["leads", "show", "1", "--json"]).output().unwrap();
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["lead"]["data"]["company"], "Acme");
    assert_eq!(shown["lead"]["data"]["email"], "sales@acme.lt");
    assert_eq!(shown["calls"].as_array().unwrap().len(), 1);
}

#[test]
fn test_keep_one() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "keep", "2", "--fields", "phone", "--execute"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keep 2, delete 1"));

    get_callq_cmd(&temp_dir)
        .args(&["leads", "show", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Lead 1 not found"));
    get_callq_cmd(&temp_dir).args(&["leads", "show", "2"]).assert().success();
}

#[test]
fn test_merge_one_group() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "merge", "2", "--fields", "phone"])
        .assert()
        .success()
        .stdout(predicate::str::contains("merge into 1, delete 2"))
        .stdout(predicate::str::contains("Dry run"));
    assert_eq!(lead_count(&temp_dir), 3);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "merge", "2", "--fields", "phone", "--execute"])
        .assert()
        .success();
    assert_eq!(lead_count(&temp_dir), 2);
}

#[test]
fn test_keep_lead_without_duplicates() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "keep", "3", "--fields", "phone", "--execute"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Lead 3 has no duplicates on phone"));
}

#[test]
fn test_invalid_strategy() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "bulk", "--strategy", "newest-wins", "--fields", "phone"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid strategy 'newest-wins'"));
}

#[test]
fn test_internal_requires_list() {
    let (temp_dir, _guard) = setup_test_env();
    seed(&temp_dir);

    get_callq_cmd(&temp_dir)
        .args(&["dupes", "find", "--fields", "phone", "--internal"])
        .assert()
        .failure();
}
