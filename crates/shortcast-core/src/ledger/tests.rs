use super::*;
use std::fs;

fn ledger_in(dir: &tempfile::TempDir) -> Ledger {
    Ledger::load(&dir.path().join("state/ledger.json")).unwrap()
}

#[test]
fn missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ledger_in(&dir);
    assert!(ledger.entries().is_empty());
    assert_eq!(ledger.first_incomplete("story1", 3), Some(1));
}

#[test]
fn commit_persists_and_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    ledger.commit("story1", 1).unwrap();
    ledger.commit("story1", 2).unwrap();

    let reloaded = ledger_in(&dir);
    assert_eq!(reloaded.first_incomplete("story1", 3), Some(3));
    assert_eq!(reloaded.first_incomplete("story1", 2), None);
    assert_eq!(
        reloaded.completed("story1").unwrap().iter().copied().collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn file_is_pretty_json_keyed_by_item() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    ledger.commit("a", 2).unwrap();
    ledger.commit("a", 1).unwrap();
    let text = fs::read_to_string(ledger.path()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v, serde_json::json!({ "a": [1, 2] }));
    assert!(text.contains('\n'));
}

#[test]
fn duplicate_commit_is_a_single_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    ledger.commit("story1", 1).unwrap();
    ledger.commit("story1", 1).unwrap();
    let reloaded = ledger_in(&dir);
    assert_eq!(reloaded.completed("story1").unwrap().len(), 1);
}

#[test]
fn first_incomplete_fills_gaps_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    ledger.commit("x", 2).unwrap();
    assert_eq!(ledger.first_incomplete("x", 3), Some(1));
    assert_eq!(ledger.first_incomplete("x", 0), None);
}

#[test]
fn highest_completed_tracks_largest_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    assert_eq!(ledger.highest_completed("x"), None);
    ledger.commit("x", 3).unwrap();
    ledger.commit("x", 1).unwrap();
    assert_eq!(ledger.highest_completed("x"), Some(3));
}

#[test]
fn remove_drops_entry_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    ledger.commit("a", 1).unwrap();
    ledger.commit("b", 1).unwrap();
    assert!(ledger.remove("a").unwrap());
    assert!(!ledger.remove("a").unwrap());

    let reloaded = ledger_in(&dir);
    assert!(reloaded.completed("a").is_none());
    assert!(reloaded.completed("b").is_some());
}

#[test]
fn corrupt_file_is_an_error_not_a_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    fs::write(&path, b"{ not json").unwrap();
    let err = Ledger::load(&path).unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"{ not json");
}

#[test]
fn no_temp_files_left_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let mut ledger = Ledger::load(&path).unwrap();
    for i in 1..=5 {
        ledger.commit("story1", i).unwrap();
    }
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("ledger.json")]);
}

#[cfg(unix)]
#[test]
fn failed_write_rolls_back_memory() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");
    fs::create_dir(&state).unwrap();
    let mut ledger = Ledger::load(&state.join("ledger.json")).unwrap();
    ledger.commit("a", 1).unwrap();

    fs::set_permissions(&state, fs::Permissions::from_mode(0o500)).unwrap();
    let probe = state.join("probe");
    let writable = fs::write(&probe, b"x").is_ok();
    if !writable {
        assert!(ledger.commit("a", 2).is_err());
        assert_eq!(ledger.first_incomplete("a", 2), Some(2));
    }
    fs::set_permissions(&state, fs::Permissions::from_mode(0o700)).unwrap();
}
