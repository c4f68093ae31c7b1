//! The `pathway` binary driven as a user would.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use crate::common::{TestDb, draft_json};

fn pathway(db: &TestDb) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pathway"));
    cmd.arg("--db")
        .arg(db.path())
        .env("HOME", db.dir())
        .env_remove("PATHWAY_DB")
        .env_remove("RUST_LOG");
    cmd
}

fn run(db: &TestDb, args: &[&str]) -> Output {
    pathway(db).args(args).output().expect("run pathway")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "pathway failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn import(db: &TestDb, node_count: usize) -> String {
    let mut child = pathway(db)
        .args(["import", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn pathway");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(draft_json(node_count).to_string().as_bytes())
        .unwrap();
    stdout(&child.wait_with_output().unwrap()).trim().to_owned()
}

fn node_ids(db: &TestDb, path_id: &str) -> Vec<String> {
    let shown: serde_json::Value =
        serde_json::from_str(&stdout(&run(db, &["show", path_id, "--json"]))).unwrap();
    shown["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["id"].as_str().unwrap().to_owned())
        .collect()
}

#[test]
fn import_complete_and_finish_a_path() {
    let db = TestDb::new();
    let path_id = import(&db, 2);
    let nodes = node_ids(&db, &path_id);

    let out = stdout(&run(&db, &["complete", &path_id, &nodes[0]]));
    assert_eq!(out, "Completed node 1\nUnlocked node 2\n");

    let out = stdout(&run(&db, &["complete", &path_id, &nodes[1]]));
    assert_eq!(out, "Completed node 2\nPath completed\n");

    let listed = stdout(&run(&db, &["list"]));
    assert!(listed.contains(&path_id));
    assert!(listed.contains("completed"));
}

#[test]
fn completing_a_locked_node_exits_non_zero() {
    let db = TestDb::new();
    let path_id = import(&db, 2);
    let nodes = node_ids(&db, &path_id);

    let output = run(&db, &["complete", &path_id, &nodes[1]]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be completed from locked"), "{stderr}");
}

#[test]
fn progress_reports_xp() {
    let db = TestDb::new();
    let path_id = import(&db, 3);

    let out = stdout(&run(&db, &["progress", &path_id]));
    assert!(out.starts_with("0/3 nodes completed, 0/300 xp\n"), "{out}");
}

#[test]
fn invalid_ids_are_rejected_by_the_parser() {
    let db = TestDb::new();
    let output = run(&db, &["show", "not-a-uuid"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid path id"));
}

#[test]
fn resume_rejects_position_zero() {
    let db = TestDb::new();
    let path_id = import(&db, 1);
    let output = run(&db, &["resume", &path_id, "0"]);
    assert!(!output.status.success());
}

#[test]
fn list_for_unknown_user_is_empty() {
    let db = TestDb::new();
    import(&db, 1);
    let out = stdout(&run(&db, &["list", "--user", "nobody", "--json"]));
    assert_eq!(out.trim(), "[]");
}
