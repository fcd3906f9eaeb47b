use std::fs;
use std::path::PathBuf;

use session_store::{
    backup_path, SessionRecord, SessionStore, SessionStoreError, ASSISTANT_KEY, THREAD_KEY,
};
use tempfile::TempDir;
use time::macros::datetime;
use time::OffsetDateTime;

const STAMP_TIME: OffsetDateTime = datetime!(2024-01-11 01:51:13 UTC);

fn store_with(contents: &str) -> (TempDir, PathBuf, SessionStore) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("openai.env");
    fs::write(&path, contents).expect("store should be seeded");
    let store = SessionStore::open(&path);
    (dir, path, store)
}

fn empty_dir_store() -> (TempDir, PathBuf, SessionStore) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("openai.env");
    let store = SessionStore::open(&path);
    (dir, path, store)
}

#[test]
fn session_reads_thread_and_assistant_ids() {
    let (_dir, _path, store) = store_with(
        "OPENAI_API_KEY='sk-test'\nGPT_THREAD='thread_abc'\nASSISTANT_ID='asst_xyz'\n",
    );

    assert_eq!(
        store.session().expect("session should load"),
        SessionRecord {
            thread_id: Some("thread_abc".to_string()),
            assistant_id: Some("asst_xyz".to_string()),
        }
    );
}

#[test]
fn set_preserves_unrelated_lines_and_order() {
    let (_dir, path, store) = store_with(
        "# credentials\nOPENAI_API_KEY='sk-test'\n\nGPT_THREAD='thread_old'\nEXTRA=value\n",
    );

    store
        .set(THREAD_KEY, "thread_new")
        .expect("set should succeed");

    let contents = fs::read_to_string(&path).expect("store should be readable");
    assert_eq!(
        contents,
        "# credentials\nOPENAI_API_KEY='sk-test'\n\nGPT_THREAD='thread_new'\nEXTRA='value'\n"
    );
}

#[test]
fn set_on_missing_store_creates_it() {
    let (_dir, path, store) = empty_dir_store();

    store
        .record_session("thread_1", Some("asst_1"))
        .expect("record should succeed");

    assert_eq!(
        fs::read_to_string(&path).expect("store should exist"),
        "GPT_THREAD='thread_1'\nASSISTANT_ID='asst_1'\n"
    );
}

#[test]
fn set_leaves_no_temp_files_behind() {
    let (dir, _path, store) = store_with("GPT_THREAD='a'\n");

    store.set(THREAD_KEY, "b").expect("first set");
    store.set(ASSISTANT_KEY, "asst_1").expect("second set");

    let names: Vec<String> = fs::read_dir(dir.path())
        .expect("dir should be listable")
        .map(|entry| {
            entry
                .expect("entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(names, vec!["openai.env".to_string()]);
}

#[test]
fn backup_copies_store_byte_for_byte() {
    let original = "# keep comments\nGPT_THREAD=thread_old   # inline\nASSISTANT_ID=\"asst_1\"\n";
    let (_dir, path, store) = store_with(original);

    let backup = store
        .backup_at(STAMP_TIME)
        .expect("backup should succeed")
        .expect("existing store should produce a backup");

    assert_eq!(backup, backup_path(&path, "20240111-015113", 0));
    assert_eq!(
        fs::read_to_string(&backup).expect("backup should be readable"),
        original
    );
    assert_eq!(
        fs::read_to_string(&path).expect("store should be untouched"),
        original
    );
}

#[test]
fn backup_never_overwrites_an_earlier_backup() {
    let (_dir, path, store) = store_with("GPT_THREAD='first'\n");

    let first = store
        .backup_at(STAMP_TIME)
        .expect("first backup")
        .expect("backup path");
    store.set(THREAD_KEY, "second").expect("set");
    let second = store
        .backup_at(STAMP_TIME)
        .expect("second backup")
        .expect("backup path");

    assert_ne!(first, second);
    assert_eq!(second, backup_path(&path, "20240111-015113", 1));
    assert_eq!(
        fs::read_to_string(&first).expect("first backup"),
        "GPT_THREAD='first'\n"
    );
    assert_eq!(
        fs::read_to_string(&second).expect("second backup"),
        "GPT_THREAD='second'\n"
    );
}

#[test]
fn backup_of_missing_store_creates_empty_store_without_backup() {
    let (dir, path, store) = empty_dir_store();

    let backup = store.backup_at(STAMP_TIME).expect("backup should succeed");

    assert_eq!(backup, None);
    assert!(path.is_file());
    assert_eq!(fs::read_to_string(&path).expect("store"), "");
    assert_eq!(
        fs::read_dir(dir.path()).expect("dir").count(),
        1,
        "no backup file should be written"
    );
}

#[test]
fn malformed_store_is_reported_with_line_number() {
    let (_dir, _path, store) = store_with("GPT_THREAD='a'\nthis is not valid\n");

    let error = store
        .session()
        .expect_err("malformed store should fail to load");

    match error {
        SessionStoreError::MalformedLine { line, content, .. } => {
            assert_eq!(line, 2);
            assert_eq!(content, "this is not valid");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_set_leaves_store_untouched() {
    let original = "GPT_THREAD='keep'\n";
    let (_dir, path, store) = store_with(original);

    let error = store
        .set_many(&[(THREAD_KEY, "new"), ("BAD KEY", "x")])
        .expect_err("invalid key should fail");

    assert!(matches!(error, SessionStoreError::InvalidKey { .. }));
    assert_eq!(fs::read_to_string(&path).expect("store"), original);
}
