use super::*;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::SELF_WRITE_WINDOW;
use crate::io::{LineReader, LineWriter};
use crate::utils::LoadFailure;
use crate::watch::WatchEventKind;

/// 创建测试目录并写入语言文件
fn create_test_dir(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(temp_dir.path().join(name), content).unwrap();
    }
    temp_dir
}

fn open_store(dir: &TempDir) -> TranslationStore {
    let mut store = TranslationStore::new(StoreOptions::new(dir.path())).unwrap();
    store.load().unwrap();
    store
}

fn read(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join(name)).unwrap()
}

/// 远晚于所有定时器的时刻
fn later() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

fn hello_dir() -> TempDir {
    create_test_dir(&[("app.en", "+hello=Hi\n"), ("app.fr", "+hello=Hi\n")])
}

// === 加载 ===

#[test]
fn test_load_builds_state() {
    let dir = create_test_dir(&[
        ("app.en", "#hello=Greeting\n+hello=Hi\n-world=World\n"),
        ("app.fr", "+hello=Salut\n"),
        ("notes about app", "ignored\n"),
    ]);
    let store = open_store(&dir);

    assert!(store.is_loaded());
    assert!(store.state().error.is_none());
    assert_eq!(store.keys(), ["hello", "world"]);
    assert_eq!(store.files().len(), 2);
    assert_eq!(store.files()[0].locale.as_deref(), Some("en"));

    let hello = store.translation("app.en", "hello").unwrap();
    assert_eq!(hello.value.as_deref(), Some("Hi"));
    assert_eq!(hello.comment.as_deref(), Some("Greeting"));
    assert!(hello.approved);

    assert!(!store.translation("app.en", "world").unwrap().approved);
    assert!(store.translation("app.fr", "world").is_none());
    assert!(!store.is_dirty());
}

#[test]
fn test_load_missing_directory() {
    let dir = TempDir::new().unwrap();
    let mut store = TranslationStore::new(StoreOptions::new(dir.path().join("missing"))).unwrap();

    assert!(matches!(store.load(), Err(StoreError::InvalidDirectory(_))));
    assert!(!store.is_loaded());
}

#[test]
fn test_load_then_save_is_identical() {
    let en = "#hello=Greeting\n+hello=Hi\n-world=World\n";
    let fr = "#hello=\n+hello=Salut\n-world=Monde\n";
    let dir = create_test_dir(&[("app.en", en), ("app.fr", fr)]);
    let mut store = open_store(&dir);

    store.save().unwrap();

    assert_eq!(read(&dir, "app.en"), en);
    assert_eq!(read(&dir, "app.fr"), fr);
}

#[test]
fn test_load_replays_pending_updates() {
    let dir = create_test_dir(&[
        ("app.en", "+hello=Hi\n>-hello=Hello\n>-bye=Bye\n>!hello=\n"),
        ("app.fr", "+hello=Salut\n>!hello=\n"),
    ]);
    let store = open_store(&dir);

    assert_eq!(store.keys(), ["bye"]);
    assert!(store.translation("app.en", "hello").is_none());
    assert_eq!(store.translation("app.en", "bye").unwrap().value.as_deref(), Some("Bye"));
    assert_eq!(
        store.original_translation("app.en", "hello").unwrap().value.as_deref(),
        Some("Hi")
    );
    assert_eq!(store.pending_len(), 3);
}

#[test]
fn test_load_compacts_noop_log() {
    let dir = create_test_dir(&[("app.en", "+hello=Hi\n>-hello=Hey\n>+hello=Hi\n")]);
    let store = open_store(&dir);

    assert_eq!(store.pending_len(), 0);
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n");
}

#[test]
fn test_duplicate_key_is_captured() {
    let dir = create_test_dir(&[
        ("app.en", "+hello=Hi\n"),
        ("app.fr", "#hello=Note\n+hello=Salut\n\n-hello=Bonjour\n"),
    ]);
    let mut store = open_store(&dir);

    let error = store.state().error.clone().unwrap();
    assert_eq!(
        error,
        LoadFailure::DuplicateKey {
            file: "app.fr".to_string(),
            line: 4,
            key: "hello".to_string(),
            kind: "value",
        }
    );
    assert_eq!(error.to_string(), "app.fr:4: duplicate value for key \"hello\"");

    match store.add_key("other") {
        Err(StoreError::NotResolved(cause)) => assert_eq!(cause, error),
        other => panic!("expected NotResolved, got {:?}", other),
    }
    assert!(matches!(store.save(), Err(StoreError::NotResolved(_))));

    // 修好文件后重新加载即可恢复
    fs::write(dir.path().join("app.fr"), "+hello=Salut\n").unwrap();
    store.load().unwrap();
    assert!(store.state().error.is_none());
    store.add_key("other").unwrap();
}

#[test]
fn test_malformed_line_is_captured() {
    let dir = create_test_dir(&[("app.en", "+hello=Hi\nnot a line\n")]);
    let store = open_store(&dir);

    match store.state().error.as_ref() {
        Some(LoadFailure::Malformed { file, line, .. }) => {
            assert_eq!(file, "app.en");
            assert_eq!(*line, 2);
        }
        other => panic!("expected Malformed, got {:?}", other),
    }
    assert!(store.is_loaded());
}

#[test]
fn test_operations_require_load() {
    let dir = hello_dir();
    let mut store = TranslationStore::new(StoreOptions::new(dir.path())).unwrap();

    assert!(matches!(store.add_key("k"), Err(StoreError::NotLoaded)));
    assert!(matches!(store.delete_key("hello"), Err(StoreError::NotLoaded)));
    assert!(matches!(store.revert(&RevertScope::all()), Err(StoreError::NotLoaded)));
    assert!(matches!(store.save(), Err(StoreError::NotLoaded)));
}

// === 更新日志 ===

#[test]
fn test_update_value_and_revert() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_value("app.fr", "hello", "Salut").unwrap();

    assert_eq!(read(&dir, "app.fr"), "+hello=Hi\n>-hello=Salut\n");
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n");
    let entry = store.translation("app.fr", "hello").unwrap();
    assert_eq!(entry.value.as_deref(), Some("Salut"));
    assert!(!entry.approved);
    assert_eq!(store.pending_len(), 1);

    store.revert(&RevertScope::entry("app.fr", "hello")).unwrap();

    let entry = store.translation("app.fr", "hello").unwrap();
    assert_eq!(entry.value.as_deref(), Some("Hi"));
    assert!(entry.approved);
    assert_eq!(store.translation("app.fr", "hello"), store.original_translation("app.fr", "hello"));
    assert_eq!(store.pending_len(), 0);
    assert_eq!(read(&dir, "app.fr"), "+hello=Hi\n");
}

#[test]
fn test_edit_back_to_baseline_compacts() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_value("app.en", "hello", "Hello").unwrap();
    assert!(store.is_dirty());

    let restored = TranslationEntry::new("hello").with_value("Hi", true);
    store.update_translation("app.en", "hello", &restored).unwrap();

    assert!(!store.is_dirty());
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n");
}

#[test]
fn test_update_comment_and_approval() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_comment("app.en", "hello", "Shown on start").unwrap();
    store.update_approved("app.fr", "hello", false).unwrap();

    assert_eq!(
        read(&dir, "app.en"),
        "+hello=Hi\n>#hello=Shown on start\n"
    );
    assert_eq!(read(&dir, "app.fr"), "+hello=Hi\n>-hello=Hi\n");
    assert_eq!(store.pending_len(), 2);

    store.save().unwrap();
    assert_eq!(read(&dir, "app.en"), "#hello=Shown on start\n+hello=Hi\n");
    assert_eq!(read(&dir, "app.fr"), "#hello=\n-hello=Hi\n");
    assert!(!store.is_dirty());
}

#[test]
fn test_update_targets_must_exist() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    assert!(matches!(
        store.update_value("app.en", "missing", "x"),
        Err(StoreError::KeyNotExists(_))
    ));
    assert!(matches!(
        store.update_value("app.de", "hello", "x"),
        Err(StoreError::FileNotExists(_))
    ));
}

#[test]
fn test_multiline_value_survives_reload() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_value("app.en", "hello", "line one\nline two").unwrap();
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n>-hello=line one\u{2424}line two\n");

    let reloaded = open_store(&dir);
    assert_eq!(
        reloaded.translation("app.en", "hello").unwrap().value.as_deref(),
        Some("line one\nline two")
    );
}

// === 键操作 ===

#[test]
fn test_add_key() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.add_key("bye").unwrap();

    assert_eq!(store.keys(), ["bye", "hello"]);
    assert!(store.state().keys_changed);
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n>-bye=\n");
    assert_eq!(store.pending_len(), 2);

    let reloaded = open_store(&dir);
    assert_eq!(reloaded.keys(), ["bye", "hello"]);
    assert_eq!(reloaded.translation("app.fr", "bye").unwrap().value.as_deref(), Some(""));
}

#[test]
fn test_add_key_errors() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    assert!(matches!(store.add_key("hello"), Err(StoreError::KeyExists(_))));
    assert!(matches!(store.add_key(""), Err(StoreError::InvalidKey(_))));
    assert!(matches!(store.add_key("a=b"), Err(StoreError::InvalidKey(_))));

    let empty = TempDir::new().unwrap();
    let mut store = open_store(&empty);
    assert!(matches!(store.add_key("k"), Err(StoreError::NoLocaleFiles)));
    assert!(store.keys().is_empty());
}

#[test]
fn test_delete_key() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.delete_key("hello").unwrap();

    assert!(store.keys().is_empty());
    assert!(store.translation("app.en", "hello").is_none());
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n>!hello=\n");

    let reloaded = open_store(&dir);
    assert!(reloaded.keys().is_empty());
    assert_eq!(reloaded.pending_len(), 2);

    store.save().unwrap();
    assert_eq!(read(&dir, "app.en"), "");
}

#[test]
fn test_delete_missing_key_is_silent() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    store.subscribe(move |_| counter.set(counter.get() + 1));

    // 加载本身安排了一次通知
    store.tick_at(later()).unwrap();
    assert_eq!(calls.get(), 1);

    store.delete_key("missing").unwrap();
    assert!(!store.notify_timer.is_pending());
    store.tick_at(later()).unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n");

    store.delete_key("hello").unwrap();
    store.tick_at(later()).unwrap();
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_copy_key() {
    let dir = create_test_dir(&[
        ("app.en", "#hello=Greeting\n+hello=Hi\n"),
        ("app.fr", "-hello=Salut\n"),
    ]);
    let mut store = open_store(&dir);

    store.copy_key("hello", "hi").unwrap();

    assert_eq!(store.keys(), ["hello", "hi"]);
    assert_eq!(
        store.translation("app.en", "hi"),
        Some(&TranslationEntry::new("hi").with_value("Hi", true).with_comment("Greeting"))
    );
    assert_eq!(
        read(&dir, "app.en"),
        "#hello=Greeting\n+hello=Hi\n>#hi=Greeting\n>+hi=Hi\n"
    );
    assert_eq!(read(&dir, "app.fr"), "-hello=Salut\n>-hi=Salut\n");

    // 相同的键什么也不做
    store.copy_key("hello", "hello").unwrap();
    assert!(matches!(store.copy_key("hello", "hi"), Err(StoreError::KeyExists(_))));
    assert!(matches!(store.copy_key("nope", "x"), Err(StoreError::KeyNotExists(_))));
    assert!(matches!(store.copy_key("hello", "a=b"), Err(StoreError::InvalidKey(_))));
}

#[test]
fn test_rename_key() {
    let dir = create_test_dir(&[
        ("app.en", "#hello=Greeting\n+hello=Hi\n"),
        ("app.fr", "-hello=Salut\n"),
    ]);
    let mut store = open_store(&dir);

    store.rename_key("hello", "greeting").unwrap();

    assert_eq!(store.keys(), ["greeting"]);
    assert!(store.translation("app.en", "hello").is_none());

    store.save().unwrap();
    assert_eq!(read(&dir, "app.en"), "#greeting=Greeting\n+greeting=Hi\n");
    assert_eq!(read(&dir, "app.fr"), "#greeting=\n-greeting=Salut\n");
}

// === 撤销 ===

#[test]
fn test_partial_revert_rewrites_log() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_value("app.en", "hello", "Hello").unwrap();
    store.update_value("app.fr", "hello", "Salut").unwrap();
    assert_eq!(store.pending_len(), 2);

    store.revert(&RevertScope::file("app.en")).unwrap();

    assert_eq!(store.pending_len(), 1);
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n");
    assert_eq!(read(&dir, "app.fr"), "+hello=Hi\n>-hello=Salut\n");

    let reloaded = open_store(&dir);
    assert_eq!(reloaded.pending_len(), 1);
    assert_eq!(
        reloaded.translation("app.fr", "hello").unwrap().value.as_deref(),
        Some("Salut")
    );
}

#[test]
fn test_revert_added_key() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.add_key("bye").unwrap();
    store.revert(&RevertScope::key("bye")).unwrap();

    assert_eq!(store.keys(), ["hello"]);
    assert!(store.translation("app.en", "bye").is_none());
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n");
}

#[test]
fn test_revert_deleted_key() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.delete_key("hello").unwrap();
    store.revert(&RevertScope::all()).unwrap();

    assert_eq!(store.keys(), ["hello"]);
    assert_eq!(store.translation("app.en", "hello").unwrap().value.as_deref(), Some("Hi"));
    assert!(!store.is_dirty());
    assert_eq!(read(&dir, "app.fr"), "+hello=Hi\n");
}

// === 文件操作 ===

#[test]
fn test_add_file() {
    let dir = create_test_dir(&[("app.en", "#hello=Greeting\n+hello=Hi\n")]);
    let mut store = open_store(&dir);

    store.add_file("app.de").unwrap();

    assert_eq!(store.files().len(), 2);
    assert_eq!(read(&dir, "app.de"), "#hello=\n-hello=\n");
    assert_eq!(store.translation("app.de", "hello").unwrap().value.as_deref(), Some(""));
    assert!(!store.is_dirty());

    assert!(matches!(store.add_file("app.en"), Err(StoreError::FileExists(_))));
    assert!(matches!(store.add_file("bad name"), Err(StoreError::InvalidFileName(_))));
    assert!(matches!(store.add_file("../app.it"), Err(StoreError::InvalidFileName(_))));
    assert!(matches!(store.add_file("export.json"), Err(StoreError::InvalidFileName(_))));
}

#[test]
fn test_file_operations_require_clean_log() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_value("app.en", "hello", "Hello").unwrap();

    assert!(matches!(store.add_file("app.de"), Err(StoreError::UnappliedChanges)));
    assert!(matches!(store.delete_file("app.fr"), Err(StoreError::UnappliedChanges)));
    assert!(!dir.path().join("app.de").exists());
}

#[test]
fn test_delete_file() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.delete_file("app.fr").unwrap();

    assert!(!dir.path().join("app.fr").exists());
    assert_eq!(store.files().len(), 1);
    assert!(store.translation("app.fr", "hello").is_none());
    assert_eq!(store.keys(), ["hello"]);

    assert!(matches!(store.delete_file("app.fr"), Err(StoreError::FileNotExists(_))));
}

// === 通知与监听 ===

#[test]
fn test_notifications_are_throttled() {
    let dir = hello_dir();
    let mut store = open_store(&dir);
    store.tick_at(later()).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let id = store.subscribe(move |state| {
        let value = state
            .translation("app.en", "hello")
            .and_then(|e| e.value.clone())
            .unwrap_or_default();
        sink.borrow_mut().push((value, state.keys_changed));
    });

    store.update_value("app.en", "hello", "One").unwrap();
    store.update_value("app.en", "hello", "Two").unwrap();
    store.add_key("bye").unwrap();
    assert!(store.next_deadline().is_some());

    store.tick_at(later()).unwrap();
    assert_eq!(*seen.borrow(), vec![("Two".to_string(), true)]);
    assert!(!store.state().keys_changed);
    assert!(store.next_deadline().is_none());

    assert!(store.unsubscribe(id));
    store.update_value("app.en", "hello", "Three").unwrap();
    store.tick_at(later()).unwrap();
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_own_writes_do_not_trigger_reload() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_value("app.en", "hello", "Hello").unwrap();
    let now = Instant::now();
    store.handle_watch_event_at(&WatchEvent::new(WatchEventKind::Modified, "app.en"), now);
    assert!(!store.reload_timer.is_pending());

    // 窗口之外的事件会安排重新加载
    let outside = now + SELF_WRITE_WINDOW * 2;
    store.handle_watch_event_at(&WatchEvent::at(WatchEventKind::Modified, "app.en", outside), outside);
    assert!(store.reload_timer.is_pending());
}

#[test]
fn test_own_write_window_uses_event_arrival_time() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.update_value("app.en", "hello", "Hello").unwrap();
    let arrived = Instant::now();

    // 事件在写入后立即到达，但引擎很久之后才取出
    let drained = arrived + SELF_WRITE_WINDOW * 4;
    store.handle_watch_event_at(&WatchEvent::at(WatchEventKind::Modified, "app.en", arrived), drained);
    assert!(!store.reload_timer.is_pending());
}

#[test]
fn test_watcher_ignores_own_append_after_slow_tick() {
    let dir = hello_dir();
    let mut store = TranslationStore::new(StoreOptions::new(dir.path())).unwrap();
    store.connect().unwrap();
    store.tick_at(later()).unwrap();

    store.update_value("app.en", "hello", "Hello").unwrap();
    std::thread::sleep(SELF_WRITE_WINDOW + Duration::from_millis(200));
    store.tick().unwrap();

    assert!(!store.reload_timer.is_pending());
    assert_eq!(store.translation("app.en", "hello").unwrap().value.as_deref(), Some("Hello"));
    store.disconnect();
}

#[test]
fn test_multiline_key_survives_reload() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.add_key("a\nb").unwrap();
    store.update_value("app.en", "a\nb", "two\nlines").unwrap();
    assert_eq!(read(&dir, "app.en").lines().count(), 3);

    store.load().unwrap();
    assert!(store.state().error.is_none());
    assert_eq!(store.keys(), ["a\nb", "hello"]);
    assert_eq!(
        store.translation("app.en", "a\nb").unwrap().value.as_deref(),
        Some("two\nlines")
    );

    store.save().unwrap();
    store.load().unwrap();
    assert!(store.state().error.is_none());
    assert_eq!(store.keys(), ["a\nb", "hello"]);
}

#[test]
fn test_baseline_delete_line_drops_key() {
    let dir = create_test_dir(&[
        ("app.en", "+hello=Hi\n-gone=Old\n!gone=\n"),
        ("app.fr", "+hello=Salut\n"),
    ]);
    let mut store = open_store(&dir);

    assert!(store.state().error.is_none());
    assert_eq!(store.keys(), ["hello"]);
    assert!(store.translation("app.en", "gone").is_none());

    store.save().unwrap();
    assert_eq!(read(&dir, "app.en"), "+hello=Hi\n");
    assert_eq!(read(&dir, "app.fr"), "+hello=Salut\n");
}

#[test]
fn test_external_changes_reload_once() {
    let dir = hello_dir();
    let mut store = open_store(&dir);
    store.tick_at(later()).unwrap();

    let loads = Rc::new(Cell::new(0));
    let counter = loads.clone();
    store.subscribe(move |_| counter.set(counter.get() + 1));

    fs::write(dir.path().join("app.en"), "+hello=Hello\n-bye=Bye\n").unwrap();
    let now = Instant::now();
    for _ in 0..3 {
        store.handle_watch_event_at(&WatchEvent::new(WatchEventKind::Modified, "app.en"), now);
    }
    store.handle_watch_event_at(&WatchEvent::new(WatchEventKind::Created, "bad name"), now);

    store.tick_at(now + Duration::from_millis(50)).unwrap();
    assert_eq!(store.translation("app.en", "hello").unwrap().value.as_deref(), Some("Hi"));

    store.tick_at(now + Duration::from_millis(150)).unwrap();
    assert_eq!(store.translation("app.en", "hello").unwrap().value.as_deref(), Some("Hello"));
    assert_eq!(store.keys(), ["bye", "hello"]);
    assert!(!store.reload_timer.is_pending());

    store.tick_at(later()).unwrap();
    assert_eq!(loads.get(), 1);
}

#[test]
fn test_export_module_events_bump_version() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    store.handle_watch_event_at(&WatchEvent::new(WatchEventKind::Created, "export.json"), Instant::now());
    store.handle_watch_event_at(&WatchEvent::new(WatchEventKind::Modified, "export.json"), Instant::now());

    assert_eq!(store.export_version(), 2);
    assert!(store.export_module_present);
    assert!(!store.reload_timer.is_pending());
}

#[test]
fn test_disconnect_detaches_subscribers() {
    let dir = hello_dir();
    let mut store = open_store(&dir);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    store.subscribe(move |_| counter.set(counter.get() + 1));

    store.disconnect();
    store.tick_at(later()).unwrap();
    assert_eq!(calls.get(), 0);
    assert!(!store.is_connected());
}

// === 导出 ===

fn write_export_module(dir: &TempDir) {
    fs::write(dir.path().join("export.json"), r#"{"outputDir": "dist"}"#).unwrap();
}

#[test]
fn test_export_with_descriptor() {
    let dir = create_test_dir(&[
        ("app.en", "+hello=Hi\n-bye=Bye\n"),
        ("app.fr", "+hello=Salut\n"),
    ]);
    write_export_module(&dir);
    let mut store = TranslationStore::new(StoreOptions::new(dir.path())).unwrap();

    // 未加载时先加载
    let report = store.export().unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.entries, 3);
    assert_eq!(store.files().len(), 2);

    let en: serde_json::Value =
        serde_json::from_str(&read(&dir, "dist/en.json")).unwrap();
    assert_eq!(en, serde_json::json!({ "bye": "Bye", "hello": "Hi" }));
    let fr: serde_json::Value =
        serde_json::from_str(&read(&dir, "dist/fr.json")).unwrap();
    assert_eq!(fr, serde_json::json!({ "hello": "Salut" }));
}

#[test]
fn test_export_failures() {
    let dir = hello_dir();
    let mut store = open_store(&dir);
    assert!(matches!(store.export(), Err(StoreError::ExportFailed(_))));

    let broken = create_test_dir(&[("app.en", "+hello=Hi\n+hello=Again\n")]);
    write_export_module(&broken);
    let mut store = open_store(&broken);
    assert!(matches!(store.export(), Err(StoreError::NotResolved(_))));
}

/// 记录调用顺序的导出器
#[derive(Clone, Default)]
struct RecordingExporter {
    calls: Rc<RefCell<Vec<String>>>,
}

impl Exporter for RecordingExporter {
    fn open(&mut self, file: &LocaleFile) -> std::result::Result<(), crate::export::ExportError> {
        self.calls.borrow_mut().push(format!("open {}", file.name));
        Ok(())
    }

    fn write(
        &mut self,
        file: &LocaleFile,
        entry: &TranslationEntry,
    ) -> std::result::Result<(), crate::export::ExportError> {
        self.calls.borrow_mut().push(format!("write {} {}", file.name, entry.key));
        Ok(())
    }

    fn close(&mut self, file: &LocaleFile) -> std::result::Result<(), crate::export::ExportError> {
        self.calls.borrow_mut().push(format!("close {}", file.name));
        Ok(())
    }
}

#[test]
fn test_export_visits_keys_in_order() {
    let dir = create_test_dir(&[("app.en", "+b=B\n+a=A\n"), ("app.fr", "+b=B\n")]);
    let exporter = RecordingExporter::default();
    let calls = exporter.calls.clone();
    let mut store = TranslationStore::new(StoreOptions::new(dir.path()))
        .unwrap()
        .with_exporter(exporter);
    store.load().unwrap();

    store.export().unwrap();

    assert_eq!(
        *calls.borrow(),
        vec![
            "open app.en",
            "write app.en a",
            "write app.en b",
            "close app.en",
            "open app.fr",
            "write app.fr b",
            "close app.fr",
        ]
    );
}

#[test]
fn test_auto_export_is_debounced() {
    let dir = hello_dir();
    write_export_module(&dir);
    let options = StoreOptions::new(dir.path()).with_auto_export(true);
    let mut store = TranslationStore::new(options).unwrap();
    store.load().unwrap();

    assert!(store.export_timer.is_pending());
    store.tick_at(Instant::now()).unwrap();
    assert!(!dir.path().join("dist").exists());

    store.update_value("app.en", "hello", "Hello").unwrap();
    store.tick_at(later()).unwrap();

    let en: serde_json::Value =
        serde_json::from_str(&read(&dir, "dist/en.json")).unwrap();
    assert_eq!(en, serde_json::json!({ "hello": "Hello" }));
}

// === 存储注入 ===

/// 内存存储，记录同时打开的读取器数量
#[derive(Clone, Default)]
struct MemoryStorage {
    files: Rc<RefCell<HashMap<String, Vec<String>>>>,
    open_readers: Rc<Cell<usize>>,
}

impl MemoryStorage {
    fn with_file(self, name: &str, lines: &[&str]) -> Self {
        self.files
            .borrow_mut()
            .insert(name.to_string(), lines.iter().map(|l| l.to_string()).collect());
        self
    }

    fn name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }
}

struct MemoryReader {
    lines: std::vec::IntoIter<String>,
    open_readers: Rc<Cell<usize>>,
}

impl LineReader for MemoryReader {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.next())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.open_readers.set(self.open_readers.get() - 1);
        Ok(())
    }
}

struct MemoryWriter {
    name: String,
    lines: Vec<String>,
    files: Rc<RefCell<HashMap<String, Vec<String>>>>,
}

impl LineWriter for MemoryWriter {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.files.borrow_mut().insert(self.name, self.lines);
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn files_in(&self, _directory: &Path) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = self.files.borrow().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn append_line(&self, path: &Path, line: &str) -> io::Result<()> {
        self.files
            .borrow_mut()
            .entry(Self::name(path))
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    fn line_reader(&self, path: &Path) -> io::Result<Box<dyn LineReader>> {
        let lines = self
            .files
            .borrow()
            .get(&Self::name(path))
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        self.open_readers.set(self.open_readers.get() + 1);
        Ok(Box::new(MemoryReader {
            lines: lines.into_iter(),
            open_readers: self.open_readers.clone(),
        }))
    }

    fn line_writer(&self, path: &Path) -> io::Result<Box<dyn LineWriter>> {
        Ok(Box::new(MemoryWriter {
            name: Self::name(path),
            lines: Vec::new(),
            files: self.files.clone(),
        }))
    }

    fn create_file(&self, path: &Path) -> io::Result<()> {
        let mut files = self.files.borrow_mut();
        let name = Self::name(path);
        if files.contains_key(&name) {
            return Err(io::ErrorKind::AlreadyExists.into());
        }
        files.insert(name, Vec::new());
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.files
            .borrow_mut()
            .remove(&Self::name(path))
            .map(|_| ())
            .ok_or_else(|| io::ErrorKind::NotFound.into())
    }
}

#[test]
fn test_injected_storage() {
    let storage = MemoryStorage::default()
        .with_file("app.en", &["+hello=Hi"])
        .with_file("app.fr", &["+hello=Salut"]);
    let files = storage.files.clone();
    let mut store = TranslationStore::new(StoreOptions::new("virtual"))
        .unwrap()
        .with_storage(storage.clone());
    store.load().unwrap();

    store.add_key("bye").unwrap();
    assert_eq!(files.borrow()["app.fr"], vec!["+hello=Salut", ">-bye="]);

    store.save().unwrap();
    assert_eq!(files.borrow()["app.fr"], vec!["-bye=", "+hello=Salut"]);
    assert_eq!(storage.open_readers.get(), 0);
}

#[test]
fn test_readers_closed_on_failure() {
    let storage = MemoryStorage::default()
        .with_file("app.en", &["+hello=Hi", "+hello=Again"])
        .with_file("app.fr", &["+hello=Salut"]);
    let mut store = TranslationStore::new(StoreOptions::new("virtual"))
        .unwrap()
        .with_storage(storage.clone());
    store.load().unwrap();

    assert!(store.state().error.is_some());
    assert_eq!(storage.open_readers.get(), 0);
}

#[test]
fn test_summary() {
    let dir = create_test_dir(&[
        ("app.en", "+hello=Hi\n-bye=Bye\n"),
        ("app.fr", "+hello=Salut\n"),
    ]);
    let store = open_store(&dir);

    let stats = store.summary();
    assert_eq!(stats.files, 2);
    assert_eq!(stats.keys, 2);
    assert_eq!(stats.translated, 3);
    assert_eq!(stats.approved, 2);
    assert_eq!(stats.missing, 1);
    assert!(stats.to_string().contains("键数量: 2"));
}
