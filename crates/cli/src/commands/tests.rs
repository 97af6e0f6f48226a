use super::*;
use tasksync_core::TaskId;
use tempfile::TempDir;

fn test_config(accounts: &[&str]) -> Config {
    let mut config = Config::default();
    config.server.accounts = accounts.iter().map(|a| a.to_string()).collect();
    config.sync.retry_initial_delay_ms = 1;
    config
}

#[tokio::test]
async fn test_open_engine_creates_database_and_accounts() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("tasks.db");
    let config = test_config(&["a@example.com", "b@example.com"]);

    let engine = open_engine(&config, &db_path).await.unwrap();

    assert!(db_path.exists());
    let accounts = engine.store().list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 2);

    init(&engine, &db_path).await.unwrap();
}

#[tokio::test]
async fn test_open_engine_twice_keeps_accounts() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");
    let config = test_config(&["a@example.com"]);

    let first = open_engine(&config, &db_path).await.unwrap();
    let id = first.accounts().lookup("a@example.com").await.unwrap().unwrap().id;
    first.store().clone().close().await;

    let second = open_engine(&config, &db_path).await.unwrap();
    let again = second.accounts().lookup("a@example.com").await.unwrap().unwrap();
    assert_eq!(again.id, id);
}

#[test]
fn test_sync_settings_from_config() {
    let mut config = SyncConfig::default();
    config.max_batch_size = 10;
    config.max_pull_records = 0;

    let settings = sync_settings(&config);
    assert_eq!(settings.max_batch_size, 10);
    assert_eq!(settings.max_pull_records, None);

    config.max_pull_records = 25;
    assert_eq!(sync_settings(&config).max_pull_records, Some(25));
}

#[test]
fn test_retry_policy_from_config() {
    let config = SyncConfig {
        retry_attempts: 4,
        retry_initial_delay_ms: 20,
        ..SyncConfig::default()
    };

    let policy = retry_policy(&config);
    assert_eq!(policy.max_attempts(), 4);
    assert_eq!(policy.initial_delay(), Duration::from_millis(20));
}

#[test]
fn test_database_config_from_config() {
    let mut config = Config::default();
    config.server.max_connections = 3;
    config.server.enable_wal = false;

    let db_config = database_config(&config, Path::new("/tmp/tasks.db"));
    assert_eq!(db_config.path, "/tmp/tasks.db");
    assert_eq!(db_config.max_connections, 3);
    assert!(!db_config.enable_wal);
}

#[test]
fn test_edits_from_json_accepts_both_shapes() {
    let bare = edits_from_json(r#"[{"id": "t1", "version": 1}]"#).unwrap();
    assert_eq!(bare.len(), 1);

    let wrapped = edits_from_json(r#"{"tasks": [{"id": "t1", "version": 1}, {"id": "t2", "version": 1}]}"#).unwrap();
    assert_eq!(wrapped.len(), 2);

    assert!(edits_from_json(r#"{"items": []}"#).is_err());
    assert!(edits_from_json("42").is_err());
    assert!(edits_from_json("not json").is_err());
}

#[tokio::test]
async fn test_push_file_then_pull() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");
    let config = test_config(&["a@example.com"]);
    let engine = open_engine(&config, &db_path).await.unwrap();

    let file = temp_dir.path().join("edits.json");
    std::fs::write(
        &file,
        r#"[{"id": "t1", "version": 1, "title": "buy milk"}, {"id": "t2", "version": 1}]"#,
    )
    .unwrap();

    let report = push(
        &engine,
        "a@example.com",
        file.to_str().unwrap(),
        &retry_policy(&config.sync),
    )
    .await
    .unwrap();
    assert_eq!(report.applied_count(), 2);

    let account = engine.accounts().lookup("a@example.com").await.unwrap().unwrap();
    assert_eq!(engine.store().count_tasks(account.id).await.unwrap(), 2);

    pull(&engine, "a@example.com", Version::ZERO, false).await.unwrap();
}

#[tokio::test]
async fn test_push_reports_rejections_at_file_positions() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");
    let config = test_config(&["a@example.com"]);
    let engine = open_engine(&config, &db_path).await.unwrap();

    let file = temp_dir.path().join("edits.json");
    std::fs::write(
        &file,
        r#"{"tasks": [
            {"id": "t1", "version": 1},
            {"version": 2},
            {"id": "t3", "version": 1},
            "not an edit",
            {"id": "t5", "version": 1}
        ]}"#,
    )
    .unwrap();

    let report = push(
        &engine,
        "a@example.com",
        file.to_str().unwrap(),
        &retry_policy(&config.sync),
    )
    .await
    .unwrap();

    assert_eq!(report.len(), 5);
    assert_eq!(report.applied_count(), 3);
    let rejected: Vec<usize> = report.rejections().iter().map(|(r, _)| r.index).collect();
    assert_eq!(rejected, vec![1, 3]);
    assert_eq!(report.results[4].task_id, Some(TaskId::new("t5")));
}

#[tokio::test]
async fn test_open_engine_clock_resumes_above_stored_versions() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");
    let config = test_config(&["a@example.com"]);

    let first = open_engine(&config, &db_path).await.unwrap();
    let account = first.accounts().lookup("a@example.com").await.unwrap().unwrap();
    first
        .apply_batch(&account, vec![tasksync_core::TaskEdit::new("t1", 1, "x")])
        .await
        .unwrap();
    let stamped = first.clock().last_issued();
    first.store().clone().close().await;

    let second = open_engine(&config, &db_path).await.unwrap();
    assert!(second.clock().last_issued() >= stamped);
}

#[tokio::test]
async fn test_pull_unknown_identity_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");
    let engine = open_engine(&test_config(&[]), &db_path).await.unwrap();

    let result = pull(&engine, "nobody@example.com", Version::ZERO, false).await;
    assert!(result.is_err());
    assert!(engine.accounts().lookup("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_request_dispatches() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");
    let engine = open_engine(&test_config(&["a@example.com"]), &db_path)
        .await
        .unwrap();

    request(
        &engine,
        "a@example.com",
        "save",
        r#"{"tasks": [{"id": "t1", "version": 1}]}"#,
    )
    .await
    .unwrap();

    let account = engine.accounts().lookup("a@example.com").await.unwrap().unwrap();
    assert_eq!(engine.store().count_tasks(account.id).await.unwrap(), 1);

    assert!(request(&engine, "a@example.com", "tasks", "{oops").await.is_err());
}

#[test]
fn test_config_commands() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf()).unwrap();

    init_config(&manager).unwrap();
    assert!(manager.config_path().exists());
    init_config(&manager).unwrap();

    validate_config(&manager).unwrap();
    show_config(&manager, &Config::default()).unwrap();

    std::fs::write(manager.config_path(), "[sync]\nretry_attempts = 0\n").unwrap();
    assert!(validate_config(&manager).is_err());
}
