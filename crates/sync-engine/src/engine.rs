//! Main sync engine

use crate::accounts::AccountResolver;
use crate::conflict::{ConflictResolver, Decision};
use crate::error::{SyncError, SyncResult};
use crate::types::{ChangeSet, EditOutcome, PushReport};
use serde_json::Value;
use std::sync::Arc;
use tasksync_core::{Account, AppError, TaskEdit, TaskId, TaskRecord, Version, VersionClock};
use tasksync_database::TaskStore;
use tasksync_resilience::RetryPolicy;

/// Limits applied by the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Most edits accepted in one push (0 disables the limit)
    pub max_batch_size: usize,
    /// Largest content accepted for a single edit, in bytes (0 disables the limit)
    pub max_content_bytes: usize,
    /// Page size for pulls; `None` returns every change at once
    pub max_pull_records: Option<u32>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            max_content_bytes: 64 * 1024,
            max_pull_records: None,
        }
    }
}

/// Pull and push operations over one task store
///
/// Cloning is cheap and clones share the store and the version clock, so one
/// engine can be handed to every request handler.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: TaskStore,
    clock: Arc<VersionClock>,
    resolver: ConflictResolver,
    settings: SyncSettings,
}

type PendingEdit = Result<TaskEdit, AppError>;

impl SyncEngine {
    /// Creates a new sync engine with its own version clock
    pub fn new(store: TaskStore, settings: SyncSettings) -> Self {
        Self::with_clock(store, Arc::new(VersionClock::new()), settings)
    }

    /// Creates a sync engine whose clock starts above every stored version
    ///
    /// Use this when opening an existing database, so a wall clock that reads
    /// earlier than before a restart cannot issue stamps below a watermark a
    /// client already holds.
    pub async fn open(store: TaskStore, settings: SyncSettings) -> SyncResult<Self> {
        let floor = store.max_version().await?;
        log::debug!("Version clock starts after {}", floor);
        Ok(Self::with_clock(
            store,
            Arc::new(VersionClock::starting_after(floor)),
            settings,
        ))
    }

    /// Creates a sync engine sharing an existing version clock
    pub fn with_clock(store: TaskStore, clock: Arc<VersionClock>, settings: SyncSettings) -> Self {
        Self {
            store,
            clock,
            resolver: ConflictResolver::new(),
            settings,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<VersionClock> {
        &self.clock
    }

    /// Returns an account resolver over the same store
    pub fn accounts(&self) -> AccountResolver {
        AccountResolver::new(self.store.clone())
    }

    /// Returns every record of `account` changed after `watermark`
    ///
    /// Pages by `max_pull_records` when the setting is present.
    pub async fn changes_since(&self, account: &Account, watermark: Version) -> SyncResult<ChangeSet> {
        if let Some(limit) = self.settings.max_pull_records {
            return self.changes_since_limited(account, watermark, limit).await;
        }

        self.ensure_account(account).await?;
        let records = self.store.scan_since(account.id, watermark).await?;
        check_owner(account, &records)?;
        let changes = ChangeSet::new(records, watermark);

        log::debug!(
            "Pull for account {} since {}: {} records, next {}",
            account.id,
            watermark,
            changes.len(),
            changes.next_watermark
        );
        Ok(changes)
    }

    /// Returns one page of changes after `watermark`
    ///
    /// The page is cut after about `limit` records (never splitting records
    /// that share a version); the caller fetches the next page with the
    /// returned watermark.
    pub async fn changes_since_limited(
        &self,
        account: &Account,
        watermark: Version,
        limit: u32,
    ) -> SyncResult<ChangeSet> {
        let limit = self
            .settings
            .max_pull_records
            .map_or(limit, |max| limit.min(max))
            .max(1);

        self.ensure_account(account).await?;
        let records = self
            .store
            .scan_since_limited(account.id, watermark, limit)
            .await?;
        check_owner(account, &records)?;

        let more_available = records.len() >= limit as usize;
        let mut changes = ChangeSet::new(records, watermark);
        changes.more_available = more_available;

        log::debug!(
            "Paged pull for account {} since {}: {} records (limit {}), next {}",
            account.id,
            watermark,
            changes.len(),
            limit,
            changes.next_watermark
        );
        Ok(changes)
    }

    /// Applies pushed edits in order, each one independently
    ///
    /// Stale and malformed edits are reported per edit and do not stop the
    /// batch. A store failure stops it with [`SyncError::BatchAborted`]; the
    /// edits after the failed one can be resubmitted as-is.
    pub async fn apply_batch(&self, account: &Account, edits: Vec<TaskEdit>) -> SyncResult<PushReport> {
        self.process(account, edits.into_iter().map(Ok).collect(), 0)
            .await
    }

    /// Applies edits in transport form: JSON objects with `id` and `version`
    ///
    /// The whole object becomes the stored content, re-serialized compactly.
    /// Objects that cannot be read are rejected individually.
    pub async fn apply_raw_batch(&self, account: &Account, items: Vec<Value>) -> SyncResult<PushReport> {
        let edits = items.iter().map(parse_edit).collect();
        self.process(account, edits, 0).await
    }

    /// Like [`apply_batch`](Self::apply_batch), resubmitting the unprocessed
    /// remainder after retryable store failures
    pub async fn apply_batch_with_retry(
        &self,
        account: &Account,
        edits: Vec<TaskEdit>,
        policy: &RetryPolicy,
    ) -> SyncResult<PushReport> {
        self.process_with_retry(account, edits, |edit| Ok(edit.clone()), policy)
            .await
    }

    /// Like [`apply_raw_batch`](Self::apply_raw_batch), resubmitting the
    /// unprocessed remainder after retryable store failures
    ///
    /// Report indices are positions in `items`, malformed items included.
    pub async fn apply_raw_batch_with_retry(
        &self,
        account: &Account,
        items: Vec<Value>,
        policy: &RetryPolicy,
    ) -> SyncResult<PushReport> {
        self.process_with_retry(account, items, parse_edit, policy)
            .await
    }

    async fn process_with_retry<T, F>(
        &self,
        account: &Account,
        items: Vec<T>,
        to_edit: F,
        policy: &RetryPolicy,
    ) -> SyncResult<PushReport>
    where
        F: Fn(&T) -> PendingEdit,
    {
        let total = items.len();
        let mut remaining = items;
        let mut done = 0;
        let mut report = PushReport::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let pending = remaining.iter().map(&to_edit).collect();
            let (processed, source) = match self.process(account, pending, done).await {
                Ok(rest) => {
                    report.merge(rest);
                    return Ok(report);
                }
                Err(SyncError::BatchAborted {
                    processed,
                    partial,
                    source,
                    ..
                }) => {
                    report.merge(partial);
                    (processed, source)
                }
                Err(SyncError::App(source)) if done == 0 && !source.is_retryable() => {
                    return Err(SyncError::App(source));
                }
                Err(SyncError::App(source)) => (0, source),
                Err(other) => return Err(other),
            };

            done += processed;
            remaining.drain(..processed);

            if !source.is_retryable() {
                return Err(SyncError::BatchAborted {
                    processed: done,
                    total,
                    partial: report,
                    source,
                });
            }

            if attempt >= policy.max_attempts() {
                return Err(SyncError::RetriesExhausted {
                    attempts: attempt,
                    processed: done,
                    total,
                    partial: report,
                    last_error: source,
                });
            }

            let delay = policy.delay_for_attempt(attempt);
            log::warn!(
                "Push for account {} stopped at edit {}/{}: {}; retrying in {:?}",
                account.id,
                done,
                total,
                source,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn process(
        &self,
        account: &Account,
        edits: Vec<PendingEdit>,
        first_index: usize,
    ) -> SyncResult<PushReport> {
        let total = edits.len();
        let limit = self.settings.max_batch_size;
        if limit > 0 && total > limit {
            return Err(SyncError::BatchTooLarge { size: total, limit });
        }

        self.ensure_account(account).await?;

        let mut report = PushReport::new();
        for (offset, pending) in edits.into_iter().enumerate() {
            let index = first_index + offset;

            let edit = match pending {
                Ok(edit) => edit,
                Err(e) => {
                    log::debug!("Rejected edit #{} for account {}: {}", index, account.id, e);
                    let (task_id, reason) = rejection(e);
                    report.record(index, task_id, EditOutcome::Rejected { reason });
                    continue;
                }
            };

            match self.apply_edit(account, &edit).await {
                Ok(outcome) => report.record(index, Some(edit.task_id), outcome),
                Err(source) => {
                    return Err(SyncError::BatchAborted {
                        processed: offset,
                        total,
                        partial: report,
                        source,
                    })
                }
            }
        }

        log::info!(
            "Push for account {}: {} applied, {} stale, {} rejected",
            account.id,
            report.applied_count(),
            report.stale_ids().len(),
            report.rejections().len()
        );
        Ok(report)
    }

    async fn apply_edit(&self, account: &Account, edit: &TaskEdit) -> Result<EditOutcome, AppError> {
        if let Err(e) = edit.check() {
            let (_, reason) = rejection(e);
            return Ok(EditOutcome::Rejected { reason });
        }

        let limit = self.settings.max_content_bytes;
        if limit > 0 && edit.content.len() > limit {
            return Ok(EditOutcome::Rejected {
                reason: format!(
                    "Content is {} bytes, the limit is {}",
                    edit.content.len(),
                    limit
                ),
            });
        }

        let existing = self.store.get(account.id, &edit.task_id).await?;

        match (self.resolver.resolve(existing.as_ref(), edit), existing) {
            (Decision::Ignore, Some(stored)) => {
                log::debug!(
                    "Ignoring stale edit of {} (client version {} <= stored {})",
                    edit.task_id,
                    edit.client_version,
                    stored.client_version
                );
                Ok(EditOutcome::Ignored {
                    stored_client_version: stored.client_version,
                })
            }
            _ => {
                let record = TaskRecord::from_edit(account.id, edit, self.clock.next());
                match self.store.upsert_if_newer(&record).await? {
                    Some(version) => Ok(EditOutcome::Applied { version }),
                    None => {
                        // A concurrent push stored an equal-or-newer edit first
                        let held = self
                            .store
                            .get(account.id, &edit.task_id)
                            .await?
                            .map_or(edit.client_version, |r| r.client_version);
                        log::debug!("Edit of {} lost a race to client version {}", edit.task_id, held);
                        Ok(EditOutcome::Ignored {
                            stored_client_version: held,
                        })
                    }
                }
            }
        }
    }

    async fn ensure_account(&self, account: &Account) -> Result<(), AppError> {
        if self.store.account_exists(account.id).await? {
            Ok(())
        } else {
            Err(AppError::unknown_account(account.id))
        }
    }
}

/// Reads one transport edit: `{"id": ..., "version": ..., ...}`
pub fn parse_edit(item: &Value) -> Result<TaskEdit, AppError> {
    let object = item
        .as_object()
        .ok_or_else(|| AppError::malformed(None, "Edit must be a JSON object"))?;

    let id = match object.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(AppError::malformed(None, "Missing task id")),
    };

    let version = match object.get("version") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::malformed(Some(&id), "Missing or non-integer version"))?;

    let content = serde_json::to_string(item).map_err(|e| AppError::malformed(Some(&id), e.to_string()))?;

    Ok(TaskEdit::new(id, version, content))
}

fn check_owner(account: &Account, records: &[TaskRecord]) -> Result<(), AppError> {
    match records.iter().find(|r| !r.is_owned_by(account.id)) {
        Some(stray) => Err(AppError::StorageCorrupted {
            details: format!(
                "Scan for account {} returned task {} of account {}",
                account.id, stray.task_id, stray.owner
            ),
        }),
        None => Ok(()),
    }
}

fn rejection(error: AppError) -> (Option<TaskId>, String) {
    match error {
        AppError::MalformedEdit { task_id, reason } => (task_id.map(TaskId::new), reason),
        other => (None, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup() -> (SyncEngine, Account) {
        let store = TaskStore::open_in_memory().await.unwrap();
        let engine = SyncEngine::new(store, SyncSettings::default());
        let account = engine.accounts().resolve("a@example.com").await.unwrap();
        (engine, account)
    }

    #[test]
    fn test_parse_edit() {
        let edit = parse_edit(&json!({"id": "t1", "version": 3, "title": "buy milk"})).unwrap();
        assert_eq!(edit.task_id, TaskId::new("t1"));
        assert_eq!(edit.client_version, Version::from_raw(3));

        let content: Value = serde_json::from_str(&edit.content).unwrap();
        assert_eq!(content["title"], "buy milk");
    }

    #[test]
    fn test_parse_edit_accepts_numeric_strings() {
        let edit = parse_edit(&json!({"id": 42, "version": "7"})).unwrap();
        assert_eq!(edit.task_id, TaskId::new("42"));
        assert_eq!(edit.client_version, Version::from_raw(7));
    }

    #[test]
    fn test_parse_edit_rejects_bad_input() {
        assert!(matches!(
            parse_edit(&json!("t1")),
            Err(AppError::MalformedEdit { task_id: None, .. })
        ));
        assert!(matches!(
            parse_edit(&json!({"version": 1})),
            Err(AppError::MalformedEdit { task_id: None, .. })
        ));
        assert!(matches!(
            parse_edit(&json!({"id": "t1", "version": 1.5})),
            Err(AppError::MalformedEdit { task_id: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn test_applied_edit_gets_server_stamp() {
        let (engine, account) = setup().await;

        let report = engine
            .apply_batch(&account, vec![TaskEdit::new("t1", 1, "buy milk")])
            .await
            .unwrap();

        match report.outcome_for(&TaskId::new("t1")) {
            Some(EditOutcome::Applied { version }) => {
                assert!(*version > Version::from_raw(1));
                assert_eq!(*version, engine.clock().last_issued());
            }
            other => panic!("Expected Applied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stale_edit_reports_stored_client_version() {
        let (engine, account) = setup().await;
        engine
            .apply_batch(&account, vec![TaskEdit::new("t1", 4, "v4")])
            .await
            .unwrap();

        let report = engine
            .apply_batch(&account, vec![TaskEdit::new("t1", 2, "v2")])
            .await
            .unwrap();

        assert_eq!(
            report.outcome_for(&TaskId::new("t1")),
            Some(&EditOutcome::Ignored {
                stored_client_version: Version::from_raw(4)
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_edits_do_not_stop_batch() {
        let (engine, account) = setup().await;

        let report = engine
            .apply_batch(
                &account,
                vec![
                    TaskEdit::new("", 1, "no id"),
                    TaskEdit::new("t2", -1, "negative"),
                    TaskEdit::new("t3", 1, "fine"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert!(report.results[0].outcome.is_rejected());
        assert!(report.results[1].outcome.is_rejected());
        assert!(report.results[2].outcome.is_applied());
        assert_eq!(engine.store().count_tasks(account.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oversized_content_rejected() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let settings = SyncSettings {
            max_content_bytes: 8,
            ..SyncSettings::default()
        };
        let engine = SyncEngine::new(store, settings);
        let account = engine.accounts().resolve("a@example.com").await.unwrap();

        let report = engine
            .apply_batch(
                &account,
                vec![TaskEdit::new("big", 1, "0123456789"), TaskEdit::new("small", 1, "ok")],
            )
            .await
            .unwrap();

        assert!(report.results[0].outcome.is_rejected());
        assert!(report.results[1].outcome.is_applied());
    }

    #[tokio::test]
    async fn test_batch_too_large_touches_nothing() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let settings = SyncSettings {
            max_batch_size: 2,
            ..SyncSettings::default()
        };
        let engine = SyncEngine::new(store, settings);
        let account = engine.accounts().resolve("a@example.com").await.unwrap();

        let edits = (0..3).map(|i| TaskEdit::new(format!("t{}", i), 1, "x")).collect();
        let result = engine.apply_batch(&account, edits).await;

        assert!(matches!(result, Err(SyncError::BatchTooLarge { size: 3, limit: 2 })));
        assert_eq!(engine.store().count_tasks(account.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_limits_accept_anything() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let settings = SyncSettings {
            max_batch_size: 0,
            max_content_bytes: 0,
            max_pull_records: None,
        };
        let engine = SyncEngine::new(store, settings);
        let account = engine.accounts().resolve("a@example.com").await.unwrap();

        let mut edits: Vec<TaskEdit> = (0..1001)
            .map(|i| TaskEdit::new(format!("t{}", i), 1, "x"))
            .collect();
        edits.push(TaskEdit::new("big", 1, "x".repeat(100 * 1024)));
        let report = engine.apply_batch(&account, edits).await.unwrap();

        assert_eq!(report.applied_count(), 1002);
    }

    #[tokio::test]
    async fn test_unknown_account_rejected() {
        let (engine, _) = setup().await;
        let ghost = Account::new(tasksync_core::AccountId::from_raw(999), "ghost@example.com");

        let pull = engine.changes_since(&ghost, Version::ZERO).await;
        assert!(matches!(pull, Err(SyncError::App(AppError::UnknownAccount { .. }))));

        let push = engine
            .apply_batch(&ghost, vec![TaskEdit::new("t1", 1, "x")])
            .await;
        assert!(matches!(push, Err(SyncError::App(AppError::UnknownAccount { .. }))));
    }

    #[tokio::test]
    async fn test_unknown_account_same_error_with_retry() {
        let (engine, _) = setup().await;
        let ghost = Account::new(tasksync_core::AccountId::from_raw(999), "ghost@example.com");
        let policy = RetryPolicy::new(3);

        let push = engine
            .apply_batch_with_retry(&ghost, vec![TaskEdit::new("t1", 1, "x")], &policy)
            .await;
        assert!(matches!(push, Err(SyncError::App(AppError::UnknownAccount { .. }))));

        let raw = engine
            .apply_raw_batch_with_retry(&ghost, vec![json!({"id": "t1", "version": 1})], &policy)
            .await;
        assert!(matches!(raw, Err(SyncError::App(AppError::UnknownAccount { .. }))));
    }

    #[tokio::test]
    async fn test_raw_batch_with_retry_keeps_item_positions() {
        let (engine, account) = setup().await;

        let report = engine
            .apply_raw_batch_with_retry(
                &account,
                vec![
                    json!({"id": "t1", "version": 1}),
                    json!({"version": 1}),
                    json!({"id": "t3", "version": 1}),
                ],
                &RetryPolicy::new(2),
            )
            .await
            .unwrap();

        assert_eq!(report.applied_count(), 2);
        let rejected: Vec<usize> = report.rejections().iter().map(|(r, _)| r.index).collect();
        assert_eq!(rejected, vec![1]);
        assert_eq!(report.results[2].task_id, Some(TaskId::new("t3")));
    }

    #[tokio::test]
    async fn test_open_starts_clock_above_stored_versions() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let account = store.find_or_create_account("a@example.com").await.unwrap();
        let future = Version::from_raw(i64::MAX / 2);
        store
            .upsert(&TaskRecord {
                owner: account.id,
                task_id: TaskId::new("t1"),
                version: future,
                client_version: Version::from_raw(1),
                content: "from a fast clock".to_string(),
            })
            .await
            .unwrap();

        let engine = SyncEngine::open(store, SyncSettings::default()).await.unwrap();
        let report = engine
            .apply_batch(&account, vec![TaskEdit::new("t2", 1, "later")])
            .await
            .unwrap();

        match report.outcome_for(&TaskId::new("t2")) {
            Some(EditOutcome::Applied { version }) => assert!(*version > future),
            other => panic!("Expected Applied, got {:?}", other),
        }

        let changes = engine.changes_since(&account, future).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.records[0].task_id, TaskId::new("t2"));
    }

    #[test]
    fn test_check_owner_flags_foreign_records() {
        let alice = Account::new(tasksync_core::AccountId::from_raw(1), "a@example.com");
        let record = |owner: i64| TaskRecord {
            owner: tasksync_core::AccountId::from_raw(owner),
            task_id: TaskId::new("t1"),
            version: Version::from_raw(5),
            client_version: Version::from_raw(1),
            content: String::new(),
        };

        assert!(check_owner(&alice, &[record(1)]).is_ok());
        assert!(matches!(
            check_owner(&alice, &[record(1), record(2)]),
            Err(AppError::StorageCorrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_raw_batch_stores_whole_object() {
        let (engine, account) = setup().await;

        let report = engine
            .apply_raw_batch(
                &account,
                vec![
                    json!({"id": "t1", "version": 1, "title": "buy milk", "done": false}),
                    json!({"title": "no id"}),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.rejections().len(), 1);
        assert_eq!(report.rejections()[0].0.index, 1);

        let stored = engine
            .store()
            .get(account.id, &TaskId::new("t1"))
            .await
            .unwrap()
            .unwrap();
        let content: Value = serde_json::from_str(&stored.content).unwrap();
        assert_eq!(content, json!({"id": "t1", "version": 1, "title": "buy milk", "done": false}));
    }

    #[tokio::test]
    async fn test_paged_pull() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let settings = SyncSettings {
            max_pull_records: Some(2),
            ..SyncSettings::default()
        };
        let engine = SyncEngine::new(store, settings);
        let account = engine.accounts().resolve("a@example.com").await.unwrap();

        let edits = (0..5).map(|i| TaskEdit::new(format!("t{}", i), 1, "x")).collect();
        engine.apply_batch(&account, edits).await.unwrap();

        let mut watermark = Version::ZERO;
        let mut seen = Vec::new();
        loop {
            let page = engine.changes_since(&account, watermark).await.unwrap();
            assert!(page.len() <= 2);
            seen.extend(page.records.iter().map(|r| r.task_id.clone()));
            watermark = page.next_watermark;
            if !page.more_available {
                break;
            }
        }

        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_limited_pull_respects_configured_maximum() {
        let store = TaskStore::open_in_memory().await.unwrap();
        let settings = SyncSettings {
            max_pull_records: Some(1),
            ..SyncSettings::default()
        };
        let engine = SyncEngine::new(store, settings);
        let account = engine.accounts().resolve("a@example.com").await.unwrap();
        engine
            .apply_batch(&account, vec![TaskEdit::new("a", 1, "a"), TaskEdit::new("b", 1, "b")])
            .await
            .unwrap();

        let page = engine
            .changes_since_limited(&account, Version::ZERO, 100)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert!(page.more_available);
    }
}
