//! Two devices editing the same task list through one engine

use tasksync_core::{TaskEdit, Version};
use tasksync_database::TaskStore;
use tasksync_sync_engine::{EditOutcome, SyncEngine, SyncSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("TaskSync Engine Demo");
    println!("====================\n");

    let store = TaskStore::open_in_memory().await?;
    let engine = SyncEngine::new(store, SyncSettings::default());
    let account = engine.accounts().resolve("demo@example.com").await?;

    // Phone creates a task
    let report = engine
        .apply_batch(&account, vec![TaskEdit::new("t1", 1, "buy milk")])
        .await?;
    println!("phone push:  {:?}", report.results[0].outcome);

    // Laptop pulls everything
    let changes = engine.changes_since(&account, Version::ZERO).await?;
    println!("laptop pull: {} record(s), next_since = {}", changes.len(), changes.next_watermark);
    let laptop_watermark = changes.next_watermark;

    // Phone re-sends an old copy, laptop sends a newer one
    for (device, edit) in [
        ("phone", TaskEdit::new("t1", 1, "buy bread")),
        ("laptop", TaskEdit::new("t1", 2, "buy bread")),
    ] {
        let report = engine.apply_batch(&account, vec![edit]).await?;
        match &report.results[0].outcome {
            EditOutcome::Applied { version } => println!("{device} push: applied as {version}"),
            EditOutcome::Ignored { stored_client_version } => {
                println!("{device} push: stale, store holds client version {stored_client_version}")
            }
            EditOutcome::Rejected { reason } => println!("{device} push: rejected ({reason})"),
        }
    }

    let changes = engine.changes_since(&account, laptop_watermark).await?;
    for record in &changes.records {
        println!("laptop sees {} = {:?} (version {})", record.task_id, record.content, record.version);
    }

    engine.store().clone().close().await;
    Ok(())
}
