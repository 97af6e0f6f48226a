use anyhow::{bail, Context, Result};
use console::style;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tasksync_config::{Config, ConfigManager, SyncConfig};
use tasksync_core::{Account, AppError, Version};
use tasksync_database::{current_version, optimize, DatabaseConfig, TaskStore};
use tasksync_resilience::{with_retry_if, RetryPolicy};
use tasksync_sync_engine::compression::encode_body;
use tasksync_sync_engine::{dispatch, PushReport, Response, SyncEngine, SyncSettings};

/// Maps the `[sync]` config section onto engine limits
pub fn sync_settings(config: &SyncConfig) -> SyncSettings {
    SyncSettings {
        max_batch_size: config.max_batch_size,
        max_content_bytes: config.max_content_bytes,
        max_pull_records: config.pull_limit(),
    }
}

/// Retry policy for pushes and for opening the store
pub fn retry_policy(config: &SyncConfig) -> RetryPolicy {
    RetryPolicy::new(config.retry_attempts as usize)
        .with_initial_delay(Duration::from_millis(config.retry_initial_delay_ms))
}

pub fn database_config(config: &Config, db_path: &Path) -> DatabaseConfig {
    DatabaseConfig::new(db_path.to_string_lossy().into_owned())
        .with_max_connections(config.server.max_connections)
        .with_wal(config.server.enable_wal)
        .with_busy_timeout(Duration::from_millis(config.server.busy_timeout_ms))
}

/// Opens the store (retrying while it is busy), and provisions configured accounts
pub async fn open_engine(config: &Config, db_path: &Path) -> Result<SyncEngine> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db_config = database_config(config, db_path);
    let store = with_retry_if(
        &retry_policy(&config.sync),
        AppError::is_retryable,
        || TaskStore::open(db_config.clone()),
    )
    .await
    .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let engine = SyncEngine::open(store, sync_settings(&config.sync))
        .await
        .context("Failed to read stored versions")?;
    engine
        .accounts()
        .ensure(&config.server.accounts)
        .await
        .context("Failed to provision configured accounts")?;

    Ok(engine)
}

/// Reports the state of a freshly opened database
pub async fn init(engine: &SyncEngine, db_path: &Path) -> Result<()> {
    engine
        .store()
        .verify_integrity()
        .await
        .context("Database integrity check failed")?;

    optimize(engine.store().pool())
        .await
        .context("Failed to optimize database")?;

    let accounts = engine
        .store()
        .list_accounts()
        .await
        .context("Failed to list accounts")?;

    println!("{} Database ready at {}", style("✓").green().bold(), db_path.display());
    println!("  Schema version: {}", current_version());
    println!("  Accounts: {}", accounts.len());

    Ok(())
}

/// Resolves an identity and prints its account
pub async fn show_account(engine: &SyncEngine, identity: &str) -> Result<()> {
    let account = engine
        .accounts()
        .resolve(identity)
        .await
        .context("Failed to resolve account")?;

    let tasks = engine
        .store()
        .count_tasks(account.id)
        .await
        .context("Failed to count tasks")?;

    println!("\n{}", style(&account.external_identity).bold().cyan());
    println!("  Account ID: {}", account.id);
    println!("  Tasks: {}", tasks);
    if let Some(extra) = &account.extra {
        println!("  Extra: {}", extra);
    }

    Ok(())
}

/// Prints the pull response for `identity`, or writes it gzipped to stdout
pub async fn pull(engine: &SyncEngine, identity: &str, since: Version, gzip: bool) -> Result<()> {
    let account = known_account(engine, identity).await?;

    let changes = engine
        .changes_since(&account, since)
        .await
        .context("Failed to read changes")?;
    let response = Response::tasks(&changes.records, changes.next_watermark);

    if gzip {
        let body = response.to_bytes().context("Failed to encode response")?;
        let encoded = encode_body(body, Some("gzip")).context("Failed to compress response")?;
        eprintln!(
            "Content-Encoding: {}",
            encoded.content_encoding.unwrap_or("identity")
        );
        std::io::stdout()
            .write_all(&encoded.body)
            .context("Failed to write response")?;
    } else {
        print_json(&response)?;
    }

    if changes.more_available {
        eprintln!(
            "{} More changes available; pull again with --since {}",
            style("…").yellow(),
            changes.next_watermark
        );
    }

    Ok(())
}

/// Applies the edits in `file` and prints what happened to each
///
/// Report indices are positions in the file.
pub async fn push(
    engine: &SyncEngine,
    identity: &str,
    file: &str,
    policy: &RetryPolicy,
) -> Result<PushReport> {
    let account = known_account(engine, identity).await?;

    let contents =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
    let items = edits_from_json(&contents).with_context(|| format!("Invalid edit file {}", file))?;

    let report = engine
        .apply_raw_batch_with_retry(&account, items, policy)
        .await
        .context("Push failed")?;

    print_report(&report);
    Ok(report)
}

/// Dispatches one protocol request and prints the reply
pub async fn request(engine: &SyncEngine, identity: &str, name: &str, arguments: &str) -> Result<()> {
    let response = dispatch(engine, Some(identity), name, arguments)
        .await
        .context("Request failed")?;

    print_json(&response)
}

pub fn show_config(manager: &ConfigManager, config: &Config) -> Result<()> {
    println!("# {}", manager.config_path().display());
    print!("{}", config.to_toml().context("Failed to render configuration")?);
    Ok(())
}

pub fn init_config(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default configuration")?;

    if created {
        println!("{} Wrote {}", style("✓").green().bold(), manager.config_path().display());
    } else {
        println!("Config already exists at {}", manager.config_path().display());
    }
    Ok(())
}

pub fn validate_config(manager: &ConfigManager) -> Result<()> {
    let errors = manager.validate().context("Failed to read configuration")?;

    if errors.is_empty() {
        println!("{} Configuration is valid", style("✓").green().bold());
        return Ok(());
    }

    for error in &errors {
        println!("{} {}", style("✗").red(), error);
    }
    bail!("{} invalid configuration value(s)", errors.len())
}

async fn known_account(engine: &SyncEngine, identity: &str) -> Result<Account> {
    match engine.accounts().lookup(identity).await? {
        Some(account) => Ok(account),
        None => bail!(
            "No account for '{}'; create it with `tasksync account {}`",
            identity,
            identity
        ),
    }
}

/// Accepts a bare array of edits or a `save` argument object
fn edits_from_json(contents: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(contents)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("tasks") {
            Some(Value::Array(items)) => Ok(items),
            _ => bail!("Expected a \"tasks\" array"),
        },
        _ => bail!("Expected a JSON array of edits"),
    }
}

fn print_report(report: &PushReport) {
    println!(
        "{} {} applied",
        style("✓").green().bold(),
        style(report.applied_count()).bold()
    );

    let stale = report.stale_ids();
    if !stale.is_empty() {
        let ids: Vec<&str> = stale.iter().map(|id| id.as_str()).collect();
        println!("{} {} stale: {}", style("!").yellow(), stale.len(), ids.join(", "));
    }

    for (result, reason) in report.rejections() {
        let id = result.task_id.as_ref().map_or("?", |id| id.as_str());
        println!(
            "{} Edit #{} ({}) rejected: {}",
            style("✗").red(),
            result.index,
            id,
            reason
        );
    }
}

fn print_json(response: &Response) -> Result<()> {
    let json = response.to_json().context("Failed to encode response")?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests;
