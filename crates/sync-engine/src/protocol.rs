//! Request dispatch for the client-facing sync surface
//!
//! Clients send a request name and a JSON argument string on behalf of a
//! signed-in identity:
//!
//! - `tasks` `{"since": n}` pulls changes after watermark `n`
//! - `save` `{"tasks": [{"id": .., "version": .., ...}]}` pushes edits
//!
//! Every reply is a JSON object whose `response` field is `ok`, `signin`
//! (no known identity) or `unknown` (unrecognised request).

use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::types::PushReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tasksync_core::{TaskId, TaskRecord, Version};

/// Status carried in the `response` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Ok,
    Signin,
    Unknown,
}

/// A rejected edit as reported to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: Option<TaskId>,
    pub reason: String,
}

/// Request-specific fields of a response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Tasks {
        next_since: Version,
        tasks: Vec<String>,
    },
    Saved {
        applied: usize,
        stale: Vec<TaskId>,
        rejected: Vec<Rejection>,
    },
    Empty {},
}

/// Reply to one dispatched request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub response: ResponseKind,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn signin() -> Self {
        Self {
            response: ResponseKind::Signin,
            body: ResponseBody::Empty {},
        }
    }

    pub fn unknown() -> Self {
        Self {
            response: ResponseKind::Unknown,
            body: ResponseBody::Empty {},
        }
    }

    /// Builds a pull reply carrying each stored content string unchanged
    pub fn tasks(records: &[TaskRecord], next_since: Version) -> Self {
        let tasks = records.iter().map(|r| r.content.clone()).collect();

        Self {
            response: ResponseKind::Ok,
            body: ResponseBody::Tasks { next_since, tasks },
        }
    }

    /// Builds a push reply from a report
    pub fn saved(report: &PushReport) -> Self {
        let rejected = report
            .rejections()
            .into_iter()
            .map(|(result, reason)| Rejection {
                id: result.task_id.clone(),
                reason: reason.to_string(),
            })
            .collect();

        Self {
            response: ResponseKind::Ok,
            body: ResponseBody::Saved {
                applied: report.applied_count(),
                stale: report.stale_ids().into_iter().cloned().collect(),
                rejected,
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response == ResponseKind::Ok
    }

    pub fn to_json(&self) -> SyncResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_bytes(&self) -> SyncResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Deserialize)]
struct PullArguments {
    #[serde(default)]
    since: Version,
}

#[derive(Debug, Deserialize)]
struct SaveArguments {
    #[serde(default)]
    tasks: Vec<Value>,
}

/// Handles one request for `identity`
///
/// `identity` is whatever the sign-in layer vouched for; an identity with no
/// account yet is told to sign in rather than being created here.
pub async fn dispatch(
    engine: &SyncEngine,
    identity: Option<&str>,
    request: &str,
    arguments: &str,
) -> SyncResult<Response> {
    let account = match identity {
        Some(identity) => engine.accounts().lookup(identity).await?,
        None => None,
    };

    let Some(account) = account else {
        return Ok(Response::signin());
    };

    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };

    match request {
        "tasks" => {
            let args: PullArguments = serde_json::from_str(arguments)?;
            let changes = engine.changes_since(&account, args.since).await?;
            Ok(Response::tasks(&changes.records, changes.next_watermark))
        }
        "save" => {
            let args: SaveArguments = serde_json::from_str(arguments)?;
            let report = engine.apply_raw_batch(&account, args.tasks).await?;
            Ok(Response::saved(&report))
        }
        other => {
            log::debug!("Unknown request {:?} from account {}", other, account.id);
            Ok(Response::unknown())
        }
    }
}
