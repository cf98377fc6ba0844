//! Function calls emitted by the assistant
//!
//! The assistant can only request the four task mutations below. Each
//! applied call is answered with an acknowledgement so the conversation can
//! carry on even when the mutation failed.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::tasks::{Lookup, NewTask, StoreError, TaskStore, TaskUpdates};

use super::sdk::SdkMessage;

/// Functions the assistant may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionName {
    AddTask,
    UpdateTask,
    DeleteTask,
    CompleteTask,
}

impl FunctionName {
    pub const ALL: [FunctionName; 4] = [
        FunctionName::AddTask,
        FunctionName::UpdateTask,
        FunctionName::DeleteTask,
        FunctionName::CompleteTask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionName::AddTask => "add_task",
            FunctionName::UpdateTask => "update_task",
            FunctionName::DeleteTask => "delete_task",
            FunctionName::CompleteTask => "complete_task",
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown function: {0}")]
pub struct UnknownFunction(pub String);

impl FromStr for FunctionName {
    type Err = UnknownFunction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownFunction(s.to_string()))
    }
}

/// Why a function call could not be applied
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    task_title: String,
    #[serde(default)]
    subtask_title: Option<String>,
    #[serde(default)]
    updates: TaskUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetArgs {
    task_title: String,
    #[serde(default)]
    subtask_title: Option<String>,
}

fn subtask_lookup(title: Option<String>) -> Option<Lookup> {
    title.filter(|t| !t.trim().is_empty()).map(Lookup::Title)
}

/// Result reported back to the assistant for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAck {
    pub function: FunctionName,
    pub outcome: Result<(), String>,
}

impl FunctionAck {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// JSON string placed in the function message content
    pub fn content(&self) -> String {
        match &self.outcome {
            Ok(()) => json!({ "result": format!("{} executed successfully", self.function) }),
            Err(error) => json!({ "error": error }),
        }
        .to_string()
    }

    pub fn into_message(self) -> SdkMessage {
        SdkMessage::function_result(self.function.as_str(), self.content())
    }
}

/// Apply one assistant function call to the store.
///
/// Returns `None` for names outside the known set; those are ignored.
pub fn dispatch(store: &mut TaskStore, name: &str, args: Value) -> Option<FunctionAck> {
    let function = match name.parse::<FunctionName>() {
        Ok(function) => function,
        Err(e) => {
            warn!(%e, "ignoring function call");
            return None;
        }
    };

    info!(%function, "applying function call");
    let outcome = apply(store, function, args).map_err(|e| {
        warn!(%function, error = %e, "function call failed");
        e.to_string()
    });

    Some(FunctionAck { function, outcome })
}

fn apply(store: &mut TaskStore, function: FunctionName, args: Value) -> Result<(), FunctionError> {
    let args = normalize_args(args)?;
    match function {
        FunctionName::AddTask => {
            let task: NewTask = serde_json::from_value(args)?;
            store.add(task);
        }
        FunctionName::UpdateTask => {
            let args: UpdateArgs = serde_json::from_value(args)?;
            let subtask = subtask_lookup(args.subtask_title);
            store.update(&Lookup::title(args.task_title), subtask.as_ref(), &args.updates)?;
        }
        FunctionName::DeleteTask => {
            let args: TargetArgs = serde_json::from_value(args)?;
            let subtask = subtask_lookup(args.subtask_title);
            store.delete(&Lookup::title(args.task_title), subtask.as_ref())?;
        }
        FunctionName::CompleteTask => {
            let args: TargetArgs = serde_json::from_value(args)?;
            let subtask = subtask_lookup(args.subtask_title);
            store.complete(&Lookup::title(args.task_title), subtask.as_ref())?;
        }
    }
    Ok(())
}

// Some SDK versions deliver arguments as a JSON-encoded string.
fn normalize_args(args: Value) -> Result<Value, serde_json::Error> {
    match args {
        Value::String(raw) => serde_json::from_str(&raw),
        other => Ok(other),
    }
}
