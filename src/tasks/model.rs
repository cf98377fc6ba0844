//! Task and subtask records
//!
//! Field names on the wire follow the assistant's function schemas
//! (`energy_level`, `break_after`, `stepNumber`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use uuid::Uuid;

/// How much energy the user reports having for a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum EnergyLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for EnergyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown energy level: {other:?}")),
        }
    }
}

impl TryFrom<String> for EnergyLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyLevel::Low => write!(f, "low"),
            EnergyLevel::Medium => write!(f, "medium"),
            EnergyLevel::High => write!(f, "high"),
        }
    }
}

/// A top-level to-do item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier assigned at creation
    pub id: Uuid,
    /// Display title, also the lookup key for voice calls
    pub title: String,
    /// 1 (highest) to 5
    pub priority: i32,
    /// Estimated minutes
    pub duration: i32,
    pub deadline: Option<String>,
    pub energy_level: EnergyLevel,
    /// Rolled up from `subtasks` whenever there is at least one
    pub completed: bool,
    /// Ordered steps
    pub subtasks: Vec<Subtask>,
}

/// An ordered step belonging to exactly one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub title: String,
    pub priority: i32,
    pub duration: i32,
    #[serde(rename = "stepNumber")]
    pub step_number: i32,
    pub completed: bool,
    /// Suggest a break after this step
    pub break_after: bool,
}

impl Task {
    /// Recompute `completed` from the subtasks.
    ///
    /// Tasks without subtasks keep their own flag.
    pub fn sync_rollup(&mut self) {
        if !self.subtasks.is_empty() {
            self.completed = self.subtasks.iter().all(|s| s.completed);
        }
    }

    /// Whether the completion rollup currently holds
    #[cfg(test)]
    pub fn rollup_holds(&self) -> bool {
        self.subtasks.is_empty() || self.completed == self.subtasks.iter().all(|s| s.completed)
    }

    /// Set the task's completion and force every subtask to match
    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
        for subtask in &mut self.subtasks {
            subtask.completed = completed;
        }
    }

    /// Merge the task-level fields present in `updates`
    pub fn apply(&mut self, updates: &TaskUpdates) {
        if let Some(title) = updates.new_title() {
            self.title = title.to_string();
        }
        if let Some(priority) = updates.priority {
            self.priority = priority;
        }
        if let Some(duration) = updates.duration {
            self.duration = duration;
        }
        if let Some(deadline) = &updates.deadline {
            self.deadline = deadline.clone();
        }
        if let Some(energy_level) = updates.energy_level {
            self.energy_level = energy_level;
        }
        if updates.break_after.is_some() {
            debug!(task = %self.title, "break_after does not apply to a task, ignored");
        }
    }
}

impl Subtask {
    /// Merge the subtask-level fields present in `updates`
    pub fn apply(&mut self, updates: &TaskUpdates) {
        if let Some(title) = updates.new_title() {
            self.title = title.to_string();
        }
        if let Some(priority) = updates.priority {
            self.priority = priority;
        }
        if let Some(duration) = updates.duration {
            self.duration = duration;
        }
        if let Some(break_after) = updates.break_after {
            self.break_after = break_after;
        }
        if updates.deadline.is_some() || updates.energy_level.is_some() {
            debug!(subtask = %self.title, "deadline/energy_level do not apply to a subtask, ignored");
        }
    }
}

/// Arguments of an add request
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub priority: i32,
    pub duration: i32,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub deadline: Option<String>,
    #[serde(default, deserialize_with = "energy_or_default")]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<NewSubtask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubtask {
    pub title: String,
    pub priority: i32,
    pub duration: i32,
    #[serde(rename = "stepNumber")]
    pub step_number: i32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub break_after: bool,
}

impl From<NewTask> for Task {
    fn from(new: NewTask) -> Self {
        let mut task = Task {
            id: Uuid::new_v4(),
            title: new.title,
            priority: new.priority,
            duration: new.duration,
            deadline: new.deadline,
            energy_level: new.energy_level.unwrap_or_default(),
            completed: new.completed,
            subtasks: new.subtasks.into_iter().map(Subtask::from).collect(),
        };
        task.sync_rollup();
        task
    }
}

impl From<NewSubtask> for Subtask {
    fn from(new: NewSubtask) -> Self {
        Subtask {
            id: Uuid::new_v4(),
            title: new.title,
            priority: new.priority,
            duration: new.duration,
            step_number: new.step_number,
            completed: new.completed,
            break_after: new.break_after,
        }
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdates {
    #[serde(rename = "newTitle", default, skip_serializing_if = "Option::is_none")]
    pub new_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    /// `Some(None)` clears the deadline
    #[serde(default, deserialize_with = "clearable", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Option<String>>,
    #[serde(default, deserialize_with = "energy_or_default", skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_after: Option<bool>,
}

impl TaskUpdates {
    /// The rename target, ignoring blank titles
    pub fn new_title(&self) -> Option<&str> {
        self.new_title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

// Present-but-null and present-but-blank both mean "clear".
fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    blank_as_none(deserializer).map(Some)
}

fn energy_or_default<'de, D>(deserializer: D) -> Result<Option<EnergyLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(level) => level.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
