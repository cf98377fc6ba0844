//! In-memory task list
//!
//! The store is owned by the session loop and is only mutated from there.
//! Every successful mutation publishes the whole list as one
//! `TasksUpdated` notification; a failed lookup changes nothing and
//! publishes nothing.

use std::fmt;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::Notification;

use super::model::{NewTask, Subtask, Task, TaskUpdates};

/// How a task or subtask is addressed
///
/// Voice calls only know titles; the UI addresses records by id.
/// A title resolves to the earliest-inserted record with that exact title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(Uuid),
    Title(String),
}

impl Lookup {
    pub fn title(title: impl Into<String>) -> Self {
        Self::Title(title.into())
    }

    fn matches(&self, id: Uuid, title: &str) -> bool {
        match self {
            Lookup::Id(wanted) => *wanted == id,
            Lookup::Title(wanted) => wanted == title,
        }
    }
}

impl From<Uuid> for Lookup {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for Lookup {
    fn from(title: &str) -> Self {
        Self::Title(title.to_string())
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "#{id}"),
            Lookup::Title(title) => write!(f, "{title:?}"),
        }
    }
}

/// Lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(Lookup),

    #[error("subtask {subtask} not found in task {task}")]
    SubtaskNotFound { task: Lookup, subtask: Lookup },
}

/// Authoritative task list
pub struct TaskStore {
    tasks: Vec<Task>,
    event_tx: broadcast::Sender<Notification>,
}

impl TaskStore {
    /// Create an empty store publishing on `event_tx`
    pub fn new(event_tx: broadcast::Sender<Notification>) -> Self {
        Self {
            tasks: Vec::new(),
            event_tx,
        }
    }

    /// Current list, in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Append a task, filling defaults. Returns its id.
    pub fn add(&mut self, new_task: NewTask) -> Uuid {
        let task = Task::from(new_task);
        if self.tasks.iter().any(|t| t.title == task.title) {
            warn!(task = %task.title, "duplicate task title, title lookups resolve to the earliest");
        }

        info!(task = %task.title, subtasks = task.subtasks.len(), "task added");
        let id = task.id;
        self.tasks.push(task);
        self.publish();
        id
    }

    /// Merge `updates` into a task, or into one of its subtasks.
    ///
    /// Lookups use the titles as they were before any rename. Completion is
    /// not touched; use [`complete`](Self::complete) for that.
    pub fn update(
        &mut self,
        task: &Lookup,
        subtask: Option<&Lookup>,
        updates: &TaskUpdates,
    ) -> Result<(), StoreError> {
        let ti = self.task_index(task)?;
        match subtask {
            Some(sub) => {
                let si = self.subtask_index(ti, task, sub)?;
                self.tasks[ti].subtasks[si].apply(updates);
            }
            None => self.tasks[ti].apply(updates),
        }

        info!(task = %task, subtask = ?subtask.map(ToString::to_string), "task updated");
        self.publish();
        Ok(())
    }

    /// Remove one task, or one subtask of it
    pub fn delete(&mut self, task: &Lookup, subtask: Option<&Lookup>) -> Result<(), StoreError> {
        let ti = self.task_index(task)?;
        match subtask {
            Some(sub) => {
                let si = self.subtask_index(ti, task, sub)?;
                let parent = &mut self.tasks[ti];
                let removed: Subtask = parent.subtasks.remove(si);
                parent.sync_rollup();
                info!(task = %parent.title, subtask = %removed.title, "subtask deleted");
            }
            None => {
                let removed = self.tasks.remove(ti);
                info!(task = %removed.title, "task deleted");
            }
        }

        self.publish();
        Ok(())
    }

    /// Mark a task (cascading to its subtasks) or a single subtask done
    pub fn complete(&mut self, task: &Lookup, subtask: Option<&Lookup>) -> Result<(), StoreError> {
        self.set_completed(task, subtask, true)
    }

    /// Set completion explicitly.
    ///
    /// On a task this drives every subtask to the same value; on a subtask
    /// the parent's flag is recomputed from its siblings.
    pub fn set_completed(
        &mut self,
        task: &Lookup,
        subtask: Option<&Lookup>,
        completed: bool,
    ) -> Result<(), StoreError> {
        let ti = self.task_index(task)?;
        match subtask {
            Some(sub) => {
                let si = self.subtask_index(ti, task, sub)?;
                let parent = &mut self.tasks[ti];
                parent.subtasks[si].completed = completed;
                parent.sync_rollup();
                info!(
                    task = %parent.title,
                    subtask = %parent.subtasks[si].title,
                    completed,
                    task_completed = parent.completed,
                    "subtask completion set"
                );
            }
            None => {
                let parent = &mut self.tasks[ti];
                parent.set_completed(completed);
                info!(task = %parent.title, completed, "task completion set");
            }
        }

        self.publish();
        Ok(())
    }

    /// Flip the completion of a task or subtask. Returns the new value.
    pub fn toggle(&mut self, task: &Lookup, subtask: Option<&Lookup>) -> Result<bool, StoreError> {
        let ti = self.task_index(task)?;
        let current = match subtask {
            Some(sub) => {
                let si = self.subtask_index(ti, task, sub)?;
                self.tasks[ti].subtasks[si].completed
            }
            None => self.tasks[ti].completed,
        };
        self.set_completed(task, subtask, !current)?;
        Ok(!current)
    }

    /// Broadcast the full list
    pub fn publish(&self) {
        debug!(tasks = self.tasks.len(), "publishing task list");
        let _ = self
            .event_tx
            .send(Notification::TasksUpdated(self.tasks.clone()));
    }

    fn task_index(&self, task: &Lookup) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|t| task.matches(t.id, &t.title))
            .ok_or_else(|| {
                let err = StoreError::TaskNotFound(task.clone());
                warn!(%err, "lookup failed");
                err
            })
    }

    fn subtask_index(&self, ti: usize, task: &Lookup, subtask: &Lookup) -> Result<usize, StoreError> {
        self.tasks[ti]
            .subtasks
            .iter()
            .position(|s| subtask.matches(s.id, &s.title))
            .ok_or_else(|| {
                let err = StoreError::SubtaskNotFound {
                    task: task.clone(),
                    subtask: subtask.clone(),
                };
                warn!(%err, "lookup failed");
                err
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_store() -> (TaskStore, broadcast::Receiver<Notification>) {
        let (tx, rx) = broadcast::channel(64);
        (TaskStore::new(tx), rx)
    }

    fn new_task(value: serde_json::Value) -> NewTask {
        serde_json::from_value(value).unwrap()
    }

    fn kitchen() -> NewTask {
        new_task(json!({
            "title": "Clean kitchen",
            "priority": 2,
            "duration": 30,
            "subtasks": [
                {"title": "Wash dishes", "priority": 2, "duration": 10, "stepNumber": 1},
                {"title": "Wipe counters", "priority": 2, "duration": 10, "stepNumber": 2},
                {"title": "Mop floor", "priority": 3, "duration": 10, "stepNumber": 3}
            ]
        }))
    }

    fn simple(title: &str) -> NewTask {
        new_task(json!({"title": title, "priority": 3, "duration": 15}))
    }

    fn last_published(rx: &mut broadcast::Receiver<Notification>) -> Option<Vec<Task>> {
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if let Notification::TasksUpdated(tasks) = event {
                last = Some(tasks);
            }
        }
        last
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_add_appends_and_publishes() {
        let (mut store, mut rx) = create_store();
        store.add(simple("A"));
        store.add(simple("B"));

        let published = last_published(&mut rx).unwrap();
        assert_eq!(titles(&published), vec!["A", "B"]);
        assert_eq!(published, store.tasks());
    }

    #[test]
    fn test_complete_scenario() {
        let (mut store, mut rx) = create_store();
        store.add(new_task(json!({
            "title": "Clean kitchen",
            "priority": 2,
            "duration": 30,
            "subtasks": [{"title": "Wash dishes", "priority": 2, "duration": 10, "stepNumber": 1}]
        })));

        store
            .complete(&"Clean kitchen".into(), Some(&"Wash dishes".into()))
            .unwrap();
        store.complete(&"Clean kitchen".into(), None).unwrap();

        let tasks = last_published(&mut rx).unwrap();
        assert!(tasks[0].completed);
        assert!(tasks[0].subtasks[0].completed);
    }

    #[test]
    fn test_completing_one_subtask_does_not_complete_parent() {
        let (mut store, _rx) = create_store();
        store.add(kitchen());

        store
            .complete(&"Clean kitchen".into(), Some(&"Wash dishes".into()))
            .unwrap();
        assert!(!store.tasks()[0].completed);

        store
            .complete(&"Clean kitchen".into(), Some(&"Wipe counters".into()))
            .unwrap();
        store
            .complete(&"Clean kitchen".into(), Some(&"Mop floor".into()))
            .unwrap();
        assert!(store.tasks()[0].completed);
    }

    #[test]
    fn test_complete_task_cascades() {
        let (mut store, _rx) = create_store();
        store.add(kitchen());
        store.complete(&"Clean kitchen".into(), None).unwrap();
        assert!(store.tasks()[0].subtasks.iter().all(|s| s.completed));
    }

    #[test]
    fn test_update_rename_scenario() {
        let (mut store, _rx) = create_store();
        store.add(kitchen());
        let before = store.tasks()[0].clone();

        let updates = TaskUpdates {
            new_title: Some("Tidy kitchen".to_string()),
            priority: Some(1),
            ..Default::default()
        };
        store.update(&"Clean kitchen".into(), None, &updates).unwrap();

        let after = &store.tasks()[0];
        assert_eq!(after.title, "Tidy kitchen");
        assert_eq!(after.priority, 1);
        assert_eq!(after.duration, before.duration);
        assert_eq!(after.subtasks, before.subtasks);

        assert_eq!(
            store.complete(&"Clean kitchen".into(), None),
            Err(StoreError::TaskNotFound("Clean kitchen".into()))
        );
        assert!(store.complete(&"Tidy kitchen".into(), None).is_ok());
    }

    #[test]
    fn test_update_subtask_by_old_title() {
        let (mut store, _rx) = create_store();
        store.add(kitchen());

        let updates = TaskUpdates {
            new_title: Some("Load dishwasher".to_string()),
            break_after: Some(true),
            ..Default::default()
        };
        store
            .update(&"Clean kitchen".into(), Some(&"Wash dishes".into()), &updates)
            .unwrap();

        let subtask = &store.tasks()[0].subtasks[0];
        assert_eq!(subtask.title, "Load dishwasher");
        assert!(subtask.break_after);
        assert_eq!(subtask.step_number, 1);
    }

    #[test]
    fn test_lookup_miss_is_a_noop() {
        let (mut store, mut rx) = create_store();
        store.add(kitchen());
        let _ = last_published(&mut rx);
        let before = store.tasks().to_vec();

        let updates = TaskUpdates {
            priority: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&"Nonexistent".into(), None, &updates),
            Err(StoreError::TaskNotFound(_))
        ));
        assert!(matches!(
            store.update(&"Clean kitchen".into(), Some(&"Nope".into()), &updates),
            Err(StoreError::SubtaskNotFound { .. })
        ));
        assert!(store.delete(&"Nonexistent".into(), None).is_err());
        assert!(store
            .delete(&"Clean kitchen".into(), Some(&"Nope".into()))
            .is_err());
        assert!(store.complete(&"Nonexistent".into(), None).is_err());

        assert_eq!(store.tasks(), before.as_slice());
        assert!(last_published(&mut rx).is_none());
    }

    #[test]
    fn test_delete_subtask_keeps_sibling_order() {
        let (mut store, _rx) = create_store();
        store.add(kitchen());

        store
            .delete(&"Clean kitchen".into(), Some(&"Wipe counters".into()))
            .unwrap();

        let subtasks: Vec<&str> = store.tasks()[0]
            .subtasks
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(subtasks, vec!["Wash dishes", "Mop floor"]);
    }

    #[test]
    fn test_delete_subtask_recomputes_rollup() {
        let (mut store, _rx) = create_store();
        store.add(new_task(json!({
            "title": "Errands",
            "priority": 2,
            "duration": 40,
            "subtasks": [
                {"title": "Bank", "priority": 2, "duration": 20, "stepNumber": 1, "completed": true},
                {"title": "Post office", "priority": 2, "duration": 20, "stepNumber": 2}
            ]
        })));
        assert!(!store.tasks()[0].completed);

        store
            .delete(&"Errands".into(), Some(&"Post office".into()))
            .unwrap();
        assert!(store.tasks()[0].completed);
    }

    #[test]
    fn test_delete_task_keeps_order() {
        let (mut store, _rx) = create_store();
        for title in ["A", "B", "C", "D"] {
            store.add(simple(title));
        }
        store.delete(&"B".into(), None).unwrap();
        assert_eq!(titles(store.tasks()), vec!["A", "C", "D"]);
    }

    #[test]
    fn test_duplicate_titles_resolve_to_earliest() {
        let (mut store, _rx) = create_store();
        let first = store.add(simple("Call mom"));
        let second = store.add(simple("Call mom"));
        assert_eq!(store.tasks().len(), 2);

        store.complete(&"Call mom".into(), None).unwrap();
        assert!(store.tasks()[0].completed);
        assert!(!store.tasks()[1].completed);

        store.delete(&"Call mom".into(), None).unwrap();
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].id, second);
        assert_ne!(first, second);
    }

    #[test]
    fn test_id_lookup() {
        let (mut store, _rx) = create_store();
        store.add(simple("Call mom"));
        let second = store.add(simple("Call mom"));

        store.complete(&Lookup::Id(second), None).unwrap();
        assert!(!store.tasks()[0].completed);
        assert!(store.tasks()[1].completed);
    }

    #[test]
    fn test_toggle_subtask_and_task() {
        let (mut store, _rx) = create_store();
        let id = store.add(kitchen());
        let sub = store.tasks()[0].subtasks[1].id;

        assert!(store.toggle(&id.into(), Some(&sub.into())).unwrap());
        assert!(store.tasks()[0].subtasks[1].completed);
        assert!(!store.tasks()[0].completed);

        assert!(store.toggle(&id.into(), None).unwrap());
        assert!(store.tasks()[0].subtasks.iter().all(|s| s.completed));

        assert!(!store.toggle(&id.into(), Some(&sub.into())).unwrap());
        assert!(!store.tasks()[0].completed);

        // The task is open again, so toggling it completes everything
        assert!(store.toggle(&id.into(), None).unwrap());
        assert!(store.tasks()[0].subtasks.iter().all(|s| s.completed));

        assert!(!store.toggle(&id.into(), None).unwrap());
        assert!(store.tasks()[0].subtasks.iter().all(|s| !s.completed));
        assert!(!store.tasks()[0].completed);
    }

    #[test]
    fn test_rollup_holds_across_mixed_operations() {
        let (mut store, mut rx) = create_store();
        store.add(kitchen());
        store.add(simple("Email"));

        let steps: Vec<Box<dyn Fn(&mut TaskStore)>> = vec![
            Box::new(|s: &mut TaskStore| {
                let _ = s.complete(&"Clean kitchen".into(), Some(&"Mop floor".into()));
            }),
            Box::new(|s: &mut TaskStore| {
                let _ = s.delete(&"Clean kitchen".into(), Some(&"Wash dishes".into()));
            }),
            Box::new(|s: &mut TaskStore| {
                let _ = s.complete(&"Clean kitchen".into(), Some(&"Wipe counters".into()));
            }),
            Box::new(|s: &mut TaskStore| {
                let _ = s.set_completed(&"Clean kitchen".into(), Some(&"Mop floor".into()), false);
            }),
            Box::new(|s: &mut TaskStore| {
                let _ = s.update(
                    &"Clean kitchen".into(),
                    Some(&"Mop floor".into()),
                    &TaskUpdates {
                        new_title: Some("Sweep".to_string()),
                        ..Default::default()
                    },
                );
            }),
            Box::new(|s: &mut TaskStore| {
                let _ = s.complete(&"Email".into(), None);
            }),
            Box::new(|s: &mut TaskStore| {
                let _ = s.delete(&"Clean kitchen".into(), Some(&"Sweep".into()));
            }),
        ];

        for step in steps {
            step(&mut store);
            if let Some(tasks) = last_published(&mut rx) {
                assert!(tasks.iter().all(Task::rollup_holds));
            }
        }
        assert!(store.tasks()[0].completed);
    }
}
