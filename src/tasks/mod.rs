//! Task list module
//!
//! Holds the task/subtask records and the store that applies mutations
//! while keeping each task's completion rolled up from its subtasks.

mod model;
mod store;

pub use model::{NewTask, Task, TaskUpdates};
pub use store::{Lookup, StoreError, TaskStore};
