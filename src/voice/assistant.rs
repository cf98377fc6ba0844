//! Assistant definition sent with every session start

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::functions::FunctionName;

const SYSTEM_PROMPT: &str = "\
You are a warm, casual assistant for people with ADHD who want help turning a task into small, doable steps. \
Sound like a supportive coach, never like a form.

When the user brings up a task, react briefly and ask only the single most useful question for that kind of task: \
energy for chores, deadline for work, available time for creative projects. Ask follow-ups only when the breakdown \
really needs them: offer smaller chunks when energy is low, focus on the essentials when time is short, \
and help estimate when the user is unsure how long something takes.

As soon as you have a reasonable breakdown, call add_task. The list appears on the user's screen immediately, \
so do not read the steps aloud; just say the breakdown is ready below and offer to adjust it.

Use update_task for changes, delete_task for removals and complete_task when something is done. \
Keep replies short, point out that every step counts, remind the user that breaks are fine, \
and celebrate finished steps.";

/// Assistant configuration understood by the voice SDK
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub name: String,
    pub transcriber: Transcriber,
    pub voice: VoiceSettings,
    pub model: ModelSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcriber {
    pub provider: String,
    pub model: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub provider: String,
    #[serde(rename = "voiceId")]
    pub voice_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub provider: String,
    pub model: String,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    pub functions: Vec<FunctionSchema>,
}

/// JSON-schema description of one callable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "ADHD Task Assistant".to_string(),
            transcriber: Transcriber {
                provider: "deepgram".to_string(),
                model: "nova-2".to_string(),
                language: "en-US".to_string(),
            },
            voice: VoiceSettings {
                provider: "playht".to_string(),
                voice_id: "jennifer".to_string(),
            },
            model: ModelSettings {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                system_prompt: SYSTEM_PROMPT.to_string(),
                functions: FunctionName::ALL.iter().map(|f| f.schema()).collect(),
            },
        }
    }
}

impl FunctionName {
    /// Schema advertised to the assistant for this function
    pub fn schema(&self) -> FunctionSchema {
        let (description, parameters) = match self {
            FunctionName::AddTask => (
                "Adds a new task with subtasks to the task list",
                json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Title of the task" },
                        "priority": { "type": "integer", "description": "Priority of the task (1-5, where 1 is highest)" },
                        "duration": { "type": "integer", "description": "Estimated duration in minutes" },
                        "deadline": { "type": "string", "description": "Optional deadline for the task" },
                        "energy_level": { "type": "string", "description": "User's energy level (low/medium/high)" },
                        "subtasks": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": { "type": "string", "description": "Title of the subtask" },
                                    "priority": { "type": "integer", "description": "Priority of the subtask" },
                                    "duration": { "type": "integer", "description": "Estimated duration in minutes" },
                                    "stepNumber": { "type": "integer", "description": "Step number of the subtask" },
                                    "completed": { "type": "boolean", "description": "Completion status of the subtask" },
                                    "break_after": { "type": "boolean", "description": "Whether to take a break after this subtask" }
                                },
                                "required": ["title", "priority", "duration", "stepNumber"]
                            }
                        }
                    },
                    "required": ["title", "priority", "duration", "subtasks"]
                }),
            ),
            FunctionName::UpdateTask => (
                "Updates an existing task or subtask",
                json!({
                    "type": "object",
                    "properties": {
                        "taskTitle": { "type": "string", "description": "Title of the task to update" },
                        "subtaskTitle": { "type": "string", "description": "Title of the subtask to update (if applicable)" },
                        "updates": {
                            "type": "object",
                            "properties": {
                                "newTitle": { "type": "string", "description": "New title for the task/subtask" },
                                "priority": { "type": "integer", "description": "New priority (1-5)" },
                                "duration": { "type": "integer", "description": "New duration in minutes" },
                                "deadline": { "type": "string", "description": "New deadline" },
                                "energy_level": { "type": "string", "description": "Updated energy level" },
                                "break_after": { "type": "boolean", "description": "Whether to take a break after this subtask" }
                            }
                        }
                    },
                    "required": ["taskTitle", "updates"]
                }),
            ),
            FunctionName::DeleteTask => (
                "Deletes a task or subtask",
                target_schema("Title of the task to delete", "Title of the subtask to delete (if applicable)"),
            ),
            FunctionName::CompleteTask => (
                "Marks a task or subtask as completed",
                target_schema("Title of the task", "Title of the subtask (if applicable)"),
            ),
        };

        FunctionSchema {
            name: self.as_str().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

fn target_schema(task: &str, subtask: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "taskTitle": { "type": "string", "description": task },
            "subtaskTitle": { "type": "string", "description": subtask }
        },
        "required": ["taskTitle"]
    })
}
