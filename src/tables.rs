use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// * Enums ....................................................................

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "low")]
    Low,
    #[default]
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// The label shown to users, which is also the wire value.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "to do")]
    Todo,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Todo, Status::InProgress, Status::Completed];

    pub fn label(&self) -> &'static str {
        match self {
            Status::Todo => "to do",
            Status::InProgress => "in progress",
            Status::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Completed => "completed",
            TaskFilter::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

// Labels are matched case-insensitively, and the underscore form is accepted
// so that `in_progress` works from a shell.
fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace('_', " ")
}

impl FromStr for Priority {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = normalize(s);
        Priority::ALL
            .into_iter()
            .find(|p| p.label() == value)
            .ok_or(ParseLabelError {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

impl FromStr for Status {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = normalize(s);
        let value = if value == "todo" { "to do".to_string() } else { value };
        Status::ALL
            .into_iter()
            .find(|st| st.label() == value)
            .ok_or(ParseLabelError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

impl FromStr for TaskFilter {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "all" => Ok(TaskFilter::All),
            "completed" => Ok(TaskFilter::Completed),
            "incomplete" => Ok(TaskFilter::Incomplete),
            _ => Err(ParseLabelError {
                kind: "filter",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// * Entities .................................................................

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub is_completed: bool,
    pub parent_id: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

impl Task {
    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }
}

// * Requests / Responses .....................................................

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i32>,
}

// A field that is present maps to `Some`, even when its value is `null`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Partial update; absent fields are left untouched.
///
/// `category` and `parent_id` distinguish an absent field (`None`) from an
/// explicit `null` (`Some(None)`), which clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<i32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
}

/// Query string of `GET /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListTasksParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl ListTasksParams {
    pub fn new(filter: TaskFilter, category: Option<&str>, priority: Option<Priority>) -> Self {
        Self {
            filter_completed: Some(filter.as_str().to_string()),
            category: category.filter(|c| !c.is_empty()).map(str::to_string),
            priority: priority.map(|p| p.label().to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_parse_loosely() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!("in_progress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("todo".parse::<Status>(), Ok(Status::Todo));
        assert!("urgent".parse::<Priority>().is_err());
        assert!("done".parse::<TaskFilter>().is_err());
    }

    #[test]
    fn test_task_wire_format() {
        let json = serde_json::json!({
            "id": 1,
            "title": "Write report",
            "category": null,
            "priority": "high",
            "status": "in progress",
            "is_completed": false,
            "parent_id": null,
            "created_at": "2024-05-01T10:00:00",
            "updated_at": "2024-05-01T10:00:00"
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, Status::InProgress);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn test_list_params_lowercase_priority_and_skip_empty_category() {
        let params = ListTasksParams::new(TaskFilter::Incomplete, Some(""), Some(Priority::Low));
        assert_eq!(params.filter_completed.as_deref(), Some("incomplete"));
        assert_eq!(params.category, None);
        assert_eq!(params.priority.as_deref(), Some("low"));
    }

    #[test]
    fn test_update_request_omits_unset_fields() {
        let update = UpdateTaskRequest {
            category: Some(Some("work".to_string())),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, serde_json::json!({ "category": "work" }));
    }

    #[test]
    fn test_update_request_null_differs_from_absent() {
        let cleared: UpdateTaskRequest =
            serde_json::from_value(serde_json::json!({ "category": null, "parent_id": null })).unwrap();
        assert_eq!(cleared.category, Some(None));
        assert_eq!(cleared.parent_id, Some(None));

        let untouched: UpdateTaskRequest =
            serde_json::from_value(serde_json::json!({ "title": "x" })).unwrap();
        assert_eq!(untouched.category, None);
        assert_eq!(untouched.parent_id, None);

        let detach = UpdateTaskRequest {
            parent_id: Some(None),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&detach).unwrap(),
            serde_json::json!({ "parent_id": null })
        );
    }
}
