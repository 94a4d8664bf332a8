//! Business record vocabularies and the payloads of `create-*` replies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Manager => "Manager",
            Self::Employee => "Employee",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "HR")]
    Hr,
    Marketing,
    Engineering,
    Admin,
    Sales,
    General,
}

impl Department {
    pub const ALL: [Self; 6] =
        [Self::Hr, Self::Marketing, Self::Engineering, Self::Admin, Self::Sales, Self::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hr => "HR",
            Self::Marketing => "Marketing",
            Self::Engineering => "Engineering",
            Self::Admin => "Admin",
            Self::Sales => "Sales",
            Self::General => "General",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [Self; 3] = [Self::ToDo, Self::InProgress, Self::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleStatus {
    Pending,
    Processing,
    Finished,
    Canceled,
}

impl SaleStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Processing, Self::Finished, Self::Canceled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Finished => "Finished",
            Self::Canceled => "Canceled",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct DraftViolation {
    pub field: &'static str,
    pub message: &'static str,
}

fn require_title(field: &'static str, value: &str) -> Result<(), DraftViolation> {
    if value.trim().is_empty() {
        return Err(DraftViolation { field, message: "must not be empty" });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDraft {
    pub title: String,
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub client_ids: Vec<String>,
    pub company_id: String,
}

impl AppointmentDraft {
    pub fn validate(&self) -> Result<(), DraftViolation> {
        require_title("title", &self.title)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: String,
    pub assignee_id: String,
    pub department: Department,
    pub company_id: String,
}

impl TaskDraft {
    pub fn validate(&self) -> Result<(), DraftViolation> {
        require_title("title", &self.title)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: f64,
    pub status: SaleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    pub company_id: String,
}

impl SaleDraft {
    pub fn validate(&self) -> Result<(), DraftViolation> {
        require_title("title", &self.title)?;
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(DraftViolation { field: "value", message: "must be positive" });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CompanyDraft {
    pub fn validate(&self) -> Result<(), DraftViolation> {
        require_title("name", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CompanyDraft, Department, SaleDraft, TaskDraft, TaskStatus};

    #[test]
    fn task_draft_uses_display_status_names() {
        let draft: TaskDraft = serde_json::from_value(json!({
            "title": "Write the report",
            "status": "To Do",
            "dueDate": "2025-06-10",
            "assigneeId": "u1",
            "department": "HR",
            "companyId": "c1"
        }))
        .expect("task draft should deserialize");

        assert_eq!(draft.status, TaskStatus::ToDo);
        assert_eq!(draft.department, Department::Hr);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn sale_draft_rejects_negative_value() {
        let draft: SaleDraft = serde_json::from_value(json!({
            "title": "Renewal",
            "value": -10.0,
            "status": "Pending",
            "companyId": "c1"
        }))
        .expect("sale draft should deserialize");

        let violation = draft.validate().expect_err("negative value must be rejected");
        assert_eq!(violation.field, "value");
    }

    #[test]
    fn company_draft_requires_name() {
        let draft = CompanyDraft { name: "  ".to_string(), description: String::new() };
        assert_eq!(draft.validate().map_err(|violation| violation.field), Err("name"));
    }
}
