//! The prompt catalogue: instruction templates and the output schema the
//! model must answer with.

use std::fmt;

use bizassist_core::{Collection, ContextBundle, Department, SaleStatus, TaskStatus, UserProfile};
use chrono::{Days, NaiveDate};
use serde_json::{json, Map, Value};
use tera::{Context, Tera};

use crate::llm::GenerationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Prompt {
    DetermineContext,
    GeneralQuestion,
    CreateAppointment,
    CreateTask,
    CreateSale,
    CreateCompany,
}

impl Prompt {
    pub const ALL: [Self; 6] = [
        Self::DetermineContext,
        Self::GeneralQuestion,
        Self::CreateAppointment,
        Self::CreateTask,
        Self::CreateSale,
        Self::CreateCompany,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DetermineContext => "determine_context",
            Self::GeneralQuestion => "general_question",
            Self::CreateAppointment => "create_appointment",
            Self::CreateTask => "create_task",
            Self::CreateSale => "create_sale",
            Self::CreateCompany => "create_company",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            Self::DetermineContext => include_str!("../templates/determine_context.tera"),
            Self::GeneralQuestion => include_str!("../templates/general_question.tera"),
            Self::CreateAppointment => include_str!("../templates/create_appointment.tera"),
            Self::CreateTask => include_str!("../templates/create_task.tera"),
            Self::CreateSale => include_str!("../templates/create_sale.tera"),
            Self::CreateCompany => include_str!("../templates/create_company.tera"),
        }
    }

    /// Response schema in the subset of OpenAPI that Gemini accepts as
    /// `generationConfig.responseSchema`.
    pub fn output_schema(&self) -> Value {
        match self {
            Self::DetermineContext => context_schema(),
            Self::GeneralQuestion => reply_schema(None),
            Self::CreateAppointment => reply_schema(Some(object(
                &[
                    ("title", string()),
                    ("startTime", string()),
                    ("endTime", string()),
                    ("userIds", array(string())),
                    ("clientIds", array(string())),
                    ("companyId", string()),
                ],
                &["title", "startTime", "userIds", "clientIds", "companyId"],
            ))),
            Self::CreateTask => reply_schema(Some(object(
                &[
                    ("title", string()),
                    ("description", string()),
                    ("status", string_enum(TaskStatus::ALL.iter().map(TaskStatus::as_str))),
                    ("dueDate", string()),
                    ("assigneeId", string()),
                    ("department", string_enum(Department::ALL.iter().map(Department::as_str))),
                    ("companyId", string()),
                ],
                &["title", "status", "dueDate", "assigneeId", "department", "companyId"],
            ))),
            Self::CreateSale => reply_schema(Some(object(
                &[
                    ("title", string()),
                    ("description", string()),
                    ("value", json!({ "type": "NUMBER" })),
                    ("status", string_enum(SaleStatus::ALL.iter().map(SaleStatus::as_str))),
                    ("client", string()),
                    ("companyId", string()),
                ],
                &["title", "value", "status", "companyId"],
            ))),
            Self::CreateCompany => reply_schema(Some(object(
                &[("name", string()), ("description", string())],
                &["name", "description"],
            ))),
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn string_enum<'a>(values: impl Iterator<Item = &'a str>) -> Value {
    json!({ "type": "STRING", "enum": values.collect::<Vec<_>>() })
}

fn array(items: Value) -> Value {
    json!({ "type": "ARRAY", "items": items })
}

fn object(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let properties = properties
        .iter()
        .map(|(name, schema)| ((*name).to_string(), schema.clone()))
        .collect::<Map<_, _>>();
    json!({ "type": "OBJECT", "properties": properties, "required": required })
}

fn reply_schema(data: Option<Value>) -> Value {
    let mut properties = vec![("answer", string())];
    let mut required = vec!["answer"];
    if let Some(data) = data {
        properties.push(("action", string()));
        properties.push(("type", string()));
        properties.push(("data", data));
        required.push("data");
    }
    object(&properties, &required)
}

fn context_schema() -> Value {
    let criteria = |fields: &[(&str, Value)]| array(object(fields, &[]));
    object(
        &[
            (Collection::Companies.key(), criteria(&[("name", string()), ("id", string())])),
            (
                Collection::Employees.key(),
                criteria(&[("name", string()), ("id", string()), ("department", string())]),
            ),
            (
                Collection::Tasks.key(),
                criteria(&[
                    ("title", string()),
                    ("status", string()),
                    ("assigneeId", string()),
                    ("department", string()),
                ]),
            ),
            (
                Collection::Sales.key(),
                criteria(&[("title", string()), ("value", json!({ "type": "NUMBER" }))]),
            ),
            (
                Collection::Appointments.key(),
                criteria(&[
                    ("title", string()),
                    ("startTime", string()),
                    ("endTime", string()),
                    ("userId", string()),
                ]),
            ),
        ],
        &[],
    )
}

/// Everything a template may reference.
#[derive(Clone, Debug)]
pub struct PromptInput {
    pub question: String,
    pub context: ContextBundle,
    pub today: NaiveDate,
}

impl PromptInput {
    pub fn new(question: impl Into<String>, context: ContextBundle, today: NaiveDate) -> Self {
        Self { question: question.into(), context, today }
    }

    fn to_template_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("question", &self.question);
        context.insert("today", &self.today.format("%Y-%m-%d").to_string());
        let due = self.today.checked_add_days(Days::new(7)).unwrap_or(self.today);
        context.insert("default_due_date", &due.format("%Y-%m-%d").to_string());
        context.insert("user", &user_fields(&self.context.user));
        for collection in Collection::ALL {
            let rendered = self
                .context
                .collection(collection)
                .map(Value::to_string)
                .unwrap_or_else(|| "[]".to_string());
            context.insert(collection.key(), &rendered);
        }
        context
    }
}

/// Flat, always-present user fields. Missing values render as empty text.
fn user_fields(user: &UserProfile) -> Map<String, Value> {
    let text = |value: Option<&str>| Value::String(value.unwrap_or_default().to_string());
    let mut fields = Map::new();
    fields.insert("id".to_string(), Value::String(user.id.clone()));
    fields.insert("name".to_string(), text(user.name.as_deref()));
    fields.insert("company_id".to_string(), text(user.company_id.as_deref()));
    fields.insert("role".to_string(), text(user.role.map(|role| role.as_str())));
    fields.insert("department".to_string(), text(user.department.map(|dept| dept.as_str())));
    fields
}

/// Parsed templates for every prompt, shared across requests.
#[derive(Debug)]
pub struct PromptCatalog {
    tera: Tera,
}

impl PromptCatalog {
    pub fn new() -> Result<Self, GenerationError> {
        let mut tera = Tera::default();
        for prompt in Prompt::ALL {
            tera.add_raw_template(prompt.name(), prompt.template()).map_err(|error| {
                GenerationError::Template { prompt: prompt.name(), reason: error.to_string() }
            })?;
        }
        Ok(Self { tera })
    }

    pub fn render(&self, prompt: Prompt, input: &PromptInput) -> Result<String, GenerationError> {
        self.tera
            .render(prompt.name(), &input.to_template_context())
            .map_err(|error| GenerationError::Template {
                prompt: prompt.name(),
                reason: error.to_string(),
            })
    }
}
