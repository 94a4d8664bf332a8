//! Core of the business assistant: request/response models, the `@action-type`
//! command parser, the context filter, the error taxonomy and layered config.
//!
//! Nothing in this crate talks to the network. The agent crate owns prompt
//! invocation and the server crate owns HTTP.

pub mod command;
pub mod config;
pub mod domain;
pub mod errors;
pub mod filter;

pub use command::{is_command, parse_command, ParsedCommand};
pub use domain::chat::{
    ActionKind, ApiKey, ChatBody, ChatRequest, ChatResponse, EntityKind, MIN_API_KEY_LEN,
};
pub use domain::context::{Collection, ContextBundle, Criterion, FilterCriteria, UserProfile};
pub use domain::records::{
    AppointmentDraft, CompanyDraft, Department, DraftViolation, Role, SaleDraft, SaleStatus,
    TaskDraft, TaskStatus,
};
pub use errors::{ChatError, Mismatch};
pub use filter::filter_context;
