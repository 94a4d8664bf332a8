//! Prompt orchestration for the business assistant.
//!
//! The router turns a chat request into at most two prompt invocations:
//! 1. **Context determination** (`Prompt::DetermineContext`) asks the model
//!    which records it needs, producing `FilterCriteria`.
//! 2. **Answer generation** runs the general-question prompt or one of the
//!    create prompts against the filtered context.
//!
//! Which branch runs is decided up front by `routing::decide`, a pure table
//! over the command marker and the `(action, type)` pair. Refusals never
//! reach the model.
//!
//! # Key Types
//!
//! - `ActionRouter` - request orchestrator (see `router`)
//! - `PromptInvoker` - injected capability that executes one prompt
//! - `GeminiInvoker` - production invoker over the Gemini REST API
//!
//! The model only ever drafts records. Nothing here persists them.

pub mod gemini;
pub mod llm;
pub mod prompts;
pub mod router;
pub mod routing;

pub use gemini::{GeminiInvoker, GeminiInvokerFactory};
pub use llm::{GenerationError, InvokerFactory, PromptInvoker};
pub use prompts::{Prompt, PromptCatalog, PromptInput};
pub use router::ActionRouter;
pub use routing::{decide, dispatch, Dispatch, RouteDecision};
