//! Core logic including the turn loop, tool execution, and conversation
//! state.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod context;
mod model_client;
mod runner;
pub mod tag_grammar;
pub mod tool;

pub use agent::{Agent, AgentBuilder, ToolCallingStyle};
pub use context::Context;
pub use model_client::{ModelClient, ModelClientResponse, ResponseDelta};
pub use runner::{RunError, RunEvent, RunResult, Runner};
