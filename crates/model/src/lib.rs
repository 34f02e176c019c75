//! An abstraction layer for chat-completion models.
//!
//! This crate establishes an unified protocol for the agent to interact
//! with various supported LLMs, so that the agent can seamlessly switch
//! between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. Messages follow the
//! common chat-completion convention (`role`, `content`, `tool_calls`,
//! `tool_call_id`), so most providers can serialize them directly.

#![deny(missing_docs)]

mod error;
mod message;
mod provider;
mod request;
mod response;
mod usage;

pub use error::*;
pub use message::*;
pub use provider::*;
pub use request::*;
pub use response::*;
pub use usage::*;
