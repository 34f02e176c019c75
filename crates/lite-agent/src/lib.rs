//! An out-of-the-box agent that assembles the built-in tools and the
//! OpenAI-compatible model provider.
//!
//! The crate includes a `chat` binary for using in the terminal. And you can
//! also use it as a library to bring agent functionality into your own host
//! apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;
mod settings;
pub mod tools;

pub use session::{Session, SessionBuilder};
pub use settings::Settings;

/// Re-exports of [`lite_agent_core`] crate.
pub mod core {
    pub use lite_agent_core::*;
}
