//! Demo tools shipped with the `chat` binary.

mod calculate;
mod current_time;

use lite_agent_core::tool::ToolHandle;

pub use calculate::{CalculateTool, CalculateToolParameters};
pub use current_time::{CurrentTimeTool, CurrentTimeToolParameters};

/// Returns every built-in tool, ready to be registered on an agent.
pub fn builtin_tools() -> Vec<ToolHandle> {
    vec![
        ToolHandle::new(CalculateTool::new()),
        ToolHandle::new(CurrentTimeTool::new()),
    ]
}
