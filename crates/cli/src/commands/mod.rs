//! Command handlers for the droit CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod conventions;
pub mod prompts;
pub mod route;
pub mod search;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use conventions::ConventionsCommand;
pub use prompts::PromptsCommand;
pub use route::RouteCommand;
pub use search::SearchCommand;
