pub mod command;

pub use command::{ToolCommand, ToolError};
