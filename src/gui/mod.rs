//! Terminal front end of the monitor binary.

mod error;
mod keymap;
mod user_selector;

pub use error::MonitorError;
pub use keymap::{apply, command_for, Command};
pub use user_selector::user_selector;
