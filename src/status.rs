//! The operator's status line. Whatever a session wants a human to see,
//! it writes here as well as to the log.

use log::{error, info};
use std::collections::VecDeque;

const HISTORY_SIZE: usize = 32;

/// The most recent status message plus a short history of earlier ones.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    history: VecDeque<String>,
    errors: usize,
}

impl StatusBoard {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show an informational message.
    pub fn show(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{}", msg);
        self.push(msg);
    }

    /// Show a failure the operator has to act on.
    pub fn alert(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        error!("{}", msg);
        self.errors += 1;
        self.push(format!("ERROR: {}", msg));
    }

    /// The latest message, if any.
    pub fn text(&self) -> &str {
        self.history.back().map(String::as_str).unwrap_or("")
    }

    /// Earlier messages, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// How many alerts were raised so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    fn push(&mut self, msg: String) {
        if self.history.len() == HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(msg);
    }
}
