//! Per-run execution state.

use std::collections::HashMap;

use crate::config::Command;

/// Text captured by downloads, keyed by result key.
///
/// Lives for one plan run and is shared by every deployment in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultStore {
    values: HashMap<String, String>,
}

impl ResultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Position within a deployment's command list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandCursor {
    position: usize,
}

impl CommandCursor {
    /// Returns the number of commands consumed so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Consumes and returns the next command, if any.
    pub fn next_command<'a>(&mut self, commands: &'a [Command]) -> Option<&'a Command> {
        let command = commands.get(self.position)?;
        self.position += 1;
        Some(command)
    }

    /// Rewinds to the first command.
    pub const fn reset(&mut self) {
        self.position = 0;
    }
}

/// State threaded through a plan run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Captured download results.
    pub results: ResultStore,
    /// Cursor into the current deployment's commands.
    pub cursor: CommandCursor,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with pre-seeded results.
    #[must_use]
    pub fn with_results(results: ResultStore) -> Self {
        Self {
            results,
            cursor: CommandCursor::default(),
        }
    }
}
