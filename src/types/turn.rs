use serde::{Deserialize, Serialize};

use crate::tokens::TokenEstimator;
use crate::types::Role;

/// One message in a conversation.
///
/// A turn is immutable once created: its role, text, and approximate token
/// count are fixed at construction and only readable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
    tokens: usize,
}

impl Turn {
    /// Creates a turn with an already known token count.
    pub fn new(role: Role, content: impl Into<String>, tokens: usize) -> Self {
        Self {
            role,
            content: content.into(),
            tokens,
        }
    }

    /// Creates a turn whose token count is estimated from its content.
    pub fn estimated(role: Role, content: impl Into<String>, estimator: &TokenEstimator) -> Self {
        let content = content.into();
        let tokens = estimator.estimate(&content);
        Self::new(role, content, tokens)
    }

    /// Creates a system turn.
    pub fn system(content: impl Into<String>, tokens: usize) -> Self {
        Self::new(Role::System, content, tokens)
    }

    /// Creates a user turn.
    pub fn user(content: impl Into<String>, tokens: usize) -> Self {
        Self::new(Role::User, content, tokens)
    }

    /// Creates an assistant turn.
    pub fn assistant(content: impl Into<String>, tokens: usize) -> Self {
        Self::new(Role::Assistant, content, tokens)
    }

    /// The participant that produced this turn.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The text of this turn.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The approximate token count of this turn.
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    /// Returns true for the system turn.
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}
