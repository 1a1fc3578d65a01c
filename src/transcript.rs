//! The append-only conversation transcript and its context window.

use crate::types::{Role, Turn};

/// Default number of non-system turns sent as context.
pub const DEFAULT_CONTEXT_TURNS: usize = 3;

/// An ordered, append-only sequence of turns.
///
/// Index 0 holds the system turn after [`Transcript::new`] or
/// [`Transcript::reset`]. Turns are never edited or removed; the only way
/// to shrink a transcript is to reset it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Creates a transcript holding only `system`.
    pub fn new(system: Turn) -> Self {
        Self { turns: vec![system] }
    }

    /// Creates a transcript from existing turns, in order.
    ///
    /// The system turn normally comes first, but system turns anywhere in
    /// `turns` are kept by [`Transcript::windowed`].
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// Adds `turn` to the end.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Replaces the whole transcript with a single fresh system turn.
    ///
    /// The replacement is built before it is swapped in, so no caller can
    /// observe a half-reset transcript.
    pub fn reset(&mut self, system: Turn) {
        self.turns = vec![system];
    }

    /// Every system turn plus the last `n` non-system turns, in transcript order.
    pub fn windowed(&self, n: usize) -> ContextWindow<'_> {
        let conversation = self.turns.iter().filter(|turn| !turn.is_system()).count();
        let mut skip = conversation.saturating_sub(n);
        let turns = self
            .turns
            .iter()
            .filter(|turn| {
                if turn.is_system() {
                    true
                } else if skip > 0 {
                    skip -= 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        ContextWindow { turns }
    }

    /// Every turn, as a window. Used when context truncation is disabled.
    pub fn full(&self) -> ContextWindow<'_> {
        ContextWindow {
            turns: self.turns.iter().collect(),
        }
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Iterates over the turns, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// The token count of each turn, parallel to [`Transcript::turns`].
    pub fn token_counts(&self) -> Vec<usize> {
        self.turns.iter().map(Turn::tokens).collect()
    }

    /// Sum of all token counts.
    pub fn total_tokens(&self) -> usize {
        self.turns.iter().map(Turn::tokens).sum()
    }

    /// The system prompt, if the first turn is a system turn.
    pub fn system_prompt(&self) -> Option<&str> {
        self.turns
            .first()
            .filter(|turn| turn.role() == Role::System)
            .map(Turn::content)
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns, including the system turn.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when there are no turns at all.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// A borrowed view of the turns sent for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow<'a> {
    turns: Vec<&'a Turn>,
}

impl<'a> ContextWindow<'a> {
    /// The turns in the window, oldest first.
    pub fn turns(&self) -> &[&'a Turn] {
        &self.turns
    }

    /// Owned copies of the turns, for handing to a generation task.
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().map(|turn| (*turn).clone()).collect()
    }

    /// Sum of the token counts in the window.
    pub fn token_total(&self) -> usize {
        self.turns.iter().map(|turn| turn.tokens()).sum()
    }

    /// Number of turns in the window.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when the window holds no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
