//! Context budgeting.
//!
//! Lengths are counted in characters, not model tokens. The system prompt's
//! length is reserved first; turns are then measured newest to oldest until
//! the running total would overflow what is left.

use openai_api::ChatMessage;
use thiserror::Error;

/// Default budget, roughly 95% of a 4096 character window.
pub const DEFAULT_CONTEXT_BUDGET: usize = 3891;

/// Characters skipped past the overflow point when clipping a turn. A clipped
/// fragment shorter than this is dropped instead of kept.
pub const CLIP_MARGIN: usize = 2;

/// What happens to the turn on which the budget overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStrategy {
    /// Drop the overflowing turn and everything older.
    WholeTurn,
    /// Keep the newest part of the overflowing turn that still fits.
    PartialClip,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("context budget of {budget} leaves no room after a {system} character system prompt")]
    NonPositiveBudget { budget: usize, system: usize },

    #[error("content too long: newest turn has {length} characters, {available} available")]
    ContentTooLong { length: usize, available: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    budget: usize,
    strategy: BudgetStrategy,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_BUDGET, BudgetStrategy::WholeTurn)
    }
}

impl ContextBudget {
    pub fn new(budget: usize, strategy: BudgetStrategy) -> Self {
        Self { budget, strategy }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn strategy(&self) -> BudgetStrategy {
        self.strategy
    }

    /// Characters left for turns once `system` is reserved.
    pub fn available(&self, system: &str) -> Result<usize, BudgetError> {
        let system = char_len(system);
        match self.budget.checked_sub(system) {
            Some(available) if available > 0 => Ok(available),
            _ => Err(BudgetError::NonPositiveBudget {
                budget: self.budget,
                system,
            }),
        }
    }

    /// Build the message list for one request: the system turn followed by
    /// the newest turns that fit.
    pub fn fit(&self, system: &str, turns: &[ChatMessage]) -> Result<Vec<ChatMessage>, BudgetError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(self.retain(system, turns)?);
        Ok(messages)
    }

    /// Select the turns that fit after reserving `system`, oldest first.
    ///
    /// Turns that fit entirely are returned unchanged.
    pub fn retain(&self, system: &str, turns: &[ChatMessage]) -> Result<Vec<ChatMessage>, BudgetError> {
        let available = self.available(system)?;
        let newest = turns.len().saturating_sub(1);
        let mut total = 0usize;

        for (index, turn) in turns.iter().enumerate().rev() {
            let length = char_len(&turn.content);
            if total + length <= available {
                total += length;
                continue;
            }

            let kept = &turns[index + 1..];
            let clipped = match self.strategy {
                BudgetStrategy::WholeTurn => None,
                BudgetStrategy::PartialClip => clip_turn(turn, total + length - available),
            };

            if clipped.is_none() && index == newest {
                return Err(BudgetError::ContentTooLong { length, available });
            }

            tracing::debug!(
                dropped = index + usize::from(clipped.is_none()),
                clipped = clipped.is_some(),
                available,
                "conversation trimmed to fit context budget"
            );

            let mut retained = Vec::with_capacity(kept.len() + 1);
            retained.extend(clipped);
            retained.extend_from_slice(kept);
            return Ok(retained);
        }

        Ok(turns.to_vec())
    }
}

/// Keep the suffix of `turn` that starts `CLIP_MARGIN` characters past
/// `overflow`, or `None` when fewer than `CLIP_MARGIN` characters would remain.
fn clip_turn(turn: &ChatMessage, overflow: usize) -> Option<ChatMessage> {
    let skip = overflow + CLIP_MARGIN;
    let remaining = char_len(&turn.content).checked_sub(skip)?;
    if remaining < CLIP_MARGIN {
        return None;
    }

    let start = turn
        .content
        .char_indices()
        .nth(skip)
        .map_or(turn.content.len(), |(offset, _)| offset);
    Some(ChatMessage::new(turn.role, &turn.content[start..]))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
