//! Memory processors: pure transforms over conversation history.
//!
//! Processors run in registration order before prompt assembly, each
//! consuming its predecessor's output.  They never mutate their input.

use crate::context::RunContext;
use crate::llm::types::{Message, Role};

/// A pure transform over conversation history, applied before the history is
/// placed into the LM prompt.
pub trait MemoryProcessor: Send + Sync {
    fn process(&self, ctx: &RunContext, history: &[Message]) -> Vec<Message>;
}

// ---------------------------------------------------------------------------
// Budget trimmer
// ---------------------------------------------------------------------------

/// Keeps the largest contiguous suffix of the history whose total content
/// length fits within a character budget.
///
/// Chronological order is preserved.  If even the newest message exceeds the
/// budget, the result is empty.
#[derive(Debug, Clone, Copy)]
pub struct BudgetTrimmer {
    pub max_chars: usize,
}

impl BudgetTrimmer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl MemoryProcessor for BudgetTrimmer {
    fn process(&self, _ctx: &RunContext, history: &[Message]) -> Vec<Message> {
        let mut budget = self.max_chars;
        let mut start = history.len();

        // Walk newest to oldest; stop before the first message that no
        // longer fits, so the kept region is a contiguous suffix.
        for message in history.iter().rev() {
            let len = message.content.chars().count();
            if len > budget {
                break;
            }
            budget -= len;
            start -= 1;
        }

        if start > 0 {
            tracing::debug!(
                dropped = start,
                kept = history.len() - start,
                max_chars = self.max_chars,
                "trimmed conversation history to budget"
            );
        }

        history[start..].to_vec()
    }
}

// ---------------------------------------------------------------------------
// Role filter
// ---------------------------------------------------------------------------

/// Drops tool-role messages from the history.
///
/// Useful on follow-up calls when the model no longer needs tool traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleFilter;

impl MemoryProcessor for RoleFilter {
    fn process(&self, _ctx: &RunContext, history: &[Message]) -> Vec<Message> {
        history
            .iter()
            .filter(|m| m.role != Role::Tool)
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn total_chars(messages: &[Message]) -> usize {
        messages.iter().map(|m| m.content.chars().count()).sum()
    }

    #[test]
    fn trimmer_keeps_history_under_budget() {
        let trimmer = BudgetTrimmer::new(10);
        let history = vec![Message::user("hello"), Message::assistant("world")];
        let ctx = RunContext::background();

        let out = trimmer.process(&ctx, &history);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn trimmer_keeps_largest_suffix() {
        let trimmer = BudgetTrimmer::new(5);
        let history = vec![
            Message::user("12"),
            Message::assistant("34"),
            Message::user("5"),
        ];
        let ctx = RunContext::background();

        let out = trimmer.process(&ctx, &history);
        // "34" + "5" fit exactly; "12" would push the total to 5 + 2.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "34");
        assert_eq!(out[1].content, "5");
        assert!(total_chars(&out) <= 5);
    }

    #[test]
    fn trimmer_result_is_contiguous_suffix_in_order() {
        let trimmer = BudgetTrimmer::new(4);
        let history = vec![
            Message::user("aaa"),
            Message::assistant("bb"),
            Message::user("cc"),
        ];
        let ctx = RunContext::background();

        let out = trimmer.process(&ctx, &history);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "bb");
        assert_eq!(out[1].content, "cc");
    }

    #[test]
    fn trimmer_empty_when_newest_exceeds_budget() {
        let trimmer = BudgetTrimmer::new(3);
        let history = vec![Message::user("ok"), Message::assistant("too long")];
        let ctx = RunContext::background();

        // The newest message alone exceeds the budget, so nothing survives
        // even though an older message would fit.
        assert!(trimmer.process(&ctx, &history).is_empty());
    }

    #[test]
    fn trimmer_zero_budget_is_empty() {
        let trimmer = BudgetTrimmer::new(0);
        let history = vec![Message::user("x")];
        let ctx = RunContext::background();
        assert!(trimmer.process(&ctx, &history).is_empty());
    }

    #[test]
    fn trimmer_does_not_mutate_input() {
        let trimmer = BudgetTrimmer::new(1);
        let history = vec![Message::user("long message"), Message::user("y")];
        let ctx = RunContext::background();

        let _ = trimmer.process(&ctx, &history);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "long message");
    }

    #[test]
    fn role_filter_drops_tool_messages() {
        let filter = RoleFilter;
        let history = vec![
            Message::user("hi"),
            Message::tool_result("call-1", "x"),
            Message::assistant("ok"),
        ];
        let ctx = RunContext::background();

        let out = filter.process(&ctx, &history);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|m| m.role != Role::Tool));
    }
}
