//! Scripted prompt client for testing
//!
//! Replies are chosen by matching a needle against the conversation's system
//! prompt, so each pipeline stage can be scripted independently.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let llm = MockPromptClient::new()
//!     .respond_to("Add comments", "```sql\nCREATE TABLE users (...) -- people\n```")
//!     .respond_to("exactly one SQL code snippet", "```sql\nSELECT COUNT(*) FROM users;\n```")
//!     .respond_to("helpful assistant", "There are 42 users.");
//!
//! assert_eq!(llm.calls_matching("Add comments"), 1);
//! ```

use crate::client::{PromptClient, PromptFailure};
use naturalquery_core::Conversation;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

type Reply = Result<String, PromptFailure>;

struct Rule {
    needle: String,
    replies: VecDeque<Reply>,
    /// Last reply handed out; repeated once the queue is empty
    last: Option<Reply>,
}

impl Rule {
    fn next_reply(&mut self) -> Option<Reply> {
        if let Some(reply) = self.replies.pop_front() {
            self.last = Some(reply.clone());
            return Some(reply);
        }
        self.last.clone()
    }
}

/// Prompt client answering from a script
///
/// Rules are tried in insertion order; the first whose needle occurs in the
/// system prompt answers. Each rule hands out its replies in order and then
/// keeps repeating the last one. Every conversation received is recorded.
#[derive(Clone, Default)]
pub struct MockPromptClient {
    rules: Arc<Mutex<Vec<Rule>>>,
    default_reply: Option<String>,
    calls: Arc<Mutex<Vec<Conversation>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockPromptClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for conversations whose system prompt contains `needle`
    pub fn respond_to(self, needle: &str, reply: impl Into<String>) -> Self {
        self.push(needle, Ok(reply.into()));
        self
    }

    /// Queue a failure for conversations whose system prompt contains `needle`
    pub fn fail_on(self, needle: &str, failure: PromptFailure) -> Self {
        self.push(needle, Err(failure));
        self
    }

    /// Reply used when no rule matches
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    fn push(&self, needle: &str, reply: Reply) {
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|r| r.needle == needle) {
            Some(rule) => rule.replies.push_back(reply),
            None => rules.push(Rule {
                needle: needle.to_string(),
                replies: VecDeque::from([reply]),
                last: None,
            }),
        }
    }

    /// Every conversation received, in order
    pub fn calls(&self) -> Vec<Conversation> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of received conversations whose system prompt contains `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.system_text().contains(needle))
            .count()
    }
}

#[async_trait::async_trait]
impl PromptClient for MockPromptClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn ask(&self, conversation: &Conversation) -> Result<String, PromptFailure> {
        lock(&self.calls).push(conversation.clone());

        let system = conversation.system_text();
        let scripted = lock(&self.rules)
            .iter_mut()
            .find(|rule| system.contains(&rule.needle))
            .and_then(Rule::next_reply);

        match (scripted, &self.default_reply) {
            (Some(reply), _) => reply,
            (None, Some(default)) => Ok(default.clone()),
            (None, None) => Err(PromptFailure::InvalidResponse(format!(
                "no scripted reply for system prompt: {}",
                system
            ))),
        }
    }
}
