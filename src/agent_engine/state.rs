use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Server-side image bookkeeping for one stateful (Responses API) session.
///
/// `turn_index` is the position, in the caller's untrimmed conversation, of
/// the earliest turn whose screenshot is still inside the image window.
/// `response_ids` are the upstream responses created while that window was
/// current, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadImageContext {
    turn_index: Option<usize>,
    response_ids: VecDeque<String>,
}

impl HeadImageContext {
    pub fn turn_index(&self) -> Option<usize> {
        self.turn_index
    }

    pub fn response_ids(&self) -> impl Iterator<Item = &str> {
        self.response_ids.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.turn_index.is_none() && self.response_ids.is_empty()
    }

    /// If the window slid away from the recorded head image, pop the oldest
    /// pending response id so the caller can delete it upstream.
    ///
    /// At most one id is released per call.
    pub fn take_superseded(&mut self, head_turn: Option<usize>) -> Option<String> {
        if self.response_ids.is_empty() || self.turn_index == head_turn {
            return None;
        }
        self.response_ids.pop_front()
    }

    /// Record a response that carried a new image for the current head.
    pub fn record(&mut self, head_turn: Option<usize>, response_id: String) {
        self.turn_index = head_turn;
        self.response_ids.push_back(response_id);
    }

    pub fn reset(&mut self) {
        self.turn_index = None;
        self.response_ids.clear();
    }
}

/// Per-agent-session model state, owned by the caller and threaded through
/// every invocation. Each session owns its own instance; it is never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSession {
    pub session_id: String,
    pub head_image: HeadImageContext,
}

impl ModelSession {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            head_image: HeadImageContext::default(),
        }
    }

    /// Called whenever the agent session restarts.
    pub fn reset(&mut self) {
        tracing::debug!(session = %self.session_id, "model session reset");
        self.head_image.reset();
    }
}

impl Default for ModelSession {
    fn default() -> Self {
        Self::new()
    }
}
