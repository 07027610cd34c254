//! Conversation history + screenshot buffer → provider-agnostic messages.
//!
//! Every stage is a pure function over owned values so it can be tested in
//! isolation: budget → placeholder substitution → role coercion →
//! content normalisation.
use crate::agent_engine::history::{count_placeholders, Speaker, Turn, IMAGE_PLACEHOLDER};
use crate::llm::types::{ChatMessage, ContentPart, MessageContent, Role};

/// Prepended when the conversation would otherwise open with the assistant.
pub const STARTING_INTERACTION: &str = "Starting interaction.";
/// Stands in for screenshots the target cannot receive in this request.
pub const OMITTED_SCREENSHOT: &str =
    "[An earlier screenshot was taken here; only the most recent screenshot is attached.]";

pub struct FormatRequest<'a> {
    pub history: &'a [Turn],
    pub new_turns: &'a [Turn],
    pub system_prompt: Option<&'a str>,
    /// Base64 screenshots, oldest first, one per placeholder occurrence.
    pub images: &'a [String],
    pub max_images: usize,
    /// Real images allowed in one request; `None` means all retained images.
    pub images_per_request: Option<usize>,
}

/// A turn together with its position in the caller's conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTurn {
    pub index: usize,
    pub turn: Turn,
}

/// Conversation after the image budget has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageWindow {
    pub turns: Vec<IndexedTurn>,
    pub images: Vec<String>,
}

impl ImageWindow {
    /// Conversation index of the earliest turn that still carries an image.
    pub fn head_image_turn(&self) -> Option<usize> {
        if self.images.is_empty() {
            return None;
        }
        self.turns
            .iter()
            .find(|t| t.turn.placeholder_count() > 0)
            .map(|t| t.index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedPrompt {
    pub messages: Vec<ChatMessage>,
    pub head_image_turn: Option<usize>,
    pub image_count: usize,
}

/// Keep at most `max_images` of the most recent screenshots and drop the
/// placeholders of every screenshot that is no longer available.
///
/// Placeholders are dropped oldest first. A turn that held nothing but
/// dropped placeholders is removed; otherwise only the token is removed and
/// the text stays.
pub fn apply_image_budget(turns: &[Turn], images: &[String], max_images: usize) -> ImageWindow {
    let placeholders = count_placeholders(turns);
    let keep = placeholders.min(images.len()).min(max_images);
    let mut to_drop = placeholders - keep;

    if keep < images.len() || to_drop > 0 {
        tracing::debug!(
            placeholders,
            images = images.len(),
            max_images,
            keep,
            "trimming image window"
        );
    }

    let mut window_turns = Vec::with_capacity(turns.len());
    for (index, turn) in turns.iter().enumerate() {
        let count = turn.placeholder_count();
        if to_drop == 0 || count == 0 {
            window_turns.push(IndexedTurn { index, turn: turn.clone() });
            continue;
        }
        let dropped_here = count.min(to_drop);
        to_drop -= dropped_here;
        if dropped_here == count && turn.is_image_only() {
            continue;
        }
        window_turns.push(IndexedTurn {
            index,
            turn: Turn {
                from: turn.from,
                value: remove_placeholders(&turn.value, dropped_here),
            },
        });
    }

    ImageWindow {
        turns: window_turns,
        images: images[images.len() - keep..].to_vec(),
    }
}

/// Remove the first `count` placeholders, collapsing the whitespace around
/// each one to a single separator (a newline if either side had one).
fn remove_placeholders(value: &str, count: usize) -> String {
    let mut pieces = value.splitn(count + 1, IMAGE_PLACEHOLDER);
    let mut out = pieces.next().unwrap_or_default().to_string();
    for piece in pieces {
        let left = out.trim_end();
        let right = piece.trim_start();
        let gap = format!("{}{}", &out[left.len()..], &piece[..piece.len() - right.len()]);
        let separator = if left.is_empty() || right.is_empty() {
            ""
        } else if gap.contains('\n') {
            "\n"
        } else if !gap.is_empty() {
            " "
        } else {
            ""
        };
        out = format!("{left}{separator}{right}");
    }
    out.trim().to_string()
}

/// Split every human turn on the placeholder and interleave its images.
///
/// Images are assigned in placeholder order. When `images_per_request` is
/// smaller than the window, only the latest placeholders get real images and
/// the earlier ones get [`OMITTED_SCREENSHOT`].
pub fn substitute_placeholders(window: &ImageWindow, images_per_request: Option<usize>) -> Vec<ChatMessage> {
    let total = window.images.len();
    let first_real = images_per_request.map_or(0, |limit| total.saturating_sub(limit));
    let mut image_idx = 0usize;
    let mut messages = Vec::with_capacity(window.turns.len());

    for IndexedTurn { turn, .. } in &window.turns {
        let message = match turn.from {
            Speaker::Assistant => ChatMessage::text(Role::Assistant, turn.value.clone()),
            Speaker::Human => {
                let segments: Vec<&str> = turn.value.split(IMAGE_PLACEHOLDER).collect();
                let mut parts = Vec::new();
                for (i, segment) in segments.iter().enumerate() {
                    let text = segment.trim();
                    if !text.is_empty() {
                        parts.push(ContentPart::text(text));
                    }
                    if i + 1 == segments.len() {
                        break;
                    }
                    // Placeholders with no screenshot left are text-only.
                    if let Some(image) = window.images.get(image_idx) {
                        if image_idx >= first_real {
                            parts.push(ContentPart::image_base64(image));
                        } else {
                            parts.push(ContentPart::text(OMITTED_SCREENSHOT));
                        }
                    }
                    image_idx += 1;
                }
                ChatMessage::parts(Role::User, parts)
            }
        };
        if !is_empty_message(&message) {
            messages.push(message);
        }
    }
    messages
}

fn is_empty_message(message: &ChatMessage) -> bool {
    match &message.content {
        MessageContent::Text(text) => text.trim().is_empty(),
        MessageContent::Parts(parts) => parts.is_empty(),
    }
}

/// Join adjacent text parts so merged messages stay compact.
fn coalesce_text(parts: Vec<ContentPart>) -> Vec<ContentPart> {
    let mut out: Vec<ContentPart> = Vec::with_capacity(parts.len());
    for part in parts {
        if let ContentPart::Text { text } = &part {
            if let Some(ContentPart::Text { text: prev }) = out.last_mut() {
                prev.push_str("\n\n");
                prev.push_str(text);
                continue;
            }
        }
        out.push(part);
    }
    out
}

/// Single text part → bare string; anything richer stays structured.
pub fn normalize_content(content: MessageContent) -> MessageContent {
    let MessageContent::Parts(parts) = content else {
        return content;
    };
    let parts = coalesce_text(parts);
    if parts.is_empty() {
        return MessageContent::Text(String::new());
    }
    if parts.len() == 1 {
        if let Some(ContentPart::Text { text }) = parts.first() {
            let text = text.clone();
            return MessageContent::Text(text);
        }
    }
    MessageContent::Parts(parts)
}

/// Concatenate `next` onto `prev`, keeping `prev`'s role.
pub fn merge_messages(prev: &ChatMessage, next: &ChatMessage) -> ChatMessage {
    let mut parts = prev.content.to_parts();
    parts.extend(next.content.to_parts());
    ChatMessage {
        role: prev.role,
        content: normalize_content(MessageContent::Parts(parts)),
    }
}

/// Append `message`, merging it into the last entry when the roles match.
pub fn push_or_merge(out: &mut Vec<ChatMessage>, message: ChatMessage) {
    if let Some(prev) = out.last_mut().filter(|prev| prev.role == message.role) {
        let merged = merge_messages(prev, &message);
        *prev = merged;
        return;
    }
    out.push(message);
}

/// Force the first non-system message to be `user` and merge same-role runs.
pub fn coerce_roles(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(messages.len() + 1);
    for message in messages {
        let opens_conversation = out.iter().all(|m| m.role == Role::System);
        if opens_conversation && message.role == Role::Assistant {
            out.push(ChatMessage::text(Role::User, STARTING_INTERACTION));
        }
        push_or_merge(&mut out, message);
    }
    out
}

pub fn format_messages(request: &FormatRequest<'_>) -> FormattedPrompt {
    let turns: Vec<Turn> = request
        .history
        .iter()
        .chain(request.new_turns)
        .cloned()
        .collect();

    let window = apply_image_budget(&turns, request.images, request.max_images);
    let head_image_turn = window.head_image_turn();

    let mut messages = Vec::new();
    if let Some(system) = request.system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::text(Role::System, system));
    }
    messages.extend(substitute_placeholders(&window, request.images_per_request));

    let messages: Vec<ChatMessage> = coerce_roles(messages)
        .into_iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: normalize_content(m.content),
        })
        .collect();
    let image_count = messages.iter().map(|m| m.content.image_count()).sum();

    FormattedPrompt {
        messages,
        head_image_turn,
        image_count,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn images(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn image_part(data: &str) -> ContentPart {
        ContentPart::image_base64(data)
    }

    #[test]
    fn test_budget_keeps_most_recent_images_and_drops_oldest_placeholders() {
        let fixture = vec![
            Turn::human("open settings"),
            Turn::screenshot(),
            Turn::assistant("click A"),
            Turn::screenshot(),
            Turn::assistant("click B"),
            Turn::screenshot(),
        ];

        let actual = apply_image_budget(&fixture, &images(&["A", "B"]), 5);

        assert_eq!(actual.images, images(&["A", "B"]));
        let kept: Vec<usize> = actual.turns.iter().map(|t| t.index).collect();
        assert_eq!(kept, vec![0, 2, 3, 4, 5]);
    }

    #[test]
    fn test_budget_enforces_configured_maximum() {
        let fixture = vec![
            Turn::human("task"),
            Turn::screenshot(),
            Turn::assistant("a1"),
            Turn::screenshot(),
            Turn::assistant("a2"),
            Turn::screenshot(),
        ];

        let actual = apply_image_budget(&fixture, &images(&["A", "B", "C"]), 1);

        assert_eq!(actual.images, images(&["C"]));
        let kept: Vec<usize> = actual.turns.iter().map(|t| t.index).collect();
        assert_eq!(kept, vec![0, 2, 4, 5]);
        assert_eq!(actual.head_image_turn(), Some(5));
    }

    #[test]
    fn test_budget_keeps_text_of_mixed_turns() {
        let fixture = vec![Turn::human("before <image> after"), Turn::screenshot()];

        let actual = apply_image_budget(&fixture, &images(&["B"]), 5);

        assert_eq!(actual.turns[0].turn.value, "before after");
        assert_eq!(actual.turns.len(), 2);
    }

    #[test]
    fn test_removed_placeholder_leaves_single_separator() {
        assert_eq!(remove_placeholders("look\n<image>\nthen click", 1), "look\nthen click");
        assert_eq!(remove_placeholders("a<image>b", 1), "ab");
        assert_eq!(remove_placeholders("<image> first <image> second", 1), "first <image> second");
    }

    #[test]
    fn test_budget_without_images_removes_all_placeholders() {
        let fixture = vec![Turn::human("task"), Turn::screenshot()];

        let actual = apply_image_budget(&fixture, &[], 5);

        assert_eq!(actual.turns.len(), 1);
        assert_eq!(actual.head_image_turn(), None);
    }

    #[test]
    fn test_substitution_interleaves_images_in_order() {
        let window = ImageWindow {
            turns: vec![IndexedTurn { index: 0, turn: Turn::human("first <image> then <image> end") }],
            images: images(&["A", "B"]),
        };

        let actual = substitute_placeholders(&window, None);

        let expected = vec![ChatMessage::parts(
            Role::User,
            vec![
                ContentPart::text("first"),
                image_part("A"),
                ContentPart::text("then"),
                image_part("B"),
                ContentPart::text("end"),
            ],
        )];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_single_image_target_gets_stand_ins_for_earlier_screenshots() {
        let window = ImageWindow {
            turns: vec![
                IndexedTurn { index: 0, turn: Turn::screenshot() },
                IndexedTurn { index: 1, turn: Turn::assistant("wait()") },
                IndexedTurn { index: 2, turn: Turn::screenshot() },
            ],
            images: images(&["A", "B"]),
        };

        let actual = substitute_placeholders(&window, Some(1));

        let expected = vec![
            ChatMessage::parts(Role::User, vec![ContentPart::text(OMITTED_SCREENSHOT)]),
            ChatMessage::text(Role::Assistant, "wait()"),
            ChatMessage::parts(Role::User, vec![image_part("B")]),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_coerce_prepends_user_and_merges_runs() {
        let fixture = vec![
            ChatMessage::text(Role::System, "sys"),
            ChatMessage::text(Role::Assistant, "a1"),
            ChatMessage::text(Role::Assistant, "a2"),
            ChatMessage::text(Role::User, "u1"),
        ];

        let actual = coerce_roles(fixture);

        let expected = vec![
            ChatMessage::text(Role::System, "sys"),
            ChatMessage::text(Role::User, STARTING_INTERACTION),
            ChatMessage::text(Role::Assistant, "a1\n\na2"),
            ChatMessage::text(Role::User, "u1"),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_normalize_single_text_part_to_string() {
        let actual = normalize_content(MessageContent::Parts(vec![ContentPart::text("hi")]));

        assert_eq!(actual, MessageContent::Text("hi".into()));
    }

    #[test]
    fn test_normalize_keeps_image_parts_structured() {
        let fixture = MessageContent::Parts(vec![image_part("A")]);

        let actual = normalize_content(fixture.clone());

        assert_eq!(actual, fixture);
    }

    #[test]
    fn test_format_full_pipeline() {
        let history = vec![
            Turn::human("open the calculator"),
            Turn::screenshot(),
            Turn::assistant("Thought: t\nAction: click(start_box='(1,2)')"),
        ];
        let new_turns = vec![Turn::screenshot()];
        let request = FormatRequest {
            history: &history,
            new_turns: &new_turns,
            system_prompt: Some("You are a GUI agent."),
            images: &images(&["A", "B"]),
            max_images: 5,
            images_per_request: None,
        };

        let actual = format_messages(&request);

        let expected = vec![
            ChatMessage::text(Role::System, "You are a GUI agent."),
            ChatMessage::parts(
                Role::User,
                vec![ContentPart::text("open the calculator"), image_part("A")],
            ),
            ChatMessage::text(Role::Assistant, "Thought: t\nAction: click(start_box='(1,2)')"),
            ChatMessage::parts(Role::User, vec![image_part("B")]),
        ];
        assert_eq!(actual.messages, expected);
        assert_eq!(actual.head_image_turn, Some(1));
        assert_eq!(actual.image_count, 2);
    }
}
