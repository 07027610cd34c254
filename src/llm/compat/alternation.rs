use crate::llm::formatter::{merge_messages, push_or_merge};
use crate::llm::types::{ChatMessage, ContentPart, MessageContent, Role};

/// Injected where a user turn is missing.
pub const CONTINUE_PROMPT: &str = "Continue.";
/// Injected between two screenshots that must not share one message.
pub const ASSISTANT_ACK: &str = "Understood.";
/// Caption added to messages that would otherwise be image-only.
pub const SCREENSHOT_CAPTION: &str = "Current screenshot.";

/// Turn every system message into user content.
pub fn fold_system_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let message = match message.role {
            Role::System => ChatMessage {
                role: Role::User,
                content: message.content.clone(),
            },
            _ => message.clone(),
        };
        push_or_merge(&mut out, message);
    }
    out
}

/// Give image-only messages a short text part.
pub fn caption_image_only(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|message| match &message.content {
            MessageContent::Parts(parts)
                if !parts.is_empty() && parts.iter().all(|p| matches!(p, ContentPart::ImageUrl { .. })) =>
            {
                let mut parts = parts.clone();
                parts.push(ContentPart::text(SCREENSHOT_CAPTION));
                ChatMessage::parts(message.role, parts)
            }
            _ => message.clone(),
        })
        .collect()
}

/// Enforce strict user/assistant turn-taking.
///
/// Leading system messages stay in front. After them the sequence starts
/// with `user`, never repeats a role and ends with `user`. Same-role
/// neighbours are merged, except two image-bearing user messages, which get
/// an assistant acknowledgment between them. Applying the repair to its own
/// output changes nothing.
pub fn repair_alternation(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let leading_system = messages.iter().take_while(|m| m.role == Role::System).count();
    let (system, rest) = messages.split_at(leading_system);

    let mut out: Vec<ChatMessage> = Vec::with_capacity(rest.len() + 2);
    for message in rest {
        let message = match message.role {
            Role::System => ChatMessage {
                role: Role::User,
                content: message.content.clone(),
            },
            _ => message.clone(),
        };

        let Some(prev) = out.last() else {
            if message.role == Role::Assistant {
                out.push(ChatMessage::text(Role::User, CONTINUE_PROMPT));
            }
            out.push(message);
            continue;
        };

        if prev.role != message.role {
            out.push(message);
        } else if message.role == Role::User && prev.has_image() && message.has_image() {
            out.push(ChatMessage::text(Role::Assistant, ASSISTANT_ACK));
            out.push(message);
        } else {
            let merged = merge_messages(prev, &message);
            if let Some(last) = out.last_mut() {
                *last = merged;
            }
        }
    }

    if out.last().map(|m| m.role) != Some(Role::User) {
        out.push(ChatMessage::text(Role::User, CONTINUE_PROMPT));
    }

    let mut repaired = system.to_vec();
    repaired.extend(out);
    repaired
}

/// True when no two non-system neighbours share a role and the sequence
/// starts and ends with `user`.
pub fn is_strictly_alternating(messages: &[ChatMessage]) -> bool {
    let turns: Vec<Role> = messages
        .iter()
        .map(|m| m.role)
        .skip_while(|r| *r == Role::System)
        .collect();
    turns.first() == Some(&Role::User)
        && turns.last() == Some(&Role::User)
        && turns.windows(2).all(|w| w[0] != w[1])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn user(text: &str) -> ChatMessage {
        ChatMessage::text(Role::User, text)
    }

    fn assistant(text: &str) -> ChatMessage {
        ChatMessage::text(Role::Assistant, text)
    }

    fn screenshot(data: &str) -> ChatMessage {
        ChatMessage::parts(Role::User, vec![ContentPart::image_base64(data)])
    }

    #[test]
    fn test_repair_merges_same_role_runs() {
        let fixture = vec![user("a"), user("b"), assistant("c"), assistant("d"), user("e")];

        let actual = repair_alternation(&fixture);

        let expected = vec![user("a\n\nb"), assistant("c\n\nd"), user("e")];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_repair_injects_missing_turns() {
        let fixture = vec![assistant("hello"), user("u")];

        let actual = repair_alternation(&fixture);

        let expected = vec![user(CONTINUE_PROMPT), assistant("hello"), user("u")];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_repair_ends_on_user() {
        let fixture = vec![ChatMessage::text(Role::System, "sys"), user("u"), assistant("a")];

        let actual = repair_alternation(&fixture);

        let expected = vec![ChatMessage::text(Role::System, "sys"), user("u"), assistant("a"), user(CONTINUE_PROMPT)];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_repair_separates_adjacent_screenshots() {
        let fixture = vec![screenshot("A"), screenshot("B")];

        let actual = repair_alternation(&fixture);

        let expected = vec![screenshot("A"), assistant(ASSISTANT_ACK), screenshot("B")];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_repair_of_empty_sequence_is_single_user_turn() {
        let actual = repair_alternation(&[]);

        assert_eq!(actual, vec![user(CONTINUE_PROMPT)]);
    }

    #[test]
    fn test_repair_is_idempotent_and_alternating() {
        let fixtures = vec![
            vec![assistant("x")],
            vec![user("a"), screenshot("A"), screenshot("B"), assistant("c")],
            vec![ChatMessage::text(Role::System, "s"), assistant("a"), assistant("b")],
            vec![user("a"), ChatMessage::text(Role::System, "mid"), user("b")],
        ];

        for fixture in fixtures {
            let once = repair_alternation(&fixture);
            let twice = repair_alternation(&once);

            assert!(is_strictly_alternating(&once), "not alternating: {once:?}");
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn test_fold_system_messages_merges_into_first_user() {
        let fixture = vec![ChatMessage::text(Role::System, "rules"), user("task")];

        let actual = fold_system_messages(&fixture);

        assert_eq!(actual, vec![user("rules\n\ntask")]);
    }

    #[test]
    fn test_caption_image_only_messages() {
        let fixture = vec![screenshot("A")];

        let actual = caption_image_only(&fixture);

        let expected = vec![ChatMessage::parts(
            Role::User,
            vec![ContentPart::image_base64("A"), ContentPart::text(SCREENSHOT_CAPTION)],
        )];
        assert_eq!(actual, expected);
    }
}
