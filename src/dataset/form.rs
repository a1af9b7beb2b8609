//! Form handling: turning submitted message pairs into conversations and back.
//!
//! Submissions arrive as three parallel lists (user texts, assistant texts,
//! weights) plus an optional system message. Lists are paired by position and
//! truncated to the shortest one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::core::config::{FormConfig, WeightPolicy};
use crate::dataset::core::errors::{DatasetError, DatasetResult};
use crate::dataset::core::message::{Conversation, DEFAULT_WEIGHT, Message, Weight};

/// Message shown when a submission carries no pair at all.
pub const NO_PAIRS_MESSAGE: &str = "At least one User and Assistant message pair is required";

/// A user/assistant exchange with its weight, as shown in the edit form.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessagePair {
    /// User text.
    pub user_message: String,
    /// Assistant text.
    pub assistant_message: String,
    /// Assistant weight.
    pub weight: Weight,
}

/// A raw, not yet validated pair borrowed from a submission.
#[derive(Clone, Copy, Debug)]
pub struct RawPair<'a> {
    /// User text as submitted.
    pub user: &'a str,
    /// Assistant text as submitted.
    pub assistant: &'a str,
    /// Weight field as submitted.
    pub weight: &'a str,
}

/// Zip three parallel lists into raw pairs, dropping anything past the shortest.
pub fn zip_pairs<'a>(
    users: &'a [String],
    assistants: &'a [String],
    weights: &'a [String],
) -> impl Iterator<Item = RawPair<'a>> + 'a {
    users
        .iter()
        .zip(assistants)
        .zip(weights)
        .map(|((user, assistant), weight)| RawPair {
            user,
            assistant,
            weight,
        })
}

/// Coerce a submitted weight field into a number.
#[must_use]
pub fn coerce_weight(raw: &str, policy: WeightPolicy) -> Weight {
    match policy {
        WeightPolicy::Integer => {
            if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return DEFAULT_WEIGHT;
            }
            raw.parse().unwrap_or(DEFAULT_WEIGHT)
        }
        WeightPolicy::Checkbox => {
            let checked = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "on" | "true" | "1" | "yes"
            );
            Weight::from(checked)
        }
    }
}

/// Validate and assemble a conversation from a system message and raw pairs.
///
/// All texts are trimmed. A non-empty system message becomes the leading
/// message. The whole submission is rejected if any pair has an empty side or
/// if there is no pair at all.
///
/// # Errors
/// Returns [`DatasetError::Validation`] on an empty user/assistant text or an
/// empty submission.
pub fn build_conversation<'a, I>(
    system_message: &str,
    pairs: I,
    policy: WeightPolicy,
) -> DatasetResult<Conversation>
where
    I: IntoIterator<Item = RawPair<'a>>,
{
    let mut messages = Vec::new();

    let system_message = system_message.trim();
    if !system_message.is_empty() {
        messages.push(Message::system(system_message));
    }

    let mut pair_count = 0_usize;
    for pair in pairs {
        let user = pair.user.trim();
        let assistant = pair.assistant.trim();
        if user.is_empty() || assistant.is_empty() {
            return Err(DatasetError::empty_pair());
        }

        messages.push(Message::user(user));
        messages.push(Message::assistant(
            assistant,
            coerce_weight(pair.weight, policy),
        ));
        pair_count += 1;
    }

    if pair_count == 0 {
        return Err(DatasetError::Validation(NO_PAIRS_MESSAGE.to_string()));
    }

    Ok(Conversation::new(messages))
}

/// A weight field as it may arrive in a JSON form body.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    /// Text input.
    Text(String),
    /// Numeric input.
    Number(i64),
    /// Checkbox state.
    Flag(bool),
    /// Anything else; coerced as unusable text.
    Other(serde_json::Value),
}

impl FormValue {
    /// Render the value the way an HTML form would have submitted it.
    #[must_use]
    pub fn as_form_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(n) => n.to_string(),
            Self::Flag(true) => "on".to_string(),
            Self::Flag(false) => "off".to_string(),
            Self::Other(_) => String::new(),
        }
    }
}

/// A create/update submission.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConversationForm {
    /// System message; `None` when the field was left out entirely.
    #[serde(default)]
    pub system_message: Option<String>,
    /// User texts in order.
    #[serde(default)]
    pub user_message: Vec<String>,
    /// Assistant texts in order.
    #[serde(default)]
    pub assistant_message: Vec<String>,
    /// Weight fields in order.
    #[serde(default)]
    pub weight: Vec<FormValue>,
    /// Whether to remember the system message as the session default.
    #[serde(default)]
    pub persist: bool,
}

impl ConversationForm {
    /// System message after falling back to the configured default and trimming.
    #[must_use]
    pub fn effective_system_message<'a>(&'a self, config: &'a FormConfig) -> &'a str {
        self.system_message
            .as_deref()
            .unwrap_or(&config.default_system_message)
            .trim()
    }

    /// Validate the submission and build the conversation.
    ///
    /// # Errors
    /// Returns [`DatasetError::Validation`] if any pair is incomplete.
    pub fn build(&self, config: &FormConfig) -> DatasetResult<Conversation> {
        let weights: Vec<String> = self.weight.iter().map(FormValue::as_form_text).collect();
        build_conversation(
            self.effective_system_message(config),
            zip_pairs(&self.user_message, &self.assistant_message, &weights),
            config.weight_policy,
        )
    }
}

/// Irregularity found while splitting a stored conversation into pairs.
///
/// Positions are indices into the conversation's message list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairingAnomaly {
    /// A user message followed by another user message.
    ConsecutiveUser {
        /// Position of the unanswered user message.
        position: usize,
    },
    /// An assistant message with no user message before it.
    OrphanAssistant {
        /// Position of the assistant message.
        position: usize,
    },
    /// A user message at the end with no answer.
    TrailingUser {
        /// Position of the user message.
        position: usize,
    },
    /// A second system message; the last one wins.
    ExtraSystem {
        /// Position of the replaced system message.
        position: usize,
    },
}

impl fmt::Display for PairingAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConsecutiveUser { position } => {
                write!(f, "user message at {position} has no assistant reply")
            }
            Self::OrphanAssistant { position } => {
                write!(f, "assistant message at {position} has no user message")
            }
            Self::TrailingUser { position } => {
                write!(f, "trailing user message at {position} has no assistant reply")
            }
            Self::ExtraSystem { position } => {
                write!(f, "system message at {position} is overridden by a later one")
            }
        }
    }
}

/// A stored conversation split back into form fields.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EditDraft {
    /// Leading system message, or empty.
    pub system_message: String,
    /// Pairs in order.
    pub message_pairs: Vec<MessagePair>,
    /// Irregularities found while pairing.
    pub anomalies: Vec<PairingAnomaly>,
}

impl EditDraft {
    /// Whether the stored record paired cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// Split a stored conversation into a system message and ordered pairs.
///
/// Well-formed records decompose exactly. Malformed ones never lose text:
/// an unanswered user message yields a pair with an empty assistant side and an
/// orphan assistant yields a pair with an empty user side, so the edit form
/// refuses to save until the gap is filled. Each irregularity is reported.
#[must_use]
pub fn decompose_for_edit(conversation: &Conversation) -> EditDraft {
    let mut draft = EditDraft::default();
    let mut system_at: Option<usize> = None;
    let mut pending_user: Option<(usize, &str)> = None;

    for (position, message) in conversation.messages.iter().enumerate() {
        match message {
            Message::System { content } => {
                if let Some(previous) = system_at.replace(position) {
                    draft
                        .anomalies
                        .push(PairingAnomaly::ExtraSystem { position: previous });
                }
                draft.system_message.clone_from(content);
            }
            Message::User { content } => {
                if let Some((previous, text)) = pending_user.replace((position, content.as_str())) {
                    draft
                        .anomalies
                        .push(PairingAnomaly::ConsecutiveUser { position: previous });
                    draft.message_pairs.push(MessagePair {
                        user_message: text.to_string(),
                        assistant_message: String::new(),
                        weight: DEFAULT_WEIGHT,
                    });
                }
            }
            Message::Assistant { content, weight } => {
                let user_message = match pending_user.take() {
                    Some((_, text)) => text.to_string(),
                    None => {
                        draft
                            .anomalies
                            .push(PairingAnomaly::OrphanAssistant { position });
                        String::new()
                    }
                };
                draft.message_pairs.push(MessagePair {
                    user_message,
                    assistant_message: content.clone(),
                    weight: *weight,
                });
            }
        }
    }

    if let Some((position, text)) = pending_user {
        draft
            .anomalies
            .push(PairingAnomaly::TrailingUser { position });
        draft.message_pairs.push(MessagePair {
            user_message: text.to_string(),
            assistant_message: String::new(),
            weight: DEFAULT_WEIGHT,
        });
    }

    for anomaly in &draft.anomalies {
        warn!("malformed stored conversation: {anomaly}");
    }

    draft
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn build(system: &str, users: &[&str], assistants: &[&str], weights: &[&str]) -> DatasetResult<Conversation> {
        let users = strings(users);
        let assistants = strings(assistants);
        let weights = strings(weights);
        build_conversation(
            system,
            zip_pairs(&users, &assistants, &weights),
            WeightPolicy::Integer,
        )
    }

    #[test]
    fn test_build_terse_example() {
        let conversation = build("You are terse.", &["Hi"], &["Hello"], &["2"]).unwrap();
        assert_eq!(
            conversation.messages,
            vec![
                Message::system("You are terse."),
                Message::user("Hi"),
                Message::assistant("Hello", 2),
            ]
        );
    }

    #[test]
    fn test_build_trims_and_skips_blank_system() {
        let conversation = build("   ", &["  Hi \n"], &["\tHello  "], &["1"]).unwrap();
        assert_eq!(
            conversation.messages,
            vec![Message::user("Hi"), Message::assistant("Hello", 1)]
        );
    }

    #[test]
    fn test_build_rejects_empty_assistant() {
        let err = build("", &["Hi"], &[""], &["1"]).unwrap_err();
        assert!(matches!(err, DatasetError::Validation(_)));
        assert_eq!(err.to_string(), "User and Assistant messages cannot be empty");
    }

    #[test]
    fn test_build_rejects_whole_submission_on_later_empty_pair() {
        let err = build("sys", &["a", "   "], &["b", "c"], &["1", "1"]).unwrap_err();
        assert!(matches!(err, DatasetError::Validation(_)));
    }

    #[test]
    fn test_build_rejects_no_pairs() {
        let err = build("sys", &[], &[], &[]).unwrap_err();
        assert_eq!(err.to_string(), NO_PAIRS_MESSAGE);
    }

    #[test]
    fn test_build_truncates_to_shortest_list() {
        let conversation = build("", &["a", "b", "c"], &["x", "y"], &["3", "4", "5"]).unwrap();
        assert_eq!(conversation.pair_count(), 2);
        assert_eq!(conversation.messages[3], Message::assistant("y", 4));
    }

    #[test]
    fn test_integer_weight_coercion() {
        assert_eq!(coerce_weight("0", WeightPolicy::Integer), 0);
        assert_eq!(coerce_weight("17", WeightPolicy::Integer), 17);
        assert_eq!(coerce_weight("", WeightPolicy::Integer), 1);
        assert_eq!(coerce_weight("-2", WeightPolicy::Integer), 1);
        assert_eq!(coerce_weight("2.5", WeightPolicy::Integer), 1);
        assert_eq!(coerce_weight(" 2", WeightPolicy::Integer), 1);
        assert_eq!(coerce_weight("abc", WeightPolicy::Integer), 1);
        assert_eq!(coerce_weight("5000000000", WeightPolicy::Integer), 5_000_000_000);
        assert_eq!(coerce_weight("18446744073709551615", WeightPolicy::Integer), u64::MAX);
        assert_eq!(coerce_weight("99999999999999999999", WeightPolicy::Integer), 1);
    }

    #[test]
    fn test_checkbox_weight_coercion() {
        assert_eq!(coerce_weight("on", WeightPolicy::Checkbox), 1);
        assert_eq!(coerce_weight("true", WeightPolicy::Checkbox), 1);
        assert_eq!(coerce_weight("1", WeightPolicy::Checkbox), 1);
        assert_eq!(coerce_weight("off", WeightPolicy::Checkbox), 0);
        assert_eq!(coerce_weight("", WeightPolicy::Checkbox), 0);
        assert_eq!(coerce_weight("5", WeightPolicy::Checkbox), 0);
    }

    #[test]
    fn test_build_then_decompose_recovers_input() {
        let conversation = build(
            "  Be brief. ",
            &["one ", "two"],
            &["uno", " dos "],
            &["3", "0"],
        )
        .unwrap();
        let draft = decompose_for_edit(&conversation);

        assert!(draft.is_clean());
        assert_eq!(draft.system_message, "Be brief.");
        assert_eq!(
            draft.message_pairs,
            vec![
                MessagePair {
                    user_message: "one".to_string(),
                    assistant_message: "uno".to_string(),
                    weight: 3,
                },
                MessagePair {
                    user_message: "two".to_string(),
                    assistant_message: "dos".to_string(),
                    weight: 0,
                },
            ]
        );
    }

    #[test]
    fn test_decompose_without_system_message() {
        let conversation = Conversation::new(vec![Message::user("q"), Message::assistant("a", 1)]);
        let draft = decompose_for_edit(&conversation);
        assert_eq!(draft.system_message, "");
        assert_eq!(draft.message_pairs.len(), 1);
    }

    #[test]
    fn test_decompose_flags_malformed_records() {
        let conversation = Conversation::new(vec![
            Message::system("first"),
            Message::assistant("orphan", 2),
            Message::system("second"),
            Message::user("q1"),
            Message::user("q2"),
            Message::assistant("a2", 1),
            Message::user("dangling"),
        ]);
        let draft = decompose_for_edit(&conversation);

        assert_eq!(draft.system_message, "second");
        assert_eq!(
            draft.anomalies,
            vec![
                PairingAnomaly::OrphanAssistant { position: 1 },
                PairingAnomaly::ExtraSystem { position: 0 },
                PairingAnomaly::ConsecutiveUser { position: 3 },
                PairingAnomaly::TrailingUser { position: 6 },
            ]
        );

        let texts: Vec<(&str, &str)> = draft
            .message_pairs
            .iter()
            .map(|p| (p.user_message.as_str(), p.assistant_message.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![("", "orphan"), ("q1", ""), ("q2", "a2"), ("dangling", "")]
        );
    }

    #[test]
    fn test_form_defaults_missing_system_message() {
        let config = FormConfig::default();
        let form = ConversationForm {
            system_message: None,
            user_message: strings(&["Hi"]),
            assistant_message: strings(&["Hello"]),
            weight: vec![FormValue::Number(4)],
            persist: false,
        };
        let conversation = form.build(&config).unwrap();
        assert_eq!(conversation.system_message(), Some("You are a helpful assistant."));
        assert_eq!(conversation.messages[2], Message::assistant("Hello", 4));
    }

    #[test]
    fn test_form_explicit_empty_system_message() {
        let config = FormConfig::default();
        let form = ConversationForm {
            system_message: Some(String::new()),
            user_message: strings(&["Hi"]),
            assistant_message: strings(&["Hello"]),
            weight: vec![FormValue::Text("x".to_string())],
            persist: true,
        };
        let conversation = form.build(&config).unwrap();
        assert_eq!(conversation.system_message(), None);
        assert_eq!(conversation.messages[1], Message::assistant("Hello", 1));
    }

    #[test]
    fn test_form_value_deserialization() {
        let form: ConversationForm = serde_json::from_str(
            r#"{"user_message":["a","b","c","d"],"assistant_message":["w","x","y","z"],"weight":["2",3,true,1.5]}"#,
        )
        .unwrap();
        let texts: Vec<String> = form.weight.iter().map(FormValue::as_form_text).collect();
        assert_eq!(texts, strings(&["2", "3", "on", ""]));

        let conversation = form.build(&FormConfig::default()).unwrap();
        let weights: Vec<Weight> = conversation
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::Assistant { weight, .. } => Some(*weight),
                _ => None,
            })
            .collect();
        assert_eq!(weights, vec![2, 3, 1, 1]);
    }

    #[test]
    fn test_form_checkbox_policy() {
        let config = FormConfig {
            weight_policy: WeightPolicy::Checkbox,
            ..FormConfig::default()
        };
        let form: ConversationForm = serde_json::from_str(
            r#"{"system_message":"","user_message":["a","b"],"assistant_message":["x","y"],"weight":[true,"off"]}"#,
        )
        .unwrap();
        let conversation = form.build(&config).unwrap();
        assert_eq!(conversation.messages[1], Message::assistant("x", 1));
        assert_eq!(conversation.messages[3], Message::assistant("y", 0));
    }
}
