//! Line-delimited JSON encoding for the backing document and exports.

use tracing::warn;

use crate::dataset::core::config::LoadPolicy;
use crate::dataset::core::errors::{DatasetError, DatasetResult};
use crate::dataset::core::message::Conversation;

/// Conversations decoded from a document, with the lines that were skipped.
#[derive(Debug, Default)]
pub struct Decoded {
    /// Conversations in document order.
    pub conversations: Vec<Conversation>,
    /// 1-based numbers of lines skipped under [`LoadPolicy::SkipInvalid`].
    pub skipped_lines: Vec<usize>,
}

/// Encode one conversation as a single JSON line, without the newline.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn encode_line(conversation: &Conversation) -> DatasetResult<String> {
    Ok(serde_json::to_string(conversation)?)
}

/// Encode conversations as a document: one JSON object per line, each line
/// newline-terminated. Non-ASCII text is written as-is.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn encode_document(conversations: &[Conversation]) -> DatasetResult<String> {
    let mut out = String::new();
    for conversation in conversations {
        out.push_str(&encode_line(conversation)?);
        out.push('\n');
    }
    Ok(out)
}

/// Decode a document. Blank lines are ignored.
///
/// # Errors
/// Under [`LoadPolicy::Strict`], returns [`DatasetError::CorruptLine`] for the
/// first line that does not parse.
pub fn decode_document(text: &str, policy: LoadPolicy) -> DatasetResult<Decoded> {
    let mut decoded = Decoded::default();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Conversation>(line) {
            Ok(conversation) => decoded.conversations.push(conversation),
            Err(source) => {
                let line_no = index + 1;
                match policy {
                    LoadPolicy::Strict => {
                        return Err(DatasetError::CorruptLine {
                            line: line_no,
                            source,
                        });
                    }
                    LoadPolicy::SkipInvalid => {
                        warn!("skipping unreadable conversation on line {line_no}: {source}");
                        decoded.skipped_lines.push(line_no);
                    }
                }
            }
        }
    }

    Ok(decoded)
}
