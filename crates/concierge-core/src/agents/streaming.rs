//! Chunked delivery of a structured reply
//!
//! The model produces one validated [`StructuredOutput`]; streaming hands the
//! response text out in whitespace-aligned pieces and closes with the labels.

use crate::task::StructuredOutput;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// One piece of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// Next chunk of the response text
    Response(String),
    /// Final fragment, always last and always exactly once
    Labels { intent: String, sentiment: String },
}

/// Split text into chunks of roughly `target` characters
///
/// Chunks end after a whitespace run so words stay whole; a single word longer
/// than `target` becomes its own chunk. Concatenating the chunks gives back the
/// input exactly.
pub fn chunk_text(text: &str, target: usize) -> Vec<String> {
    let target = target.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for word in split_keep_whitespace(text) {
        let word_chars = word.chars().count();
        if current_chars > 0 && current_chars + word_chars > target {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(word);
        current_chars += word_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Words with their trailing whitespace attached
fn split_keep_whitespace(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_whitespace = false;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_whitespace = true;
        } else if in_whitespace {
            pieces.push(&text[start..idx]);
            start = idx;
            in_whitespace = false;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Turn a validated reply into its fragment sequence
pub fn fragments(output: StructuredOutput, chunk_chars: usize) -> Vec<StreamFragment> {
    let StructuredOutput {
        response,
        intent,
        sentiment,
    } = output;

    let mut fragments: Vec<StreamFragment> = chunk_text(&response, chunk_chars)
        .into_iter()
        .map(StreamFragment::Response)
        .collect();
    fragments.push(StreamFragment::Labels { intent, sentiment });
    fragments
}

/// Stream form of [`fragments`]
pub fn fragment_stream(
    output: StructuredOutput,
    chunk_chars: usize,
) -> impl Stream<Item = StreamFragment> + Send + 'static {
    futures::stream::iter(fragments(output, chunk_chars))
}
