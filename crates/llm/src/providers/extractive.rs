//! Offline extractive answering.
//!
//! Answers by quoting the context sentences that share the most terms with the
//! question. No network, deterministic, and never says anything the context
//! does not contain. Used for local runs without an API key and in tests.
//!
//! The prompt is expected to end with a `Question:` line (the default grounded
//! prompt does); everything before it is treated as context, minus the
//! `Context:` header and `[From ...]:` source labels.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docqa_core::{AppError, AppResult};
use std::collections::HashSet;

/// Reply used when no context sentence shares a term with the question.
pub const NOT_FOUND_ANSWER: &str = "I could not find this information in the provided documents.";

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "who", "whom", "when", "where", "why", "how",
    "does", "did", "do", "can", "could", "would", "should", "about", "there", "tell",
];

/// Deterministic extractive client.
#[derive(Debug, Clone)]
pub struct ExtractiveClient {
    max_sentences: usize,
}

impl ExtractiveClient {
    pub fn new() -> Self {
        Self { max_sentences: 2 }
    }

    /// Limit how many sentences an answer may quote.
    pub fn with_max_sentences(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }

    fn answer(&self, prompt: &str) -> AppResult<String> {
        let marker = prompt.rfind("Question:").ok_or_else(|| {
            AppError::Synthesis("Prompt has no 'Question:' section to answer".to_string())
        })?;

        let question = prompt[marker + "Question:".len()..]
            .split("\n\n")
            .next()
            .unwrap_or_default();
        let question_terms = terms(question);

        let sentences: Vec<&str> = prompt[..marker]
            .lines()
            .filter(|line| !is_label(line))
            .flat_map(split_sentences)
            .collect();

        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, terms(s).intersection(&question_terms).count()))
            .filter(|(_, overlap)| *overlap > 0)
            .collect();

        if scored.is_empty() {
            return Ok(NOT_FOUND_ANSWER.to_string());
        }

        // Best overlap first, earlier sentence wins ties; then restore text order.
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.max_sentences);
        scored.sort_by_key(|(i, _)| *i);

        let mut seen = HashSet::new();
        let picked: Vec<&str> = scored
            .into_iter()
            .map(|(i, _)| sentences[i])
            .filter(|s| seen.insert(*s))
            .collect();

        Ok(picked.join(" "))
    }
}

impl Default for ExtractiveClient {
    fn default() -> Self {
        Self::new()
    }
}

fn is_label(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed == "Context:"
        || (trimmed.starts_with("[From ") && trimmed.ends_with("]:"))
}

fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = line.as_bytes();

    for (i, b) in bytes.iter().enumerate() {
        let terminal = matches!(b, b'.' | b'!' | b'?');
        let at_boundary = i + 1 == bytes.len() || bytes[i + 1].is_ascii_whitespace();
        if terminal && at_boundary {
            let sentence = line[start..=i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = i + 1;
        }
    }

    let tail = line[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

#[async_trait::async_trait]
impl LlmClient for ExtractiveClient {
    fn provider_name(&self) -> &str {
        "extractive"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let content = self.answer(&request.prompt)?;
        tracing::debug!(answer_len = content.len(), "Extractive answer selected");

        let prompt_words = request.prompt.split_whitespace().count() as u32;
        let answer_words = content.split_whitespace().count() as u32;

        Ok(LlmResponse {
            content,
            model: "extractive".to_string(),
            usage: LlmUsage::new(prompt_words, answer_words),
        })
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "Context:\n[From sky.txt, section 0]:\nThe sky is blue. Grass is green.\n\nQuestion: What color is the sky?\n\nAnswer based on the context above:";

    #[tokio::test]
    async fn test_picks_matching_sentence() {
        let client = ExtractiveClient::new();
        let response = client
            .complete(&LlmRequest::new(PROMPT, "extractive"))
            .await
            .unwrap();
        assert_eq!(response.content, "The sky is blue.");
    }

    #[tokio::test]
    async fn test_no_overlap_says_not_found() {
        let client = ExtractiveClient::new();
        let prompt = "Context:\n[From a.txt, section 0]:\nCats purr.\n\nQuestion: Who won the election?";
        let response = client
            .complete(&LlmRequest::new(prompt, "extractive"))
            .await
            .unwrap();
        assert_eq!(response.content, NOT_FOUND_ANSWER);
    }

    #[tokio::test]
    async fn test_missing_question_is_synthesis_error() {
        let client = ExtractiveClient::new();
        let err = client
            .complete(&LlmRequest::new("just text", "extractive"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Synthesis(_)));
    }

    #[test]
    fn test_split_sentences() {
        let parts = split_sentences("One. Two! Three? v1.2 stays whole");
        assert_eq!(parts, vec!["One.", "Two!", "Three?", "v1.2 stays whole"]);
    }

    #[test]
    fn test_labels_skipped() {
        assert!(is_label("[From notes.txt, section 3]:"));
        assert!(is_label("Context:"));
        assert!(!is_label("The sky is blue."));
    }
}
