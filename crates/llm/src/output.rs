//! Typed parsing of LLM JSON output.
//!
//! Models occasionally wrap JSON in code fences or surround it with prose
//! despite the contract; parsing strips that before handing the payload to
//! serde. Schema violations surface as [`OutputError`] so the caller can
//! retry within its attempt budget.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("response contains no JSON payload")]
    NoJson,

    #[error("response JSON does not match the expected schema: {0}")]
    Schema(String),

    #[error("response JSON is valid but empty: {0}")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryOutput {
    pub summary: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionOutput {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct QuestionsEnvelope {
    questions: Vec<QuestionOutput>,
}

/// Slice the first JSON object or array out of a raw model response.
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    // Strip a ```json ... ``` (or bare ```) fence if present.
    let inner = if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.rsplit_once("```").map(|(body, _)| body).unwrap_or(rest)
    } else {
        trimmed
    };

    let start = inner.find(['{', '['])?;
    let close = match inner.as_bytes()[start] {
        b'{' => '}',
        _ => ']',
    };
    let end = inner.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&inner[start..=end])
}

/// Parse a summary-generation response.
///
/// Enforces the format contract: `summary` must be present and non-empty,
/// `key_points` must be present.
pub fn parse_summary(raw: &str) -> Result<SummaryOutput, OutputError> {
    let json = extract_json(raw).ok_or(OutputError::NoJson)?;
    let parsed: SummaryOutput =
        serde_json::from_str(json).map_err(|e| OutputError::Schema(e.to_string()))?;
    if parsed.summary.trim().is_empty() {
        return Err(OutputError::Empty("summary"));
    }
    Ok(parsed)
}

/// Parse a question-generation response.
///
/// Accepts either the `{"questions": [...]}` envelope or a bare array.
/// Every pair must have a non-empty question and answer.
pub fn parse_questions(raw: &str) -> Result<Vec<QuestionOutput>, OutputError> {
    let json = extract_json(raw).ok_or(OutputError::NoJson)?;

    let questions = match serde_json::from_str::<QuestionsEnvelope>(json) {
        Ok(envelope) => envelope.questions,
        Err(_) => serde_json::from_str::<Vec<QuestionOutput>>(json)
            .map_err(|e| OutputError::Schema(e.to_string()))?,
    };

    if questions.is_empty() {
        return Err(OutputError::Empty("questions"));
    }
    for q in &questions {
        if q.question.trim().is_empty() || q.answer.trim().is_empty() {
            return Err(OutputError::Empty("question/answer pair"));
        }
    }

    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_summary_json() {
        let raw = r#"{"summary": "An overview.", "key_points": ["a", "b"]}"#;
        let parsed = parse_summary(raw).unwrap();
        assert_eq!(parsed.summary, "An overview.");
        assert_eq!(parsed.key_points.len(), 2);
    }

    #[test]
    fn parses_fenced_summary_json() {
        let raw = "```json\n{\"summary\": \"Fenced.\", \"key_points\": []}\n```";
        let parsed = parse_summary(raw).unwrap();
        assert_eq!(parsed.summary, "Fenced.");
    }

    #[test]
    fn parses_summary_with_surrounding_prose() {
        let raw = "Here is the result:\n{\"summary\": \"Prose-wrapped.\", \"key_points\": [\"x\"]}\nHope that helps!";
        let parsed = parse_summary(raw).unwrap();
        assert_eq!(parsed.summary, "Prose-wrapped.");
    }

    #[test]
    fn rejects_summary_missing_key_points() {
        let raw = r#"{"summary": "No points."}"#;
        assert!(matches!(parse_summary(raw), Err(OutputError::Schema(_))));
    }

    #[test]
    fn rejects_empty_summary_text() {
        let raw = r#"{"summary": "   ", "key_points": ["a"]}"#;
        assert!(matches!(parse_summary(raw), Err(OutputError::Empty(_))));
    }

    #[test]
    fn rejects_non_json_response() {
        assert!(matches!(
            parse_summary("I cannot summarize this article."),
            Err(OutputError::NoJson)
        ));
    }

    #[test]
    fn parses_question_envelope() {
        let raw = r#"{"questions": [{"question": "Why?", "answer": "Because."}]}"#;
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Why?");
    }

    #[test]
    fn parses_bare_question_array() {
        let raw = r#"[{"question": "Q1?", "answer": "A1."}, {"question": "Q2?", "answer": "A2."}]"#;
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn rejects_empty_question_list() {
        let raw = r#"{"questions": []}"#;
        assert!(matches!(parse_questions(raw), Err(OutputError::Empty(_))));
    }

    #[test]
    fn rejects_blank_answer() {
        let raw = r#"{"questions": [{"question": "Q?", "answer": ""}]}"#;
        assert!(matches!(parse_questions(raw), Err(OutputError::Empty(_))));
    }
}
