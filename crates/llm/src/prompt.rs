//! Prompt construction for summary, question, and Q&A generation.
//!
//! Every generation prompt is three layers: a fixed role + JSON output
//! contract, instructions (publisher override or default), and the exact
//! format template. The builders are pure functions of those layers.

const SUMMARY_ROLE_CONTRACT: &str = "\
You are an expert content analyst for a publisher's reader-engagement widget. \
You read one blog article and produce a faithful, self-contained summary of it. \
You MUST respond with a single JSON object and nothing else: no prose before or \
after it, no markdown code fences, no comments.";

const SUMMARY_DEFAULT_INSTRUCTIONS: &str = "\
Summarize the article in 3 to 5 sentences using a neutral, informative tone. \
Do not add opinions or facts that are not in the article. Then extract the 3 to \
7 most important key points as short standalone statements a reader could skim.";

const SUMMARY_FORMAT_TEMPLATE: &str = r#"Respond with JSON in exactly this shape:
{
  "summary": "<the summary text>",
  "key_points": ["<key point>", "<key point>"]
}"#;

const QUESTION_ROLE_CONTRACT: &str = "\
You are an expert content analyst for a publisher's reader-engagement widget. \
Given a blog article, you generate the exploratory questions a curious reader \
would ask next, each with a grounded answer. You MUST respond with a single \
JSON object and nothing else: no prose before or after it, no markdown code \
fences, no comments.";

const QUESTION_FORMAT_TEMPLATE: &str = r#"Respond with JSON in exactly this shape:
{
  "questions": [
    { "question": "<the question>", "answer": "<the answer>" }
  ]
}"#;

/// System prompt for the stateless Q&A answer endpoint.
///
/// The widget renders raw HTML, hence the hard formatting contract: short
/// paragraphs separated by `<br><br>`, `<b>` emphasis (never markdown), and a
/// closing key-takeaway line.
pub const QA_ANSWER_SYSTEM_PROMPT: &str = "\
Role: You are an expert assistant answering a reader's specific question \
clearly, accurately, and authoritatively. Briefly explain the how or the why \
instead of giving a bare one-liner, and write in simple, direct language.\n\
\n\
MANDATORY FORMATTING (follow exactly):\n\
1. Break the answer into short paragraphs of at most 2-3 sentences, separated \
by <br><br>.\n\
2. Bold the 3-5 most important terms or phrases using HTML <b>...</b> tags. \
Never use markdown (** or __ or #), only HTML tags.\n\
3. End with exactly this on its own line: <b>Key Takeaway:</b> followed by a \
one-sentence summary.\n\
4. Keep the whole answer under 200 words (1000 characters).\n\
5. No conversational filler. Start directly with the answer.";

/// Build the system prompt for summary generation.
pub fn summary_system_prompt(custom_instructions: Option<&str>) -> String {
    let instructions = custom_instructions
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(SUMMARY_DEFAULT_INSTRUCTIONS);
    format!("{SUMMARY_ROLE_CONTRACT}\n\n{instructions}\n\n{SUMMARY_FORMAT_TEMPLATE}")
}

/// Build the system prompt for question generation.
pub fn question_system_prompt(question_count: u32, custom_instructions: Option<&str>) -> String {
    let default_instructions = format!(
        "Generate exactly {question_count} question/answer pairs a curious reader would \
ask after reading this article. Questions must be answerable from the article; \
answers must be grounded in its content, 2 to 4 sentences each, and must not \
contradict it."
    );
    let instructions = custom_instructions
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or(default_instructions);
    format!("{QUESTION_ROLE_CONTRACT}\n\n{instructions}\n\n{QUESTION_FORMAT_TEMPLATE}")
}

/// Build the user message carrying the article itself.
pub fn article_user_prompt(title: &str, url: &str, content: &str) -> String {
    format!("Title: {title}\nURL: {url}\n\nArticle:\n{content}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prompt_uses_default_instructions() {
        let prompt = summary_system_prompt(None);
        assert!(prompt.contains("single JSON object"));
        assert!(prompt.contains("3 to 5 sentences"));
        assert!(prompt.contains("\"key_points\""));
    }

    #[test]
    fn summary_prompt_honors_publisher_override() {
        let prompt = summary_system_prompt(Some("Summarize for a five-year-old."));
        assert!(prompt.contains("Summarize for a five-year-old."));
        assert!(!prompt.contains("3 to 5 sentences"));
        // Role contract and format template are non-negotiable layers.
        assert!(prompt.contains("single JSON object"));
        assert!(prompt.contains("\"key_points\""));
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        let prompt = summary_system_prompt(Some("   "));
        assert!(prompt.contains("3 to 5 sentences"));
    }

    #[test]
    fn question_prompt_embeds_count() {
        let prompt = question_system_prompt(7, None);
        assert!(prompt.contains("exactly 7 question/answer pairs"));
        assert!(prompt.contains("\"questions\""));
    }

    #[test]
    fn question_prompt_override_keeps_format_contract() {
        let prompt = question_system_prompt(5, Some("Ask only about methodology."));
        assert!(prompt.contains("Ask only about methodology."));
        assert!(prompt.contains("\"questions\""));
    }

    #[test]
    fn article_prompt_contains_all_parts() {
        let prompt = article_user_prompt("A Title", "https://example.com/a", "Body text.");
        assert!(prompt.contains("Title: A Title"));
        assert!(prompt.contains("URL: https://example.com/a"));
        assert!(prompt.contains("Body text."));
    }
}
