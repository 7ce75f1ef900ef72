//! HTML → article extraction.
//!
//! Synchronous on purpose: `scraper::Html` is not `Send`, so parsing happens
//! strictly between awaits, on the already-fetched body.

use scraper::{ElementRef, Html, Selector};

#[derive(Debug, Clone)]
pub struct Extracted {
    pub title: String,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub word_count: usize,
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector")
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let s = sel(selector);
    doc.select(&s)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Collapse runs of whitespace into single spaces.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract title, author, date, and the main article text from raw HTML.
pub fn extract(html: &str) -> Extracted {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, r#"meta[property="og:title"]"#)
        .or_else(|| {
            doc.select(&sel("title"))
                .next()
                .map(element_text)
                .map(|t| squash(&t))
                .filter(|t| !t.is_empty())
        })
        .or_else(|| {
            doc.select(&sel("h1"))
                .next()
                .map(element_text)
                .map(|t| squash(&t))
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_default();

    let author = meta_content(&doc, r#"meta[name="author"]"#)
        .or_else(|| meta_content(&doc, r#"meta[property="article:author"]"#));

    let published_date = meta_content(&doc, r#"meta[property="article:published_time"]"#)
        .or_else(|| {
            doc.select(&sel("time[datetime]"))
                .next()
                .and_then(|el| el.value().attr("datetime"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });

    // Prefer the semantic article container; fall back to <main>, then <body>.
    let container_selectors = ["article", "main", "body"];
    let mut content = String::new();
    for container in container_selectors {
        let cs = sel(container);
        if let Some(root) = doc.select(&cs).next() {
            content = paragraphs_text(root);
            if !content.is_empty() {
                break;
            }
        }
    }

    let word_count = content.split_whitespace().count();
    let language = whatlang::detect(&content).map(|info| info.lang().code().to_string());

    Extracted {
        title,
        author,
        published_date,
        content,
        language,
        word_count,
    }
}

/// Join the text of all paragraph-level nodes under `root`. Falls back to the
/// container's full text when it holds no <p> elements.
fn paragraphs_text(root: ElementRef<'_>) -> String {
    let p = sel("p, h2, h3, li");
    let parts: Vec<String> = root
        .select(&p)
        .map(element_text)
        .map(|t| squash(&t))
        .filter(|t| !t.is_empty())
        .collect();

    if !parts.is_empty() {
        return parts.join("\n\n");
    }

    squash(&element_text(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Fallback Title | Site</title>
  <meta property="og:title" content="How Queues Fail" />
  <meta name="author" content="Dana Author" />
  <meta property="article:published_time" content="2024-11-02T10:00:00Z" />
</head>
<body>
  <nav><p>Home About Contact</p></nav>
  <article>
    <h1>How Queues Fail</h1>
    <p>Queues fail in surprisingly boring ways. Most outages start with a slow consumer.</p>
    <p>Backpressure is the difference between a delay and an incident.</p>
  </article>
  <footer><p>Copyright</p></footer>
</body>
</html>"#;

    #[test]
    fn prefers_og_title() {
        let out = extract(SAMPLE);
        assert_eq!(out.title, "How Queues Fail");
    }

    #[test]
    fn extracts_author_and_date() {
        let out = extract(SAMPLE);
        assert_eq!(out.author.as_deref(), Some("Dana Author"));
        assert_eq!(out.published_date.as_deref(), Some("2024-11-02T10:00:00Z"));
    }

    #[test]
    fn article_content_skips_nav_and_footer() {
        let out = extract(SAMPLE);
        assert!(out.content.contains("slow consumer"));
        assert!(out.content.contains("Backpressure"));
        assert!(!out.content.contains("Copyright"));
        assert!(!out.content.contains("Home About"));
    }

    #[test]
    fn counts_words() {
        let out = extract(SAMPLE);
        assert!(out.word_count > 10);
        assert_eq!(out.word_count, out.content.split_whitespace().count());
    }

    #[test]
    fn detects_english() {
        let out = extract(SAMPLE);
        assert_eq!(out.language.as_deref(), Some("eng"));
    }

    #[test]
    fn falls_back_to_title_tag_and_body() {
        let html = "<html><head><title>Plain Page</title></head><body>Just some body text here, short and flat.</body></html>";
        let out = extract(html);
        assert_eq!(out.title, "Plain Page");
        assert!(out.content.contains("body text"));
    }

    #[test]
    fn empty_document() {
        let out = extract("<html><body></body></html>");
        assert_eq!(out.title, "");
        assert_eq!(out.word_count, 0);
    }
}
