use std::time::Duration;

use quarry_core::QuarryError;

const ARXIV_API: &str = "http://export.arxiv.org/api/query";

/// Fetch paper metadata for an arXiv URL and format it as an external
/// context block for the ranking prompt.
///
/// Accepts `arxiv.org/abs/<id>` and `arxiv.org/pdf/<id>` URLs. Metadata is
/// retrieved from the arXiv export API's Atom feed rather than the PDF,
/// which reliably yields title, authors, and abstract.
///
/// Callers treat any failure as "no context": the search proceeds without
/// the block and logs a note.
///
/// # Errors
///
/// Returns [`QuarryError::Config`] for an unrecognized URL,
/// [`QuarryError::Provider`] on transport failure or non-success status,
/// and [`QuarryError::ResponseParse`] when the feed has no paper entry.
pub async fn fetch_arxiv_context(url: &str) -> Result<String, QuarryError> {
    let paper_id = paper_id(url)
        .ok_or_else(|| QuarryError::Config(format!("invalid arXiv URL format: {url}")))?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| QuarryError::Provider(format!("failed to create HTTP client: {e}")))?;

    let response = http
        .get(ARXIV_API)
        .query(&[("id_list", paper_id.as_str())])
        .send()
        .await
        .map_err(|e| QuarryError::Provider(format!("arXiv request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(QuarryError::Provider(format!("arXiv API error {status}")));
    }

    let feed = response
        .text()
        .await
        .map_err(|e| QuarryError::Provider(format!("arXiv response unreadable: {e}")))?;

    format_context(&feed, url)
        .ok_or_else(|| QuarryError::ResponseParse("arXiv feed has no entry".to_string()))
}

/// Extract the paper identifier from an abs/ or pdf/ URL, tolerating a
/// `.pdf` suffix, a version tag, and trailing slashes.
fn paper_id(url: &str) -> Option<String> {
    let rest = url
        .split_once("arxiv.org/abs/")
        .or_else(|| url.split_once("arxiv.org/pdf/"))
        .map(|(_, rest)| rest)?;
    let id = rest
        .split('?')
        .next()?
        .trim_end_matches('/')
        .trim_end_matches(".pdf");
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

fn format_context(feed: &str, url: &str) -> Option<String> {
    // The feed-level <title> describes the query itself; paper metadata
    // lives inside the first <entry>.
    let entry = slice_between(feed, "<entry>", "</entry>")?;
    let title = slice_between(entry, "<title>", "</title>")?.trim();
    let abstract_text = slice_between(entry, "<summary>", "</summary>")?.trim();

    let mut authors: Vec<&str> = Vec::new();
    let mut rest = entry;
    while let Some(name) = slice_between(rest, "<name>", "</name>") {
        authors.push(name.trim());
        let after = rest.find("</name>")? + "</name>".len();
        rest = &rest[after..];
    }

    Some(format!(
        "ARXIV PAPER CONTEXT:\nTitle: {title}\nAuthors: {}\nURL: {url}\nAbstract: {abstract_text}\n",
        authors.join(", ")
    ))
}

fn slice_between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_id_from_abs_url() {
        assert_eq!(
            paper_id("https://arxiv.org/abs/2101.12345").as_deref(),
            Some("2101.12345")
        );
    }

    #[test]
    fn paper_id_from_pdf_url() {
        assert_eq!(
            paper_id("https://arxiv.org/pdf/2101.12345v2.pdf").as_deref(),
            Some("2101.12345v2")
        );
    }

    #[test]
    fn paper_id_rejects_other_urls() {
        assert!(paper_id("https://example.com/paper.pdf").is_none());
        assert!(paper_id("https://arxiv.org/abs/").is_none());
    }

    const FEED: &str = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query: id_list=2101.12345</title>
  <entry>
    <title>Graph Diameter in Sublinear Time</title>
    <summary>We present an algorithm that approximates graph diameter.</summary>
    <author><name>A. Researcher</name></author>
    <author><name>B. Colleague</name></author>
  </entry>
</feed>"#;

    #[test]
    fn format_context_reads_entry_metadata() {
        let block = format_context(FEED, "https://arxiv.org/abs/2101.12345").unwrap();
        assert!(block.contains("Title: Graph Diameter in Sublinear Time"));
        assert!(block.contains("Authors: A. Researcher, B. Colleague"));
        assert!(block.contains("Abstract: We present an algorithm"));
        // Feed-level query title must not leak into the block.
        assert!(!block.contains("ArXiv Query"));
    }

    #[test]
    fn format_context_requires_an_entry() {
        let empty = r#"<feed><title>ArXiv Query</title></feed>"#;
        assert!(format_context(empty, "url").is_none());
    }
}
