use super::{Article, BestEffort, HostError, SearchHost, SearchResults, RESULT_CAP};
use async_trait::async_trait;
use futures::future::join_all;
use quick_xml::events::Event;
use quick_xml::Reader;

const BASE_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivClient {
    client: reqwest::Client,
}

impl ArxivClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("paperdesk/0.1")
                .build()
                .unwrap(),
        }
    }
}

#[async_trait]
impl SearchHost for ArxivClient {
    fn code(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    async fn search(&self, query: &str) -> Result<SearchResults, HostError> {
        let url = format!(
            "{}?search_query=all:{}&start=0&max_results={}&sortBy=relevance&sortOrder=descending",
            BASE_URL,
            urlencoded(query),
            RESULT_CAP
        );
        let resp = self.client.get(&url).send().await?.text().await?;
        let (entries, total) = parse_atom_feed(&resp)?;
        let articles: Vec<Article> = entries.into_iter().filter_map(entry_to_article).collect();

        // One BibTeX lookup per entry, concurrently; a failed lookup leaves
        // that entry's bibtex unavailable and nothing else.
        let client = &self.client;
        let articles = join_all(articles.into_iter().map(|mut article| async move {
            if let Some(doi) = article.doi.clone() {
                article.bibtex = match fetch_bibtex(client, &doi).await {
                    Ok(text) => BestEffort::Fetched(text.trim().to_string()),
                    Err(e) => {
                        tracing::warn!(doi, error = %e, "BibTeX lookup failed");
                        BestEffort::Unavailable
                    }
                };
            }
            article
        }))
        .await;

        Ok(SearchResults::new(articles, total))
    }
}

/// Content negotiation against doi.org; DataCite serves BibTeX for the
/// arXiv DOI prefix.
async fn fetch_bibtex(client: &reqwest::Client, doi: &str) -> Result<String, reqwest::Error> {
    let url = format!("https://doi.org/{}", doi);
    client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/x-bibtex")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// New-style arXiv abs URLs carry an id of the form `2301.12345` plus an
/// optional `v<N>` suffix; the DOI is that id under the 10.48550 prefix.
/// Old-style ids (`cond-mat/0102536`) have no registered DOI, so they and
/// anything else unexpected yield `None`.
fn derive_doi(abs_url: &str) -> Option<String> {
    if !abs_url.contains("arxiv.org") {
        tracing::warn!(url = abs_url, "not an arXiv URL, skipping DOI");
        return None;
    }
    let last = abs_url.trim_end_matches('/').rsplit('/').next()?;
    if last.split('.').count() != 2 {
        tracing::warn!(url = abs_url, "unrecognized arXiv id format, skipping DOI");
        return None;
    }
    let id = match last.rsplit_once('v') {
        Some((base, ver)) if !ver.is_empty() && ver.chars().all(|c| c.is_ascii_digit()) => base,
        _ => last,
    };
    Some(format!("10.48550/arXiv.{}", id))
}

fn urlencoded(s: &str) -> String {
    s.replace(' ', "+")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

fn capture_link(e: &quick_xml::events::BytesStart<'_>, entry: &mut AtomEntry) {
    let mut href = String::new();
    let mut title_attr = String::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let val = String::from_utf8_lossy(&attr.value).to_string();
        if key == "href" {
            href = val;
        } else if key == "title" {
            title_attr = val;
        }
    }
    if title_attr == "pdf" {
        entry.link_pdf = href;
    } else if entry.link_abs.is_empty() && href.contains("abs") {
        entry.link_abs = href;
    }
}

/// One `<entry>` of the Atom feed, fields as the feed gives them.
#[derive(Debug, Default)]
struct AtomEntry {
    abs_url: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    link_abs: String,
    link_pdf: String,
}

fn entry_to_article(entry: AtomEntry) -> Option<Article> {
    let short_id = entry
        .abs_url
        .rsplit('/')
        .next()
        .unwrap_or(&entry.abs_url)
        .to_string();
    let title = entry.title.trim().replace('\n', " ");
    if short_id.is_empty() || title.is_empty() {
        return None;
    }
    let year = entry.published.get(..4).and_then(|y| y.parse::<u16>().ok());
    let doi = derive_doi(&entry.abs_url);
    let url = if entry.link_abs.is_empty() {
        entry.abs_url.clone()
    } else {
        entry.link_abs.clone()
    };
    let summary = entry.summary.trim();
    Some(Article {
        id: format!("arxiv:{}", short_id),
        title,
        authors: entry.authors,
        abstract_text: if summary.is_empty() {
            None
        } else {
            Some(summary.replace('\n', " "))
        },
        year,
        venue: Some("arXiv".to_string()),
        kind: Some("preprint".to_string()),
        doi,
        url: Some(url),
        bibtex: BestEffort::Unavailable,
        bibtex_url: None,
        pdf_link: if entry.link_pdf.is_empty() {
            None
        } else {
            Some(entry.link_pdf)
        },
        citations: None,
    })
}

fn parse_atom_feed(xml: &str) -> Result<(Vec<AtomEntry>, Option<u64>), HostError> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut total: Option<u64> = None;
    let mut in_total = false;
    let mut in_entry = false;
    let mut in_author = false;
    let mut current_tag = String::new();
    let mut author_name = String::new();
    let mut entry = AtomEntry::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" {
                    in_entry = true;
                    entry = AtomEntry::default();
                } else if tag == "opensearch:totalResults" && !in_entry {
                    in_total = true;
                } else if in_entry {
                    current_tag = tag.clone();
                    if tag == "author" {
                        in_author = true;
                        author_name.clear();
                    }
                    if tag == "link" {
                        capture_link(&e, &mut entry);
                    }
                }
            }
            Ok(Event::Empty(e)) if in_entry => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "link" {
                    capture_link(&e, &mut entry);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if in_total {
                    total = text.trim().parse::<u64>().ok();
                } else if in_entry {
                    match current_tag.as_str() {
                        "title" => entry.title.push_str(&text),
                        "summary" => entry.summary.push_str(&text),
                        "id" if entry.abs_url.is_empty() => entry.abs_url = text,
                        "published" => entry.published.push_str(&text),
                        "name" if in_author => author_name.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "entry" && in_entry {
                    in_entry = false;
                    entries.push(std::mem::take(&mut entry));
                } else if tag == "author" && in_author {
                    in_author = false;
                    if !author_name.trim().is_empty() {
                        entry.authors.push(author_name.trim().to_string());
                    }
                } else if tag == "opensearch:totalResults" {
                    in_total = false;
                }
                if tag == current_tag {
                    current_tag.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(HostError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    entries.truncate(RESULT_CAP);
    Ok((entries, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">
  <opensearch:totalResults>2042</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v1</id>
    <title>Test Paper on Graph Networks</title>
    <summary>This is a test abstract about graph
networks.</summary>
    <published>2023-01-15T00:00:00Z</published>
    <author><name>John Doe</name></author>
    <author><name>Jane Smith</name></author>
    <link href="http://arxiv.org/abs/2301.12345v1" rel="alternate" type="text/html"/>
    <link href="http://arxiv.org/pdf/2301.12345v1" title="pdf" type="application/pdf"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let (entries, total) = parse_atom_feed(SAMPLE_ATOM).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(total, Some(2042));
        let a = entry_to_article(entries.into_iter().next().unwrap()).unwrap();
        assert_eq!(a.id, "arxiv:2301.12345v1");
        assert_eq!(a.title, "Test Paper on Graph Networks");
        assert_eq!(a.authors, vec!["John Doe", "Jane Smith"]);
        assert_eq!(a.year, Some(2023));
        assert_eq!(a.venue.as_deref(), Some("arXiv"));
        assert_eq!(a.kind.as_deref(), Some("preprint"));
        assert_eq!(a.abstract_text.as_deref(), Some("This is a test abstract about graph networks."));
        assert_eq!(a.pdf_link.as_deref(), Some("http://arxiv.org/pdf/2301.12345v1"));
        assert_eq!(a.doi.as_deref(), Some("10.48550/arXiv.2301.12345"));
        assert_eq!(a.bibtex, BestEffort::Unavailable);
    }

    #[test]
    fn test_derive_doi() {
        assert_eq!(
            derive_doi("http://arxiv.org/abs/2301.12345v1").as_deref(),
            Some("10.48550/arXiv.2301.12345")
        );
        assert_eq!(
            derive_doi("https://arxiv.org/abs/2107.03374").as_deref(),
            Some("10.48550/arXiv.2107.03374")
        );
        // Old-style ids have no dot-separated pair.
        assert_eq!(derive_doi("https://arxiv.org/abs/cond-mat/0102536"), None);
        assert_eq!(derive_doi("https://example.com/abs/2301.12345"), None);
    }

    #[test]
    fn test_doi_keeps_bare_trailing_v() {
        // A lone trailing 'v' is not a version suffix.
        assert_eq!(
            derive_doi("https://arxiv.org/abs/2301.12345v").as_deref(),
            Some("10.48550/arXiv.2301.12345v")
        );
    }

    #[test]
    fn test_caps_oversized_feed() {
        let mut feed = String::from(
            r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/"><opensearch:totalResults>2042</opensearch:totalResults>"#,
        );
        for i in 0..13 {
            feed.push_str(&format!(
                "<entry><id>http://arxiv.org/abs/2301.100{i:02}v1</id><title>Paper {i}</title><published>2023-01-15T00:00:00Z</published></entry>"
            ));
        }
        feed.push_str("</feed>");

        let (entries, total) = parse_atom_feed(&feed).unwrap();
        assert_eq!(entries.len(), RESULT_CAP);
        assert_eq!(entries[0].title, "Paper 0");
        assert_eq!(entries[9].title, "Paper 9");
        assert_eq!(total, Some(2042));
    }
}
