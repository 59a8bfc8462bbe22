use super::{Article, BestEffort, HostError, SearchHost, SearchResults, RESULT_CAP};
use async_trait::async_trait;
use futures::future::join_all;
use quick_xml::events::Event;
use quick_xml::Reader;

const BASE_URL: &str = "https://dblp.org/search/publ/api";

pub struct DblpClient {
    client: reqwest::Client,
}

impl DblpClient {
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
impl SearchHost for DblpClient {
    fn code(&self) -> &str {
        "dblp"
    }

    fn name(&self) -> &str {
        "DBLP"
    }

    async fn search(&self, query: &str) -> Result<SearchResults, HostError> {
        let cap = RESULT_CAP.to_string();
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[("q", query), ("format", "xml"), ("h", cap.as_str())])
            .send()
            .await?
            .text()
            .await?;
        let (hits, total) = parse_search_response(&resp)?;
        let articles: Vec<Article> = hits.into_iter().filter_map(hit_to_article).collect();

        // DBLP serves the record's BibTeX next to the record page; fetch all
        // of them concurrently, each one best-effort.
        let client = &self.client;
        let articles = join_all(articles.into_iter().map(|mut article| async move {
            if let Some(url) = article.bibtex_url.clone() {
                article.bibtex = match fetch_bibtex(client, &url).await {
                    Ok(text) => BestEffort::Fetched(text.trim().to_string()),
                    Err(e) => {
                        tracing::warn!(url, error = %e, "BibTeX fetch failed");
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

async fn fetch_bibtex(client: &reqwest::Client, url: &str) -> Result<String, reqwest::Error> {
    client.get(url).send().await?.error_for_status()?.text().await
}

/// One `<hit>` of a publ API response, fields as DBLP gives them. Absent
/// children leave their buffer empty.
#[derive(Debug, Default)]
struct DblpHit {
    id: String,
    title: String,
    authors: Vec<String>,
    venue: String,
    year: String,
    kind: String,
    doi: String,
    url: String,
    ees: Vec<ElectronicEdition>,
}

/// An `<ee>` link; DBLP tags some with a `data-type` attribute.
#[derive(Debug, Default)]
struct ElectronicEdition {
    data_type: String,
    value: String,
}

fn hit_to_article(hit: DblpHit) -> Option<Article> {
    let title = hit.title.trim().replace('\n', " ");
    if hit.id.is_empty() || title.is_empty() {
        return None;
    }
    let url = if hit.url.is_empty() {
        hit.ees.first().map(|ee| ee.value.clone())
    } else {
        Some(hit.url.clone())
    };
    // The record's BibTeX lives next to the record page.
    let bibtex_url = url.as_ref().map(|u| format!("{}.bib?param=1", u));
    let pdf_link = find_pdf_link(&hit.ees);
    Some(Article {
        id: format!("dblp:{}", hit.id),
        title,
        authors: hit.authors,
        abstract_text: None,
        year: hit.year.trim().parse::<u16>().ok(),
        venue: non_empty(hit.venue),
        kind: non_empty(hit.kind),
        doi: non_empty(hit.doi),
        url,
        bibtex: BestEffort::Unavailable,
        bibtex_url,
        pdf_link,
        citations: None,
    })
}

/// First electronic edition marked as a PDF, or failing that one whose URL
/// plainly ends in `.pdf`.
fn find_pdf_link(ees: &[ElectronicEdition]) -> Option<String> {
    ees.iter()
        .find(|ee| ee.data_type == "pdf" || ee.value.ends_with(".pdf"))
        .map(|ee| ee.value.clone())
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn parse_search_response(xml: &str) -> Result<(Vec<DblpHit>, Option<u64>), HostError> {
    let mut reader = Reader::from_str(xml);
    let mut hits = Vec::new();
    let mut total: Option<u64> = None;
    let mut in_hit = false;
    let mut in_title = false;
    let mut in_author = false;
    let mut current_tag = String::new();
    let mut author_name = String::new();
    let mut hit = DblpHit::default();
    let mut ee = ElectronicEdition::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "hits" {
                    total = read_total(&e);
                } else if tag == "hit" {
                    in_hit = true;
                    hit = DblpHit::default();
                    for attr in e.attributes().flatten() {
                        if String::from_utf8_lossy(attr.key.as_ref()) == "id" {
                            hit.id = String::from_utf8_lossy(&attr.value).to_string();
                        }
                    }
                } else if in_hit {
                    current_tag = tag.clone();
                    match tag.as_str() {
                        // Titles may carry nested markup; the flag keeps the
                        // capture open across it.
                        "title" => in_title = true,
                        "author" => {
                            in_author = true;
                            author_name.clear();
                        }
                        "ee" => {
                            ee = ElectronicEdition::default();
                            for attr in e.attributes().flatten() {
                                if String::from_utf8_lossy(attr.key.as_ref()) == "data-type" {
                                    ee.data_type = String::from_utf8_lossy(&attr.value).to_string();
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "hits" {
                    total = read_total(&e);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if in_title {
                    hit.title.push_str(&text);
                } else if in_author {
                    author_name.push_str(&text);
                } else if in_hit {
                    match current_tag.as_str() {
                        "venue" => hit.venue.push_str(&text),
                        "year" => hit.year.push_str(&text),
                        "type" => hit.kind.push_str(&text),
                        "doi" => hit.doi.push_str(&text),
                        "url" => hit.url.push_str(&text),
                        "ee" => ee.value.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match tag.as_str() {
                    "hit" if in_hit => {
                        in_hit = false;
                        hits.push(std::mem::take(&mut hit));
                    }
                    "title" => in_title = false,
                    "author" if in_author => {
                        in_author = false;
                        if !author_name.trim().is_empty() {
                            hit.authors.push(author_name.trim().to_string());
                        }
                    }
                    "ee" if in_hit => hit.ees.push(std::mem::take(&mut ee)),
                    _ => {}
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
    hits.truncate(RESULT_CAP);
    Ok((hits, total))
}

fn read_total(e: &quick_xml::events::BytesStart<'_>) -> Option<u64> {
    for attr in e.attributes().flatten() {
        if String::from_utf8_lossy(attr.key.as_ref()) == "total" {
            return String::from_utf8_lossy(&attr.value).trim().parse::<u64>().ok();
        }
    }
    None
}
