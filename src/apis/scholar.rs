use super::{Article, BestEffort, HostError, SearchHost, SearchResults, RESULT_CAP};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use futures::future::join_all;
use scraper::{Html, Selector};
use url::Url;

const BASE_URL: &str = "https://scholar.google.com/scholar";
// Scholar serves a consent interstitial to obviously non-browser agents.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:140.0) Gecko/20100101 Firefox/140.0";

pub struct ScholarClient {
    client: reqwest::Client,
}

impl ScholarClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap(),
        }
    }
}

#[async_trait]
impl SearchHost for ScholarClient {
    fn code(&self) -> &str {
        "scholar"
    }

    fn name(&self) -> &str {
        "Google Scholar"
    }

    async fn search(&self, query: &str) -> Result<SearchResults, HostError> {
        let year_high = Utc::now().year().to_string();
        let html = self
            .client
            .get(BASE_URL)
            .query(&[
                ("q", query),
                ("hl", "en"),
                ("as_ylo", "1950"),
                ("as_yhi", year_high.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let (hits, total) = parse_results_page(&html)?;

        // Scholar has no citation API; the BibTeX link hides behind a
        // per-result citation page. Scrape them concurrently, best-effort.
        let client = &self.client;
        let articles = join_all(hits.into_iter().enumerate().map(|(index, hit)| async move {
            let paper_id = extract_paper_id(&hit.related_url);
            let mut article = hit_to_article(index, hit, paper_id.as_deref());
            if let Some(id) = paper_id {
                let page_url = citation_page_url(&id);
                article.bibtex_url = match fetch_bibtex_link(client, &page_url).await {
                    Ok(link) => Some(link),
                    Err(e) => {
                        tracing::warn!(paper_id = id, error = %e, "BibTeX link scrape failed");
                        None
                    }
                };
            }
            article
        }))
        .await;

        Ok(SearchResults::new(articles, total))
    }
}

/// One result block of a Scholar page, fields as scraped.
#[derive(Debug, Default)]
struct ScholarHit {
    title: String,
    url: String,
    authors: Vec<String>,
    snippet: String,
    year: Option<u16>,
    citations: u32,
    related_url: String,
    pdf_link: String,
}

fn hit_to_article(index: usize, hit: ScholarHit, paper_id: Option<&str>) -> Article {
    let id = match paper_id {
        Some(p) => format!("scholar:{}", p),
        None => format!("scholar:{}", index),
    };
    Article {
        id,
        title: hit.title,
        authors: hit.authors,
        abstract_text: non_empty(hit.snippet),
        year: hit.year,
        venue: None,
        kind: None,
        doi: None,
        url: non_empty(hit.url),
        bibtex: BestEffort::Unavailable,
        bibtex_url: None,
        pdf_link: non_empty(hit.pdf_link),
        citations: Some(hit.citations),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// The cluster id sits inside the "Related articles" href as
/// `related:<id>:scholar`.
fn extract_paper_id(related_url: &str) -> Option<String> {
    let (_, rest) = related_url.split_once("related:")?;
    let (id, _) = rest.split_once(":scholar")?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn citation_page_url(paper_id: &str) -> String {
    format!(
        "https://scholar.google.com/scholar?q=info:{}:scholar.google.com/&output=cite&scirp=0&hl=en",
        paper_id
    )
}

async fn fetch_bibtex_link(client: &reqwest::Client, page_url: &str) -> Result<String, HostError> {
    let html = client
        .get(page_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    extract_bibtex_link(&html, page_url)
}

/// Citation pages link the formats with host-relative hrefs; resolve against
/// the page URL.
fn extract_bibtex_link(html: &str, page_url: &str) -> Result<String, HostError> {
    let document = Html::parse_document(html);
    let link_sel = sel(r#"a[href*="scholar.bib"]"#)?;
    let href = match document.select(&link_sel).next().and_then(|a| a.value().attr("href")) {
        Some(h) => h,
        None => return Err(HostError::Parse("BibTeX link not found".to_string())),
    };
    let resolved = Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map_err(|e| HostError::Parse(format!("bad BibTeX link: {}", e)))?;
    Ok(resolved.to_string())
}

fn parse_results_page(html: &str) -> Result<(Vec<ScholarHit>, Option<u64>), HostError> {
    let document = Html::parse_document(html);
    let block_sel = sel("div.gs_r.gs_or.gs_scl")?;
    let title_sel = sel("h3.gs_rt a")?;
    let byline_sel = sel("div.gs_a")?;
    let snippet_sel = sel("div.gs_rs")?;
    let footer_sel = sel("div.gs_fl a")?;
    let pdf_sel = sel("div.gs_ggs a")?;
    let total_sel = sel("#gs_ab_md .gs_ab_mdw")?;

    let total = document
        .select(&total_sel)
        .next()
        .and_then(|el| parse_total(&el.text().collect::<String>()));

    let mut hits = Vec::new();
    for block in document.select(&block_sel).take(RESULT_CAP) {
        let anchor = match block.select(&title_sel).next() {
            Some(a) => a,
            // Bare [CITATION] entries have no link and nothing to open.
            None => continue,
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let mut hit = ScholarHit {
            title,
            url: anchor.value().attr("href").unwrap_or_default().to_string(),
            ..Default::default()
        };
        if let Some(byline) = block.select(&byline_sel).next() {
            let (authors, year) = parse_byline(&byline.text().collect::<String>());
            hit.authors = authors;
            hit.year = year;
        }
        if let Some(snippet) = block.select(&snippet_sel).next() {
            hit.snippet = snippet.text().collect::<String>().trim().replace('\n', " ");
        }
        for link in block.select(&footer_sel) {
            let text = link.text().collect::<String>();
            let href = link.value().attr("href").unwrap_or_default();
            if let Some(count) = text.strip_prefix("Cited by ") {
                hit.citations = count.trim().parse().unwrap_or(0);
            } else if href.contains("related:") {
                hit.related_url = href.to_string();
            }
        }
        if let Some(href) = block.select(&pdf_sel).next().and_then(|a| a.value().attr("href")) {
            hit.pdf_link = href.to_string();
        }
        hits.push(hit);
    }
    Ok((hits, total))
}

fn sel(css: &str) -> Result<Selector, HostError> {
    Selector::parse(css).map_err(|e| HostError::Parse(format!("{:?}", e)))
}

/// Byline shape: `A Author, B Author - Venue, 2020 - domain.org`. Authors sit
/// before the first dash; the year is the first 4-digit run after it.
fn parse_byline(raw: &str) -> (Vec<String>, Option<u16>) {
    let text = raw.replace('\u{a0}', " ");
    let (authors_part, rest) = match text.split_once(" - ") {
        Some((a, r)) => (a, Some(r)),
        None => (text.as_str(), None),
    };
    let authors = authors_part
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "…")
        .map(String::from)
        .collect();
    (authors, rest.and_then(find_year))
}

fn find_year(s: &str) -> Option<u16> {
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if digits.len() == 4 {
                break;
            }
            digits.clear();
        }
    }
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

fn parse_total(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"<!DOCTYPE html><html><body>
<div id="gs_ab_md"><div class="gs_ab_mdw">About 1,230,000 results (0.05 sec)</div></div>
<div class="gs_r gs_or gs_scl" data-cid="AbC123dEf45">
  <div class="gs_ggs gs_fl">
    <div class="gs_or_ggsm"><a href="https://files.example.org/gnn.pdf"><span class="gs_ctg2">[PDF]</span> example.org</a></div>
  </div>
  <div class="gs_ri">
    <h3 class="gs_rt"><a href="https://journal.example.org/articles/gnn">A survey of <b>graph neural networks</b></a></h3>
    <div class="gs_a">J Zhou, G Cui, S Hu&nbsp;- AI Open, 2020 - sciencedirect.com</div>
    <div class="gs_rs">Graph neural networks are <b>neural</b> models capturing dependence between nodes.</div>
    <div class="gs_fl gs_flb">
      <a href="/scholar?cites=8397604837244395385">Cited by 9128</a>
      <a href="/scholar?q=related:AbC123dEf45J:scholar.google.com/&amp;scioq=graph+neural+networks">Related articles</a>
    </div>
  </div>
</div>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <h3 class="gs_rt"><a href="https://proceedings.example.org/paper2">Spectral methods on large graphs</a></h3>
    <div class="gs_a">M Rivera - 2019</div>
    <div class="gs_rs">Second snippet.</div>
    <div class="gs_fl gs_flb"><a href="/scholar?q=save">Save</a></div>
  </div>
</div>
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <h3 class="gs_rt"><span class="gs_ct1">[CITATION]</span> Untitled memo</h3>
  </div>
</div>
</body></html>"#;

    const SAMPLE_CITE_PAGE: &str = r#"<html><body>
<div id="gs_citi">
  <a class="gs_citi" href="/scholar.bib?q=info:AbC123dEf45J:scholar.google.com/&amp;output=citation&amp;scfhb=1">BibTeX</a>
  <a class="gs_citi" href="https://scholar.googleusercontent.com/scholar.enw?q=info:AbC123dEf45J">EndNote</a>
</div>
</body></html>"#;

    #[test]
    fn test_parses_result_blocks() {
        let (hits, total) = parse_results_page(SAMPLE_PAGE).unwrap();
        assert_eq!(total, Some(1_230_000));
        // The bare [CITATION] block has no link and is dropped.
        assert_eq!(hits.len(), 2);

        let first = &hits[0];
        assert_eq!(first.title, "A survey of graph neural networks");
        assert_eq!(first.url, "https://journal.example.org/articles/gnn");
        assert_eq!(first.authors, vec!["J Zhou", "G Cui", "S Hu"]);
        assert_eq!(first.year, Some(2020));
        assert_eq!(first.citations, 9128);
        assert!(first.related_url.contains("related:AbC123dEf45J:scholar"));
        assert_eq!(first.pdf_link, "https://files.example.org/gnn.pdf");
        assert!(first.snippet.contains("neural models"));

        let second = &hits[1];
        assert_eq!(second.year, Some(2019));
        assert_eq!(second.citations, 0);
        assert!(second.related_url.is_empty());
    }

    #[test]
    fn test_maps_hits_to_articles() {
        let (hits, _) = parse_results_page(SAMPLE_PAGE).unwrap();
        let articles: Vec<Article> = hits
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                let id = extract_paper_id(&h.related_url);
                hit_to_article(i, h, id.as_deref())
            })
            .collect();
        assert_eq!(articles[0].id, "scholar:AbC123dEf45J");
        assert_eq!(articles[0].citations, Some(9128));
        assert_eq!(articles[0].venue, None);
        // No related link: the position stands in as the id.
        assert_eq!(articles[1].id, "scholar:1");
    }

    #[test]
    fn test_extracts_paper_id() {
        assert_eq!(
            extract_paper_id("/scholar?q=related:XyZ:scholar.google.com/&scioq=q").as_deref(),
            Some("XyZ")
        );
        assert_eq!(extract_paper_id("/scholar?q=save"), None);
        assert_eq!(extract_paper_id("related::scholar"), None);
    }

    #[test]
    fn test_citation_page_url_format() {
        assert_eq!(
            citation_page_url("AbC"),
            "https://scholar.google.com/scholar?q=info:AbC:scholar.google.com/&output=cite&scirp=0&hl=en"
        );
    }

    #[test]
    fn test_resolves_relative_bibtex_link() {
        let page_url = citation_page_url("AbC123dEf45J");
        let link = extract_bibtex_link(SAMPLE_CITE_PAGE, &page_url).unwrap();
        assert_eq!(
            link,
            "https://scholar.google.com/scholar.bib?q=info:AbC123dEf45J:scholar.google.com/&output=citation&scfhb=1"
        );
    }

    #[test]
    fn test_missing_bibtex_link_is_an_error() {
        let err = extract_bibtex_link("<html><body></body></html>", "https://scholar.google.com/")
            .unwrap_err();
        assert!(matches!(err, HostError::Parse(_)));
    }

    #[test]
    fn test_parses_result_totals() {
        assert_eq!(parse_total("About 1,230,000 results (0.05 sec)"), Some(1_230_000));
        assert_eq!(parse_total("17 results"), Some(17));
        assert_eq!(parse_total("Showing the best result for this search"), None);
    }

    #[test]
    fn test_caps_oversized_page() {
        let mut page = String::from(
            r#"<html><body><div id="gs_ab_md"><div class="gs_ab_mdw">About 96,400 results (0.04 sec)</div></div>"#,
        );
        for i in 0..14 {
            page.push_str(&format!(
                r#"<div class="gs_r gs_or gs_scl"><div class="gs_ri"><h3 class="gs_rt"><a href="https://example.org/p/{i}">Paper {i}</a></h3><div class="gs_a">A Author - 2020</div></div></div>"#
            ));
        }
        page.push_str("</body></html>");

        let (hits, total) = parse_results_page(&page).unwrap();
        assert_eq!(hits.len(), RESULT_CAP);
        assert_eq!(hits[0].title, "Paper 0");
        assert_eq!(hits[9].title, "Paper 9");
        assert_eq!(total, Some(96_400));
    }
}
