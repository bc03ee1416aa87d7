use crate::types::{ArticleExtract, ExtractedArticle, FetchConfig, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const MAIN_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "[itemprop='articleBody']",
    ".post-content",
    ".entry-content",
    ".article-body",
    "#content",
    "body",
];

const PUBLISHED_META: &[&str] = &[
    "meta[property='article:published_time']",
    "meta[property='og:published_time']",
    "meta[name='pubdate']",
    "meta[name='publishdate']",
    "meta[name='date']",
    "meta[itemprop='datePublished']",
];

const KEYWORD_LIMIT: usize = 10;

/// Downloads an article page and pulls out its readable parts.
pub struct HtmlArticleExtractor {
    client: Client,
}

impl HtmlArticleExtractor {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Option<(Url, String)> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to download article {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Article {} returned HTTP {}", url, response.status());
            return None;
        }

        let final_url = response.url().clone();
        match response.text().await {
            Ok(body) => Some((final_url, body)),
            Err(e) => {
                warn!("Failed to read article body {}: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl ArticleExtract for HtmlArticleExtractor {
    async fn extract(&self, url: &str) -> Option<ExtractedArticle> {
        let (final_url, body) = self.download(url).await?;
        let article = parse_article(&final_url, &body);
        debug!(
            url = %article.url,
            chars = article.text.len(),
            "Extracted article"
        );
        Some(article)
    }
}

/// Extract article fields from an already downloaded page.
pub fn parse_article(page_url: &Url, html: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);

    let url = link_href(&document, "link[rel='canonical']")
        .or_else(|| meta_content(&document, "meta[property='og:url']"))
        .and_then(|href| page_url.join(&href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| page_url.to_string());

    let title = meta_content(&document, "meta[property='og:title']")
        .or_else(|| first_text(&document, "title"))
        .or_else(|| first_text(&document, "h1"))
        .unwrap_or_default();

    let (text, html) = match main_content(&document) {
        Some(main) => (readable_text(&main), main.html()),
        None => (String::new(), String::new()),
    };

    let image = meta_content(&document, "meta[property='og:image']")
        .or_else(|| meta_content(&document, "meta[name='twitter:image']"))
        .and_then(|src| page_url.join(&src).ok())
        .map(|u| u.to_string());

    let published = PUBLISHED_META
        .iter()
        .filter_map(|sel| meta_content(&document, sel))
        .chain(attr_values(&document, "time[datetime]", "datetime"))
        .find_map(|raw| parse_timestamp(&raw));

    let mut keywords: Vec<String> = meta_content(&document, "meta[name='keywords']")
        .map(|raw| {
            raw.split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();
    for keyword in rank_keywords(&text, KEYWORD_LIMIT) {
        if !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }

    ExtractedArticle {
        url,
        title,
        text,
        html,
        image,
        published,
        authors: authors(&document),
        keywords,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    attr_values(document, css, "content").into_iter().next()
}

fn link_href(document: &Html, css: &str) -> Option<String> {
    attr_values(document, css, "href").into_iter().next()
}

fn attr_values(document: &Html, css: &str, attr: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn main_content(document: &Html) -> Option<ElementRef<'_>> {
    MAIN_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| document.select(&sel).next())
}

/// Paragraph text when the container has paragraphs, otherwise all of it.
fn readable_text(main: &ElementRef<'_>) -> String {
    let paragraphs: Vec<String> = selector("p")
        .map(|sel| {
            main.select(&sel)
                .map(|p| normalize_whitespace(&p.text().collect::<String>()))
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if paragraphs.is_empty() {
        normalize_whitespace(&main.text().collect::<String>())
    } else {
        paragraphs.join("\n\n")
    }
}

fn authors(document: &Html) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let candidates = attr_values(document, "meta[name='author']", "content")
        .into_iter()
        .chain(attr_values(document, "meta[property='article:author']", "content"))
        .chain(
            selector("[rel='author'], [itemprop='author'] [itemprop='name'], .byline .author")
                .map(|sel| {
                    document
                        .select(&sel)
                        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        );

    for name in candidates {
        let name = name.trim_start_matches("By ").trim_start_matches("by ").trim().to_string();
        // article:author is frequently a profile url rather than a name
        if name.is_empty() || name.starts_with("http") || found.contains(&name) {
            continue;
        }
        found.push(name);
    }
    found
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
        })
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Most frequent non-trivial words of the body, ties broken alphabetically.
pub fn rank_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.chars().count() <= 3 || is_stop_word(&word) || word.chars().all(char::is_numeric) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "about" | "after" | "also" | "been" | "before" | "being" | "could" | "does" | "from"
            | "have" | "into" | "just" | "like" | "more" | "most" | "much" | "only" | "other"
            | "over" | "said" | "says" | "should" | "some" | "such" | "than" | "that" | "their"
            | "them" | "then" | "there" | "these" | "they" | "this" | "those" | "through"
            | "very" | "were" | "what" | "when" | "where" | "which" | "while" | "will" | "with"
            | "would" | "your"
    )
}
