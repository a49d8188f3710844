//! Normalizer stage: HTML stripping, Unicode normalization, keyword
//! extraction. Deterministic and pure.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use tl_domain::constants::pipeline::YIELD_EVERY_ITEMS;
use tl_domain::entities::{Category, ProcessedItem, RawItem};

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap_or_else(|e| {
        unreachable!("static regex: {e}")
    })
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap_or_else(|e| unreachable!("static regex: {e}")));

/// English stopwords excluded from keyword extraction. Non-Latin scripts pass
/// through untouched; keyword quality there rides on source tags instead.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "how",
    "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what",
    "when", "where", "which", "who", "why", "will", "with", "you", "your",
];

/// Strip HTML to text: drop script/style blocks, remove tags, decode entities.
#[must_use]
pub fn strip_html(input: &str) -> String {
    let without_blocks = SCRIPT_RE.replace_all(input, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    html_escape::decode_html_entities(without_tags.as_ref()).into_owned()
}

/// NFC-normalize and collapse runs of whitespace into single spaces.
#[must_use]
pub fn normalize_whitespace(input: &str) -> String {
    let nfc: String = input.nfc().collect();
    nfc.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison form of a title: stripped, NFC, collapsed, lower-cased.
/// Non-Latin characters are preserved as-is; lowercasing is a no-op there.
#[must_use]
pub fn comparison_form(title: &str) -> String {
    normalize_whitespace(&strip_html(title)).to_lowercase()
}

/// Extract up to `max` keyword tokens from the given text, preserving first
/// occurrence order.
#[must_use]
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut keywords = Vec::new();
    for word in text.unicode_words() {
        let token = word.to_lowercase();
        if token.chars().count() < 3 || STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if seen.insert(token.clone()) {
            keywords.push(token);
            if keywords.len() == max {
                break;
            }
        }
    }
    keywords
}

/// Crude category inference from tags and keywords; everything unmatched
/// lands in General.
fn infer_category(item: &RawItem, keywords: &[String]) -> Category {
    let haystack: Vec<&str> = item
        .tags
        .iter()
        .map(String::as_str)
        .chain(keywords.iter().map(String::as_str))
        .collect();
    let has = |candidates: &[&str]| haystack.iter().any(|t| candidates.contains(t));

    if has(&["tech", "technology", "software", "programming", "ai", "startup"]) {
        Category::Technology
    } else if has(&["business", "economy", "markets", "finance", "ipo"]) {
        Category::Business
    } else if has(&["science", "research", "space", "physics", "biology"]) {
        Category::Science
    } else if has(&["entertainment", "movies", "music", "culture", "gaming"]) {
        Category::Entertainment
    } else if has(&["sports", "football", "soccer", "nba", "olympics"]) {
        Category::Sports
    } else if has(&["politics", "election", "policy", "government"]) {
        Category::Politics
    } else if has(&["health", "medicine", "covid", "vaccine", "fitness"]) {
        Category::Health
    } else {
        Category::General
    }
}

/// Normalize one raw item into a processed item. Language is tagged by the
/// next stage; this stage leaves the `und` placeholder.
#[must_use]
pub fn normalize_item(raw: RawItem) -> ProcessedItem {
    let display_title = normalize_whitespace(&strip_html(&raw.title));
    let normalized_title = display_title.to_lowercase();
    let body = raw
        .body
        .as_deref()
        .map(|b| normalize_whitespace(&strip_html(b)))
        .filter(|b| !b.is_empty());

    let keyword_basis = match &body {
        Some(b) => format!("{display_title} {b}"),
        None => display_title.clone(),
    };
    let keywords = extract_keywords(&keyword_basis, 12);
    let category = infer_category(&raw, &keywords);

    ProcessedItem {
        id: Uuid::new_v4(),
        source: raw.source,
        source_id: raw.source_id,
        url: raw.url,
        title: display_title,
        normalized_title,
        body,
        author: raw.author,
        published_at: raw.published_at,
        engagement: raw.engagement,
        category,
        language_hint: raw.language_hint,
        language: tl_domain::constants::pipeline::UNDETERMINED_LANGUAGE.to_owned(),
        language_confidence: 0.0,
        keywords,
        sentiment: None,
        tags: raw.tags,
        processed_at: chrono::Utc::now(),
    }
}

/// Normalize a batch, yielding to the scheduler periodically.
pub async fn normalize_batch(raw: Vec<RawItem>) -> Vec<ProcessedItem> {
    let mut out = Vec::with_capacity(raw.len());
    for (i, item) in raw.into_iter().enumerate() {
        out.push(normalize_item(item));
        if (i + 1) % YIELD_EVERY_ITEMS == 0 {
            tokio::task::yield_now().await;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_decodes_entities() {
        let html = "<p>Apple &amp; Google <b>face off</b></p><script>alert(1)</script>";
        let text = normalize_whitespace(&strip_html(html));
        assert_eq!(text, "Apple & Google face off");
    }

    #[test]
    fn comparison_form_collapses_whitespace_and_case() {
        assert_eq!(comparison_form("apple   unveils M5"), "apple unveils m5");
        assert_eq!(comparison_form("Apple unveils M5"), "apple unveils m5");
    }

    #[test]
    fn comparison_form_preserves_cjk() {
        let title = "東京で新しいAIモデル発表";
        assert!(comparison_form(title).contains("東京"));
    }

    #[test]
    fn keywords_skip_stopwords_and_dedupe() {
        let kws = extract_keywords("the quick quick brown fox and the lazy dog", 10);
        assert_eq!(kws, vec!["quick", "brown", "fox", "lazy", "dog"]);
    }

    #[test]
    fn normalize_item_preserves_display_title() {
        let mut raw = RawItem::new("hn", "1", "https://x", "Apple   unveils <b>M5</b>");
        raw.tags = vec!["tech".to_owned()];
        let item = normalize_item(raw);
        assert_eq!(item.title, "Apple unveils M5");
        assert_eq!(item.normalized_title, "apple unveils m5");
        assert_eq!(item.category, Category::Technology);
    }
}
