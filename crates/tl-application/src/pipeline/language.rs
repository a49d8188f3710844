//! Language detector stage.
//!
//! Tags each item with a BCP-47 primary language tag plus a confidence.
//! Items with fewer than three characters of content are tagged `und` and
//! flow through, excluded from cross-language clustering later.

use tl_domain::constants::pipeline::{MIN_DETECT_CHARS, UNDETERMINED_LANGUAGE, YIELD_EVERY_ITEMS};
use tl_domain::entities::ProcessedItem;
use whatlang::Lang;

/// Map a whatlang ISO 639-3 language onto its BCP-47 primary (639-1) tag.
/// Languages without a two-letter code keep their three-letter code.
fn primary_tag(lang: Lang) -> &'static str {
    match lang {
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Ces => "cs",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Nob => "nb",
        Lang::Hun => "hu",
        Lang::Ron => "ro",
        Lang::Ell => "el",
        Lang::Bul => "bg",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Heb => "he",
        Lang::Pes => "fa",
        Lang::Hin => "hi",
        Lang::Ben => "bn",
        Lang::Urd => "ur",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Mar => "mr",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Tha => "th",
        Lang::Vie => "vi",
        Lang::Ind => "id",
        other => other.code(),
    }
}

/// Detect the language of one item from its title and body.
/// Returns `(tag, confidence)`.
#[must_use]
pub fn detect(item: &ProcessedItem) -> (String, f64) {
    // A source-provided hint wins when detection cannot beat it.
    let text = match &item.body {
        Some(body) => format!("{} {body}", item.title),
        None => item.title.clone(),
    };
    if text.chars().count() < MIN_DETECT_CHARS {
        return (UNDETERMINED_LANGUAGE.to_owned(), 0.0);
    }

    match whatlang::detect(&text) {
        Some(info) if info.is_reliable() => {
            (primary_tag(info.lang()).to_owned(), info.confidence())
        }
        Some(info) => match &item.language_hint {
            Some(hint) => (hint.clone(), 0.5),
            None => (primary_tag(info.lang()).to_owned(), info.confidence()),
        },
        None => match &item.language_hint {
            Some(hint) => (hint.clone(), 0.5),
            None => (UNDETERMINED_LANGUAGE.to_owned(), 0.0),
        },
    }
}

/// Tag a batch of items, yielding to the scheduler periodically.
pub async fn detect_batch(mut items: Vec<ProcessedItem>) -> Vec<ProcessedItem> {
    for (i, item) in items.iter_mut().enumerate() {
        let (language, confidence) = detect(item);
        item.language = language;
        item.language_confidence = confidence;
        if (i + 1) % YIELD_EVERY_ITEMS == 0 {
            tokio::task::yield_now().await;
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn item(title: &str, body: Option<&str>) -> ProcessedItem {
        ProcessedItem {
            id: Uuid::new_v4(),
            source: "test".to_owned(),
            source_id: "1".to_owned(),
            url: "https://example.com".to_owned(),
            title: title.to_owned(),
            normalized_title: title.to_lowercase(),
            body: body.map(str::to_owned),
            author: None,
            published_at: Utc::now(),
            engagement: Default::default(),
            category: Default::default(),
            language_hint: None,
            language: UNDETERMINED_LANGUAGE.to_owned(),
            language_confidence: 0.0,
            keywords: vec![],
            sentiment: None,
            tags: vec![],
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn detects_english() {
        let (lang, confidence) = detect(&item(
            "The quick brown fox jumps over the lazy dog near the river bank",
            None,
        ));
        assert_eq!(lang, "en");
        assert!(confidence > 0.0);
    }

    #[test]
    fn detects_cjk_without_collapsing() {
        let (lang, _) = detect(&item(
            "東京で開催された展示会で新しい人工知能モデルが発表されました",
            None,
        ));
        assert_eq!(lang, "ja");
    }

    #[test]
    fn detects_rtl_scripts() {
        let (lang, _) = detect(&item(
            "أعلنت الشركة عن نموذج جديد للذكاء الاصطناعي في المؤتمر السنوي",
            None,
        ));
        assert_eq!(lang, "ar");
    }

    #[test]
    fn short_content_is_undetermined() {
        let (lang, confidence) = detect(&item("ok", None));
        assert_eq!(lang, UNDETERMINED_LANGUAGE);
        assert_eq!(confidence, 0.0);
    }
}
