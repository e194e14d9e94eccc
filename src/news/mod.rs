//! News normalization pipeline
//!
//! ingest → preprocess → classify → extract → summarize
//!
//! Every stage is deterministic. Sentiment and entity extraction sit behind
//! small traits so a model-backed classifier can replace the keyword rules
//! without touching the scorer.

use crate::models::{ClassifiedArticle, Entities, NewsDigest, RawArticle, Sentiment};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// Cleaned summaries are cut to this many characters
const MAX_CLEANED_CHARS: usize = 200;

/// Articles quoted in the digest summary
const SUMMARY_TOP_N: usize = 2;

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r"http\S+|www\S+|https\S+").unwrap();
    static ref NON_WORD: Regex = Regex::new(r"\W+").unwrap();
    static ref POSITIVE_WORDS: Regex =
        Regex::new(r"\b(good|great|rise|strong|positive)\b").unwrap();
    static ref NEGATIVE_WORDS: Regex =
        Regex::new(r"\b(bad|fall|weak|decline|negative)\b").unwrap();
    static ref WATCHED_COMPANIES: Regex = Regex::new(r"\b(AAPL|Apple|UBS|NASDAQ)\b").unwrap();
    static ref DATE_TOKENS: Regex = Regex::new(
        r"\b((?:19|20)\d{2}|January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)\b"
    )
    .unwrap();
    static ref DOLLAR_AMOUNTS: Regex = Regex::new(r"\$\d+(?:\.\d{2})?").unwrap();
}

/// Classifies a cleaned summary into a sentiment with a confidence score
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, cleaned_text: &str) -> (Sentiment, u32);
}

/// Pulls named entities out of article text
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, symbol: &str, text: &str) -> Entities;
}

/// Word-list sentiment: more positive hits than negative is positive, and
/// vice versa; ties are neutral. Score is the absolute difference.
pub struct KeywordSentimentClassifier;

impl SentimentClassifier for KeywordSentimentClassifier {
    fn classify(&self, cleaned_text: &str) -> (Sentiment, u32) {
        let positive = POSITIVE_WORDS.find_iter(cleaned_text).count() as u32;
        let negative = NEGATIVE_WORDS.find_iter(cleaned_text).count() as u32;

        let sentiment = if positive > negative {
            Sentiment::Positive
        } else if negative > positive {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };

        (sentiment, positive.abs_diff(negative))
    }
}

pub struct RegexEntityExtractor;

impl EntityExtractor for RegexEntityExtractor {
    fn extract(&self, symbol: &str, text: &str) -> Entities {
        let mut companies: Vec<String> = WATCHED_COMPANIES
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();

        if !symbol.is_empty() && !companies.iter().any(|c| c == symbol) {
            let mentions_symbol = text
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == symbol);
            if mentions_symbol {
                companies.push(symbol.to_string());
            }
        }

        Entities {
            companies,
            dates: DATE_TOKENS
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect(),
            numbers: DOLLAR_AMOUNTS
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }
}

pub struct NewsPipeline {
    classifier: Box<dyn SentimentClassifier>,
    extractor: Box<dyn EntityExtractor>,
}

impl NewsPipeline {
    pub fn new(
        classifier: Box<dyn SentimentClassifier>,
        extractor: Box<dyn EntityExtractor>,
    ) -> Self {
        Self {
            classifier,
            extractor,
        }
    }

    pub fn process(&self, symbol: &str, raw: Vec<RawArticle>) -> NewsDigest {
        let ingested = raw.len();

        let items: Vec<ClassifiedArticle> = raw
            .iter()
            .map(|article| {
                let cleaned_summary = preprocess(article.summary.as_deref().unwrap_or_default());
                let (sentiment, score) = self.classifier.classify(&cleaned_summary);
                let text = format!("{} {}", article.title, cleaned_summary);
                let entities = self.extractor.extract(symbol, &text);

                ClassifiedArticle {
                    title: article.title.clone(),
                    cleaned_summary,
                    sentiment,
                    score,
                    entities,
                }
            })
            .collect();

        let summary = summarize(&items);

        debug!(
            symbol,
            ingested,
            distinct_sentiments = items
                .iter()
                .map(|i| i.sentiment)
                .collect::<std::collections::BTreeSet<_>>()
                .len(),
            "News pipeline completed"
        );

        NewsDigest {
            ingested,
            raw,
            items,
            summary,
        }
    }
}

impl Default for NewsPipeline {
    fn default() -> Self {
        Self::new(Box::new(KeywordSentimentClassifier), Box::new(RegexEntityExtractor))
    }
}

/// Strip URLs, lowercase, collapse non-word runs, truncate
pub fn preprocess(text: &str) -> String {
    let without_urls = URL_PATTERN.replace_all(text, "");
    let lowered = without_urls.to_lowercase();
    let normalized = NON_WORD.replace_all(&lowered, " ");
    normalized.trim().chars().take(MAX_CLEANED_CHARS).collect()
}

/// Extractive summary of the highest-scoring items
fn summarize(items: &[ClassifiedArticle]) -> String {
    let mut ranked: Vec<&ClassifiedArticle> = items.iter().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    ranked
        .iter()
        .take(SUMMARY_TOP_N)
        .map(|item| format!("{}: {} ({})", item.title, item.sentiment, item.entities))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, summary: &str) -> RawArticle {
        RawArticle {
            title: title.to_string(),
            summary: Some(summary.to_string()),
            url: None,
        }
    }

    #[test]
    fn test_negative_article_classified() {
        let pipeline = NewsPipeline::default();
        let digest = pipeline.process("TEST", vec![article("Test", "bad news fall")]);

        assert_eq!(digest.ingested, 1);
        assert_eq!(digest.items[0].sentiment, Sentiment::Negative);
        assert_eq!(digest.items[0].score, 2);
        assert!(!digest.summary.is_empty());
    }

    #[test]
    fn test_preprocess_strips_urls_and_punctuation() {
        let cleaned = preprocess("Shares ROSE 3.5%! See https://example.com/x and www.foo.com now");
        assert_eq!(cleaned, "shares rose 3 5 see and now");
    }

    #[test]
    fn test_preprocess_truncates() {
        let long = "word ".repeat(100);
        assert_eq!(preprocess(&long).chars().count(), MAX_CLEANED_CHARS);
    }

    #[test]
    fn test_balanced_words_are_neutral() {
        let (sentiment, score) = KeywordSentimentClassifier.classify("strong quarter but weak guidance");
        assert_eq!(sentiment, Sentiment::Neutral);
        assert_eq!(score, 0);
    }

    #[test]
    fn test_missing_summary_is_empty_text() {
        let pipeline = NewsPipeline::default();
        let digest = pipeline.process(
            "AAPL",
            vec![RawArticle {
                title: "Apple (AAPL) holds at $245.27".to_string(),
                summary: None,
                url: None,
            }],
        );

        let item = &digest.items[0];
        assert_eq!(item.cleaned_summary, "");
        assert_eq!(item.sentiment, Sentiment::Neutral);
        assert_eq!(item.entities.companies, vec!["Apple", "AAPL"]);
        assert_eq!(item.entities.numbers, vec!["$245.27"]);
    }

    #[test]
    fn test_symbol_mention_tagged_as_company() {
        let entities = RegexEntityExtractor.extract("TSLA", "TSLA deliveries beat in October 2025");
        assert_eq!(entities.companies, vec!["TSLA"]);
        assert_eq!(entities.dates, vec!["October", "2025"]);
    }

    #[test]
    fn test_summary_prefers_highest_scores() {
        let pipeline = NewsPipeline::default();
        let digest = pipeline.process(
            "X",
            vec![
                article("Flat", "nothing happened"),
                article("Up", "great strong rise"),
                article("Down", "bad decline"),
            ],
        );

        assert!(digest.summary.starts_with("Up: positive"));
        assert!(digest.summary.contains("Down: negative"));
        assert!(!digest.summary.contains("Flat"));
    }

    #[test]
    fn test_empty_input() {
        let digest = NewsPipeline::default().process("X", vec![]);
        assert_eq!(digest.ingested, 0);
        assert!(digest.items.is_empty());
        assert_eq!(digest.summary, "");
    }
}
