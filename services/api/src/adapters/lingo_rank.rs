//! services/api/src/adapters/lingo_rank.rs
//!
//! Local "Lingo Rank" difficulty estimator, based on the LIX readability index:
//! words per sentence plus the percentage of words longer than six letters.
//! Typical values run from about 20 (very easy) to 60 (very hard).

use async_trait::async_trait;
use lingo_core::domain::Article;
use lingo_core::ports::{DifficultyRanker, PortResult};

const LONG_WORD_LETTERS: usize = 6;

#[derive(Default)]
pub struct LixRanker;

/// LIX score of `text`; zero for text without words.
pub fn lix(text: &str) -> f64 {
    let words: Vec<usize> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
        .filter(|w| w.chars().any(char::is_alphabetic))
        .map(|w| w.chars().filter(|c| c.is_alphabetic()).count())
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let sentences = text
        .split(|c: char| matches!(c, '.' | '!' | '?' | ':' | ';'))
        .filter(|s| s.chars().any(char::is_alphabetic))
        .count()
        .max(1);
    let long_words = words.iter().filter(|&&n| n > LONG_WORD_LETTERS).count();

    let total = words.len() as f64;
    total / sentences as f64 + 100.0 * long_words as f64 / total
}

#[async_trait]
impl DifficultyRanker for LixRanker {
    async fn rank(&self, article: &Article) -> PortResult<f64> {
        Ok(lix(&article.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lix_empty_text_is_zero() {
        assert_eq!(lix(""), 0.0);
        assert_eq!(lix("... !!"), 0.0);
    }

    #[test]
    fn test_lix_short_sentences() {
        // 6 words, 2 sentences, no long words.
        assert_eq!(lix("Jeg er her. Du er der."), 3.0);
    }

    #[test]
    fn test_lix_counts_long_words() {
        // 2 words, 1 sentence, 1 long word: 2 + 50.
        assert_eq!(lix("Uddannelse koster."), 52.0);
    }

    #[test]
    fn test_lix_harder_text_scores_higher() {
        let easy = lix("Katten sover. Hunden leger. Solen skinner.");
        let hard = lix(
            "Forskningsinstitutionernes internationaliseringsstrategier \
             forudsætter betydelige administrative ressourcer og langsigtede investeringer.",
        );
        assert!(hard > easy);
    }
}
