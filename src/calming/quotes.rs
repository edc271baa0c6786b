use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

pub const CALMING_QUOTES: &[&str] = &[
    "Breathe in calm, breathe out tension.",
    "You don't have to see the whole staircase, just take the first step.",
    "Every expert was once a beginner.",
    "Slow progress is still progress.",
    "It's okay to pause. Learning is not a race.",
    "Mistakes are proof that you are trying.",
    "One concept at a time. You've got this.",
    "Feel your breath. Let your shoulders drop.",
];

const LAST_RESORT_QUOTE: &str = "Take a deep breath.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteError {
    Empty,
    NoSuchQuote(usize),
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteError::Empty => write!(f, "A quote cannot be empty."),
            QuoteError::NoSuchQuote(index) => write!(f, "There is no quote #{}.", index + 1),
        }
    }
}

impl std::error::Error for QuoteError {}

/// The user's editable list of calming quotes, seeded with the built-ins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBook {
    quotes: Vec<String>,
}

impl Default for QuoteBook {
    fn default() -> Self {
        Self {
            quotes: CALMING_QUOTES.iter().map(|quote| quote.to_string()).collect(),
        }
    }
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quotes(&self) -> &[String] {
        &self.quotes
    }

    pub fn add(&mut self, raw: &str) -> Result<(), QuoteError> {
        let quote = raw.trim();
        if quote.is_empty() {
            return Err(QuoteError::Empty);
        }
        self.quotes.push(quote.to_string());
        Ok(())
    }

    pub fn edit(&mut self, index: usize, raw: &str) -> Result<(), QuoteError> {
        let quote = raw.trim();
        if quote.is_empty() {
            return Err(QuoteError::Empty);
        }
        let slot = self
            .quotes
            .get_mut(index)
            .ok_or(QuoteError::NoSuchQuote(index))?;
        *slot = quote.to_string();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<String, QuoteError> {
        if index >= self.quotes.len() {
            return Err(QuoteError::NoSuchQuote(index));
        }
        Ok(self.quotes.remove(index))
    }

    /// A random quote; falls back to a fixed line once every quote is deleted.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        self.quotes
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(LAST_RESORT_QUOTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn picks_from_the_builtin_list() {
        let book = QuoteBook::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert!(CALMING_QUOTES.contains(&book.pick(&mut rng)));
        }
    }

    #[test]
    fn added_quotes_are_trimmed_and_eligible() {
        let mut book = QuoteBook::new();
        book.add("  Rest is part of the work.  ").unwrap();
        assert_eq!(book.quotes().last().map(String::as_str), Some("Rest is part of the work."));

        for index in (0..CALMING_QUOTES.len()).rev() {
            book.remove(index).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(book.pick(&mut rng), "Rest is part of the work.");
    }

    #[test]
    fn blank_quotes_are_rejected() {
        let mut book = QuoteBook::new();
        assert_eq!(book.add("   "), Err(QuoteError::Empty));
        assert_eq!(book.edit(0, ""), Err(QuoteError::Empty));
        assert_eq!(book.quotes().len(), CALMING_QUOTES.len());
    }

    #[test]
    fn edit_and_remove_check_the_index() {
        let mut book = QuoteBook::new();
        book.edit(0, "Inhale. Exhale.").unwrap();
        assert_eq!(book.quotes()[0], "Inhale. Exhale.");
        assert_eq!(book.remove(99), Err(QuoteError::NoSuchQuote(99)));
        assert_eq!(QuoteError::NoSuchQuote(99).to_string(), "There is no quote #100.");
    }

    #[test]
    fn empty_book_falls_back() {
        let mut book = QuoteBook::new();
        while !book.quotes().is_empty() {
            book.remove(0).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(book.pick(&mut rng), LAST_RESORT_QUOTE);
    }
}
