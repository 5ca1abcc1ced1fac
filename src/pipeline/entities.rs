//! Relevance filtering by named-entity presence.
//!
//! Rasterising a page and sending it to a vision model is the expensive
//! step. Running entity recognition over the text layer first narrows each
//! target to the pages that mention a person (owner name) or an amount of
//! money (portfolio value, holdings). A page is relevant for a category iff
//! the recogniser returns at least one match of that category.
//!
//! [`RuleBasedRecognizer`] is the built-in recogniser. Anything implementing
//! [`EntityRecognizer`] can replace it.

use super::text::PageTexts;
use crate::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info};

/// Error type returned by recognisers.
pub type RecognizerError = Box<dyn std::error::Error + Send + Sync>;

/// Entity category searched for on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityCategory {
    Person,
    Money,
}

impl EntityCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityCategory::Person => "PERSON",
            EntityCategory::Money => "MONEY",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finds entity surface strings of one category in a piece of text.
///
/// Matches are returned in detection order and are not deduplicated.
pub trait EntityRecognizer: Send + Sync {
    fn extract_entities(
        &self,
        text: &str,
        category: EntityCategory,
    ) -> Result<Vec<String>, RecognizerError>;
}

/// A page is relevant when at least one entity was found.
pub fn is_page_relevant(entities: &[String]) -> bool {
    !entities.is_empty()
}

/// Run `recognizer` on `text` and report whether `category` matched.
pub fn is_relevant(
    recognizer: &dyn EntityRecognizer,
    text: &str,
    category: EntityCategory,
) -> Result<bool, RecognizerError> {
    Ok(is_page_relevant(&recognizer.extract_entities(text, category)?))
}

/// Relevant page lists for both categories, each in ascending page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevantPages {
    pub person: Vec<usize>,
    pub money: Vec<usize>,
}

impl RelevantPages {
    /// Classify every page independently for PERSON and MONEY.
    ///
    /// Recognition runs afresh for each page and category. The first
    /// recogniser failure aborts the whole run.
    pub fn detect(
        texts: &PageTexts,
        recognizer: &dyn EntityRecognizer,
    ) -> Result<Self, ExtractError> {
        let mut relevant = Self::default();

        for (&page, text) in texts {
            if check_page(recognizer, page, text, EntityCategory::Person)? {
                relevant.person.push(page);
            }
            if check_page(recognizer, page, text, EntityCategory::Money)? {
                relevant.money.push(page);
            }
        }

        info!(
            "Relevant pages: PERSON {:?}, MONEY {:?}",
            relevant.person, relevant.money
        );
        Ok(relevant)
    }

    pub fn for_category(&self, category: EntityCategory) -> &[usize] {
        match category {
            EntityCategory::Person => &self.person,
            EntityCategory::Money => &self.money,
        }
    }
}

fn check_page(
    recognizer: &dyn EntityRecognizer,
    page: usize,
    text: &str,
    category: EntityCategory,
) -> Result<bool, ExtractError> {
    let relevant = is_relevant(recognizer, text, category).map_err(|e| {
        error!("Entity recognition failed on page {}: {}", page, e);
        ExtractError::EntityRecognitionFailed {
            page,
            detail: e.to_string(),
        }
    })?;
    if relevant {
        debug!("Page {} has {} entities", page, category);
    }
    Ok(relevant)
}

// ── Built-in recogniser ──────────────────────────────────────────────────────

static RE_MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"[$€£¥]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?i:million|billion|thousand)\b)?",
        r"|\b\d[\d,]*(?:\.\d+)?\s?(?i:dollars|euros|pounds|usd|eur|gbp)\b",
    ))
    .unwrap()
});

/// Statement vocabulary that rules a capitalised run out as a person name.
static NON_NAME_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // statement vocabulary
        "account", "accounts", "total", "value", "values", "portfolio", "statement",
        "summary", "balance", "market", "investment", "investments", "investor", "income",
        "activity", "holding", "holdings", "cost", "basis", "gain", "gains", "loss", "losses",
        "page", "date", "period", "beginning", "ending", "change", "net", "cash", "money",
        "fund", "funds", "stock", "stocks", "bond", "bonds", "dividend", "dividends",
        "interest", "tax", "taxes", "fee", "fees", "report", "number", "customer", "service",
        "services", "brokerage", "retirement", "ira", "roth", "individual", "joint", "trust",
        "class", "shares", "share", "price", "quantity", "unrealized", "realized", "estimated",
        "annual", "yield", "contact", "information", "important", "disclosures", "mutual",
        "equity", "equities", "fixed", "other", "credit", "debit", "deposit", "deposits",
        "withdrawal", "withdrawals", "transaction", "transactions", "description", "symbol",
        "security", "securities", "assets", "asset", "allocation", "options", "online",
        // organisations and addresses
        "inc", "corp", "corporation", "co", "company", "llc", "ltd", "lp", "plc", "etf",
        "bank", "group", "capital", "management", "financial", "advisors", "partners",
        "street", "st", "ave", "avenue", "road", "rd", "suite", "box", "po", "new", "york",
        "united", "states", "america", "usa",
        // function words that show up capitalised in headings
        "the", "your", "our", "this", "that", "these", "of", "and", "for", "to", "in", "on",
        "at", "by", "with", "from", "as", "is", "are", "see", "visit", "call", "please", "dear",
        // calendar
        "january", "february", "march", "april", "may", "june", "july", "august",
        "september", "october", "november", "december", "jan", "feb", "mar", "apr", "jun",
        "jul", "aug", "sep", "sept", "oct", "nov", "dec", "monday", "tuesday", "wednesday",
        "thursday", "friday", "saturday", "sunday",
    ]
    .into_iter()
    .collect()
});

const HONORIFICS: &[&str] = &["Mr", "Mrs", "Ms", "Miss", "Dr", "Prof"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameToken {
    Honorific,
    Initial,
    Word,
}

fn is_title_word(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest: Vec<char> = chars.collect();
    first.is_uppercase()
        && !rest.is_empty()
        && rest.iter().all(|c| c.is_alphabetic() || *c == '-' || *c == '\'')
        && rest.iter().any(|c| c.is_lowercase())
}

fn is_upper_word(word: &str) -> bool {
    word.chars().count() >= 2
        && word.chars().any(|c| c.is_uppercase())
        && word
            .chars()
            .all(|c| c.is_uppercase() || c == '-' || c == '\'')
}

fn classify(core: &str) -> Option<NameToken> {
    let bare = core.trim_end_matches('.');
    if HONORIFICS.contains(&bare) {
        return Some(NameToken::Honorific);
    }
    let mut chars = bare.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_uppercase().then_some(NameToken::Initial);
    }
    if NON_NAME_WORDS.contains(bare.to_lowercase().as_str()) {
        return None;
    }
    (is_title_word(bare) || is_upper_word(bare)).then_some(NameToken::Word)
}

/// A run of name-like tokens is a person when it holds two to four name
/// words, or an honorific followed by one to three.
fn flush_run(run: &mut Vec<(NameToken, String)>, found: &mut Vec<String>) {
    let words = run.iter().filter(|(t, _)| *t == NameToken::Word).count();
    let honorific = run.first().is_some_and(|(t, _)| *t == NameToken::Honorific);
    let is_person = if honorific {
        (1..=3).contains(&words)
    } else {
        (2..=4).contains(&words)
    };
    if is_person {
        while run.last().is_some_and(|(t, _)| *t != NameToken::Word) {
            run.pop();
        }
        let name: Vec<&str> = run.iter().map(|(_, s)| s.as_str()).collect();
        found.push(name.join(" "));
    }
    run.clear();
}

fn find_people(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut run: Vec<(NameToken, String)> = Vec::new();

    for raw in text.split_whitespace() {
        let core = raw.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '(' | ')' | '"'));
        let closes_clause = raw.ends_with([',', ';', ':']);

        match classify(core) {
            Some(NameToken::Honorific) => {
                flush_run(&mut run, &mut found);
                run.push((NameToken::Honorific, core.to_string()));
            }
            Some(NameToken::Initial) => run.push((NameToken::Initial, core.to_string())),
            Some(NameToken::Word) => {
                let sentence_end = core.ends_with('.');
                run.push((NameToken::Word, core.trim_end_matches('.').to_string()));
                if sentence_end {
                    flush_run(&mut run, &mut found);
                }
            }
            None => flush_run(&mut run, &mut found),
        }

        if closes_clause {
            flush_run(&mut run, &mut found);
        }
    }
    flush_run(&mut run, &mut found);
    found
}

/// Deterministic recogniser for PERSON and MONEY.
///
/// MONEY covers currency-symbol amounts (`$1,234.56`, `€ 10`, `$2.5 million`)
/// and amounts followed by a currency word or code (`250 USD`). PERSON covers
/// honorific names and runs of two to four capitalised or upper-case words
/// with optional middle initials. A statement-vocabulary word ends the run it
/// appears in, and the words before it are still judged on their own:
/// `Jane Doe Account` yields `Jane Doe`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedRecognizer;

impl EntityRecognizer for RuleBasedRecognizer {
    fn extract_entities(
        &self,
        text: &str,
        category: EntityCategory,
    ) -> Result<Vec<String>, RecognizerError> {
        let found = match category {
            EntityCategory::Money => RE_MONEY
                .find_iter(text)
                .map(|m| m.as_str().trim_end_matches(',').to_string())
                .collect(),
            EntityCategory::Person => find_people(text),
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn money(text: &str) -> Vec<String> {
        RuleBasedRecognizer
            .extract_entities(text, EntityCategory::Money)
            .unwrap()
    }

    fn people(text: &str) -> Vec<String> {
        RuleBasedRecognizer
            .extract_entities(text, EntityCategory::Person)
            .unwrap()
    }

    #[test]
    fn money_amounts() {
        assert_eq!(
            money("Ending value $52,310.14, up from $ 50,000. Fee: 12.50 USD"),
            vec!["$52,310.14", "$ 50,000", "12.50 USD"]
        );
        assert_eq!(money("Assets of $2.5 million"), vec!["$2.5 million"]);
        assert_eq!(money("paid 300 dollars"), vec!["300 dollars"]);
    }

    #[test]
    fn money_keeps_duplicates_in_order() {
        assert_eq!(money("$5 then $5"), vec!["$5", "$5"]);
    }

    #[test]
    fn no_money_in_plain_numbers() {
        assert!(money("Account 1234-5678, page 3 of 9").is_empty());
    }

    #[test]
    fn person_names() {
        assert_eq!(people("Prepared for Jane Q. Doe today"), vec!["Jane Q. Doe"]);
        assert_eq!(people("JOHN W SMITH 100 MAIN"), vec!["JOHN W SMITH"]);
        assert_eq!(people("Contact Mr. Patel"), vec!["Mr. Patel"]);
    }

    #[test]
    fn statement_headings_are_not_people() {
        assert!(people("Account Summary Total Portfolio Value").is_empty());
        assert!(people("INVESTMENT REPORT January 1, 2024").is_empty());
        assert!(people("Apple Inc").is_empty());
    }

    #[test]
    fn names_stop_at_punctuation() {
        assert_eq!(
            people("JANE DOE, 12 ELM ROAD. Dear Jane Doe."),
            vec!["JANE DOE", "Jane Doe"]
        );
        assert_eq!(people("Mary-Ann O'Neil and Tom McDonald"), vec!["Mary-Ann O'Neil", "Tom McDonald"]);
    }

    #[test]
    fn vocabulary_word_splits_a_run() {
        assert_eq!(people("Jane Doe Account"), vec!["Jane Doe"]);
        assert_eq!(people("Portfolio Jane Doe Summary"), vec!["Jane Doe"]);
        assert!(people("Jane Account Doe").is_empty());
    }

    #[test]
    fn category_display() {
        assert_eq!(EntityCategory::Person.to_string(), "PERSON");
        assert_eq!(serde_json::to_string(&EntityCategory::Money).unwrap(), "\"MONEY\"");
    }

    struct MapRecognizer(HashMap<(&'static str, EntityCategory), Vec<String>>);

    impl EntityRecognizer for MapRecognizer {
        fn extract_entities(
            &self,
            text: &str,
            category: EntityCategory,
        ) -> Result<Vec<String>, RecognizerError> {
            if text == "boom" {
                return Err("model not loaded".into());
            }
            Ok(self
                .0
                .iter()
                .find(|((t, c), _)| *t == text && *c == category)
                .map(|(_, v)| v.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn detect_builds_ascending_lists_per_category() {
        let rec = MapRecognizer(HashMap::from([
            (("p0", EntityCategory::Money), vec!["$1".to_string()]),
            (("p2", EntityCategory::Person), vec!["Jane".to_string()]),
            (("p2", EntityCategory::Money), vec!["$2".to_string(), "$2".to_string()]),
        ]));
        let texts: PageTexts = [(2, "p2".to_string()), (0, "p0".to_string()), (1, "p1".to_string())]
            .into_iter()
            .collect();

        let relevant = RelevantPages::detect(&texts, &rec).unwrap();
        assert_eq!(relevant.person, vec![2]);
        assert_eq!(relevant.money, vec![0, 2]);
        assert_eq!(relevant.for_category(EntityCategory::Money), &[0, 2]);
    }

    #[test]
    fn detect_fails_fast_on_recognizer_error() {
        let rec = MapRecognizer(HashMap::new());
        let texts: PageTexts = [(0, "ok".to_string()), (1, "boom".to_string())]
            .into_iter()
            .collect();

        let err = RelevantPages::detect(&texts, &rec).unwrap_err();
        assert!(matches!(err, ExtractError::EntityRecognitionFailed { page: 1, .. }));
    }

    #[test]
    fn is_relevant_uses_recognizer() {
        assert!(is_relevant(&RuleBasedRecognizer, "Balance $10", EntityCategory::Money).unwrap());
        assert!(!is_relevant(&RuleBasedRecognizer, "Balance ten", EntityCategory::Money).unwrap());
        assert!(!is_page_relevant(&[]));
    }
}
