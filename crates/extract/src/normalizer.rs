use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.,!?;:'"()&/\\-]"#).expect("punctuation pattern compiles"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

/// Legal-form words that say nothing about who the owner is.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "llc",
    "llp",
    "lp",
    "ltd",
    "limited",
    "corp",
    "corporation",
    "co",
    "company",
    "plc",
    "gmbh",
    "ag",
    "sa",
    "bv",
    "nv",
    "kk",
    "the",
];

/// Compares assignee names that differ only in casing, punctuation or legal form.
#[derive(Debug, Default)]
pub struct AssigneeNormalizer;

impl AssigneeNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize an assignee name: lowercase, drop punctuation and legal-form words
    pub fn normalize(&self, name: &str) -> String {
        let lowered = name.to_lowercase();
        let stripped = PUNCTUATION.replace_all(lowered.trim(), " ");
        let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");

        let words: Vec<&str> = collapsed
            .split(' ')
            .filter(|w| !w.is_empty() && !CORPORATE_SUFFIXES.contains(w))
            .collect();

        if words.is_empty() {
            collapsed.to_string()
        } else {
            words.join(" ")
        }
    }

    /// Same owner after normalization, or one name is a word-level
    /// superset of the other ("Acme" vs "Acme Analytics").
    pub fn same_entity(&self, a: &str, b: &str) -> bool {
        let a = self.normalize(a);
        let b = self.normalize(b);

        if a == b {
            return true;
        }
        if a.is_empty() || b.is_empty() {
            return false;
        }

        let words_a: Vec<&str> = a.split_whitespace().collect();
        let words_b: Vec<&str> = b.split_whitespace().collect();

        let (shorter, longer) = if words_a.len() <= words_b.len() {
            (&words_a, &words_b)
        } else {
            (&words_b, &words_a)
        };
        if shorter.iter().all(|w| longer.contains(w)) {
            return true;
        }

        // Check if they share most words (for multi-word names)
        if words_a.len() > 1 && words_b.len() > 1 {
            let common = words_a.iter().filter(|w| words_b.contains(w)).count();
            let total = words_a.len().max(words_b.len());
            return common as f64 / total as f64 > 0.7; // 70% overlap
        }

        false
    }
}
