//! Heuristic claim categorisation.
//!
//! Claim openings are loosely structured, so categories come from an
//! ordered rule list over the opening clause. The first matching rule wins
//! and anything unmatched is `Unclassified`, never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::schema::{ClaimCategory, ClaimEntry, PatentRecord};

/// Ordered: medium before method before system, so that
/// "a computer-readable storage device" is a medium and not a device.
const RULES: &[(ClaimCategory, &str)] = &[
    (
        ClaimCategory::Medium,
        r"(?i)^(?:an?\s+|one\s+or\s+more\s+)?(?:non-?transitory|non-?transient|tangible)\b",
    ),
    (
        ClaimCategory::Medium,
        r"(?i)^(?:an?\s+|one\s+or\s+more\s+)?(?:[\w-]+\s+){0,3}(?:computer|machine|processor)[\s-]+(?:readable|usable|accessible)\b",
    ),
    (
        ClaimCategory::Medium,
        r"(?i)^(?:an?\s+|one\s+or\s+more\s+)?(?:[\w-]+\s+){0,3}(?:storage|recording)\s+(?:medium|media)\b",
    ),
    (ClaimCategory::Medium, r"(?i)^(?:an?\s+)?computer\s+program\s+product\b"),
    (
        ClaimCategory::Method,
        r"(?i)^(?:an?\s+)?(?:[\w-]+\s+){0,3}(?:method|process)\b",
    ),
    (
        ClaimCategory::System,
        r"(?i)^(?:an?\s+)?(?:[\w-]+\s+){0,4}(?:system|apparatus|device|machine|server|circuit|computer|network|assembly|terminal|controller)s?\b",
    ),
];

static COMPILED_RULES: Lazy<Vec<(ClaimCategory, Regex)>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|(category, pattern)| {
            (*category, Regex::new(pattern).expect("claim rule compiles"))
        })
        .collect()
});

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\s*[.)]\s*").expect("claim number pattern compiles"));

/// The opening clause ends at the first punctuation or transitional phrase.
static CLAUSE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[:;,]|\b(?:comprising|comprises|including|includes|having|consisting|storing|wherein|which|that)\b")
        .expect("clause end pattern compiles")
});

/// A prepositional phrase after the head noun ("a system for process control").
static HEAD_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s(?:for|of|to|with|in|on|by|at|from|under)\s")
        .expect("head phrase pattern compiles")
});

/// "of claim 1", "according to claim 3", "as recited in any one of claims 2"
static TEXTUAL_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:of|to|in|by)\s+(?:any\s+(?:one\s+)?of\s+)?claims?\s+(\d+)")
        .expect("claim reference pattern compiles")
});

#[derive(Debug, Default)]
pub struct ClaimClassifier;

impl ClaimClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Text of the claim up to its first transitional phrase, without the
    /// printed claim number.
    pub fn opening_clause<'a>(&self, text: &'a str) -> &'a str {
        let body = match LEADING_NUMBER.find(text) {
            Some(m) => &text[m.end()..],
            None => text,
        };
        let end = CLAUSE_END.find(body).map(|m| m.start()).unwrap_or(body.len());
        body[..end].trim()
    }

    /// Opening clause cut before its first prepositional phrase, leaving
    /// the noun the claim is actually directed to.
    pub fn head_phrase<'a>(&self, text: &'a str) -> &'a str {
        let opening = self.opening_clause(text);
        let end = HEAD_END.find(opening).map(|m| m.start()).unwrap_or(opening.len());
        opening[..end].trim()
    }

    pub fn categorize(&self, text: &str) -> ClaimCategory {
        let head = self.head_phrase(text);
        COMPILED_RULES
            .iter()
            .find(|(_, rule)| rule.is_match(head))
            .map(|(category, _)| *category)
            .unwrap_or(ClaimCategory::Unclassified)
    }

    /// Earlier claim this claim is written against, from markup or wording.
    pub fn base_claim(&self, claim: &ClaimEntry) -> Option<u32> {
        let marked = claim.references.iter().copied().find(|n| *n < claim.number);
        marked.or_else(|| {
            TEXTUAL_REFERENCE
                .captures_iter(&claim.text)
                .filter_map(|caps| caps[1].parse::<u32>().ok())
                .find(|n| *n < claim.number)
        })
    }

    /// Annotate every claim in place. Dependent claims take their base
    /// claim's category. Returns the independent claims left unclassified.
    pub fn classify(&self, claims: &mut [ClaimEntry]) -> Vec<u32> {
        let mut unclassified = Vec::new();

        for i in 0..claims.len() {
            let base = self.base_claim(&claims[i]);
            let inherited = base.and_then(|n| {
                claims[..i]
                    .iter()
                    .find(|c| c.number == n)
                    .map(|c| c.category)
            });

            let claim = &mut claims[i];
            claim.independent = base.is_none();
            claim.category = match inherited {
                Some(category) if category != ClaimCategory::Unclassified => category,
                _ => self.categorize(&claim.text),
            };

            if claim.independent && claim.category == ClaimCategory::Unclassified {
                unclassified.push(claim.number);
            }
        }

        unclassified
    }

    pub fn classify_record(&self, record: &mut PatentRecord) -> Vec<u32> {
        let unclassified = self.classify(&mut record.claims);
        debug!(
            identifier = %record.identifier,
            independent = record.independent_claims().count(),
            unclassified = unclassified.len(),
            "claims classified"
        );
        unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(number: u32, text: &str) -> ClaimEntry {
        ClaimEntry {
            number,
            category: ClaimCategory::Unclassified,
            independent: false,
            text: text.to_string(),
            references: Vec::new(),
        }
    }

    #[test]
    fn test_opening_clause() {
        let classifier = ClaimClassifier::new();
        assert_eq!(
            classifier.opening_clause("12. A method, comprising: doing things"),
            "A method"
        );
        assert_eq!(
            classifier.opening_clause("5. A non-transitory computer-readable storage medium storing instructions"),
            "A non-transitory computer-readable storage medium"
        );
    }

    #[test]
    fn test_medium_claim() {
        let mut claims = vec![claim(
            1,
            "1. A non-transitory computer-readable storage medium storing instructions that, when executed, cause a processor to act.",
        )];
        let unclassified = ClaimClassifier::new().classify(&mut claims);
        assert_eq!(claims[0].category, ClaimCategory::Medium);
        assert!(claims[0].independent);
        assert!(unclassified.is_empty());
    }

    #[test]
    fn test_categories() {
        let classifier = ClaimClassifier::new();
        assert_eq!(classifier.categorize("1. A system comprising: a processor"), ClaimCategory::System);
        assert_eq!(classifier.categorize("1. An apparatus for cutting"), ClaimCategory::System);
        assert_eq!(classifier.categorize("1. A method comprising: receiving"), ClaimCategory::Method);
        assert_eq!(
            classifier.categorize("1. A computer-implemented method comprising"),
            ClaimCategory::Method
        );
        assert_eq!(
            classifier.categorize("7. One or more computer-readable media storing code"),
            ClaimCategory::Medium
        );
        assert_eq!(
            classifier.categorize("9. A computer program product comprising a medium"),
            ClaimCategory::Medium
        );
        assert_eq!(
            classifier.categorize("3. A computer-readable storage device storing code"),
            ClaimCategory::Medium
        );
    }

    #[test]
    fn test_trailing_phrase_does_not_decide_category() {
        let classifier = ClaimClassifier::new();
        assert_eq!(
            classifier.categorize("1. A system for process control, comprising: a controller"),
            ClaimCategory::System
        );
        assert_eq!(
            classifier.categorize("1. An apparatus for storage media handling, comprising: a tray"),
            ClaimCategory::System
        );
        assert_eq!(
            classifier.categorize("2. A method of operating a computer-readable storage medium"),
            ClaimCategory::Method
        );
        assert_eq!(
            classifier.head_phrase("1. A system for process control, comprising: a controller"),
            "A system"
        );
    }

    #[test]
    fn test_unmatched_opening_is_unclassified() {
        let classifier = ClaimClassifier::new();
        assert_eq!(
            classifier.categorize("3. A kit for assembling a trellis, the kit including a frame"),
            ClaimCategory::Unclassified
        );
        // the body mentions a device, the opening does not
        assert_eq!(
            classifier.categorize("4. A kit comprising a device"),
            ClaimCategory::Unclassified
        );
    }

    #[test]
    fn test_dependent_claims_inherit_category() {
        let mut claims = vec![
            claim(1, "1. A method comprising: receiving an event."),
            claim(2, "2. The method of claim 1, wherein the event is a click."),
            claim(3, "3. A system comprising: a processor."),
            claim(4, "4. The system according to claim 3, further comprising memory."),
        ];
        claims[1].references.push(1);

        let unclassified = ClaimClassifier::new().classify(&mut claims);
        assert!(unclassified.is_empty());

        let independent: Vec<u32> = claims.iter().filter(|c| c.independent).map(|c| c.number).collect();
        assert_eq!(independent, vec![1, 3]);
        assert_eq!(claims[1].category, ClaimCategory::Method);
        assert_eq!(claims[3].category, ClaimCategory::System);
    }

    #[test]
    fn test_reference_to_later_claim_is_not_a_base() {
        let classifier = ClaimClassifier::new();
        let c = claim(1, "1. A method as used by the system of claim 5.");
        assert_eq!(classifier.base_claim(&c), None);
    }

    #[test]
    fn test_unclassified_independent_claims_reported() {
        let mut claims = vec![
            claim(1, "1. An apparatus comprising a frame."),
            claim(3, "3. A kit for assembling a trellis."),
        ];
        let unclassified = ClaimClassifier::new().classify(&mut claims);
        assert_eq!(unclassified, vec![3]);
        assert!(claims[1].independent);
    }
}
