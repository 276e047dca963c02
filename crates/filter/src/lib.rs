use regex::Regex;

/// Text-cleaning capability applied to every message before it is appended.
///
/// Call sites depend on this trait only, so the masking policy can be swapped
/// without touching submission code.
pub trait ProfanityFilter: Send + Sync {
    /// Returns the cleaned text. Text with no disallowed terms passes through
    /// unchanged.
    fn clean(&self, text: &str) -> String;
}

/// Default mask character used for matched terms.
const MASK_CHAR: char = '*';

/// Built-in term list for the default filter.
///
/// Deliberately short and mild; deployments with stricter policies construct
/// `WordListFilter::new` with their own list.
const DEFAULT_TERMS: &[&str] = &[
    "arse",
    "bastard",
    "bollocks",
    "bugger",
    "crap",
    "dammit",
    "damn",
    "goddamn",
    "jackass",
];

/// Word-list filter that masks each matched term with `*` of equal length.
///
/// Matching is case-insensitive and bounded to whole words, so embedded
/// substrings ("scrapbook") pass through untouched.
pub struct WordListFilter {
    pattern: Option<Regex>,
}

impl WordListFilter {
    /// Builds a filter for the given terms. An empty list produces a no-op
    /// filter.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let escaped = terms
            .into_iter()
            .map(|term| regex::escape(term.as_ref().trim()))
            .filter(|term| !term.is_empty())
            .collect::<Vec<_>>();

        if escaped.is_empty() {
            return Self { pattern: None };
        }

        let source = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
        // The alternation is built from escaped literals, so compilation can
        // only fail on pathological list sizes; treat that as a no-op filter.
        let pattern = match Regex::new(&source) {
            Ok(pattern) => Some(pattern),
            Err(_) => None,
        };

        Self { pattern }
    }

    /// Builds the filter with the built-in term list.
    pub fn with_default_terms() -> Self {
        Self::new(DEFAULT_TERMS.iter().copied())
    }
}

impl Default for WordListFilter {
    fn default() -> Self {
        Self::with_default_terms()
    }
}

impl ProfanityFilter for WordListFilter {
    fn clean(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };

        pattern
            .replace_all(text, |captures: &regex::Captures<'_>| {
                MASK_CHAR
                    .to_string()
                    .repeat(captures[0].chars().count())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> WordListFilter {
        WordListFilter::new(["blocked", "forbidden"])
    }

    #[test]
    fn clean_is_identity_without_matches() {
        let input = "hello there, lovely weather today";
        assert_eq!(filter().clean(input), input);
    }

    #[test]
    fn matched_terms_never_survive_verbatim() {
        let cleaned = filter().clean("well blocked there");
        assert!(!cleaned.contains("blocked"));
        assert_eq!(cleaned, "well ******* there");
    }

    #[test]
    fn masking_is_case_insensitive() {
        assert_eq!(filter().clean("BLOCKED!"), "*******!");
        assert_eq!(filter().clean("Forbidden fruit"), "********* fruit");
    }

    #[test]
    fn embedded_substrings_pass_through() {
        // Whole-word boundaries only; "unblocked" is a different word.
        assert_eq!(filter().clean("unblocked roadblocked"), "unblocked roadblocked");
    }

    #[test]
    fn every_occurrence_is_masked() {
        assert_eq!(filter().clean("blocked and blocked"), "******* and *******");
    }

    #[test]
    fn surrounding_text_is_preserved_verbatim() {
        assert_eq!(
            filter().clean("  spacing\tand\npunctuation, blocked."),
            "  spacing\tand\npunctuation, *******."
        );
    }

    #[test]
    fn empty_term_list_is_a_no_op() {
        let filter = WordListFilter::new(Vec::<String>::new());
        assert_eq!(filter.clean("anything at all"), "anything at all");
    }

    #[test]
    fn default_terms_are_masked() {
        let cleaned = WordListFilter::with_default_terms().clean("well damn");
        assert_eq!(cleaned, "well ****");
    }
}
