//! Layer 1: local content checks.
//!
//! An Aho-Corasick automaton over two category lists - exact prohibited
//! substrings and a profanity list - gives O(N) scanning per message.

use aho_corasick::AhoCorasick;
use tracing::warn;

/// Exact substrings that are never allowed, regardless of context.
const PROHIBITED_TERMS: &[&str] = &[
    "kill yourself",
    "kys",
    "send nudes",
    "dox",
    "swat you",
    "cp trade",
];

/// Common profanity. Deliberately short: the goal is a first-pass gate,
/// not a dictionary; the remote classifier catches paraphrases.
const PROFANITY: &[&str] = &[
    "fuck",
    "shit",
    "bitch",
    "asshole",
    "cunt",
    "dickhead",
];

/// Category labels reported to the client on a block.
pub const CATEGORY_PROHIBITED: &str = "prohibited-terms";
pub const CATEGORY_PROFANITY: &str = "profanity";

/// The local (layer 1) content filter.
pub struct LocalFilter {
    matcher: AhoCorasick,
    /// Category of each pattern, parallel to the automaton's pattern ids.
    categories: Vec<&'static str>,
}

impl LocalFilter {
    pub fn new() -> Self {
        let mut patterns: Vec<&str> = Vec::new();
        let mut categories = Vec::new();
        for term in PROHIBITED_TERMS {
            patterns.push(term);
            categories.push(CATEGORY_PROHIBITED);
        }
        for term in PROFANITY {
            patterns.push(term);
            categories.push(CATEGORY_PROFANITY);
        }

        let matcher = match AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
        {
            Ok(matcher) => matcher,
            Err(err) => {
                warn!(error = ?err, "Failed to build blocklist matcher; local filtering disabled");
                let empty: Vec<&str> = Vec::new();
                AhoCorasick::builder()
                    .ascii_case_insensitive(true)
                    .build(&empty)
                    .expect("building empty Aho-Corasick should not fail")
            }
        };

        Self { matcher, categories }
    }

    /// Scan content. Returns the hit categories, de-duplicated; empty
    /// means clean.
    pub fn scan(&self, content: &str) -> Vec<String> {
        let mut hits: Vec<String> = Vec::new();
        for found in self.matcher.find_iter(content) {
            let category = self.categories[found.pattern().as_usize()];
            if !hits.iter().any(|c| c == category) {
                hits.push(category.to_string());
            }
        }
        hits
    }
}

impl Default for LocalFilter {
    fn default() -> Self {
        Self::new()
    }
}
