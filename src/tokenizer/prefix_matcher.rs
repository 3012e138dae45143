// src/tokenizer/prefix_matcher.rs

/*

Initial segmentation for the merge engine.

Text is cut into units one at a time from the front. Plain text is cut into single
characters, which are then free to be merged. User-defined pieces (markers such as
<sep> or domain tokens the model must keep whole) are matched first with an anchored,
leftmost-longest Aho-Corasick automaton; a match is returned as one frozen unit that
no merge may ever touch.

*/

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, Anchored, Input, MatchKind, StartKind};

use crate::tokenizer::Result;

/// The next atomic unit at the front of the remaining text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    /// Length in bytes. Must be non-zero and end on a char boundary,
    /// otherwise the merge loop takes a single char instead.
    pub len: usize,
    /// Frozen units are never merged.
    pub frozen: bool,
}

/// Splits text into the initial units the merge engine starts from.
pub trait PrefixSegmenter {
    /// `rest` is never empty.
    fn next_unit(&self, rest: &str) -> Unit;
}

/// Single characters, with user-defined pieces kept whole and frozen.
#[derive(Clone, Debug, Default)]
pub struct PrefixMatcher {
    /// `None` when there are no user-defined pieces.
    trie: Option<AhoCorasick>,
}

impl PrefixMatcher {
    pub fn new<I, S>(user_defined: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = user_defined
            .into_iter()
            .map(|s| s.as_ref().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if patterns.is_empty() {
            return Ok(Self { trie: None });
        }

        let trie = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .start_kind(StartKind::Anchored)
            .build(&patterns)?;
        Ok(Self { trie: Some(trie) })
    }

    /// Number of user-defined patterns.
    pub fn len(&self) -> usize {
        self.trie.as_ref().map_or(0, |t| t.patterns_len())
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_none()
    }
}

fn one_char_len(rest: &str) -> usize {
    rest.chars().next().map_or(0, char::len_utf8)
}

impl PrefixSegmenter for PrefixMatcher {
    fn next_unit(&self, rest: &str) -> Unit {
        let found = self.trie.as_ref().and_then(|trie| {
            trie.find(Input::new(rest).anchored(Anchored::Yes))
                .map(|m| m.end())
        });
        match found {
            Some(len) => Unit { len, frozen: true },
            None => Unit {
                len: one_char_len(rest),
                frozen: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units<'a>(matcher: &impl PrefixSegmenter, mut text: &'a str) -> Vec<(&'a str, bool)> {
        let mut out = vec![];
        while !text.is_empty() {
            let unit = matcher.next_unit(text);
            out.push((&text[..unit.len], unit.frozen));
            text = &text[unit.len..];
        }
        out
    }

    #[test]
    fn test_plain_characters() {
        let matcher = PrefixMatcher::default();
        assert!(matcher.is_empty());
        assert_eq!(
            units(&matcher, "a▁é"),
            vec![("a", false), ("▁", false), ("é", false)]
        );
    }

    #[test]
    fn test_user_defined_is_frozen() {
        let matcher = PrefixMatcher::new(["<sep>", "<s"]).unwrap();
        assert_eq!(matcher.len(), 2);
        assert_eq!(
            units(&matcher, "x<sep>y"),
            vec![("x", false), ("<sep>", true), ("y", false)]
        );
    }

    #[test]
    fn test_longest_match_wins() {
        let matcher = PrefixMatcher::new(["ab", "abc"]).unwrap();
        assert_eq!(
            matcher.next_unit("abcd"),
            Unit {
                len: 3,
                frozen: true
            }
        );
        assert_eq!(units(&matcher, "abx"), vec![("ab", true), ("x", false)]);
    }

    #[test]
    fn test_match_must_start_at_front() {
        let matcher = PrefixMatcher::new(["bc"]).unwrap();
        assert_eq!(
            matcher.next_unit("abc"),
            Unit {
                len: 1,
                frozen: false
            }
        );
    }

    #[test]
    fn test_empty_patterns_are_ignored() {
        let matcher = PrefixMatcher::new(["", ""]).unwrap();
        assert!(matcher.is_empty());
        assert_eq!(matcher.len(), 0);
    }
}
