// src/tokenizer/merge.rs

//! Best-first BPE merge loop with optional dropout.
//!
//! The input is cut into units by a [`PrefixSegmenter`] and linked into a
//! chain of [`Symbol`]s. Every adjacent pair whose concatenation is a known
//! piece becomes a [`MergeCandidate`] on a max-heap ordered by score, ties
//! going to the leftmost pair. Popping a candidate merges the pair in place
//! and queues the (at most two) pairs that the merge created.
//!
//! Candidates are never removed from the heap when a merge makes them
//! obsolete. Instead a popped candidate is checked against the current
//! chain: if either side was merged away, or the pair no longer spans the
//! recorded number of bytes, it is dropped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::Rng;
use rustc_hash::FxHashMap as HashMap;

use crate::tokenizer::arena::{Arena, ArenaId};
use crate::tokenizer::prefix_matcher::PrefixSegmenter;
use crate::tokenizer::vocab::Vocabulary;

/// Maps an unused composite piece to the two pieces it was built from.
pub type ReverseMergeTable<'a> = HashMap<&'a str, (&'a str, &'a str)>;

/// A node of the symbol chain. Its piece is `text[start..start + len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub start: usize,
    /// Zero once the symbol has been merged into its left neighbour.
    pub len: usize,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub freeze: bool,
}

impl Symbol {
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeCandidate {
    pub left: usize,
    pub right: usize,
    /// Score of the merged piece. Larger is better.
    pub score: f32,
    /// Byte length of the merged piece when the candidate was created.
    pub size: usize,
}

/// Heap entry. The full candidate lives in the arena.
#[derive(Debug, Clone, Copy)]
struct AgendaItem {
    score: f32,
    left: usize,
    candidate: ArenaId,
}

impl PartialEq for AgendaItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AgendaItem {}

impl PartialOrd for AgendaItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgendaItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher score first, then the smaller left index.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.left.cmp(&self.left))
            .then_with(|| other.candidate.cmp(&self.candidate))
    }
}

/// Counters for one merge run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub symbols: usize,
    pub candidates: usize,
    pub merges: usize,
    pub stale: usize,
    pub dropped: usize,
}

/// BPE-dropout decision for one popped candidate.
///
/// `alpha <= 0` never skips and `alpha >= 1` always skips; the generator is
/// only drawn from in between.
#[inline]
pub fn skip_merge<R: Rng + ?Sized>(alpha: f32, rng: &mut R) -> bool {
    if alpha <= 0.0 {
        return false;
    }
    if alpha >= 1.0 {
        return true;
    }
    rng.r#gen::<f64>() < f64::from(alpha)
}

/// All mutable state of a single encode call.
pub struct MergeContext<'v, 'a> {
    text: &'a str,
    vocab: &'v Vocabulary,
    symbols: Vec<Symbol>,
    agenda: BinaryHeap<AgendaItem>,
    arena: Arena<MergeCandidate>,
    rev_merge: ReverseMergeTable<'a>,
    stats: MergeStats,
}

impl<'v, 'a> MergeContext<'v, 'a> {
    /// Segments `text` into the initial chain and queues every mergeable
    /// adjacent pair.
    pub fn new<S>(text: &'a str, vocab: &'v Vocabulary, segmenter: &S, arena_block_size: usize) -> Self
    where
        S: PrefixSegmenter + ?Sized,
    {
        let mut symbols = Vec::with_capacity(text.len());
        let mut start = 0;
        while start < text.len() {
            let rest = &text[start..];
            let unit = segmenter.next_unit(rest);
            // A unit that is empty or ends inside a char becomes one char.
            let (len, frozen) = if unit.len > 0 && rest.is_char_boundary(unit.len) {
                (unit.len, unit.frozen)
            } else {
                (rest.chars().next().map_or(rest.len(), char::len_utf8), false)
            };
            let index = symbols.len();
            symbols.push(Symbol {
                start,
                len,
                prev: index.checked_sub(1),
                next: (start + len < text.len()).then_some(index + 1),
                freeze: frozen,
            });
            start += len;
        }

        let mut ctx = Self {
            text,
            vocab,
            agenda: BinaryHeap::with_capacity(symbols.len()),
            arena: Arena::with_block_size(arena_block_size),
            rev_merge: ReverseMergeTable::default(),
            stats: MergeStats {
                symbols: symbols.len(),
                ..Default::default()
            },
            symbols,
        };

        for i in 1..ctx.symbols.len() {
            ctx.try_add_candidate(Some(i - 1), Some(i));
        }
        ctx
    }

    #[inline]
    fn piece(&self, index: usize) -> &'a str {
        let s = &self.symbols[index];
        &self.text[s.start..s.start + s.len]
    }

    /// Queues `(left, right)` if their concatenation is a known piece.
    fn try_add_candidate(&mut self, left: Option<usize>, right: Option<usize>) {
        let (Some(left), Some(right)) = (left, right) else {
            return;
        };
        let (l, r) = (self.symbols[left], self.symbols[right]);
        if l.freeze || r.freeze {
            return;
        }

        let text = self.text;
        let size = l.len + r.len;
        let merged = &text[l.start..l.start + size];
        let Some(&entry) = self.vocab.lookup(merged) else {
            return;
        };

        let candidate = self.arena.alloc(MergeCandidate {
            left,
            right,
            score: entry.score,
            size,
        });
        self.agenda.push(AgendaItem {
            score: entry.score,
            left,
            candidate,
        });
        self.stats.candidates += 1;

        if entry.unused {
            let parts = (self.piece(left), self.piece(right));
            self.rev_merge.insert(merged, parts);
        }
    }

    /// Drains the agenda, skipping each valid candidate with probability
    /// `alpha`.
    pub fn run<R: Rng + ?Sized>(&mut self, alpha: f32, rng: &mut R) {
        self.drain(|| skip_merge(alpha, rng));
    }

    /// Drains the agenda, asking `skip` about each valid candidate.
    pub fn drain<F: FnMut() -> bool>(&mut self, mut skip: F) {
        while let Some(item) = self.agenda.pop() {
            let top = self.arena[item.candidate];
            let (l, r) = (&self.symbols[top.left], &self.symbols[top.right]);

            if l.is_tombstone() || r.is_tombstone() || l.len + r.len != top.size {
                self.stats.stale += 1;
                continue;
            }
            debug_assert_eq!(l.next, Some(top.right));

            if skip() {
                self.stats.dropped += 1;
                continue;
            }

            self.merge(top.left, top.right);
        }
    }

    fn merge(&mut self, left: usize, right: usize) {
        let next = self.symbols[right].next;
        self.symbols[left].len += self.symbols[right].len;
        self.symbols[left].next = next;
        if let Some(next) = next {
            self.symbols[next].prev = Some(left);
        }
        self.symbols[right].len = 0;
        self.stats.merges += 1;

        self.try_add_candidate(self.symbols[left].prev, Some(left));
        self.try_add_candidate(Some(left), next);
    }

    /// Live pieces in chain order.
    pub fn pieces(&self) -> impl Iterator<Item = &'a str> + '_ {
        let head = if self.symbols.is_empty() { None } else { Some(0) };
        std::iter::successors(head, move |&i| self.symbols[i].next).map(move |i| self.piece(i))
    }

    #[cfg(test)]
    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn reverse_merges(&self) -> &ReverseMergeTable<'a> {
        &self.rev_merge
    }

    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// Candidates allocated so far, stale or not.
    #[cfg(test)]
    fn candidates_allocated(&self) -> usize {
        self.arena.len()
    }
}
