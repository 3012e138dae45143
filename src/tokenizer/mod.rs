// src/tokenizer/mod.rs

pub mod arena;
pub mod bpe;
pub mod merge;
pub mod prefix_matcher;
pub mod resegment;
pub mod result;
pub mod vocab;

pub use arena::{Arena, ArenaId};
pub use bpe::{BpeBuilder, ModelProto, BPE};
pub use merge::{MergeCandidate, MergeContext, MergeStats, ReverseMergeTable, Symbol};
pub use prefix_matcher::{PrefixMatcher, PrefixSegmenter, Unit};
pub use resegment::{EncodeResult, Resegmenter};
pub use result::{Error, Result};
pub use vocab::{ModelPiece, PieceType, VocabEntry, Vocabulary};

/// A trait defining the core behavior of a tokenizer Model.
pub trait Model: Send + Sync {
    /// Deterministic encoding of already normalized text.
    fn encode<'a>(&self, normalized: &'a str) -> EncodeResult<'a>;

    /// Sampled encoding; `alpha` is the probability of skipping a merge.
    fn sample_encode<'a>(&self, normalized: &'a str, alpha: f32) -> EncodeResult<'a>;

    /// Converts a piece to its ID, falling back to the unknown ID.
    fn piece_to_id(&self, piece: &str) -> u32;

    /// Converts an ID back to its piece.
    fn id_to_piece(&self, id: u32) -> Option<&str>;

    /// Returns the vocabulary size of the model.
    fn get_piece_size(&self) -> usize;
}
