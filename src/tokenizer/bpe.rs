// src/tokenizer/bpe.rs

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::tokenizer::arena::DEFAULT_BLOCK_SIZE;
use crate::tokenizer::merge::{MergeContext, skip_merge};
use crate::tokenizer::prefix_matcher::PrefixMatcher;
use crate::tokenizer::resegment::{EncodeResult, Resegmenter};
use crate::tokenizer::vocab::{ModelPiece, PieceType, Vocabulary};
use crate::tokenizer::{Error, Model, Result};

/// Serialized form of a model: the pieces in id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelProto {
    pub pieces: Vec<ModelPiece>,
}

impl ModelProto {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

struct Config {
    arena_block_size: usize,
}

pub struct BpeBuilder {
    config: Config,
    pieces: Vec<ModelPiece>,
}

impl Default for BpeBuilder {
    fn default() -> Self {
        Self {
            config: Config {
                arena_block_size: DEFAULT_BLOCK_SIZE,
            },
            pieces: vec![],
        }
    }
}

impl BpeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a piece; its id is its position.
    #[must_use]
    pub fn piece<S: Into<String>>(mut self, piece: S, score: f32, kind: PieceType) -> Self {
        self.pieces.push(ModelPiece::new(piece, score, kind));
        self
    }

    #[must_use]
    pub fn pieces<I: IntoIterator<Item = ModelPiece>>(mut self, pieces: I) -> Self {
        self.pieces.extend(pieces);
        self
    }

    /// Merge candidates allocated per arena block.
    #[must_use]
    pub fn arena_block_size(mut self, size: usize) -> Self {
        self.config.arena_block_size = size;
        self
    }

    pub fn build(self) -> Result<BPE> {
        let mut bpe = BPE::from_proto(ModelProto {
            pieces: self.pieces,
        });
        bpe.arena_block_size = self.config.arena_block_size;
        std::mem::replace(&mut bpe.status, Ok(()))?;
        Ok(bpe)
    }
}

/// BPE model with sampling support.
///
/// A model that failed validation is still usable as a value: every encode
/// call on it returns an empty result, see [`BPE::status`].
#[derive(Debug)]
pub struct BPE {
    vocab: Vocabulary,
    matcher: PrefixMatcher,
    arena_block_size: usize,
    status: Result<()>,
}

impl BPE {
    pub fn builder() -> BpeBuilder {
        BpeBuilder::new()
    }

    /// Builds a model, recording any validation failure as its status.
    pub fn from_proto(proto: ModelProto) -> Self {
        let built = Vocabulary::from_pieces(proto.pieces).and_then(|vocab| {
            let matcher = PrefixMatcher::new(vocab.user_defined_pieces())?;
            Ok((vocab, matcher))
        });

        let (vocab, matcher, status) = match built {
            Ok((vocab, matcher)) => {
                debug!(
                    pieces = vocab.len(),
                    user_defined = matcher.len(),
                    unused = vocab.count_of(PieceType::Unused),
                    "built BPE model"
                );
                (vocab, matcher, Ok(()))
            }
            Err(e) => {
                warn!(error = %e, "invalid BPE model");
                (Vocabulary::default(), PrefixMatcher::default(), Err(e))
            }
        };

        Self {
            vocab,
            matcher,
            arena_block_size: DEFAULT_BLOCK_SIZE,
            status,
        }
    }

    /// Like [`BPE::from_proto`] but fails instead of recording the status.
    pub fn new(proto: ModelProto) -> Result<Self> {
        let mut bpe = Self::from_proto(proto);
        std::mem::replace(&mut bpe.status, Ok(()))?;
        Ok(bpe)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(ModelProto::from_file(path)?)
    }

    pub fn status(&self) -> std::result::Result<(), &Error> {
        self.status.as_ref().map(|_| ())
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Deterministic best-first encoding. No generator is involved.
    pub fn encode<'a>(&self, normalized: &'a str) -> EncodeResult<'a> {
        self.encode_with(normalized, 0.0, || false)
    }

    /// BPE-dropout encoding with the thread-local generator.
    pub fn sample_encode<'a>(&self, normalized: &'a str, alpha: f32) -> EncodeResult<'a> {
        if alpha <= 0.0 {
            return self.encode(normalized);
        }
        self.sample_encode_with_rng(normalized, alpha, &mut rand::thread_rng())
    }

    /// BPE-dropout encoding: every valid merge is skipped with probability
    /// `alpha`. `alpha <= 0` is plain BPE and `alpha >= 1` performs no merges.
    pub fn sample_encode_with_rng<'a, R>(
        &self,
        normalized: &'a str,
        alpha: f32,
        rng: &mut R,
    ) -> EncodeResult<'a>
    where
        R: Rng + ?Sized,
    {
        self.encode_with(normalized, alpha, || skip_merge(alpha, rng))
    }

    fn encode_with<'a, F>(&self, normalized: &'a str, alpha: f32, skip: F) -> EncodeResult<'a>
    where
        F: FnMut() -> bool,
    {
        if self.status.is_err() || normalized.is_empty() {
            return vec![];
        }

        let mut ctx = MergeContext::new(normalized, &self.vocab, &self.matcher, self.arena_block_size);
        ctx.drain(skip);

        let stats = ctx.stats();
        trace!(
            alpha,
            symbols = stats.symbols,
            candidates = stats.candidates,
            merges = stats.merges,
            stale = stats.stale,
            dropped = stats.dropped,
            "merged"
        );

        Resegmenter::new(&self.vocab, ctx.reverse_merges()).resegment_all(ctx.pieces())
    }

    /// Id of `piece`, or the unk id if it is not in the vocabulary.
    pub fn piece_to_id(&self, piece: &str) -> u32 {
        self.vocab.id_of(piece).unwrap_or_else(|| self.vocab.unk_id())
    }

    pub fn id_to_piece(&self, id: u32) -> Option<&str> {
        self.vocab.piece_of(id)
    }

    pub fn get_score(&self, id: u32) -> f32 {
        self.vocab.score_of(id)
    }

    pub fn unk_id(&self) -> u32 {
        self.vocab.unk_id()
    }

    pub fn is_unused(&self, id: u32) -> bool {
        self.vocab.is_unused(id)
    }

    pub fn is_control(&self, id: u32) -> bool {
        self.vocab.type_of(id) == Some(PieceType::Control)
    }

    pub fn is_user_defined(&self, id: u32) -> bool {
        self.vocab.type_of(id) == Some(PieceType::UserDefined)
    }

    pub fn get_piece_size(&self) -> usize {
        self.vocab.len()
    }

    /// Concatenates the pieces of `ids`.
    pub fn decode_pieces(&self, ids: &[u32]) -> Result<String> {
        let mut ret = String::with_capacity(ids.len() * 2);
        for &id in ids {
            let piece = self.vocab.piece_of(id).ok_or(Error::UnknownId(id))?;
            ret.push_str(piece);
        }
        Ok(ret)
    }
}

impl Model for BPE {
    fn encode<'a>(&self, normalized: &'a str) -> EncodeResult<'a> {
        BPE::encode(self, normalized)
    }

    fn sample_encode<'a>(&self, normalized: &'a str, alpha: f32) -> EncodeResult<'a> {
        BPE::sample_encode(self, normalized, alpha)
    }

    fn piece_to_id(&self, piece: &str) -> u32 {
        BPE::piece_to_id(self, piece)
    }

    fn id_to_piece(&self, id: u32) -> Option<&str> {
        BPE::id_to_piece(self, id)
    }

    fn get_piece_size(&self) -> usize {
        BPE::get_piece_size(self)
    }
}
