// src/tokenizer/vocab.rs

//! Piece vocabulary shared read-only by every encode call.

use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::tokenizer::{Error, Result};

/// How a piece takes part in encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PieceType {
    #[default]
    Normal,
    Unknown,
    Control,
    UserDefined,
    /// Only steers merge ordering, never emitted.
    Unused,
    Byte,
}

impl PieceType {
    /// Whether pieces of this type can be produced by a merge.
    pub fn is_mergeable(self) -> bool {
        matches!(self, PieceType::Normal | PieceType::UserDefined | PieceType::Unused)
    }
}

/// One entry of a serialized model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPiece {
    pub piece: String,
    #[serde(default)]
    pub score: f32,
    #[serde(rename = "type", default)]
    pub kind: PieceType,
}

impl ModelPiece {
    pub fn new<S: Into<String>>(piece: S, score: f32, kind: PieceType) -> Self {
        Self {
            piece: piece.into(),
            score,
            kind,
        }
    }
}

/// What a merge lookup sees for a mergeable piece.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VocabEntry {
    pub id: u32,
    pub score: f32,
    pub unused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    /// Normal, user-defined and unused pieces. The only map merges consult.
    pieces: HashMap<String, VocabEntry>,
    /// Unknown, control and byte pieces.
    reserved: HashMap<String, u32>,
    id_to_piece: Vec<ModelPiece>,
    unk_id: u32,
}

impl Vocabulary {
    /// Builds the vocabulary, assigning ids by position.
    pub fn from_pieces(model_pieces: Vec<ModelPiece>) -> Result<Self> {
        let mut pieces = HashMap::default();
        let mut reserved = HashMap::default();
        let mut unk_id = None;

        for (i, sp) in model_pieces.iter().enumerate() {
            let id = i as u32;
            if sp.piece.is_empty() {
                return Err(Error::EmptyPiece(id));
            }
            if pieces.contains_key(&sp.piece) || reserved.contains_key(&sp.piece) {
                return Err(Error::DuplicatePiece(sp.piece.clone()));
            }

            if sp.kind.is_mergeable() {
                pieces.insert(
                    sp.piece.clone(),
                    VocabEntry {
                        id,
                        score: sp.score,
                        unused: sp.kind == PieceType::Unused,
                    },
                );
            } else {
                reserved.insert(sp.piece.clone(), id);
            }

            if sp.kind == PieceType::Unknown {
                if unk_id.is_some() {
                    return Err(Error::UnkAlreadyDefined);
                }
                unk_id = Some(id);
            }
        }

        let unk_id = unk_id.ok_or(Error::UnkNotDefined)?;

        Ok(Self {
            pieces,
            reserved,
            id_to_piece: model_pieces,
            unk_id,
        })
    }

    /// Looks up a candidate merge result.
    #[inline]
    pub fn lookup(&self, piece: &str) -> Option<&VocabEntry> {
        self.pieces.get(piece)
    }

    /// Returns the id of any known piece, reserved pieces first.
    #[inline]
    pub fn id_of(&self, piece: &str) -> Option<u32> {
        self.reserved
            .get(piece)
            .copied()
            .or_else(|| self.pieces.get(piece).map(|entry| entry.id))
    }

    /// Score of `id`, `0.0` for ids outside the vocabulary.
    pub fn score_of(&self, id: u32) -> f32 {
        self.id_to_piece.get(id as usize).map_or(0.0, |sp| sp.score)
    }

    pub fn piece_of(&self, id: u32) -> Option<&str> {
        self.id_to_piece.get(id as usize).map(|sp| sp.piece.as_str())
    }

    pub fn type_of(&self, id: u32) -> Option<PieceType> {
        self.id_to_piece.get(id as usize).map(|sp| sp.kind)
    }

    #[inline]
    pub fn is_unused(&self, id: u32) -> bool {
        self.type_of(id) == Some(PieceType::Unused)
    }

    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }

    /// User-defined pieces in id order.
    pub fn user_defined_pieces(&self) -> impl Iterator<Item = &str> {
        self.id_to_piece
            .iter()
            .filter(|sp| sp.kind == PieceType::UserDefined)
            .map(|sp| sp.piece.as_str())
    }

    pub fn count_of(&self, kind: PieceType) -> usize {
        self.id_to_piece.iter().filter(|sp| sp.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.id_to_piece.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_piece.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces() -> Vec<ModelPiece> {
        vec![
            ModelPiece::new("<unk>", 0.0, PieceType::Unknown),
            ModelPiece::new("<s>", 0.0, PieceType::Control),
            ModelPiece::new("a", -1.0, PieceType::Normal),
            ModelPiece::new("b", -2.0, PieceType::Normal),
            ModelPiece::new("ab", 3.0, PieceType::Unused),
            ModelPiece::new("<sep>", 0.0, PieceType::UserDefined),
        ]
    }

    #[test]
    fn test_ids_follow_positions() {
        let vocab = Vocabulary::from_pieces(pieces()).unwrap();

        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.unk_id(), 0);
        assert_eq!(vocab.id_of("<s>"), Some(1));
        assert_eq!(vocab.id_of("ab"), Some(4));
        assert_eq!(vocab.id_of("zz"), None);
        assert_eq!(vocab.piece_of(3), Some("b"));
        assert_eq!(vocab.score_of(4), 3.0);
        assert_eq!(vocab.score_of(99), 0.0);
    }

    #[test]
    fn test_lookup_only_sees_mergeable_pieces() {
        let vocab = Vocabulary::from_pieces(pieces()).unwrap();

        assert!(vocab.lookup("<unk>").is_none());
        assert!(vocab.lookup("<s>").is_none());
        assert_eq!(
            vocab.lookup("ab"),
            Some(&VocabEntry {
                id: 4,
                score: 3.0,
                unused: true
            })
        );
        assert!(!vocab.lookup("a").unwrap().unused);
        assert!(vocab.lookup("<sep>").is_some());
    }

    #[test]
    fn test_unused_and_user_defined() {
        let vocab = Vocabulary::from_pieces(pieces()).unwrap();

        assert!(vocab.is_unused(4));
        assert!(!vocab.is_unused(2));
        assert!(!vocab.is_unused(100));
        assert_eq!(vocab.user_defined_pieces().collect::<Vec<_>>(), vec!["<sep>"]);
        assert_eq!(vocab.count_of(PieceType::Unused), 1);
    }

    #[test]
    fn test_missing_unk() {
        let err = Vocabulary::from_pieces(vec![ModelPiece::new("a", 0.0, PieceType::Normal)])
            .unwrap_err();
        assert!(matches!(err, Error::UnkNotDefined));
    }

    #[test]
    fn test_second_unk() {
        let mut p = pieces();
        p.push(ModelPiece::new("<unk2>", 0.0, PieceType::Unknown));
        let err = Vocabulary::from_pieces(p).unwrap_err();
        assert!(matches!(err, Error::UnkAlreadyDefined));
    }

    #[test]
    fn test_duplicate_and_empty() {
        let mut p = pieces();
        p.push(ModelPiece::new("a", 0.0, PieceType::Unused));
        assert!(matches!(
            Vocabulary::from_pieces(p).unwrap_err(),
            Error::DuplicatePiece(ref s) if s == "a"
        ));

        let mut p = pieces();
        p.push(ModelPiece::new("", 0.0, PieceType::Normal));
        assert!(matches!(
            Vocabulary::from_pieces(p).unwrap_err(),
            Error::EmptyPiece(6)
        ));
    }

    #[test]
    fn test_model_piece_json() {
        let sp: ModelPiece =
            serde_json::from_str(r#"{"piece": "he", "score": 1.5, "type": "unused"}"#).unwrap();
        assert_eq!(sp, ModelPiece::new("he", 1.5, PieceType::Unused));

        let sp: ModelPiece = serde_json::from_str(r#"{"piece": "x"}"#).unwrap();
        assert_eq!(sp.kind, PieceType::Normal);
        assert_eq!(sp.score, 0.0);
    }
}
