// src/tokenizer/resegment.rs

use crate::tokenizer::merge::ReverseMergeTable;
use crate::tokenizer::vocab::Vocabulary;

/// Ordered `(piece, id)` output of an encode call.
pub type EncodeResult<'a> = Vec<(&'a str, u32)>;

/// Expands unused pieces back into the pieces they were merged from.
///
/// An unused piece can only appear in the merge result if it was created by
/// a merge, and every such merge is recorded in the reverse table, so the
/// expansion always bottoms out in emittable pieces.
pub struct Resegmenter<'v, 'a> {
    vocab: &'v Vocabulary,
    rev_merge: &'v ReverseMergeTable<'a>,
}

impl<'v, 'a> Resegmenter<'v, 'a> {
    pub fn new(vocab: &'v Vocabulary, rev_merge: &'v ReverseMergeTable<'a>) -> Self {
        Self { vocab, rev_merge }
    }

    /// Appends the leaves of `piece`'s derivation to `output`, left to right.
    pub fn resegment(&self, piece: &'a str, output: &mut EncodeResult<'a>) {
        let mut stack = vec![piece];
        while let Some(w) = stack.pop() {
            let id = match self.vocab.id_of(w) {
                Some(id) => id,
                None => {
                    output.push((w, self.vocab.unk_id()));
                    continue;
                }
            };
            if !self.vocab.is_unused(id) {
                output.push((w, id));
                continue;
            }
            match self.rev_merge.get(w) {
                Some(&(left, right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                // Unreachable for pieces produced by a merge.
                None => output.push((w, id)),
            }
        }
    }

    pub fn resegment_all<I>(&self, pieces: I) -> EncodeResult<'a>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut output = EncodeResult::new();
        for piece in pieces {
            self.resegment(piece, &mut output);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::vocab::{ModelPiece, PieceType};

    fn vocab() -> Vocabulary {
        Vocabulary::from_pieces(vec![
            ModelPiece::new("<unk>", 0.0, PieceType::Unknown),
            ModelPiece::new("a", 0.0, PieceType::Normal),
            ModelPiece::new("b", 0.0, PieceType::Normal),
            ModelPiece::new("c", 0.0, PieceType::Normal),
            ModelPiece::new("ab", 0.0, PieceType::Unused),
            ModelPiece::new("abc", 0.0, PieceType::Unused),
            ModelPiece::new("bc", 0.0, PieceType::Normal),
        ])
        .unwrap()
    }

    #[test]
    fn test_normal_piece_passes_through() {
        let v = vocab();
        let table = ReverseMergeTable::default();
        let r = Resegmenter::new(&v, &table);

        assert_eq!(r.resegment_all(["bc", "a"]), vec![("bc", 6), ("a", 1)]);
    }

    #[test]
    fn test_unknown_piece_gets_unk_id() {
        let v = vocab();
        let table = ReverseMergeTable::default();
        let r = Resegmenter::new(&v, &table);

        assert_eq!(r.resegment_all(["zz"]), vec![("zz", 0)]);
    }

    #[test]
    fn test_nested_unused_expands_left_to_right() {
        let v = vocab();
        let mut table = ReverseMergeTable::default();
        table.insert("abc", ("ab", "c"));
        table.insert("ab", ("a", "b"));
        let r = Resegmenter::new(&v, &table);

        assert_eq!(
            r.resegment_all(["abc", "bc"]),
            vec![("a", 1), ("b", 2), ("c", 3), ("bc", 6)]
        );
    }

    #[test]
    fn test_missing_derivation_is_emitted_as_is() {
        let v = vocab();
        let table = ReverseMergeTable::default();
        let r = Resegmenter::new(&v, &table);

        assert_eq!(r.resegment_all(["ab"]), vec![("ab", 4)]);
    }
}
