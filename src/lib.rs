//! Byte-pair encoding with BPE-dropout sampling.
//!
//! ```
//! use bbpe_sampler::{PieceType, BPE};
//!
//! let bpe = BPE::builder()
//!     .piece("<unk>", 0.0, PieceType::Unknown)
//!     .piece("a", 0.0, PieceType::Normal)
//!     .piece("b", 0.0, PieceType::Normal)
//!     .piece("ab", 1.0, PieceType::Normal)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(bpe.encode("aba"), vec![("ab", 3), ("a", 1)]);
//! ```

pub mod tokenizer;

pub use tokenizer::{
    EncodeResult, Error, Model, ModelPiece, ModelProto, PieceType, Result, BPE,
};
