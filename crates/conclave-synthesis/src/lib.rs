//! # Conclave Synthesis
//!
//! Reduces N candidate answers (plus deliberation exchanges) into one
//! consensus decision:
//!
//! - **Similarity**: bag-of-words cosine, shared by consensus extraction
//!   and deliberation early-termination.
//! - **Synthesizer**: strategy-dispatched reduction — consensus
//!   extraction, weighted fusion, or meta-synthesis through a moderator
//!   member.
//! - **DevilsAdvocate**: the optional critique/rewrite pass that can
//!   downgrade over-confident syntheses.

mod advocate;
mod error;
mod rankings;
mod similarity;
mod synthesizer;

pub use advocate::{looks_like_code, parse_critique, Critique, CritiqueSeverity, DevilsAdvocate};
pub use error::SynthesisError;
pub use rankings::ModelRankings;
pub use similarity::{mean_pairwise, similarity};
pub use synthesizer::Synthesizer;
