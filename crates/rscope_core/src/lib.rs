//! rscope_core: Core utilities shared by every stage of the rscope compiler.
//!
//! Provides name interning and source text spans.

pub mod intern;
pub mod text;

pub use intern::{InternedString, StringInterner, WellKnownNames};
pub use text::{LineMap, TextSpan};
