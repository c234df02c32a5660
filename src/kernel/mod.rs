pub mod scope;
pub mod subset;
pub mod term;
pub mod types;

pub use scope::{CanonicalizeError, Canonicalizer};
pub use term::{Term, TermBank};
pub use types::{Type, TypeError, TypeMap};
