//! Content-addressed row keys for CDC messages.
//!
//! A message body carries its document identifier at `message._id`. The
//! identifier is normalized to an object and re-serialized in canonical form
//! (sorted keys, no whitespace, type-preserving scalars); those bytes are
//! the row key in the store.

mod canonical;
mod deriver;
mod identifier;

pub use canonical::{canonicalize, canonicalize_to_string};
pub use deriver::{DerivedKey, KeyDerivation, KeyDeriver};
pub use identifier::extract_identifier;
