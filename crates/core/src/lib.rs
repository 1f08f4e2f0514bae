//! `canonize-core` — shared data model for the canonicalization pipeline.
//!
//! Pure types + identity normalization. No I/O dependencies.

pub mod model;
pub mod normalize;

pub use model::{
    CanonicalRecord, Classification, ConflictLogEntry, EntityRegistryEntry, FieldKind,
    FieldProvenance, MatchPair, RawRecord, RejectedValue, ReviewDecision, ReviewVerdict,
    StatusEntry, DECLARED_FIELDS,
};
pub use normalize::{grouping_key, normalize_identity, normalize_phone};
