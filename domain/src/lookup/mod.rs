//! Structured lookup: normalization, reference data and the resolver.

pub mod dataset;
pub mod normalize;
pub mod region;
pub mod resolver;
pub mod similarity;

pub use dataset::{AliasMap, DatasetRecord, DatasetSnapshot, DatasetTable, TableEntry};
pub use normalize::{NormalizedQuery, normalize};
pub use region::{Region, RegionTable};
pub use resolver::{
    LookupCandidate, LookupFailure, LookupResult, MatchType, ResolverConfig, StructuredResolver,
};
pub use similarity::similarity;
