//! Intent classification domain.
//!
//! [`Classification`] is what the classifier stage produces for a single
//! request. [`parsing`] turns a provider's free-form reply into one.

pub mod classification;
pub mod parsing;

pub use classification::{Classification, EntityType, IntentType};
pub use parsing::{parse_classification, parse_sub_questions};
