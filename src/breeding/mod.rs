//! Breeders that turn one evaluated population into the next.

pub mod competition;
pub mod de;

pub use competition::{DeStatistics, StatisticsHook};
pub use de::{DeBreeder, DeBreederBuilder, DeVariant, GenerationContext, RetryLimit};
