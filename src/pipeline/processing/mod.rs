// Per-record processing stages

pub mod enrich;
pub mod merge;
pub mod normalize;
