pub mod bowl;

pub use bowl::{BowlModel, BowlState, OptimizerKind};
