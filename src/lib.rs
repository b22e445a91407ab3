pub mod check;
pub mod classify;
pub mod harvest;
pub mod model;
pub mod sensor;
pub mod source;
pub mod traits;

// Re-export common types for convenience
pub use classify::*;
pub use harvest::{harvest, HarvestError, Harvester};
pub use model::*;
pub use source::ProcessSource;
pub use traits::*;
