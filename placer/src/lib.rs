pub mod driver;
pub mod error;
pub mod objective;
pub mod solver;

pub use driver::{PlacementStats, place};
pub use error::PlaceError;
