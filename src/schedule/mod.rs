pub mod board;
pub mod facets;
mod lenient;
pub mod model;
pub mod normalize;

pub use board::{FilterSelection, ScheduleBoard, Selection};
pub use model::RawRecord;
pub use normalize::normalize;
