/// View-models derived from the page: one per card, one per list, one board.
pub mod board;
pub mod card;
pub mod list;

pub use board::BoardAggregator;
pub use card::{CardAggregator, CardValue};
pub use list::{ListAggregator, ListTally};
