pub mod aggregator;
pub mod board;

pub use aggregator::aggregate;
pub use board::{ResultBoard, Ticket};
