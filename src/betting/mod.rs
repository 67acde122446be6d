pub mod ev;
pub mod kelly;
