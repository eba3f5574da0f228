pub mod quote;
pub mod setup;
pub mod stats;
pub mod ui;
