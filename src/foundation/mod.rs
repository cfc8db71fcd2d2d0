pub mod child;
pub mod core;
pub mod error;
