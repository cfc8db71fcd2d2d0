pub mod ops;
pub mod registry;
