pub mod common;
pub mod nodes;
