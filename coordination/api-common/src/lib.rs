pub mod bodies;
pub mod env;
pub mod paths;
