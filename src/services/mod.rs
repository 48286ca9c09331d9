pub mod mapping;
pub mod recommendation;
