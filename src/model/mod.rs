pub mod cross_section;
pub mod order;
pub mod security;
pub mod universe;
