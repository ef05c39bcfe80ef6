pub mod core;
pub mod loader;
pub mod parsers;
pub mod say;
