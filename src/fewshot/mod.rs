pub mod exemplars;
pub mod index;
pub mod prompt;
