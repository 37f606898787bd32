//! Transport-agnostic glove logic: frame parsing, hand state, settings.

pub mod frame;
pub mod hand;
pub mod models;
pub mod settings;
