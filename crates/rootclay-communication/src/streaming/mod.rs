//! G-code streaming: line sanitizing, command sources and the flow-control engine

pub mod engine;
pub mod sanitizer;
pub mod source;
