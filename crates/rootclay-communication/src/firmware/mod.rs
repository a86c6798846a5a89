//! Printer firmware dialect: response classification and manual commands

pub mod commands;
pub mod response_parser;
