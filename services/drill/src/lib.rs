pub mod config;
pub mod report;
pub mod speaker;
pub mod terminal;
