// Core infrastructure modules
pub mod config;
pub mod core;

// Shell modules
pub mod launcher;
pub mod namespace;
pub mod repl;
