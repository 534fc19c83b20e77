// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod answer;
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod deck;
pub mod fetch;
pub mod handoff;
pub mod logging;
pub mod runtime;
pub mod sentence;
pub mod session;
pub mod settings;
pub mod source;
pub mod speech;
pub mod stats;
pub mod ui;
