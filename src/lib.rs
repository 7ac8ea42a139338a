// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod autodarts;
pub mod config;
pub mod dart;
pub mod game;
pub mod history;
pub mod runtime;
pub mod scoreboard;
pub mod scoring;
pub mod sim;
pub mod stats;
pub mod training;
pub mod util;
