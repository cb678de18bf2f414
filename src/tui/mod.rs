//! TUI debugger.
//!
//! Provides an interactive terminal-based debugger with:
//! - Live register view
//! - Hex memory view
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
