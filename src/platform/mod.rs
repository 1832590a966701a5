// ABOUTME: Protocol adapter module for aestas
// ABOUTME: Re-exports the adapter registry and the console adapter

pub mod console;
pub mod registry;

pub use console::{ConsoleAdapter, ConsoleLine, ConsoleOutput, ConsoleTransport};
pub use registry::AdapterRegistry;
