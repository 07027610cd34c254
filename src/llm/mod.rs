pub mod compat;
pub mod engine;
pub mod formatter;
pub mod provider;
pub mod providers;
pub mod redact;
pub mod types;
