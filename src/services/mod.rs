pub mod client;
pub mod config;
pub mod discovery;
pub mod job_poller;
pub mod logger;
pub mod signer;
pub mod tool_builder;
pub mod tool_registry;
pub mod validation;
