pub mod call;
pub mod config;
pub mod discovery;
pub mod jobs;
pub mod sign_debug;
pub mod vm;
