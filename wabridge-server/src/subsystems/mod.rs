pub mod orchestrator;
pub mod session_store;
pub mod sweeper;
pub mod transcode;
