//! CLI commands.

pub mod append;
pub mod branch;
pub mod checkout;
pub mod compare;
pub mod init;
pub mod log;
pub mod merge;
pub mod verify;
