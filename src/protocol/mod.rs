pub mod channel;
pub mod commands;
pub mod retry;
pub mod transport;
