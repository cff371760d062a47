pub mod consts;
pub mod decode;
pub mod device;
pub mod error;
pub mod flash;
pub mod output;
pub mod pipeline;
pub mod protocol;
pub mod settings;
pub mod time;
pub mod types;

#[cfg(test)]
mod sim;
