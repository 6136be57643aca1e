pub mod api;
pub mod config;
pub mod discord;
pub mod error;
pub mod format;
pub mod gateway;
pub mod identity;
pub mod line;
pub mod logging;

#[cfg(test)]
mod testing;
