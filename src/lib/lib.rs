pub mod adapters;
pub mod blob;
pub mod config;
pub mod core;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod tests;
