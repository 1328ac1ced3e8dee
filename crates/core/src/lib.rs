pub mod book;
pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod filename;
pub mod lookup;
pub mod progress;
pub mod readers;
pub mod resolve;
pub mod scan;
pub mod security;
pub mod store;

#[cfg(test)]
mod fixtures;

pub mod prelude {
    pub use crate::book::*;
    pub use crate::error::*;
}
