//! Route handlers for the Linkage API

pub mod health;
pub mod identify;

pub use health::*;
pub use identify::*;
