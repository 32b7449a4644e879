//! Data models for the homestay association backend.
//!
//! Serialized field names are camelCase to match the web client.

mod document;
mod dues;
mod ledger;
mod member;
mod period;
mod position;
mod upload;

pub use document::*;
pub use dues::*;
pub use ledger::*;
pub use member::*;
pub use period::*;
pub use position::*;
pub use upload::*;
