//! Pub/Sub wire records and canonical topic names.

pub mod message;
pub mod publish;
pub mod topic;

pub use message::*;
pub use publish::*;
pub use topic::*;
