pub mod source;
pub mod worker;

pub use source::{RawItem, RemoteError, RemoteId, RemoteOp, RemoteSource};
pub use worker::{Completion, CompletionBus};
