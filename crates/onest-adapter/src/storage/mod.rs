//! Store implementations backing the protocol engine.

pub mod memory;

pub use memory::{
    InMemoryApplicationRepository, InMemoryCallbackInbox, InMemoryOfferingStore,
    InMemoryStageStore, InMemoryTaskOutbox,
};
