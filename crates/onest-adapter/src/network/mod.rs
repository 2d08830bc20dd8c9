//! Wire types for the network protocol: the shared context, action payloads, and
//! ACK/NACK replies.

pub mod ack;
pub mod action;
pub mod context;
pub mod message;

pub use ack::{Ack, AckMessage, AckResponse, AckStatus, Nack, NackCode, NackError};
pub use action::{Action, ActionKind, Request};
pub use context::{CodedName, Context, ContextLocation};
pub use message::{
    tag_value, CancelMessage, Catalog, CatalogMessage, Contact, Credential, Customer, Descriptor,
    Fulfillment, FulfillmentState, Intent, Item, ItemQuantity, Order, OrderMessage, Person,
    Provider, ProviderLocation, QuantityCount, SearchMessage, StatusMessage, Tag, TagEntry, Time,
    TimeRange,
};
