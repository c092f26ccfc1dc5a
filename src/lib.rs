//! Async client for a Riak-style, eventually-consistent key/value store.
//!
//! Speaks a length-prefixed, message-coded binary protocol over TCP
//! (see [`frame`]) against a cluster of nodes, pooling connections
//! ([`pool`]) and offering a typed object model ([`object`]) with
//! fetch/store/sibling-merge ([`fetch`], [`store`]), a changeset retry loop
//! ([`changeset`]), secondary-index queries ([`index`]), a CRDT counter
//! ([`counter`]), delete ([`delete`]), and bucket/bucket-type property
//! management ([`bucket`]).
//!
//! The top-level entry point is [`client::Client`].

pub mod bucket;
pub mod changeset;
pub mod client;
pub mod codec;
pub mod connection;
pub mod counter;
pub mod delete;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod index;
pub mod object;
pub mod pool;
pub mod store;

pub use client::{Client, ClientConfig};
pub use counter::Counter;
pub use error::{RiakError, RiakResult};
pub use object::{Duplicator, Info, Mergeable, Object};
