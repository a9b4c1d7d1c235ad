//! HTTP surface (spec.md §3/§4.5/§6): URL grammar and command dispatch
//! (`path`), the per-connection request parser (`request`), content/encoding
//! negotiation (`negotiation`), status policy (`status`), response envelope
//! serialization (`response`), and the method/command dispatch table
//! (`dispatcher`) tying the rest of the crate to all of the above.

pub mod dispatcher;
pub mod negotiation;
pub mod path;
pub mod request;
pub mod response;
pub mod status;
