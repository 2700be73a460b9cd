//! farhand-core: Core types and traits for the farhand RPC system.
//!
//! This crate defines:
//! - Frame types ([`Frame`], [`Call`], [`Response`], [`ResponsePayload`])
//! - Correlation tokens ([`CallId`], [`SequenceId`])
//! - The error taxonomy ([`RpcError`])
//! - The transport abstraction ([`Transport`])
//! - The lazy-sequence abstraction ([`LazySequence`], [`SequenceStep`])

#![deny(unsafe_code)]

mod error;
mod frame;
mod sequence;
mod transport;

pub use error::*;
pub use frame::*;
pub use sequence::*;
pub use transport::*;
