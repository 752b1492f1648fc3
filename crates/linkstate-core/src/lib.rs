//! Linkstate Core - Shared coordination primitives
//!
//! This crate defines the building blocks of the linked-state layer:
//! - Keys and values (the observable payloads)
//! - Typed synchronous publish/subscribe (`ChangeEmitter`)
//! - Named variables with change notification
//! - Variable groups and the group registry

pub mod key;
pub mod value;
pub mod event;
pub mod var;
pub mod group;
pub mod error;

pub use key::*;
pub use value::*;
pub use event::*;
pub use var::*;
pub use group::*;
pub use error::*;
