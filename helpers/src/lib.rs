//! XWorkplace Helpers
//!
//! Allocation-light data structures shared by the workplace tools:
//!
//! - **tree** - Red-black tree over caller-owned nodes (intrusive links)
//! - **xstring** - Growable byte string with find/replace and escaping
//! - **linklist** - Doubly-linked list with owned or borrowed items
//! - **xml** - Tolerant markup parser producing a DOM
//! - **error** - Status codes returned by the above
//!
//! # Allocation
//!
//! The crate is `no_std` and needs only `alloc`. Every heap block a
//! structure takes is released when the structure is cleared or dropped.

#![no_std]
#![allow(clippy::missing_safety_doc)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod error;
pub mod linklist;
pub mod tree;
pub mod xml;
pub mod xstring;

pub use error::*;
pub use linklist::{ItemOwnership, LinkedList, ListNode};
pub use tree::*;
pub use xstring::*;
