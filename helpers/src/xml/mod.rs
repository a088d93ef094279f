//! Markup parsing (xml)
//!
//! A small DOM for HTML-like and XML-like markup:
//!
//! - **tags**: first pass, locates tags and comments in a buffer
//! - **parser**: second pass, pairs tags and builds the node tree
//! - **dom**: arena of nodes addressed by `NodeId`
//!
//! # Node ownership
//!
//! ```ignore
//! Document
//!   children:   Element, Text, Comment
//!   Element
//!     attributes: Attribute
//!     children:   Element, Text, Comment
//! ```
//!
//! Deleting a node deletes everything beneath it.

pub mod dom;
pub mod parser;
pub mod tags;

pub use dom::*;
pub use parser::*;
pub use tags::*;
