//! Error codes
//!
//! Every failure the helpers report is an ordinary, expected outcome that
//! callers branch on. Nothing here is raised for allocation failure; that is
//! left to the global allocator.

use thiserror::Error;

/// Status codes returned by the red-black tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RbError {
    /// Insert rejected because an equal key is already present
    #[error("an entry with an equal key is already in the tree")]
    Duplicate,
    /// Delete target is null or not linked into a tree
    #[error("node is not part of the tree")]
    InvalidNode,
}

/// Errors returned by the markup parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum XmlError {
    /// A closing tag was found with no matching opening tag in scope
    #[error("closing tag without matching opening tag at offset {offset}")]
    UnmatchedClosingTag {
        /// Byte offset of the offending `<` in the input buffer
        offset: usize,
    },
    /// The parent node passed to the parser does not exist
    #[error("parent node does not exist")]
    InvalidParent,
}

impl XmlError {
    /// Byte offset of the offending markup, if the error has one
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::UnmatchedClosingTag { offset } => Some(*offset),
            Self::InvalidParent => None,
        }
    }
}
