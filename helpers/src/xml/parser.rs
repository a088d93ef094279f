//! Markup parser
//!
//! Parsing runs in two passes. [`build_tags_list`] records every tag and
//! comment in the buffer; the tree builder then walks that list, pairs each
//! opening tag with its closing tag and recurses into the content between
//! them.
//!
//! The builder is lenient about opening tags: one without a matching closer
//! becomes a childless element and the content after it lands in the
//! enclosing element. A closing tag without an opener in scope is fatal.

use alloc::vec::Vec;

use bitflags::bitflags;

use super::dom::{DomTree, NodeId, NodeType};
use super::tags::{build_tags_list, TagFound};
use crate::error::XmlError;
use crate::linklist::ListNode;

bitflags! {
    /// Parser options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParseFlags: u32 {
        /// Do not create text nodes that hold only whitespace
        const DROP_WHITESPACE = 0x0001;
        /// Do not create comment nodes
        const SKIP_COMMENTS   = 0x0002;
    }
}

/// What to do with the content of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagHandling {
    /// Parse the content into child nodes
    #[default]
    BreakUp,
    /// Keep the content as one verbatim text child
    CopyAsText,
}

/// Callback choosing [`TagHandling`] by tag name
pub type TagValidator<'a> = &'a dyn Fn(&[u8]) -> TagHandling;

struct TreeBuilder<'a, 'v> {
    tree: &'a mut DomTree,
    buffer: &'a [u8],
    validator: Option<TagValidator<'v>>,
    flags: ParseFlags,
}

impl TreeBuilder<'_, '_> {
    fn handling_for(&self, name: &[u8]) -> TagHandling {
        self.validator
            .map_or(TagHandling::BreakUp, |validate| validate(name))
    }

    /// Build nodes for `buffer[start..end]` under `parent`
    ///
    /// `first` is the first tag that may lie in the range; tags at or past
    /// `end` belong to the caller.
    fn build(
        &mut self,
        parent: NodeId,
        start: usize,
        end: usize,
        first: Option<&ListNode<TagFound>>,
    ) -> Result<(), XmlError> {
        let len = self.buffer.len();
        let mut pos = start;
        let mut cursor = first;

        while let Some(entry) = cursor {
            let tag = *entry.item();
            if tag.open_bracket >= end {
                break;
            }

            self.add_text(parent, pos, tag.open_bracket)?;

            if tag.is_comment {
                if !self.flags.contains(ParseFlags::SKIP_COMMENTS) {
                    let body = &self.buffer[tag.start_of_name..tag.first_after_name];
                    self.tree
                        .create_node(Some(parent), NodeType::Comment, None, Some(body))?;
                }
                pos = tag.end(len);
                cursor = entry.next();
                continue;
            }

            if tag.is_closing(self.buffer) {
                log::debug!(
                    "xml: closing tag without opener at offset {}",
                    tag.open_bracket
                );
                return Err(XmlError::UnmatchedClosingTag {
                    offset: tag.open_bracket,
                });
            }

            let name = tag.name(self.buffer);
            let element = self
                .tree
                .create_node(Some(parent), NodeType::Element, Some(name), None)?;
            self.add_attributes(element, tag.attribute_text(self.buffer))?;

            if tag.is_empty_element {
                pos = tag.end(len);
                cursor = entry.next();
                continue;
            }

            match self.find_closing_tag(entry, name, end) {
                Some(closer) => {
                    let content_start = tag.end(len);
                    let content_end = closer.item().open_bracket;

                    match self.handling_for(name) {
                        TagHandling::CopyAsText => {
                            if content_start < content_end {
                                let text = &self.buffer[content_start..content_end];
                                self.tree
                                    .create_node(Some(element), NodeType::Text, None, Some(text))?;
                            }
                        }
                        TagHandling::BreakUp => {
                            self.build(element, content_start, content_end, entry.next())?;
                        }
                    }

                    pos = closer.item().end(len);
                    cursor = closer.next();
                }
                None => {
                    log::trace!(
                        "xml: no closing tag for element at offset {}",
                        tag.open_bracket
                    );
                    pos = tag.end(len);
                    cursor = entry.next();
                }
            }
        }

        self.add_text(parent, pos, end)
    }

    /// Find the first `</name>` after `opener` and before `end`
    fn find_closing_tag<'t>(
        &self,
        opener: &'t ListNode<TagFound>,
        name: &[u8],
        end: usize,
    ) -> Option<&'t ListNode<TagFound>> {
        let mut cursor = opener.next();

        while let Some(entry) = cursor {
            let tag = entry.item();
            if tag.open_bracket >= end {
                break;
            }

            if tag.is_closing(self.buffer) {
                let candidate = tag.name(self.buffer);
                if candidate.len() == name.len() + 1 && &candidate[1..] == name {
                    return Some(entry);
                }
            }

            cursor = entry.next();
        }

        None
    }

    fn add_text(&mut self, parent: NodeId, from: usize, to: usize) -> Result<(), XmlError> {
        if from >= to {
            return Ok(());
        }

        let text = &self.buffer[from..to];
        if self.flags.contains(ParseFlags::DROP_WHITESPACE)
            && text.iter().all(u8::is_ascii_whitespace)
        {
            return Ok(());
        }

        self.tree
            .create_node(Some(parent), NodeType::Text, None, Some(text))?;
        Ok(())
    }

    /// Split `NAME="VALUE" NAME='VALUE' NAME=VALUE NAME` pairs
    fn add_attributes(&mut self, element: NodeId, text: &[u8]) -> Result<(), XmlError> {
        let len = text.len();
        let mut i = 0;

        loop {
            while i < len && text[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= len {
                return Ok(());
            }

            let name_start = i;
            while i < len && !text[i].is_ascii_whitespace() && text[i] != b'=' {
                i += 1;
            }
            let name = &text[name_start..i];

            let mut look = i;
            while look < len && text[look].is_ascii_whitespace() {
                look += 1;
            }

            let mut value = None;
            if look < len && text[look] == b'=' {
                i = look + 1;
                while i < len && text[i].is_ascii_whitespace() {
                    i += 1;
                }

                if i < len && (text[i] == b'"' || text[i] == b'\'') {
                    let quote = text[i];
                    i += 1;
                    let value_start = i;
                    while i < len && text[i] != quote {
                        i += 1;
                    }
                    value = Some(&text[value_start..i]);
                    if i < len {
                        i += 1;
                    }
                } else {
                    let value_start = i;
                    while i < len && !text[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    value = Some(&text[value_start..i]);
                }
            }

            if !name.is_empty() {
                self.tree
                    .create_node(Some(element), NodeType::Attribute, Some(name), value)?;
            }
        }
    }
}

impl DomTree {
    /// Parse `buffer` and attach the resulting nodes under `parent`
    ///
    /// A NUL byte ends the input. On error every node this call added is
    /// destroyed again.
    pub fn parse(
        &mut self,
        parent: NodeId,
        buffer: &[u8],
        validator: Option<TagValidator<'_>>,
    ) -> Result<(), XmlError> {
        self.parse_with_flags(parent, buffer, validator, ParseFlags::empty())
    }

    /// [`DomTree::parse`] with explicit [`ParseFlags`]
    pub fn parse_with_flags(
        &mut self,
        parent: NodeId,
        buffer: &[u8],
        validator: Option<TagValidator<'_>>,
        flags: ParseFlags,
    ) -> Result<(), XmlError> {
        if self.get(parent).is_none() {
            return Err(XmlError::InvalidParent);
        }

        let buffer = match buffer.iter().position(|&b| b == 0) {
            Some(nul) => &buffer[..nul],
            None => buffer,
        };

        let tags = build_tags_list(buffer);
        log::trace!("xml: {} tags in {} bytes", tags.count(), buffer.len());

        let existing = self.children(parent).count();
        let mut builder = TreeBuilder {
            tree: self,
            buffer,
            validator,
            flags,
        };

        if let Err(err) = builder.build(parent, 0, buffer.len(), tags.first()) {
            let added: Vec<NodeId> = self.children(parent).skip(existing).collect();
            for id in added {
                self.delete_node(id);
            }
            return Err(err);
        }

        Ok(())
    }

    /// Parse `buffer` into a new document
    pub fn create_document_from_string(
        buffer: &[u8],
        validator: Option<TagValidator<'_>>,
    ) -> Result<DomTree, XmlError> {
        Self::create_document_with_flags(buffer, validator, ParseFlags::empty())
    }

    /// [`DomTree::create_document_from_string`] with explicit [`ParseFlags`]
    pub fn create_document_with_flags(
        buffer: &[u8],
        validator: Option<TagValidator<'_>>,
        flags: ParseFlags,
    ) -> Result<DomTree, XmlError> {
        let mut tree = DomTree::new();
        let document = tree.document();
        tree.parse_with_flags(document, buffer, validator, flags)?;
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::dom::DomNode;
    use alloc::vec;
    use pretty_assertions::assert_eq;

    fn node<'a>(tree: &'a DomTree, id: NodeId) -> &'a DomNode {
        tree.get(id).unwrap()
    }

    fn kids(tree: &DomTree, id: NodeId) -> Vec<NodeId> {
        tree.children(id).collect()
    }

    fn value(tree: &DomTree, id: NodeId) -> &[u8] {
        node(tree, id).value().unwrap()
    }

    #[test]
    fn test_basic_document() {
        let tree = DomTree::create_document_from_string(b"<A X=\"1\" Y=2 Z>text</A>", None)
            .unwrap();
        let doc = tree.document();

        let top = kids(&tree, doc);
        assert_eq!(top.len(), 1);
        let a = top[0];
        assert_eq!(tree.node_type(a), Some(NodeType::Element));
        assert_eq!(node(&tree, a).name(), Some(&b"A"[..]));
        assert_eq!(tree.parent(a), Some(doc));

        let attrs: Vec<(Option<&[u8]>, Option<&[u8]>)> = tree
            .attributes(a)
            .map(|id| (node(&tree, id).name(), node(&tree, id).value()))
            .collect();
        assert_eq!(
            attrs,
            vec![
                (Some(&b"X"[..]), Some(&b"1"[..])),
                (Some(&b"Y"[..]), Some(&b"2"[..])),
                (Some(&b"Z"[..]), None),
            ]
        );

        let body = kids(&tree, a);
        assert_eq!(body.len(), 1);
        assert_eq!(tree.node_type(body[0]), Some(NodeType::Text));
        assert_eq!(value(&tree, body[0]), b"text");
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_nesting_matches_input() {
        let tree = DomTree::create_document_from_string(b"<A><B>hi</B><C/></A>", None).unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 1);

        let a = kids(&tree, top[0]);
        assert_eq!(a.len(), 2);
        assert_eq!(node(&tree, a[0]).name(), Some(&b"B"[..]));
        assert_eq!(node(&tree, a[1]).name(), Some(&b"C"[..]));
        assert!(kids(&tree, a[1]).is_empty());

        let b = kids(&tree, a[0]);
        assert_eq!(b.len(), 1);
        assert_eq!(value(&tree, b[0]), b"hi");
    }

    #[test]
    fn test_element_without_closer() {
        let tree =
            DomTree::create_document_from_string(b"<IMG src=a.png>after<b>x</b>", None).unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 3);
        assert_eq!(node(&tree, top[0]).name(), Some(&b"IMG"[..]));
        assert!(kids(&tree, top[0]).is_empty());
        assert_eq!(value(&tree, top[1]), b"after");
        assert_eq!(tree.text_content(top[2]).as_bytes(), b"x");
    }

    #[test]
    fn test_unclosed_element_keeps_siblings() {
        let tree = DomTree::create_document_from_string(b"<A><B>hi</A>", None).unwrap();
        let a = tree.first_child(tree.document(), None).unwrap();

        let inside = kids(&tree, a);
        assert_eq!(inside.len(), 2);
        assert_eq!(node(&tree, inside[0]).name(), Some(&b"B"[..]));
        assert!(kids(&tree, inside[0]).is_empty());
        assert_eq!(tree.node_type(inside[1]), Some(NodeType::Text));
        assert_eq!(value(&tree, inside[1]), b"hi");
    }

    #[test]
    fn test_stray_closing_tag_fails() {
        let err = DomTree::create_document_from_string(b"text</A>", None).unwrap_err();
        assert_eq!(err, XmlError::UnmatchedClosingTag { offset: 4 });
        assert_eq!(err.offset(), Some(4));

        // A closer outside the enclosing element is out of scope
        let err = DomTree::create_document_from_string(b"<B><C></B></C>", None).unwrap_err();
        assert_eq!(err, XmlError::UnmatchedClosingTag { offset: 10 });
    }

    #[test]
    fn test_failed_parse_leaves_parent_unchanged() {
        let mut tree = DomTree::create_document_from_string(b"<keep/>", None).unwrap();
        let doc = tree.document();
        let before = tree.len();

        let result = tree.parse(doc, b"<x>a</x><y><z/></q>", None);
        assert_eq!(result, Err(XmlError::UnmatchedClosingTag { offset: 15 }));
        assert_eq!(tree.len(), before);
        assert_eq!(kids(&tree, doc).len(), 1);
    }

    #[test]
    fn test_invalid_parent() {
        let mut tree = DomTree::new();
        assert_eq!(
            tree.parse(NodeId { index: 9, generation: 0 }, b"<a/>", None),
            Err(XmlError::InvalidParent)
        );
    }

    #[test]
    fn test_text_is_verbatim() {
        let tree =
            DomTree::create_document_from_string(b"  lead <p> a &amp; b </p>\r\n", None).unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 3);
        assert_eq!(value(&tree, top[0]), b"  lead ");
        assert_eq!(value(&tree, kids(&tree, top[1])[0]), b" a &amp; b ");
        assert_eq!(value(&tree, top[2]), b"\r\n");
    }

    #[test]
    fn test_drop_whitespace() {
        let tree = DomTree::create_document_with_flags(
            b"<r>\n  <a>1</a>\n  <b> </b>\n</r>",
            None,
            ParseFlags::DROP_WHITESPACE,
        )
        .unwrap();
        let r = tree.first_child(tree.document(), None).unwrap();
        let inside = kids(&tree, r);
        assert_eq!(inside.len(), 2);
        assert!(kids(&tree, inside[1]).is_empty());
        assert_eq!(tree.text_content(r).as_bytes(), b"1");
    }

    #[test]
    fn test_comments() {
        let input = b"<a><!-- note --><b/></a><!-- open";
        let tree = DomTree::create_document_from_string(input, None).unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 2);
        assert_eq!(tree.node_type(top[1]), Some(NodeType::Comment));
        assert_eq!(value(&tree, top[1]), b" open");

        let comment = tree.first_child(top[0], None).unwrap();
        assert_eq!(tree.node_type(comment), Some(NodeType::Comment));
        assert_eq!(value(&tree, comment), b" note ");

        let tree =
            DomTree::create_document_with_flags(input, None, ParseFlags::SKIP_COMMENTS).unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 1);
        assert_eq!(kids(&tree, top[0]).len(), 1);
    }

    #[test]
    fn test_validator_copy_as_text() {
        let raw = |name: &[u8]| {
            if name.eq_ignore_ascii_case(b"pre") {
                TagHandling::CopyAsText
            } else {
                TagHandling::BreakUp
            }
        };
        let tree = DomTree::create_document_from_string(
            b"<body><PRE><b>bold</b> x</PRE><i>it</i></body>",
            Some(&raw),
        )
        .unwrap();

        let body = tree.first_child(tree.document(), None).unwrap();
        let inside = kids(&tree, body);
        assert_eq!(inside.len(), 2);

        let pre = kids(&tree, inside[0]);
        assert_eq!(pre.len(), 1);
        assert_eq!(value(&tree, pre[0]), b"<b>bold</b> x");

        let italic = kids(&tree, inside[1]);
        assert_eq!(value(&tree, italic[0]), b"it");
    }

    #[test]
    fn test_first_closer_wins() {
        // The outer <p> takes the first </p>; the inner one stays childless
        let tree = DomTree::create_document_from_string(b"<p>a<p>b</p>", None).unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 1);

        let inside = kids(&tree, top[0]);
        assert_eq!(inside.len(), 3);
        assert_eq!(value(&tree, inside[0]), b"a");
        assert_eq!(node(&tree, inside[1]).name(), Some(&b"p"[..]));
        assert!(kids(&tree, inside[1]).is_empty());
        assert_eq!(value(&tree, inside[2]), b"b");
        assert_eq!(tree.elements_by_tag_name(tree.document(), b"p").len(), 2);
    }

    #[test]
    fn test_nested_same_name_leaves_stray_closer() {
        let err = DomTree::create_document_from_string(b"<d><d>in</d>out</d>", None).unwrap_err();
        assert_eq!(err, XmlError::UnmatchedClosingTag { offset: 15 });
    }

    #[test]
    fn test_attribute_forms() {
        let tree = DomTree::create_document_from_string(
            b"<img src='a b.png' alt = \"x\" width=10/><br />",
            None,
        )
        .unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 2);

        let img = top[0];
        assert_eq!(tree.attribute_value(img, b"src"), Some(&b"a b.png"[..]));
        assert_eq!(tree.attribute_value(img, b"alt"), Some(&b"x"[..]));
        assert_eq!(tree.attribute_value(img, b"width"), Some(&b"10"[..]));
        assert_eq!(tree.attributes(top[1]).count(), 0);
    }

    #[test]
    fn test_stray_markup_is_tolerated() {
        let tree = DomTree::create_document_from_string(b"a < b <i>c</i> <tail", None).unwrap();
        let top = kids(&tree, tree.document());
        assert_eq!(top.len(), 3);
        assert_eq!(value(&tree, top[0]), b"a < b ");
        assert_eq!(node(&tree, top[1]).name(), Some(&b"i"[..]));
        assert_eq!(value(&tree, top[2]), b" <tail");
    }

    #[test]
    fn test_nul_ends_input() {
        let tree = DomTree::create_document_from_string(b"<a>x</a>\0</b>", None).unwrap();
        assert_eq!(kids(&tree, tree.document()).len(), 1);
    }

    #[test]
    fn test_parse_into_element() {
        let mut tree = DomTree::new();
        let doc = tree.document();
        let host = tree
            .create_node(Some(doc), NodeType::Element, Some(b"host"), None)
            .unwrap();

        tree.parse(host, b"<x/>y", None).unwrap();
        let inside = kids(&tree, host);
        assert_eq!(inside.len(), 2);
        assert_eq!(tree.parent(inside[0]), Some(host));
    }
}
