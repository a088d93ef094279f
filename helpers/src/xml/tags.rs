//! Tag scanner
//!
//! First pass over a markup buffer. Records where every tag and comment sits
//! without interpreting nesting; the tree builder walks the resulting list.

use crate::linklist::{ItemOwnership, LinkedList};

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";

/// Position of one tag or comment in the scanned buffer
///
/// For comments `start_of_name..first_after_name` is the comment body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagFound {
    pub is_comment: bool,
    /// Tag ends in `/>`
    pub is_empty_element: bool,
    pub open_bracket: usize,
    pub start_of_name: usize,
    pub first_after_name: usize,
    pub close_bracket: usize,
}

impl TagFound {
    /// Tag name, including the leading `/` of closing tags
    pub fn name<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.start_of_name..self.first_after_name]
    }

    /// Text between the name and `>`, without the `/` of an empty element
    pub fn attribute_text<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        let end = if self.is_empty_element {
            self.close_bracket - 1
        } else {
            self.close_bracket
        };
        if self.is_comment || end <= self.first_after_name {
            return &[];
        }
        &buffer[self.first_after_name..end]
    }

    /// Check for a `</name>` tag
    pub fn is_closing(&self, buffer: &[u8]) -> bool {
        !self.is_comment && self.name(buffer).first() == Some(&b'/')
    }

    /// First byte after the tag
    pub fn end(&self, buffer_len: usize) -> usize {
        (self.close_bracket + 1).min(buffer_len)
    }
}

fn find_byte(buffer: &[u8], from: usize, byte: u8) -> Option<usize> {
    buffer
        .get(from..)?
        .iter()
        .position(|&b| b == byte)
        .map(|p| p + from)
}

fn find_seq(buffer: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn skip_whitespace(buffer: &[u8], mut pos: usize) -> usize {
    while pos < buffer.len() && buffer[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Scan `buffer` for tags and comments
///
/// Scanning never fails: a `<` without a later `>` ends the scan, an
/// unterminated comment runs to the end of the buffer, and a `<` found
/// before the current tag's `>` restarts the tag there.
pub fn build_tags_list(buffer: &[u8]) -> LinkedList<TagFound> {
    let mut tags = LinkedList::new(ItemOwnership::Owned);
    let mut pos = 0;

    while let Some(open) = find_byte(buffer, pos, b'<') {
        if buffer[open..].starts_with(COMMENT_OPEN) {
            let body = open + COMMENT_OPEN.len();
            match find_seq(buffer, body, COMMENT_CLOSE) {
                Some(end) => {
                    tags.append(TagFound {
                        is_comment: true,
                        is_empty_element: false,
                        open_bracket: open,
                        start_of_name: body,
                        first_after_name: end,
                        close_bracket: end + COMMENT_CLOSE.len() - 1,
                    });
                    pos = end + COMMENT_CLOSE.len();
                    continue;
                }
                None => {
                    log::trace!("xml: comment at {} runs to end of input", open);
                    tags.append(TagFound {
                        is_comment: true,
                        is_empty_element: false,
                        open_bracket: open,
                        start_of_name: body,
                        first_after_name: buffer.len(),
                        close_bracket: buffer.len(),
                    });
                    break;
                }
            }
        }

        let Some(close) = find_byte(buffer, open + 1, b'>') else {
            log::trace!("xml: unterminated tag at {}", open);
            break;
        };

        if let Some(reopen) = find_byte(buffer, open + 1, b'<') {
            if reopen < close {
                log::trace!("xml: stray '<' at {}, resyncing at {}", open, reopen);
                pos = reopen;
                continue;
            }
        }

        let start_of_name = skip_whitespace(buffer, open + 1);
        let mut first_after_name = start_of_name;
        while first_after_name < close {
            let b = buffer[first_after_name];
            if b.is_ascii_whitespace()
                || (b == b'/' && first_after_name + 1 == close && first_after_name > start_of_name)
            {
                break;
            }
            first_after_name += 1;
        }

        if first_after_name == start_of_name {
            // "<>" and "< >" are left as text
            pos = close + 1;
            continue;
        }

        let is_empty_element = buffer[start_of_name] != b'/'
            && close - 1 > start_of_name
            && buffer[close - 1] == b'/';

        tags.append(TagFound {
            is_comment: false,
            is_empty_element,
            open_bracket: open,
            start_of_name,
            first_after_name,
            close_bracket: close,
        });
        pos = close + 1;
    }

    tags
}
