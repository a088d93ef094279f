//! Red-Black Tree Implementation
//!
//! Intrusive balanced binary search tree used for sorted lookups:
//! - Object lists keyed by an integer ID (handles, indices)
//! - Records sorted by composite criteria through a comparator
//!
//! # Properties
//!
//! - O(log n) insert, delete, lookup
//! - Root is black, no red node has a red parent
//! - Every path from a node to a leaf crosses the same number of black nodes
//!
//! # Intrusive Design
//!
//! The links live inside the caller's structure; the tree never allocates or
//! frees node memory, it only rewires links and recolours. The tree finds the
//! enclosing structure from the byte offset of the embedded [`RbLinks`].
//!
//! A null link is the leaf sentinel and always counts as black.
//!
//! ```ignore
//! struct Entry {
//!     links: RbLinks,
//!     name: &'static str,
//! }
//!
//! let mut tree: RbTree<Entry> = RbTree::new(core::mem::offset_of!(Entry, links));
//! let mut entry = Entry { links: RbLinks::with_key(42), name: "answer" };
//! unsafe { tree.insert_by_key(&mut entry, false)? };
//! assert!(!tree.find_exact_by_key(42).is_null());
//! ```

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::marker::PhantomData;
use core::ptr;

use crate::error::RbError;

/// Node colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RbColour {
    /// Red node (never the parent of another red node)
    Red = 0,
    /// Black node (null leaves are black too)
    Black = 1,
}

/// Red-black tree node links
///
/// This is embedded in data structures that participate in a tree.
#[repr(C)]
#[derive(Debug)]
pub struct RbLinks {
    /// Parent node (null for root)
    pub(crate) parent: *mut RbLinks,
    /// Left child (smaller keys)
    pub(crate) left: *mut RbLinks,
    /// Right child (larger keys)
    pub(crate) right: *mut RbLinks,
    /// Node colour
    pub(crate) colour: RbColour,
    /// Integer key used by the `*_by_key` operations
    pub key: usize,
}

impl RbLinks {
    /// Create new unlinked links with a zero key
    pub const fn new() -> Self {
        Self::with_key(0)
    }

    /// Create new unlinked links for a keyed tree
    pub const fn with_key(key: usize) -> Self {
        Self {
            parent: ptr::null_mut(),
            left: ptr::null_mut(),
            right: ptr::null_mut(),
            colour: RbColour::Red,
            key,
        }
    }

    /// Reset the links, keeping the key
    pub fn init(&mut self) {
        self.parent = ptr::null_mut();
        self.left = ptr::null_mut();
        self.right = ptr::null_mut();
        self.colour = RbColour::Red;
    }

    /// Current colour
    #[inline]
    pub fn colour(&self) -> RbColour {
        self.colour
    }

    /// Check if this node is the left child of its parent
    #[inline]
    pub fn is_left_child(&self) -> bool {
        if self.parent.is_null() {
            return false;
        }
        unsafe { ptr::eq((*self.parent).left, self) }
    }

    /// Check if this node is the right child of its parent
    #[inline]
    pub fn is_right_child(&self) -> bool {
        if self.parent.is_null() {
            return false;
        }
        unsafe { ptr::eq((*self.parent).right, self) }
    }

    /// Get the minimum node in subtree rooted at this node
    pub fn minimum(&self) -> *mut RbLinks {
        let mut current = self as *const _ as *mut RbLinks;
        unsafe {
            while !(*current).left.is_null() {
                current = (*current).left;
            }
        }
        current
    }

    /// Get the maximum node in subtree rooted at this node
    pub fn maximum(&self) -> *mut RbLinks {
        let mut current = self as *const _ as *mut RbLinks;
        unsafe {
            while !(*current).right.is_null() {
                current = (*current).right;
            }
        }
        current
    }

    /// Get the in-order successor
    pub fn successor(&self) -> *mut RbLinks {
        if !self.right.is_null() {
            return unsafe { (*self.right).minimum() };
        }

        // Walk up while we are a right child
        let mut current = self as *const _ as *mut RbLinks;
        let mut parent = self.parent;

        unsafe {
            while !parent.is_null() && current == (*parent).right {
                current = parent;
                parent = (*parent).parent;
            }
        }

        parent
    }

    /// Get the in-order predecessor
    pub fn predecessor(&self) -> *mut RbLinks {
        if !self.left.is_null() {
            return unsafe { (*self.left).maximum() };
        }

        // Walk up while we are a left child
        let mut current = self as *const _ as *mut RbLinks;
        let mut parent = self.parent;

        unsafe {
            while !parent.is_null() && current == (*parent).left {
                current = parent;
                parent = (*parent).parent;
            }
        }

        parent
    }
}

impl Default for RbLinks {
    fn default() -> Self {
        Self::new()
    }
}

/// Colour of a link, with null leaves counting as black
#[inline]
unsafe fn colour_of(node: *mut RbLinks) -> RbColour {
    if node.is_null() {
        RbColour::Black
    } else {
        (*node).colour
    }
}

#[inline]
unsafe fn is_red(node: *mut RbLinks) -> bool {
    colour_of(node) == RbColour::Red
}

/// Comparison function type for comparator-driven operations
pub type RbCompare<T> = fn(&T, &T) -> Ordering;

/// Relation requested from a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbRelation {
    /// Equal key (left-most match when duplicates exist)
    Exact,
    /// Largest key strictly below the probe
    LessThan,
    /// Largest key at or below the probe
    LessOrEqual,
    /// Smallest key strictly above the probe
    GreaterThan,
    /// Smallest key at or above the probe
    GreaterOrEqual,
}

/// Walk order for [`RbTree::traverse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RbTraversal {
    /// Node, then left subtree, then right subtree
    PreOrder,
    /// Left subtree, node, right subtree (sorted order)
    InOrder,
    /// Left subtree, right subtree, then node
    PostOrder,
}

/// Red-black tree over intrusive nodes
pub struct RbTree<T> {
    /// Root node of the tree (null when empty)
    root: *mut RbLinks,
    /// Number of elements in the tree
    count: usize,
    /// Offset of RbLinks within T
    links_offset: usize,
    _marker: PhantomData<*mut T>,
}

impl<T> RbTree<T> {
    /// Create a new empty tree
    ///
    /// # Arguments
    /// * `links_offset` - Byte offset of the RbLinks field within T
    pub const fn new(links_offset: usize) -> Self {
        Self {
            root: ptr::null_mut(),
            count: 0,
            links_offset,
            _marker: PhantomData,
        }
    }

    /// Forget all nodes and start over with an empty tree
    ///
    /// The nodes themselves are not touched.
    pub fn init(&mut self) {
        self.root = ptr::null_mut();
        self.count = 0;
    }

    /// Check if the tree is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Get the number of elements
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Get the root element, or null if the tree is empty
    pub fn root(&self) -> *mut T {
        if self.root.is_null() {
            return ptr::null_mut();
        }
        unsafe { self.element_from_links(self.root) }
    }

    /// Get a reference to the element containing the given links
    unsafe fn element_from_links(&self, links: *mut RbLinks) -> *mut T {
        (links as *mut u8).sub(self.links_offset) as *mut T
    }

    /// Get the links from an element
    unsafe fn links_from_element(&self, element: *mut T) -> *mut RbLinks {
        (element as *mut u8).add(self.links_offset) as *mut RbLinks
    }

    /// Insert an element ordered by the key stored in its links
    ///
    /// With `allow_duplicates`, an equal key is placed in the left subtree of
    /// the existing entry. Without it the insert is rejected and the tree is
    /// left untouched.
    ///
    /// # Safety
    /// `element` must be valid, not linked into any tree, and must outlive
    /// its membership in this tree without moving.
    pub unsafe fn insert_by_key(
        &mut self,
        element: *mut T,
        allow_duplicates: bool,
    ) -> Result<(), RbError> {
        if element.is_null() {
            return Err(RbError::InvalidNode);
        }

        let key = (*self.links_from_element(element)).key;
        self.insert_with(element, allow_duplicates, |current| unsafe {
            key.cmp(&(*current).key)
        })
    }

    /// Insert an element ordered by a comparator
    ///
    /// # Safety
    /// Same requirements as [`RbTree::insert_by_key`].
    pub unsafe fn insert(
        &mut self,
        element: *mut T,
        compare: RbCompare<T>,
        allow_duplicates: bool,
    ) -> Result<(), RbError> {
        if element.is_null() {
            return Err(RbError::InvalidNode);
        }

        let offset = self.links_offset;
        self.insert_with(element, allow_duplicates, |current| unsafe {
            let other = (current as *mut u8).sub(offset) as *const T;
            compare(&*element, &*other)
        })
    }

    /// Shared insert descent
    ///
    /// `compare` orders the new element against the node it is handed.
    unsafe fn insert_with<F>(
        &mut self,
        element: *mut T,
        allow_duplicates: bool,
        compare: F,
    ) -> Result<(), RbError>
    where
        F: Fn(*mut RbLinks) -> Ordering,
    {
        let mut current = self.root;
        let mut parent = ptr::null_mut();
        let mut is_left = false;

        while !current.is_null() {
            parent = current;

            match compare(current) {
                Ordering::Less => {
                    current = (*current).left;
                    is_left = true;
                }
                Ordering::Greater => {
                    current = (*current).right;
                    is_left = false;
                }
                Ordering::Equal => {
                    if !allow_duplicates {
                        log::trace!("rbtree: duplicate insert rejected");
                        return Err(RbError::Duplicate);
                    }
                    current = (*current).left;
                    is_left = true;
                }
            }
        }

        let new_links = self.links_from_element(element);
        (*new_links).init();
        (*new_links).parent = parent;

        if parent.is_null() {
            self.root = new_links;
        } else if is_left {
            (*parent).left = new_links;
        } else {
            (*parent).right = new_links;
        }

        self.count += 1;
        self.rebalance_after_insert(new_links);

        Ok(())
    }

    /// Remove an element from the tree
    ///
    /// Returns `InvalidNode` for a null element or one that is not linked into
    /// a tree; the tree is not modified in that case.
    ///
    /// # Safety
    /// `element` must be valid and, if linked, linked into this tree.
    pub unsafe fn delete(&mut self, element: *mut T) -> Result<(), RbError> {
        if element.is_null() || self.root.is_null() {
            return Err(RbError::InvalidNode);
        }

        let links = self.links_from_element(element);
        if links != self.root && (*links).parent.is_null() {
            return Err(RbError::InvalidNode);
        }

        self.remove_node(links);
        self.count -= 1;
        Ok(())
    }

    /// Internal: splice a node out of the tree
    unsafe fn remove_node(&mut self, node: *mut RbLinks) {
        let mut removed_colour = (*node).colour;
        let child;
        let child_parent;

        if (*node).left.is_null() {
            child = (*node).right;
            child_parent = (*node).parent;
            self.transplant(node, child);
        } else if (*node).right.is_null() {
            child = (*node).left;
            child_parent = (*node).parent;
            self.transplant(node, child);
        } else {
            // Two children: the successor takes the node's place
            let successor = (*(*node).right).minimum();
            removed_colour = (*successor).colour;
            child = (*successor).right;

            if (*successor).parent == node {
                child_parent = successor;
            } else {
                child_parent = (*successor).parent;
                self.transplant(successor, child);
                (*successor).right = (*node).right;
                (*(*successor).right).parent = successor;
            }

            self.transplant(node, successor);
            (*successor).left = (*node).left;
            (*(*successor).left).parent = successor;
            (*successor).colour = (*node).colour;
        }

        if removed_colour == RbColour::Black {
            self.rebalance_after_delete(child, child_parent);
        }

        (*node).init();
    }

    /// Replace a child pointer in the parent
    unsafe fn replace_child(&mut self, parent: *mut RbLinks, old: *mut RbLinks, new: *mut RbLinks) {
        if parent.is_null() {
            self.root = new;
        } else if (*parent).left == old {
            (*parent).left = new;
        } else {
            (*parent).right = new;
        }
    }

    /// Put `new` where `old` hangs in the tree
    unsafe fn transplant(&mut self, old: *mut RbLinks, new: *mut RbLinks) {
        let parent = (*old).parent;
        self.replace_child(parent, old, new);
        if !new.is_null() {
            (*new).parent = parent;
        }
    }

    /// Restore the colour rules after linking a red leaf
    unsafe fn rebalance_after_insert(&mut self, mut node: *mut RbLinks) {
        loop {
            let mut parent = (*node).parent;
            if !is_red(parent) {
                break;
            }

            // A red parent is never the root, so the grandparent exists
            let grandparent = (*parent).parent;

            if parent == (*grandparent).left {
                let uncle = (*grandparent).right;
                if is_red(uncle) {
                    (*parent).colour = RbColour::Black;
                    (*uncle).colour = RbColour::Black;
                    (*grandparent).colour = RbColour::Red;
                    node = grandparent;
                    continue;
                }

                if node == (*parent).right {
                    node = parent;
                    self.rotate_left(node);
                    parent = (*node).parent;
                }

                (*parent).colour = RbColour::Black;
                (*grandparent).colour = RbColour::Red;
                self.rotate_right(grandparent);
            } else {
                let uncle = (*grandparent).left;
                if is_red(uncle) {
                    (*parent).colour = RbColour::Black;
                    (*uncle).colour = RbColour::Black;
                    (*grandparent).colour = RbColour::Red;
                    node = grandparent;
                    continue;
                }

                if node == (*parent).left {
                    node = parent;
                    self.rotate_right(node);
                    parent = (*node).parent;
                }

                (*parent).colour = RbColour::Black;
                (*grandparent).colour = RbColour::Red;
                self.rotate_left(grandparent);
            }
        }

        (*self.root).colour = RbColour::Black;
    }

    /// Restore the black height after removing a black node
    ///
    /// `node` may be null; `parent` is its parent in that case.
    unsafe fn rebalance_after_delete(&mut self, mut node: *mut RbLinks, mut parent: *mut RbLinks) {
        while node != self.root && !is_red(node) {
            if node == (*parent).left {
                let mut sibling = (*parent).right;

                if is_red(sibling) {
                    (*sibling).colour = RbColour::Black;
                    (*parent).colour = RbColour::Red;
                    self.rotate_left(parent);
                    sibling = (*parent).right;
                }

                if !is_red((*sibling).left) && !is_red((*sibling).right) {
                    (*sibling).colour = RbColour::Red;
                    node = parent;
                    parent = (*node).parent;
                } else {
                    if !is_red((*sibling).right) {
                        (*(*sibling).left).colour = RbColour::Black;
                        (*sibling).colour = RbColour::Red;
                        self.rotate_right(sibling);
                        sibling = (*parent).right;
                    }

                    (*sibling).colour = (*parent).colour;
                    (*parent).colour = RbColour::Black;
                    (*(*sibling).right).colour = RbColour::Black;
                    self.rotate_left(parent);
                    node = self.root;
                    break;
                }
            } else {
                let mut sibling = (*parent).left;

                if is_red(sibling) {
                    (*sibling).colour = RbColour::Black;
                    (*parent).colour = RbColour::Red;
                    self.rotate_right(parent);
                    sibling = (*parent).left;
                }

                if !is_red((*sibling).left) && !is_red((*sibling).right) {
                    (*sibling).colour = RbColour::Red;
                    node = parent;
                    parent = (*node).parent;
                } else {
                    if !is_red((*sibling).left) {
                        (*(*sibling).right).colour = RbColour::Black;
                        (*sibling).colour = RbColour::Red;
                        self.rotate_left(sibling);
                        sibling = (*parent).left;
                    }

                    (*sibling).colour = (*parent).colour;
                    (*parent).colour = RbColour::Black;
                    (*(*sibling).left).colour = RbColour::Black;
                    self.rotate_right(parent);
                    node = self.root;
                    break;
                }
            }
        }

        if !node.is_null() {
            (*node).colour = RbColour::Black;
        }
    }

    /// Single left rotation
    unsafe fn rotate_left(&mut self, node: *mut RbLinks) {
        let right = (*node).right;
        let parent = (*node).parent;

        (*node).right = (*right).left;
        if !(*right).left.is_null() {
            (*(*right).left).parent = node;
        }

        (*right).parent = parent;
        self.replace_child(parent, node, right);

        (*right).left = node;
        (*node).parent = right;
    }

    /// Single right rotation
    unsafe fn rotate_right(&mut self, node: *mut RbLinks) {
        let left = (*node).left;
        let parent = (*node).parent;

        (*node).left = (*left).right;
        if !(*left).right.is_null() {
            (*(*left).right).parent = node;
        }

        (*left).parent = parent;
        self.replace_child(parent, node, left);

        (*left).right = node;
        (*node).parent = left;
    }

    /// Single descent tracking the best candidate for `relation`
    ///
    /// `probe` orders the wanted key against the node it is handed.
    fn search<F>(&self, relation: RbRelation, probe: F) -> *mut T
    where
        F: Fn(*mut RbLinks) -> Ordering,
    {
        let mut current = self.root;
        let mut best = ptr::null_mut();

        while !current.is_null() {
            let ordering = probe(current);

            let (candidate, go_left) = match relation {
                RbRelation::Exact => (ordering == Ordering::Equal, ordering != Ordering::Greater),
                RbRelation::LessThan => (ordering == Ordering::Greater, ordering != Ordering::Greater),
                RbRelation::LessOrEqual => (ordering != Ordering::Less, ordering == Ordering::Less),
                RbRelation::GreaterThan => (ordering == Ordering::Less, ordering == Ordering::Less),
                RbRelation::GreaterOrEqual => (ordering != Ordering::Greater, ordering != Ordering::Greater),
            };

            if candidate {
                best = current;
            }

            current = unsafe {
                if go_left {
                    (*current).left
                } else {
                    (*current).right
                }
            };
        }

        if best.is_null() {
            ptr::null_mut()
        } else {
            unsafe { self.element_from_links(best) }
        }
    }

    /// Find by integer key
    pub fn find_by_key(&self, key: usize, relation: RbRelation) -> *mut T {
        self.search(relation, |current| unsafe { key.cmp(&(*current).key) })
    }

    /// Find by comparator against a probe element
    pub fn find(&self, probe: &T, compare: RbCompare<T>, relation: RbRelation) -> *mut T {
        self.search(relation, |current| unsafe {
            compare(probe, &*self.element_from_links(current))
        })
    }

    /// Find the left-most element with the given key
    pub fn find_exact_by_key(&self, key: usize) -> *mut T {
        self.find_by_key(key, RbRelation::Exact)
    }

    /// Find the smallest element whose key is at least `key`
    pub fn find_greater_or_equal_by_key(&self, key: usize) -> *mut T {
        self.find_by_key(key, RbRelation::GreaterOrEqual)
    }

    /// Find the left-most element comparing equal to `probe`
    pub fn find_exact(&self, probe: &T, compare: RbCompare<T>) -> *mut T {
        self.find(probe, compare, RbRelation::Exact)
    }

    pub fn find_less_than(&self, probe: &T, compare: RbCompare<T>) -> *mut T {
        self.find(probe, compare, RbRelation::LessThan)
    }

    pub fn find_less_or_equal(&self, probe: &T, compare: RbCompare<T>) -> *mut T {
        self.find(probe, compare, RbRelation::LessOrEqual)
    }

    pub fn find_greater_than(&self, probe: &T, compare: RbCompare<T>) -> *mut T {
        self.find(probe, compare, RbRelation::GreaterThan)
    }

    pub fn find_greater_or_equal(&self, probe: &T, compare: RbCompare<T>) -> *mut T {
        self.find(probe, compare, RbRelation::GreaterOrEqual)
    }

    /// Visit every element recursively
    ///
    /// Stack depth grows with the tree height; prefer [`RbTree::first`] and
    /// [`RbTree::next`] for very large trees. The callback must not insert
    /// into or delete from this tree.
    pub fn traverse<F>(&self, order: RbTraversal, mut visit: F)
    where
        F: FnMut(*mut T),
    {
        unsafe { self.traverse_node(self.root, order, &mut visit) }
    }

    unsafe fn traverse_node<F>(&self, node: *mut RbLinks, order: RbTraversal, visit: &mut F)
    where
        F: FnMut(*mut T),
    {
        if node.is_null() {
            return;
        }

        let left = (*node).left;
        let right = (*node).right;

        match order {
            RbTraversal::PreOrder => {
                visit(self.element_from_links(node));
                self.traverse_node(left, order, visit);
                self.traverse_node(right, order, visit);
            }
            RbTraversal::InOrder => {
                self.traverse_node(left, order, visit);
                visit(self.element_from_links(node));
                self.traverse_node(right, order, visit);
            }
            RbTraversal::PostOrder => {
                self.traverse_node(left, order, visit);
                self.traverse_node(right, order, visit);
                visit(self.element_from_links(node));
            }
        }
    }

    /// Get the first (minimum) element
    pub fn first(&self) -> *mut T {
        if self.root.is_null() {
            return ptr::null_mut();
        }

        unsafe {
            let min = (*self.root).minimum();
            self.element_from_links(min)
        }
    }

    /// Get the last (maximum) element
    pub fn last(&self) -> *mut T {
        if self.root.is_null() {
            return ptr::null_mut();
        }

        unsafe {
            let max = (*self.root).maximum();
            self.element_from_links(max)
        }
    }

    /// Get the next element after the given one
    ///
    /// # Safety
    /// `element` must be null or linked into this tree.
    pub unsafe fn next(&self, element: *mut T) -> *mut T {
        if element.is_null() {
            return ptr::null_mut();
        }

        let successor = (*self.links_from_element(element)).successor();
        if successor.is_null() {
            ptr::null_mut()
        } else {
            self.element_from_links(successor)
        }
    }

    /// Get the previous element before the given one
    ///
    /// # Safety
    /// `element` must be null or linked into this tree.
    pub unsafe fn prev(&self, element: *mut T) -> *mut T {
        if element.is_null() {
            return ptr::null_mut();
        }

        let predecessor = (*self.links_from_element(element)).predecessor();
        if predecessor.is_null() {
            ptr::null_mut()
        } else {
            self.element_from_links(predecessor)
        }
    }

    /// Snapshot up to `expected_count` elements in sorted order
    ///
    /// The length of the returned vector is the number actually collected,
    /// which is smaller than `expected_count` if the caller's count is stale.
    /// Returns `None` only if the array could not be allocated.
    pub fn build_sorted_array(&self, expected_count: usize) -> Option<Vec<*mut T>> {
        let mut array = Vec::new();
        if array.try_reserve_exact(expected_count).is_err() {
            log::debug!("rbtree: cannot allocate array for {} entries", expected_count);
            return None;
        }

        let mut current = if self.root.is_null() {
            ptr::null_mut()
        } else {
            unsafe { (*self.root).minimum() }
        };

        while !current.is_null() && array.len() < expected_count {
            unsafe {
                array.push(self.element_from_links(current));
                current = (*current).successor();
            }
        }

        Some(array)
    }

    /// Iterate over the elements in sorted order
    pub fn iter(&self) -> RbIter<'_, T> {
        let next = if self.root.is_null() {
            ptr::null_mut()
        } else {
            unsafe { (*self.root).minimum() }
        };
        RbIter { tree: self, next }
    }
}

/// In-order iterator produced by [`RbTree::iter`]
pub struct RbIter<'a, T> {
    tree: &'a RbTree<T>,
    next: *mut RbLinks,
}

impl<T> Iterator for RbIter<'_, T> {
    type Item = *mut T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_null() {
            return None;
        }

        unsafe {
            let current = self.next;
            self.next = (*current).successor();
            Some(self.tree.element_from_links(current))
        }
    }
}
