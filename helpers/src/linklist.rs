//! Doubly-linked list
//!
//! Ordered sequence container with O(1) append at the tail. Each node owns its
//! links and holds one item. Whether the list also owns the items is decided
//! when the list is created and never changes:
//!
//! - [`ItemOwnership::Owned`]: removing or clearing a node drops its item
//! - [`ItemOwnership::Borrowed`]: the list only manages node memory and never
//!   drops an item payload; whoever handed the items in stays responsible
//!
//! # Invariants
//!
//! - `head` is `None` exactly when `tail` is `None` and `count` is zero
//! - Walking `next` from `head` visits `count` nodes and ends at `tail`

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

/// Who is responsible for the item payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOwnership {
    /// The list drops items when their nodes go away
    Owned,
    /// The list never drops items
    ///
    /// Meant for `Copy` or handle payloads (ids, indices, references) whose
    /// owner lives elsewhere. An item that owns heap memory is leaked when
    /// its node goes away through `clear`, `remove_item` or drop; take it
    /// back with `remove_at` to keep it.
    Borrowed,
}

type Link<T> = Option<NonNull<ListNode<T>>>;

/// List node
pub struct ListNode<T> {
    /// Dropped explicitly, depending on the list's ownership mode
    item: ManuallyDrop<T>,
    next: Link<T>,
    prev: Link<T>,
}

impl<T> ListNode<T> {
    /// The item stored in this node
    #[inline]
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Mutable access to the item
    #[inline]
    pub fn item_mut(&mut self) -> &mut T {
        &mut self.item
    }

    /// Following node, if any
    #[inline]
    pub fn next(&self) -> Option<&ListNode<T>> {
        self.next.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Preceding node, if any
    #[inline]
    pub fn prev(&self) -> Option<&ListNode<T>> {
        self.prev.map(|p| unsafe { &*p.as_ptr() })
    }
}

/// Doubly-linked list
pub struct LinkedList<T> {
    head: Link<T>,
    tail: Link<T>,
    count: usize,
    ownership: ItemOwnership,
    _marker: PhantomData<Box<ListNode<T>>>,
}

unsafe impl<T: Send> Send for LinkedList<T> {}
unsafe impl<T: Sync> Sync for LinkedList<T> {}

impl<T> LinkedList<T> {
    /// Create an empty list
    pub const fn new(ownership: ItemOwnership) -> Self {
        Self {
            head: None,
            tail: None,
            count: 0,
            ownership,
            _marker: PhantomData,
        }
    }

    /// Ownership mode chosen at creation
    #[inline]
    pub fn ownership(&self) -> ItemOwnership {
        self.ownership
    }

    /// Check if the list drops its items
    #[inline]
    pub fn items_owned(&self) -> bool {
        self.ownership == ItemOwnership::Owned
    }

    /// Number of nodes
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Check if the list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First node
    pub fn first(&self) -> Option<&ListNode<T>> {
        self.head.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Last node
    pub fn last(&self) -> Option<&ListNode<T>> {
        self.tail.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Append an item at the tail
    pub fn append(&mut self, item: T) -> &mut ListNode<T> {
        let node = Box::new(ListNode {
            item: ManuallyDrop::new(item),
            next: None,
            prev: self.tail,
        });
        let ptr = NonNull::from(Box::leak(node));

        match self.tail {
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(ptr) },
            None => self.head = Some(ptr),
        }
        self.tail = Some(ptr);
        self.count += 1;

        unsafe { &mut *ptr.as_ptr() }
    }

    /// Insert an item so that it ends up at position `index`
    ///
    /// `index == count` appends. Returns `None` (and hands nothing back) if
    /// `index` is past the end; the item is released per the ownership mode.
    pub fn insert_at(&mut self, index: usize, item: T) -> Option<&mut ListNode<T>> {
        if index == self.count {
            return Some(self.append(item));
        }

        let Some(before) = self.link_at(index) else {
            let mut item = ManuallyDrop::new(item);
            if self.items_owned() {
                unsafe { ManuallyDrop::drop(&mut item) };
            }
            return None;
        };

        unsafe {
            let prev = (*before.as_ptr()).prev;
            let node = Box::new(ListNode {
                item: ManuallyDrop::new(item),
                next: Some(before),
                prev,
            });
            let ptr = NonNull::from(Box::leak(node));

            (*before.as_ptr()).prev = Some(ptr);
            match prev {
                Some(prev) => (*prev.as_ptr()).next = Some(ptr),
                None => self.head = Some(ptr),
            }
            self.count += 1;

            Some(&mut *ptr.as_ptr())
        }
    }

    fn link_at(&self, index: usize) -> Link<T> {
        if index >= self.count {
            return None;
        }

        let mut current = self.head;
        for _ in 0..index {
            current = current.and_then(|p| unsafe { (*p.as_ptr()).next });
        }
        current
    }

    /// Node at position `index`
    pub fn node_at(&self, index: usize) -> Option<&ListNode<T>> {
        self.link_at(index).map(|p| unsafe { &*p.as_ptr() })
    }

    /// Item at position `index`
    pub fn item_at(&self, index: usize) -> Option<&T> {
        self.node_at(index).map(ListNode::item)
    }

    /// Position of the first item equal to `item`
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter().position(|candidate| candidate == item)
    }

    /// Unlink a node and take back its allocation
    unsafe fn unlink(&mut self, node: NonNull<ListNode<T>>) -> Box<ListNode<T>> {
        let boxed = Box::from_raw(node.as_ptr());

        match boxed.prev {
            Some(prev) => (*prev.as_ptr()).next = boxed.next,
            None => self.head = boxed.next,
        }
        match boxed.next {
            Some(next) => (*next.as_ptr()).prev = boxed.prev,
            None => self.tail = boxed.prev,
        }
        self.count -= 1;

        boxed
    }

    /// Drop or keep the payload of a node that left the list
    fn release(&self, mut node: Box<ListNode<T>>) {
        if self.items_owned() {
            unsafe { ManuallyDrop::drop(&mut node.item) };
        }
    }

    /// Remove the node at `index` and hand its item back to the caller
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        let link = self.link_at(index)?;
        let node = unsafe { self.unlink(link) };
        Some(ManuallyDrop::into_inner(node.item))
    }

    /// Remove the first node whose item equals `item`
    ///
    /// The removed item is dropped if the list owns its items.
    pub fn remove_item(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let mut current = self.head;
        while let Some(link) = current {
            unsafe {
                if *(*link.as_ptr()).item == *item {
                    let node = self.unlink(link);
                    self.release(node);
                    return true;
                }
                current = (*link.as_ptr()).next;
            }
        }
        false
    }

    /// Remove all nodes
    pub fn clear(&mut self) {
        let mut current = self.head;
        while let Some(link) = current {
            let node = unsafe { Box::from_raw(link.as_ptr()) };
            current = node.next;
            self.release(node);
        }

        self.head = None;
        self.tail = None;
        self.count = 0;
    }

    /// Reorder the nodes by `compare` (stable)
    ///
    /// Only links are rewritten; items stay in their nodes.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if self.count < 2 {
            return;
        }

        let mut nodes: Vec<NonNull<ListNode<T>>> = Vec::with_capacity(self.count);
        let mut current = self.head;
        while let Some(link) = current {
            nodes.push(link);
            current = unsafe { (*link.as_ptr()).next };
        }

        nodes.sort_by(|a, b| unsafe { compare((*a.as_ptr()).item(), (*b.as_ptr()).item()) });

        for (i, link) in nodes.iter().enumerate() {
            unsafe {
                (*link.as_ptr()).prev = if i == 0 { None } else { Some(nodes[i - 1]) };
                (*link.as_ptr()).next = nodes.get(i + 1).copied();
            }
        }
        self.head = nodes.first().copied();
        self.tail = nodes.last().copied();
    }

    /// Iterate over the items from head to tail
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.first(),
            remaining: self.count,
        }
    }
}

impl<T> Drop for LinkedList<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for LinkedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over list items
pub struct Iter<'a, T> {
    next: Option<&'a ListNode<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next();
        self.remaining -= 1;
        Some(node.item())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> IntoIterator for &'a LinkedList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
