//! [`FdSet`], the receiving end's container for descriptors that arrive with a message.

use crate::unixprelude::*;
use std::vec;

/// The largest number of descriptors that can accompany one message.
pub const MAX_FD_COUNT: usize = 8;

/// An ordered list of received file descriptors with a fixed upper bound on its length.
///
/// The bound is the descriptor capacity of a receive call: the channel never stores more than
/// [`room()`](Self::room) descriptors into the set and closes any surplus that the peer sent. All
/// descriptors in the set are owned by it and get closed when it is dropped or
/// [cleared](Self::clear), unless taken out first.
#[derive(Debug)]
pub struct FdSet {
    fds: Vec<OwnedFd>,
    limit: usize,
}
impl FdSet {
    /// Creates an empty set that can hold up to [`MAX_FD_COUNT`] descriptors.
    #[inline]
    pub fn new() -> Self {
        Self::with_limit(MAX_FD_COUNT)
    }
    /// Creates an empty set that can hold up to `limit` descriptors. A limit of zero is allowed and
    /// makes every received descriptor get closed on arrival.
    ///
    /// # Panics
    /// If `limit` exceeds [`MAX_FD_COUNT`].
    pub fn with_limit(limit: usize) -> Self {
        assert!(
            limit <= MAX_FD_COUNT,
            "descriptor set limit {limit} exceeds the maximum of {MAX_FD_COUNT}"
        );
        Self {
            fds: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Number of descriptors currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.fds.len()
    }
    #[inline]
    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }
    /// The upper bound given at construction.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
    /// How many more descriptors fit.
    #[inline]
    pub fn room(&self) -> usize {
        self.limit.saturating_sub(self.fds.len())
    }

    /// Appends a descriptor, handing it back if the set is full.
    pub fn push(&mut self, fd: OwnedFd) -> Result<(), OwnedFd> {
        if self.room() == 0 {
            return Err(fd);
        }
        self.fds.push(fd);
        Ok(())
    }
    /// Borrows the descriptor at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<BorrowedFd<'_>> {
        self.fds.get(index).map(AsFd::as_fd)
    }
    /// Iterates over borrows of the held descriptors in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = BorrowedFd<'_>> + '_ {
        self.fds.iter().map(AsFd::as_fd)
    }
    /// Collects borrows of all held descriptors, in the form accepted by
    /// [`Channel::send_with_fds()`](crate::Channel::send_with_fds).
    pub fn borrow_all(&self) -> Vec<BorrowedFd<'_>> {
        self.iter().collect()
    }
    /// Removes and returns all held descriptors, leaving the set empty with its limit unchanged.
    pub fn take(&mut self) -> Vec<OwnedFd> {
        std::mem::take(&mut self.fds)
    }
    /// Closes all held descriptors.
    pub fn clear(&mut self) {
        self.fds.clear();
    }

    /// Moves as many of `fds` into the set as there is room for and closes the rest. Returns the
    /// number kept.
    pub(crate) fn fill_clamped(&mut self, fds: Vec<OwnedFd>) -> usize {
        let room = self.room();
        let mut fds = fds.into_iter();
        let before = self.fds.len();
        self.fds.extend(fds.by_ref().take(room));
        let kept = self.fds.len() - before;
        let surplus = fds.len();
        if surplus > 0 {
            log::debug!("closing {surplus} descriptor(s) beyond the receiver's capacity of {room}");
        }
        kept
    }
}
impl Default for FdSet {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
impl IntoIterator for FdSet {
    type Item = OwnedFd;
    type IntoIter = vec::IntoIter<OwnedFd>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.fds.into_iter()
    }
}
