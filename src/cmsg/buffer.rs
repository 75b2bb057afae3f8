use super::{FD_SIZE, LEVEL, TYPE};
use crate::{unixprelude::*, MAX_FD_COUNT};
use std::mem::size_of;

const fn align8(n: usize) -> usize {
    (n + 7) & !7
}
/// Upper bound on `CMSG_SPACE(MAX_FD_COUNT * FD_SIZE)` across supported platforms, none of which
/// align control messages to more than 8 bytes.
const STORAGE_LEN: usize = align8(size_of::<cmsghdr>()) + align8(MAX_FD_COUNT * FD_SIZE);

#[repr(C, align(8))]
struct Storage([u8; STORAGE_LEN]);

/// Room for exactly one `SCM_RIGHTS` control message of up to [`MAX_FD_COUNT`] descriptors.
///
/// Lives on the stack; the used length is what gets passed as `msg_controllen`.
pub(crate) struct AncillaryBuf {
    storage: Storage,
    len: usize,
}
impl AncillaryBuf {
    const fn empty() -> Self {
        Self {
            storage: Storage([0; STORAGE_LEN]),
            len: 0,
        }
    }

    /// Encodes the given descriptors into a control message sized exactly to hold them. No
    /// descriptors means an empty buffer, which makes for a null `msg_control`.
    ///
    /// # Panics
    /// If there are more than [`MAX_FD_COUNT`] descriptors.
    pub fn encode(fds: &[BorrowedFd<'_>]) -> Self {
        assert!(
            fds.len() <= MAX_FD_COUNT,
            "cannot attach {} descriptors to one message, the maximum is {MAX_FD_COUNT}",
            fds.len()
        );
        let mut buf = Self::empty();
        if fds.is_empty() {
            return buf;
        }
        let payload = fds.len() * FD_SIZE;
        buf.len = space(payload);
        assert!(buf.len <= STORAGE_LEN, "control message does not fit its storage");

        let hdr = buf.storage.0.as_mut_ptr().cast::<cmsghdr>();
        unsafe {
            // SAFETY: the storage is zeroed, aligned for cmsghdr and has room for CMSG_SPACE of the
            // payload, as asserted above
            (*hdr).cmsg_level = LEVEL;
            (*hdr).cmsg_type = TYPE;
            (*hdr).cmsg_len = libc::CMSG_LEN(payload as c_uint) as _;
            let data = libc::CMSG_DATA(hdr);
            for (i, fd) in fds.iter().enumerate() {
                data.add(i * FD_SIZE).cast::<RawFd>().write_unaligned(fd.as_raw_fd());
            }
        }
        buf
    }
    /// Creates a zeroed buffer that can receive up to `fds` descriptors, or an empty one if `fds`
    /// is zero.
    pub fn with_room(fds: usize) -> Self {
        let fds = fds.min(MAX_FD_COUNT);
        let mut buf = Self::empty();
        if fds > 0 {
            buf.len = space(fds * FD_SIZE);
        }
        buf
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.len
    }
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.0[..self.len]
    }
    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.storage.0[..self.len]
    }
}

fn space(payload: usize) -> usize {
    // Never more than MAX_FD_COUNT descriptors' worth.
    #[allow(clippy::cast_possible_truncation)]
    let payload = payload as c_uint;
    unsafe { libc::CMSG_SPACE(payload) as usize }
}
