//! Encoding and decoding of the `SCM_RIGHTS` control messages that carry descriptors.

mod buffer;
pub(crate) use buffer::*;

use crate::unixprelude::*;
use std::{
    fmt::{self, Display, Formatter},
    io,
    mem::size_of,
};

const LEVEL: c_int = libc::SOL_SOCKET;
const TYPE: c_int = libc::SCM_RIGHTS;
const FD_SIZE: usize = size_of::<RawFd>();

/// Which parts of a received message the kernel had to cut off.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Truncation {
    /// The payload did not fit into the receive buffer (`MSG_TRUNC`).
    pub payload: bool,
    /// The descriptors did not fit into the control buffer (`MSG_CTRUNC`).
    pub descriptors: bool,
}
impl Truncation {
    pub(crate) fn from_flags(flags: c_int) -> Option<Self> {
        let t = Self {
            payload: flags & libc::MSG_TRUNC != 0,
            descriptors: flags & libc::MSG_CTRUNC != 0,
        };
        (t.payload || t.descriptors).then_some(t)
    }
}
impl Display for Truncation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match (self.payload, self.descriptors) {
            (true, true) => "payload and descriptors",
            (true, false) => "payload",
            (false, true) => "descriptors",
            (false, false) => "nothing",
        })
    }
}

/// Takes ownership of every descriptor in the `SCM_RIGHTS` messages of a header that `recvmsg`
/// has filled in. Control messages of other kinds, as well as an absent or malformed control
/// block, contribute no descriptors.
///
/// Where the kernel cannot set close-on-exec atomically, it is set here before returning. If that
/// fails, every descriptor is closed and the error is returned.
///
/// # Safety
/// `hdr` must be the header of a completed `recvmsg` call whose control buffer is still alive, and
/// must not be decoded twice.
pub(crate) unsafe fn decode(hdr: &msghdr) -> io::Result<Vec<OwnedFd>> {
    let mut fds = Vec::new();
    if hdr.msg_control.is_null() {
        return Ok(fds);
    }
    let base = hdr.msg_control.cast::<u8>().cast_const();
    let controllen = hdr.msg_controllen as usize;
    let data_offset = unsafe { libc::CMSG_LEN(0) } as usize;

    let mut cur = unsafe {
        // SAFETY: the control pointer and length come from a live header
        libc::CMSG_FIRSTHDR(hdr)
    };
    while !cur.is_null() {
        let (level, ty, len) = unsafe {
            // SAFETY: CMSG_FIRSTHDR and CMSG_NXTHDR only return non-null for a cmsghdr that lies
            // within the control buffer
            ((*cur).cmsg_level, (*cur).cmsg_type, (*cur).cmsg_len as usize)
        };
        let offset = cur.cast::<u8>().cast_const() as usize - base as usize;
        if len < data_offset || offset + len > controllen {
            log::debug!("ignoring malformed control message of length {len}");
            break;
        }
        if level == LEVEL && ty == TYPE {
            let data = unsafe { libc::CMSG_DATA(cur) }.cast_const();
            for i in 0..(len - data_offset) / FD_SIZE {
                let raw = unsafe {
                    // SAFETY: bounds checked against controllen above
                    data.add(i * FD_SIZE).cast::<RawFd>().read_unaligned()
                };
                fds.push(unsafe {
                    // SAFETY: the kernel installed this descriptor for us and nobody else knows it
                    OwnedFd::from_raw_fd(raw)
                });
            }
        }
        cur = unsafe { libc::CMSG_NXTHDR(hdr, cur) };
    }

    #[cfg(not(fdchan_cmsg_cloexec))]
    for fd in &fds {
        crate::c_wrappers::set_cloexec(fd.as_fd())?;
    }
    Ok(fds)
}

/// Closes received descriptors that cannot be handed to the caller.
pub(crate) fn discard(fds: Vec<OwnedFd>, why: fmt::Arguments<'_>) {
    if !fds.is_empty() {
        log::debug!("closing {} received descriptor(s): {why}", fds.len());
    }
    drop(fds);
}
