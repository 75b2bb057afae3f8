//! Blocking socket calls with transparent retrying of `EINTR` and `EAGAIN`.

use crate::{misc::is_transient, unixprelude::*, Error};
use std::io;

#[cfg(fdchan_msg_nosignal)]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;
#[cfg(not(fdchan_msg_nosignal))]
const SEND_FLAGS: c_int = 0;

#[cfg(fdchan_cmsg_cloexec)]
const RECV_FLAGS: c_int = libc::MSG_CMSG_CLOEXEC;
#[cfg(not(fdchan_cmsg_cloexec))]
const RECV_FLAGS: c_int = 0;

/// Runs `f` until it returns something other than an interrupted or would-block error.
pub(crate) fn retry_transient<T>(mut f: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match f() {
            Err(e) if is_transient(&e) => continue,
            els => return els,
        }
    }
}

#[allow(clippy::cast_sign_loss)]
fn ssize_to_result(ret: isize) -> io::Result<usize> {
    if ret >= 0 {
        Ok(ret as usize)
    } else {
        Err(io::Error::last_os_error())
    }
}

fn recv_once(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    let ret = unsafe { libc::recv(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len(), 0) };
    ssize_to_result(ret)
}
fn send_once(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    let ret = unsafe { libc::send(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len(), SEND_FLAGS) };
    ssize_to_result(ret)
}

/// Fills `buf` completely.
///
/// End of stream before the first byte is [`Error::Closed`]; end of stream afterwards is
/// [`Error::Incomplete`].
pub(crate) fn read_all(fd: BorrowedFd<'_>, buf: &mut [u8]) -> crate::Result<()> {
    let mut got = 0;
    while got < buf.len() {
        match retry_transient(|| recv_once(fd, &mut buf[got..]))? {
            0 if got == 0 => return Err(Error::Closed),
            0 => {
                return Err(Error::Incomplete {
                    expected: buf.len(),
                    received: got,
                })
            }
            n => got += n,
        }
    }
    Ok(())
}

/// Writes all of `buf`.
pub(crate) fn write_all(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match retry_transient(|| send_once(fd, &buf[sent..]))? {
            0 => return Err(io::ErrorKind::WriteZero.into()),
            n => sent += n,
        }
    }
    Ok(())
}

/// One `sendmsg` call with SIGPIPE suppressed where the platform allows it per call.
///
/// # Safety
/// Every pointer in `hdr` must be valid for reads for the length stored next to it.
pub(crate) unsafe fn sendmsg(fd: BorrowedFd<'_>, hdr: &msghdr) -> io::Result<usize> {
    retry_transient(|| {
        let ret = unsafe {
            // SAFETY: forwarded to the caller
            libc::sendmsg(fd.as_raw_fd(), hdr, SEND_FLAGS)
        };
        ssize_to_result(ret)
    })
}

/// One `recvmsg` call. Received descriptors get close-on-exec atomically where the platform
/// supports it. `hdr.msg_flags` holds the kernel's flags afterwards.
///
/// # Safety
/// Every pointer in `hdr` must be valid for writes for the length stored next to it.
pub(crate) unsafe fn recvmsg(fd: BorrowedFd<'_>, hdr: &mut msghdr) -> io::Result<usize> {
    retry_transient(|| {
        let ret = unsafe {
            // SAFETY: forwarded to the caller
            libc::recvmsg(fd.as_raw_fd(), hdr, RECV_FLAGS)
        };
        ssize_to_result(ret)
    })
}
