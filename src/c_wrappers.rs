use crate::{misc::OrErrno, unixprelude::*};
use std::{io, mem::size_of};

pub(crate) fn socketpair(ty: c_int) -> io::Result<(OwnedFd, OwnedFd)> {
    #[allow(unused_mut)]
    let mut ty = ty;
    #[cfg(fdchan_cmsg_cloexec)]
    {
        ty |= libc::SOCK_CLOEXEC;
    }
    let mut fds: [c_int; 2] = [-1; 2];
    let success = unsafe { libc::socketpair(libc::AF_UNIX, ty, 0, fds.as_mut_ptr()) == 0 };
    let [a, b] = success.true_val_or_errno(fds)?;
    let pair = unsafe {
        // SAFETY: we just created both of these
        (OwnedFd::from_raw_fd(a), OwnedFd::from_raw_fd(b))
    };
    #[cfg(not(fdchan_cmsg_cloexec))]
    {
        set_cloexec(pair.0.as_fd())?;
        set_cloexec(pair.1.as_fd())?;
    }
    Ok(pair)
}

pub(crate) fn socket_type(fd: BorrowedFd<'_>) -> io::Result<c_int> {
    let mut ty: c_int = 0;
    let mut len = size_of::<c_int>() as socklen_t;
    let success = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_TYPE,
            (&mut ty as *mut c_int).cast(),
            &mut len,
        ) != -1
    };
    ok_or_ret_errno!(success => ty)
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos"))]
pub(crate) fn set_nosigpipe(fd: BorrowedFd<'_>) -> io::Result<()> {
    let one: c_int = 1;
    let success = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_NOSIGPIPE,
            (&one as *const c_int).cast(),
            size_of::<c_int>() as socklen_t,
        ) != -1
    };
    ok_or_ret_errno!(success => ())
}

#[cfg_attr(fdchan_cmsg_cloexec, allow(dead_code))]
pub(crate) fn get_fdflags(fd: BorrowedFd<'_>) -> io::Result<c_int> {
    let val = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD, 0) };
    (val != -1).true_val_or_errno(val)
}
#[cfg_attr(fdchan_cmsg_cloexec, allow(dead_code))]
fn set_fdflags(fd: BorrowedFd<'_>, flags: c_int) -> io::Result<()> {
    let success = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, flags) != -1 };
    ok_or_ret_errno!(success => ())
}
#[cfg_attr(fdchan_cmsg_cloexec, allow(dead_code))]
pub(crate) fn set_cloexec(fd: BorrowedFd<'_>) -> io::Result<()> {
    let flags = get_fdflags(fd)?;
    if flags & libc::FD_CLOEXEC == 0 {
        set_fdflags(fd, flags | libc::FD_CLOEXEC)?;
    }
    Ok(())
}

/// Polls the descriptor with a zero timeout and reports whether it has hung up or errored.
pub(crate) fn poll_hangup(fd: BorrowedFd<'_>) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: 0,
        revents: 0,
    };
    let ret = unsafe { libc::poll(&mut pfd, 1, 0) };
    let ready = (ret != -1).true_val_or_errno(ret)?;
    Ok(ready > 0 && pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0)
}
