//! [`Channel`], the message-and-descriptor endpoint, and its backend selection.

mod framed;
mod seqpacket;

use crate::{c_wrappers, fdops, unixprelude::*, Error, FdSet, Result};
use std::{
    fmt::{self, Debug, Formatter},
    io,
};

/// How a [`Channel`] delimits messages on the wire. Decided once, from the socket type, when the
/// channel is created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// `SOCK_SEQPACKET` or `SOCK_DGRAM`: the kernel keeps message boundaries, and every message is
    /// a single `sendmsg`/`recvmsg` pair.
    BoundaryPreserving,
    /// `SOCK_STREAM`: every message is preceded by an 8-byte header of payload length and
    /// descriptor count.
    FramedStream,
}
impl Mode {
    fn of_socket_type(ty: c_int) -> Option<Self> {
        match ty {
            libc::SOCK_SEQPACKET | libc::SOCK_DGRAM => Some(Self::BoundaryPreserving),
            libc::SOCK_STREAM => Some(Self::FramedStream),
            _ => None,
        }
    }
    fn of_socket(fd: BorrowedFd<'_>) -> io::Result<Self> {
        let ty = c_wrappers::socket_type(fd)?;
        Self::of_socket_type(ty).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("socket type {ty} cannot carry messages with descriptors"),
            )
        })
    }
    const fn socket_type(self) -> c_int {
        match self {
            Self::BoundaryPreserving => libc::SOCK_SEQPACKET,
            Self::FramedStream => libc::SOCK_STREAM,
        }
    }
}

/// Reports whether the given socket keeps message boundaries on its own, i.e. whether a
/// [`Channel`] over it would use [`Mode::BoundaryPreserving`].
pub fn is_message_preserving(fd: BorrowedFd<'_>) -> io::Result<bool> {
    Mode::of_socket(fd).map(|m| m == Mode::BoundaryPreserving)
}

/// The successful result of [`Channel::recv_with_fds()`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RecvSuccess {
    /// How many bytes of payload were written to the buffer.
    pub main: usize,
    /// How many descriptors were added to the [`FdSet`].
    pub descriptors: usize,
}

/// One end of a connection that carries discrete messages, each with up to
/// [`MAX_FD_COUNT`](crate::MAX_FD_COUNT) file descriptors attached.
///
/// The channel exclusively owns its socket. It cannot be cloned, and it closes the socket exactly
/// once: on [`close()`](Self::close) or on drop, whichever comes first.
///
/// All operations block. Interrupted and would-block system calls are retried internally, so a
/// nonblocking socket merely makes the channel spin. Any error means that the channel can no
/// longer be trusted to be in sync with its peer and should be closed.
///
/// # Concurrency
/// The I/O methods take `&self`, so one thread may run the receive loop while another sends.
/// Two concurrent sends, or two concurrent receives, on the same channel can interleave on the
/// wire and must be serialized by the caller.
///
/// # Examples
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use fdchannel::{Channel, FdSet};
/// use std::{fs::File, os::fd::AsFd};
///
/// let (a, b) = Channel::pair()?;
/// let file = File::open("/dev/null")?;
/// a.send_with_fds(b"PING", &[file.as_fd()])?;
///
/// let mut buf = [0; 64];
/// let mut fds = FdSet::new();
/// let rs = b.recv_with_fds(&mut buf, &mut fds)?;
/// assert_eq!(&buf[..rs.main], b"PING");
/// assert_eq!(rs.descriptors, 1);
///
/// b.send(b"PONG")?;
/// let mut reply = [0; 4];
/// a.recv_exact(&mut reply)?;
/// assert_eq!(&reply, b"PONG");
/// # Ok(()) }
/// ```
pub struct Channel {
    fd: Option<OwnedFd>,
    mode: Mode,
}
impl Channel {
    /// Wraps a connected, blocking Unix domain socket.
    ///
    /// The socket type is queried once to pick the [`Mode`]. Socket types other than stream,
    /// datagram and sequential packet fail with [`InvalidInput`](io::ErrorKind::InvalidInput).
    /// On failure, the socket is closed.
    ///
    /// # System calls
    /// - `getsockopt`
    /// - `setsockopt` (Apple platforms only, for `SO_NOSIGPIPE`)
    pub fn new(fd: impl Into<OwnedFd>) -> io::Result<Self> {
        let fd = fd.into();
        let mode = Mode::of_socket(fd.as_fd())?;
        #[cfg(any(target_os = "macos", target_os = "ios", target_os = "tvos", target_os = "watchos"))]
        c_wrappers::set_nosigpipe(fd.as_fd())?;
        log::debug!("channel on fd {} uses {mode:?}", fd.as_raw_fd());
        Ok(Self { fd: Some(fd), mode })
    }
    /// Creates a pair of connected channels, using sequential packet sockets where the platform
    /// supports them for `AF_UNIX`, and framed byte streams elsewhere.
    ///
    /// Both sockets are close-on-exec.
    pub fn pair() -> io::Result<(Self, Self)> {
        #[cfg(fdchan_seqpacket)]
        let mode = Mode::BoundaryPreserving;
        #[cfg(not(fdchan_seqpacket))]
        let mode = Mode::FramedStream;
        Self::pair_with(mode)
    }
    /// Like [`pair()`](Self::pair), but with the backend chosen by the caller.
    ///
    /// # System calls
    /// - `socketpair`
    /// - `fcntl` (where `SOCK_CLOEXEC` is unavailable)
    pub fn pair_with(mode: Mode) -> io::Result<(Self, Self)> {
        let (a, b) = c_wrappers::socketpair(mode.socket_type())?;
        Ok((Self::new(a)?, Self::new(b)?))
    }

    /// The backend this channel was bound to.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }
    /// Whether the underlying socket keeps message boundaries, i.e. whether no framing header is
    /// used.
    #[inline]
    pub fn is_message_preserving(&self) -> bool {
        self.mode == Mode::BoundaryPreserving
    }

    fn fd(&self) -> Result<BorrowedFd<'_>> {
        self.fd.as_ref().map(AsFd::as_fd).ok_or(Error::Released)
    }

    /// Sends a message without descriptors.
    ///
    /// # Panics
    /// If `payload` is empty.
    #[inline]
    pub fn send(&self, payload: &[u8]) -> Result<()> {
        self.send_with_fds(payload, &[])
    }
    /// Sends a message along with the given descriptors.
    ///
    /// The descriptors are borrowed: the kernel installs duplicates of them in the receiving
    /// process, and the caller keeps and remains responsible for its own.
    ///
    /// # Panics
    /// If `payload` is empty or more than [`MAX_FD_COUNT`](crate::MAX_FD_COUNT) descriptors are
    /// given.
    ///
    /// # System calls
    /// - `sendmsg`
    /// - `send` (framed streams only, for the header)
    pub fn send_with_fds(&self, payload: &[u8], fds: &[BorrowedFd<'_>]) -> Result<()> {
        assert!(!payload.is_empty(), "cannot send an empty message");
        let fd = self.fd()?;
        let rslt = match self.mode {
            Mode::BoundaryPreserving => seqpacket::send(fd, payload, fds),
            Mode::FramedStream => framed::send(fd, payload, fds),
        };
        if let Err(e) = &rslt {
            log::warn!("send of {} bytes and {} descriptor(s) failed: {e}", payload.len(), fds.len());
        }
        rslt
    }

    /// Receives a message into `buf`, closing any descriptors that came with it. Returns the
    /// payload length.
    ///
    /// # Panics
    /// If `buf` is empty.
    #[inline]
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.recv_impl(buf, None).map(|rs| rs.main)
    }
    /// Receives a message into `buf` and its descriptors into `fds`.
    ///
    /// The capacity for the payload is `buf.len()`; the capacity for descriptors is
    /// [`fds.room()`](FdSet::room). Descriptors beyond that capacity are closed. Ownership of the
    /// descriptors that were added to `fds` passes to the caller.
    ///
    /// Payloads larger than `buf` fail the receive: with [`Error::Truncated`] if the socket keeps
    /// message boundaries, with [`Error::Oversize`] and the buffer left untouched if it is a
    /// framed stream. A peer that hung up between messages yields [`Error::Closed`].
    ///
    /// # Panics
    /// If `buf` is empty.
    ///
    /// # System calls
    /// - `recvmsg`
    /// - `recv` (framed streams only, for the header)
    /// - `fcntl` (where `MSG_CMSG_CLOEXEC` is unavailable)
    #[inline]
    pub fn recv_with_fds(&self, buf: &mut [u8], fds: &mut FdSet) -> Result<RecvSuccess> {
        self.recv_impl(buf, Some(fds))
    }
    /// Receives a message that must be exactly `buf.len()` bytes long, closing any descriptors
    /// that came with it.
    ///
    /// # Panics
    /// If `buf` is empty.
    pub fn recv_exact(&self, buf: &mut [u8]) -> Result<()> {
        let received = self.recv(buf)?;
        if received != buf.len() {
            log::warn!("expected a {}-byte reply, got {received} bytes", buf.len());
            return Err(Error::SizeMismatch {
                expected: buf.len(),
                received,
            });
        }
        Ok(())
    }
    fn recv_impl(&self, buf: &mut [u8], fds: Option<&mut FdSet>) -> Result<RecvSuccess> {
        assert!(!buf.is_empty(), "cannot receive into an empty buffer");
        let fd = self.fd()?;
        let rslt = match self.mode {
            Mode::BoundaryPreserving => seqpacket::recv(fd, buf, fds),
            Mode::FramedStream => framed::recv(fd, buf, fds),
        };
        match &rslt {
            Err(Error::Closed) => log::debug!("peer closed the channel"),
            Err(e) => log::warn!("receive failed: {e}"),
            Ok(_) => {}
        }
        rslt
    }

    /// Polls the socket without blocking and reports whether the peer is still there.
    ///
    /// Returns `false` if the socket has hung up or errored, if the poll itself failed, or if the
    /// channel has been closed.
    pub fn is_connected(&self) -> bool {
        let Ok(fd) = self.fd() else { return false };
        match fdops::retry_transient(|| c_wrappers::poll_hangup(fd)) {
            Ok(hangup) => !hangup,
            Err(e) => {
                log::debug!("poll failed: {e}");
                false
            }
        }
    }

    /// Closes the socket. Calling this again, or on a channel whose socket has been taken out, does
    /// nothing; every other operation on a closed channel fails with [`Error::Released`].
    pub fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            log::debug!("releasing channel on fd {}", fd.as_raw_fd());
        }
    }
    /// Unwraps the socket, handing it to the caller without closing it. Returns `None` if the
    /// channel has already been closed.
    #[inline]
    pub fn into_inner(mut self) -> Option<OwnedFd> {
        self.fd.take()
    }
}
impl Debug for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("fd", &self.fd.as_ref().map(AsRawFd::as_raw_fd))
            .field("mode", &self.mode)
            .finish()
    }
}
impl TryFrom<OwnedFd> for Channel {
    type Error = io::Error;
    #[inline]
    fn try_from(fd: OwnedFd) -> io::Result<Self> {
        Self::new(fd)
    }
}
