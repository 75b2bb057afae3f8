//! Backend for sockets that keep message boundaries: one `sendmsg` per message, one `recvmsg`
//! per message.

use super::RecvSuccess;
use crate::{
    cmsg::{self, AncillaryBuf, Truncation},
    fdops,
    unixprelude::*,
    util::{mk_msghdr_r, mk_msghdr_w},
    Error, FdSet, Result, MAX_FD_COUNT,
};
use std::io::{IoSlice, IoSliceMut};

pub(super) fn send(fd: BorrowedFd<'_>, payload: &[u8], fds: &[BorrowedFd<'_>]) -> Result<()> {
    let anc = AncillaryBuf::encode(fds);
    let iov = [IoSlice::new(payload)];
    let hdr = mk_msghdr_w(&iov, anc.as_bytes())?;
    let sent = unsafe {
        // SAFETY: hdr points into iov and anc, both of which outlive the call
        fdops::sendmsg(fd, &hdr)?
    };
    assert_eq!(
        sent,
        payload.len(),
        "partial send on a message-preserving socket"
    );
    Ok(())
}

pub(super) fn recv(
    fd: BorrowedFd<'_>,
    buf: &mut [u8],
    fds_out: Option<&mut FdSet>,
) -> Result<RecvSuccess> {
    // Room for a full message regardless of the caller's capacity. The surplus is closed when
    // clamping into the set.
    let mut anc = AncillaryBuf::with_room(MAX_FD_COUNT);
    let mut iov = [IoSliceMut::new(buf)];
    let mut hdr = mk_msghdr_r(&mut iov, anc.as_mut_bytes())?;

    let received = unsafe {
        // SAFETY: hdr points into iov and anc, both of which outlive the call
        fdops::recvmsg(fd, &mut hdr)?
    };
    let arrived = unsafe {
        // SAFETY: the header was just filled in by recvmsg
        cmsg::decode(&hdr)?
    };

    if let Some(t) = Truncation::from_flags(hdr.msg_flags) {
        log::debug!("message truncated ({t}) with {received} bytes of payload delivered");
        cmsg::discard(arrived, format_args!("message truncated"));
        return Err(Error::Truncated(t));
    }
    if received == 0 {
        cmsg::discard(arrived, format_args!("peer hung up"));
        return Err(Error::Closed);
    }

    let descriptors = match fds_out {
        Some(out) => out.fill_clamped(arrived),
        None => {
            cmsg::discard(arrived, format_args!("no descriptor set was provided"));
            0
        }
    };
    Ok(RecvSuccess {
        main: received,
        descriptors,
    })
}
