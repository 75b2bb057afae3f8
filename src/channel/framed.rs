//! Backend for byte-stream sockets, which need explicit framing.
//!
//! Every message is preceded by a [`Header`] carrying the payload length and the number of
//! descriptors. The descriptors ride on the first `sendmsg` of the body, so the receiver offers a
//! control buffer to its body reads until one of them produces descriptors.

use super::RecvSuccess;
use crate::{
    cmsg::{self, AncillaryBuf, Truncation},
    fdops,
    unixprelude::*,
    util::{mk_msghdr_r, mk_msghdr_w},
    Error, FdSet, Result, MAX_FD_COUNT,
};
use std::io::{self, IoSlice, IoSliceMut};
use to_method::To;

pub(crate) const HEADER_LEN: usize = 8;

/// The framing header: two native-endian `u32`s, payload length first, descriptor count second.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub len: u32,
    pub fds: u32,
}
impl Header {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut bytes = [0; HEADER_LEN];
        bytes[..4].copy_from_slice(&self.len.to_ne_bytes());
        bytes[4..].copy_from_slice(&self.fds.to_ne_bytes());
        bytes
    }
    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        let [l0, l1, l2, l3, f0, f1, f2, f3] = bytes;
        Self {
            len: u32::from_ne_bytes([l0, l1, l2, l3]),
            fds: u32::from_ne_bytes([f0, f1, f2, f3]),
        }
    }
}

pub(super) fn send(fd: BorrowedFd<'_>, payload: &[u8], fds: &[BorrowedFd<'_>]) -> Result<()> {
    let anc = AncillaryBuf::encode(fds);
    let len = payload.len().try_to::<u32>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "payload length does not fit into the framing header",
        )
    })?;
    // At most MAX_FD_COUNT, checked by encode().
    #[allow(clippy::cast_possible_truncation)]
    let header = Header {
        len,
        fds: fds.len() as u32,
    };
    log::trace!("sending {header:?}");
    fdops::write_all(fd, &header.to_bytes())?;

    let mut sent = 0;
    while sent < payload.len() {
        let iov = [IoSlice::new(&payload[sent..])];
        let anc_bytes: &[u8] = if sent == 0 { anc.as_bytes() } else { &[] };
        let hdr = mk_msghdr_w(&iov, anc_bytes)?;
        let n = unsafe {
            // SAFETY: hdr points into iov and anc, both of which outlive the call
            fdops::sendmsg(fd, &hdr)?
        };
        if n == 0 {
            return Err(io::Error::from(io::ErrorKind::WriteZero).into());
        }
        sent += n;
    }
    Ok(())
}

pub(super) fn recv(
    fd: BorrowedFd<'_>,
    buf: &mut [u8],
    fds_out: Option<&mut FdSet>,
) -> Result<RecvSuccess> {
    let mut hbytes = [0; HEADER_LEN];
    fdops::read_all(fd, &mut hbytes)?;
    let header = Header::from_bytes(hbytes);
    log::trace!("received {header:?}");

    let len = header.len as usize;
    let declared_fds = header.fds as usize;
    if len == 0 {
        return Err(Error::EmptyMessage);
    }
    if len > buf.len() {
        return Err(Error::Oversize {
            declared: len,
            capacity: buf.len(),
        });
    }
    if declared_fds > MAX_FD_COUNT {
        return Err(Error::TooManyDescriptors {
            declared: declared_fds,
        });
    }

    let mut anc = AncillaryBuf::with_room(declared_fds);
    let mut offer_anc = declared_fds > 0;
    let mut arrived = Vec::new();
    let mut got = 0;
    while got < len {
        let mut iov = [IoSliceMut::new(&mut buf[got..len])];
        let anc_bytes: &mut [u8] = if offer_anc { anc.as_mut_bytes() } else { &mut [] };
        let mut hdr = mk_msghdr_r(&mut iov, anc_bytes)?;
        let n = unsafe {
            // SAFETY: hdr points into iov and anc, both of which outlive the call
            fdops::recvmsg(fd, &mut hdr)?
        };
        let chunk_fds = unsafe {
            // SAFETY: the header was just filled in by recvmsg
            cmsg::decode(&hdr)?
        };
        arrived.extend(chunk_fds);

        if let Some(t) = Truncation::from_flags(hdr.msg_flags) {
            log::debug!("framed message body truncated ({t}) after {} of {len} bytes", got + n);
            cmsg::discard(arrived, format_args!("message truncated"));
            return Err(Error::Truncated(t));
        }
        if n == 0 {
            cmsg::discard(arrived, format_args!("connection ended mid-message"));
            return Err(Error::Incomplete {
                expected: len,
                received: got,
            });
        }
        if !arrived.is_empty() {
            offer_anc = false;
        }
        got += n;
    }

    if arrived.len() < declared_fds {
        log::debug!(
            "peer declared {declared_fds} descriptor(s), {} arrived",
            arrived.len()
        );
    }
    let descriptors = match fds_out {
        Some(out) => out.fill_clamped(arrived),
        None => {
            cmsg::discard(arrived, format_args!("no descriptor set was provided"));
            0
        }
    };
    Ok(RecvSuccess {
        main: len,
        descriptors,
    })
}
