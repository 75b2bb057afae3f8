use crate::unixprelude::*;
use cfg_if::cfg_if;
use std::{
    io::{self, IoSlice, IoSliceMut},
    mem::zeroed,
};
use to_method::To;

#[allow(dead_code)]
mod tname {
    pub static SOCKLEN_T: &str = "`socklen_t`";
    pub static SIZE_T: &str = "`size_t`";
    pub static C_INT: &str = "`c_int`";
}

cfg_if! {
    if #[cfg(fdchan_msghdr_iovlen_size_t)] {
        pub(crate) type MsghdrIovlen = size_t;
        static MSGHDR_IOVLEN_NAME: &str = tname::SIZE_T;
    } else {
        pub(crate) type MsghdrIovlen = c_int;
        static MSGHDR_IOVLEN_NAME: &str = tname::C_INT;
    }
}
cfg_if! {
    if #[cfg(fdchan_msghdr_controllen_size_t)] {
        pub(crate) type MsghdrControllen = size_t;
        static MSGHDR_CONTROLLEN_NAME: &str = tname::SIZE_T;
    } else {
        pub(crate) type MsghdrControllen = socklen_t;
        static MSGHDR_CONTROLLEN_NAME: &str = tname::SOCKLEN_T;
    }
}

fn to_msghdr_iovlen(iovlen: usize) -> io::Result<MsghdrIovlen> {
    iovlen.try_to::<MsghdrIovlen>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("number of scatter-gather buffers overflowed {MSGHDR_IOVLEN_NAME}"),
        )
    })
}
fn to_msghdr_controllen(controllen: usize) -> io::Result<MsghdrControllen> {
    controllen.try_to::<MsghdrControllen>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("ancillary data buffer length overflowed {MSGHDR_CONTROLLEN_NAME}"),
        )
    })
}

/// Builds a `msghdr` for `recvmsg`. A zero-length `anc` leaves `msg_control` null.
///
/// The returned header borrows `iov` and `anc` through raw pointers; both must outlive every use
/// of it.
pub(crate) fn mk_msghdr_r(iov: &mut [IoSliceMut<'_>], anc: &mut [u8]) -> io::Result<msghdr> {
    let control = if anc.is_empty() { std::ptr::null_mut() } else { anc.as_mut_ptr() };
    fill_msghdr(iov.as_mut_ptr().cast(), iov.len(), control, anc.len())
}
/// Builds a `msghdr` for `sendmsg`. Same borrowing rules as [`mk_msghdr_r`].
pub(crate) fn mk_msghdr_w(iov: &[IoSlice<'_>], anc: &[u8]) -> io::Result<msghdr> {
    let control = if anc.is_empty() { std::ptr::null_mut() } else { anc.as_ptr().cast_mut() };
    fill_msghdr(iov.as_ptr().cast_mut().cast(), iov.len(), control, anc.len())
}
fn fill_msghdr(
    iov: *mut libc::iovec,
    iovlen: usize,
    control: *mut u8,
    controllen: usize,
) -> io::Result<msghdr> {
    let mut hdr: msghdr = unsafe {
        // SAFETY: msghdr is plain old data, i.e. an all-zero pattern is allowed
        zeroed()
    };
    hdr.msg_iov = iov;
    hdr.msg_iovlen = to_msghdr_iovlen(iovlen)?;
    hdr.msg_control = control.cast();
    hdr.msg_controllen = to_msghdr_controllen(controllen)?;
    Ok(hdr)
}
