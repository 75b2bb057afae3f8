#[allow(unused_imports)]
pub(crate) use {
    libc::{c_int, c_uint, c_void, cmsghdr, msghdr, size_t, socklen_t},
    std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd},
};
