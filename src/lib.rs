#![doc = include_str!("../README.md")]
// If this was in Cargo.toml, it would cover tests as well
#![warn(missing_docs, clippy::missing_assert_message)]

#[cfg(not(unix))]
compile_error!("fdchannel passes file descriptors over Unix domain sockets and only supports Unix");

#[macro_use]
mod macros;

mod c_wrappers;
mod channel;
mod cmsg;
mod error;
mod fdops;
mod fdset;
mod misc;
mod unixprelude;
mod util;

pub use {
    channel::{is_message_preserving, Channel, Mode, RecvSuccess},
    cmsg::Truncation,
    error::{Error, Result},
    fdset::{FdSet, MAX_FD_COUNT},
};

#[cfg(test)]
#[path = "../tests/index.rs"]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::indexing_slicing)]
mod tests;
