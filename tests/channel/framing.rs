//! Framed-stream specifics, driven from a raw `UnixStream` on the other end.

use crate::{tests::util::*, Channel, Error, FdSet, Mode, MAX_FD_COUNT};
use color_eyre::eyre::{bail, ensure, WrapErr};
use std::{
	fs::File,
	io::{Read, Write},
	os::{
		fd::{AsFd, BorrowedFd},
		unix::net::UnixStream,
	},
	thread,
};

fn header(len: u32, fds: u32) -> [u8; 8] {
	let mut h = [0; 8];
	h[..4].copy_from_slice(&len.to_ne_bytes());
	h[4..].copy_from_slice(&fds.to_ne_bytes());
	h
}
fn raw_pair() -> TestResult<(UnixStream, Channel)> {
	let (raw, ours) = UnixStream::pair().context("socket pair creation failed")?;
	let chan = Channel::new(ours).context("channel creation failed")?;
	ensure_eq!(chan.mode(), Mode::FramedStream);
	Ok((raw, chan))
}

/// A payload far larger than the socket buffer has to be split over many `sendmsg` and
/// `recvmsg` calls, with the descriptors attached to the first one only.
pub(super) fn large_payload() -> TestResult {
	const LEN: usize = 4 * 1024 * 1024;
	let (a, b) = Channel::pair_with(Mode::FramedStream).context("socket pair creation failed")?;
	let mut payload = vec![0; LEN];
	Xorshift32::from_id("framed large payload").fill(&mut payload);
	let files = (0..MAX_FD_COUNT)
		.map(|n| tempfile_with(&[n as u8; 3]))
		.collect::<TestResult<Vec<File>>>()?;
	let borrowed: Vec<BorrowedFd<'_>> = files.iter().map(AsFd::as_fd).collect();

	let mut buf = vec![0; LEN];
	let mut fds = FdSet::new();
	let rs = thread::scope(|s| {
		let sender = s.spawn(|| a.send_with_fds(&payload, &borrowed));
		let rs = b.recv_with_fds(&mut buf, &mut fds);
		sender.join().unwrap().context("send failed")?;
		rs.context("receive failed")
	})?;

	ensure_eq!((rs.main, rs.descriptors), (LEN, MAX_FD_COUNT));
	ensure!(buf == payload, "payload was not reassembled correctly");
	for (n, fd) in fds.into_iter().enumerate() {
		ensure_eq!(contents(&File::from(fd))?, vec![n as u8; 3]);
	}
	Ok(())
}

pub(super) fn wire_format() -> TestResult {
	let (mut raw, chan) = raw_pair()?;
	chan.send(b"hello").context("send failed")?;
	let mut got = [0; 13];
	raw.read_exact(&mut got).context("raw read failed")?;
	ensure_eq!(got[..8], header(5, 0));
	ensure_eq!(&got[8..], b"hello");

	let mut msg = header(3, 0).to_vec();
	msg.extend_from_slice(b"abc");
	raw.write_all(&msg).context("raw write failed")?;
	let mut buf = [0; 16];
	ensure_eq!(chan.recv(&mut buf)?, 3);
	ensure_eq!(&buf[..3], b"abc");
	Ok(())
}

pub(super) fn too_many_descriptors() -> TestResult {
	let (mut raw, chan) = raw_pair()?;
	let mut msg = header(4, 9).to_vec();
	msg.extend_from_slice(b"data");
	raw.write_all(&msg).context("raw write failed")?;
	match chan.recv_with_fds(&mut [0; 16], &mut FdSet::new()) {
		Err(Error::TooManyDescriptors { declared: 9 }) => Ok(()),
		other => bail!("expected a descriptor count violation, got {other:?}"),
	}
}

pub(super) fn empty_message() -> TestResult {
	let (mut raw, chan) = raw_pair()?;
	raw.write_all(&header(0, 1)).context("raw write failed")?;
	match chan.recv_with_fds(&mut [0; 16], &mut FdSet::new()) {
		Err(Error::EmptyMessage) => Ok(()),
		other => bail!("expected an empty message to be rejected, got {other:?}"),
	}
}

pub(super) fn incomplete() -> TestResult {
	let (mut raw, chan) = raw_pair()?;
	let mut msg = header(16, 0).to_vec();
	msg.extend_from_slice(b"12345");
	raw.write_all(&msg).context("raw write failed")?;
	drop(raw);
	match chan.recv(&mut [0; 32]) {
		Err(e @ Error::Incomplete { expected: 16, received: 5 }) => {
			ensure!(!e.is_closed(), "a cut-off body must not look like a clean disconnect");
		}
		other => bail!("expected a cut-off body, got {other:?}"),
	}

	let (mut raw, chan) = raw_pair()?;
	raw.write_all(&header(16, 0)[..3]).context("raw write failed")?;
	drop(raw);
	match chan.recv(&mut [0; 32]) {
		Err(e @ Error::Incomplete { expected: 8, received: 3 }) => {
			ensure!(!e.is_closed(), "a cut-off header must not look like a clean disconnect");
		}
		other => bail!("expected a cut-off header, got {other:?}"),
	}
	Ok(())
}
