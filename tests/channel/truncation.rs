//! Messages that do not fit what the receiver offered. Descriptor leaks are observed through
//! pipes: once every copy of a write end is closed, the read end reports end of file.

use crate::{tests::util::*, Channel, Error, FdSet, Mode, Truncation};
use color_eyre::eyre::{bail, ensure, WrapErr};
use std::os::fd::{AsFd, BorrowedFd};

fn write_ends(pipes: &[Pipe]) -> Vec<BorrowedFd<'_>> {
	pipes.iter().map(|p| p.write.as_fd()).collect()
}
/// Drops the test's own write ends and checks that no other copy survived.
fn ensure_all_closed(pipes: Vec<Pipe>) -> TestResult {
	let readers: Vec<_> = pipes.into_iter().map(|p| p.read).collect();
	for (i, read) in readers.iter().enumerate() {
		ensure!(writers_gone(read)?, "descriptor #{i} leaked");
	}
	Ok(())
}

pub(super) fn oversize(mode: Mode) -> TestResult {
	let (a, b) = Channel::pair_with(mode).context("socket pair creation failed")?;
	a.send(&[0x55; 128]).context("send failed")?;
	let mut buf = [0xAA; 64];
	match (mode, b.recv(&mut buf)) {
		(Mode::FramedStream, Err(Error::Oversize { declared: 128, capacity: 64 })) => {
			ensure!(buf.iter().all(|&x| x == 0xAA), "buffer written to by a rejected receive");
		}
		(Mode::BoundaryPreserving, Err(Error::Truncated(t))) => {
			ensure!(t.payload, "payload truncation not reported");
		}
		(_, other) => bail!("expected an oversize message to be rejected, got {other:?}"),
	}
	Ok(())
}

/// More descriptors arrive than the receiver has room for: the surplus is closed and the rest
/// handed over.
pub(super) fn clamp_to_room(mode: Mode) -> TestResult {
	let (a, b) = Channel::pair_with(mode).context("socket pair creation failed")?;
	let pipes = Pipe::pipes(2)?;
	a.send_with_fds(b"two", &write_ends(&pipes)).context("send failed")?;

	let mut fds = FdSet::with_limit(1);
	let rs = b.recv_with_fds(&mut [0; 16], &mut fds).context("receive failed")?;
	ensure_eq!((rs.main, rs.descriptors), (3, 1));
	ensure_eq!(fds.len(), 1);

	let (first, second) = {
		let mut it = pipes.into_iter();
		(it.next().unwrap(), it.next().unwrap())
	};
	drop((first.write, second.write));
	ensure!(!writers_gone(&first.read)?, "kept descriptor was closed");
	ensure!(writers_gone(&second.read)?, "surplus descriptor leaked");
	fds.clear();
	ensure!(writers_gone(&first.read)?, "FdSet::clear() did not close");
	Ok(())
}

/// A receiver with no room for descriptors still gets the message. The descriptors are closed,
/// whichever way the receive was asked for.
pub(super) fn no_room_closes_descriptors(mode: Mode) -> TestResult {
	let (a, b) = Channel::pair_with(mode).context("socket pair creation failed")?;

	let pipes = Pipe::pipes(2)?;
	a.send_with_fds(b"PING", &write_ends(&pipes)).context("send failed")?;
	ensure_eq!(b.recv(&mut [0; 64]).context("recv() failed")?, 4);
	ensure_all_closed(pipes).context("after recv()")?;

	let pipes = Pipe::pipes(2)?;
	a.send_with_fds(b"PING", &write_ends(&pipes)).context("send failed")?;
	let mut exact = [0; 4];
	b.recv_exact(&mut exact).context("recv_exact() failed")?;
	ensure_eq!(&exact, b"PING");
	ensure_all_closed(pipes).context("after recv_exact()")?;

	let pipes = Pipe::pipes(2)?;
	a.send_with_fds(b"PING", &write_ends(&pipes)).context("send failed")?;
	let mut fds = FdSet::with_limit(0);
	let rs = b.recv_with_fds(&mut [0; 64], &mut fds).context("recv_with_fds() failed")?;
	ensure_eq!((rs.main, rs.descriptors), (4, 0));
	ensure!(fds.is_empty(), "descriptor stored in a set without room");
	ensure_all_closed(pipes).context("after recv_with_fds() with no room")?;
	Ok(())
}

/// The payload does not fit, for every descriptor count: every descriptor that came along is
/// closed.
pub(super) fn seqpacket_closes_descriptors() -> TestResult {
	let (a, b) = Channel::pair_with(Mode::BoundaryPreserving).context("socket pair creation failed")?;
	for n in 1..=crate::MAX_FD_COUNT {
		let pipes = Pipe::pipes(n)?;
		a.send_with_fds(&[7; 128], &write_ends(&pipes)).context("send failed")?;
		let mut fds = FdSet::new();
		match b.recv_with_fds(&mut [0; 16], &mut fds) {
			Err(Error::Truncated(Truncation { payload: true, .. })) => {}
			other => bail!("expected payload truncation with {n} descriptors, got {other:?}"),
		}
		ensure!(fds.is_empty(), "descriptors handed out despite truncation");
		ensure_all_closed(pipes).with_context(|| format!("with {n} descriptors"))?;
	}
	Ok(())
}
