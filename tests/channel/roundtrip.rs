use crate::{tests::util::*, Channel, FdSet, Mode, MAX_FD_COUNT};
use color_eyre::eyre::{ensure, WrapErr};
use std::{
	fs::File,
	os::fd::{AsFd, BorrowedFd},
	thread,
};

const CAPACITY: usize = 4096;

/// Random payload sizes in `1..=CAPACITY` with `0..=MAX_FD_COUNT` descriptors, each a temporary
/// file whose content identifies it.
pub(super) fn run(mode: Mode) -> TestResult {
	let (a, b) = Channel::pair_with(mode).context("socket pair creation failed")?;
	let mut rng = Xorshift32::from_id(&format!("roundtrip {mode:?}"));
	let mut payload = vec![0; CAPACITY];
	let mut buf = vec![0; CAPACITY];

	for i in 0..iterations() {
		let len = rng.between(1, CAPACITY);
		let nfds = rng.between(0, MAX_FD_COUNT);
		rng.fill(&mut payload[..len]);
		let files = (0..nfds)
			.map(|n| tempfile_with(format!("message {i}, descriptor {n}").as_bytes()))
			.collect::<TestResult<Vec<File>>>()?;
		let borrowed: Vec<BorrowedFd<'_>> = files.iter().map(AsFd::as_fd).collect();

		a.send_with_fds(&payload[..len], &borrowed)
			.with_context(|| format!("send #{i} of {len} bytes and {nfds} descriptors failed"))?;
		let mut fds = FdSet::new();
		let rs = b
			.recv_with_fds(&mut buf, &mut fds)
			.with_context(|| format!("receive #{i} failed"))?;

		ensure_eq!((rs.main, rs.descriptors), (len, nfds), "iteration {i}");
		ensure!(buf[..len] == payload[..len], "payload mismatch in iteration {i}");
		for (n, fd) in fds.into_iter().enumerate() {
			let got = contents(&File::from(fd))?;
			ensure_eq!(got, format!("message {i}, descriptor {n}").into_bytes());
		}
	}
	Ok(())
}

/// One thread sends on a channel while another receives on it.
pub(super) fn concurrent(mode: Mode) -> TestResult {
	let (a, b) = Channel::pair_with(mode).context("socket pair creation failed")?;
	let n = iterations();
	thread::scope(|s| {
		let echo = s.spawn(|| -> TestResult {
			let mut buf = [0; 64];
			for _ in 0..n {
				let len = b.recv(&mut buf).context("echo receive failed")?;
				b.send(&buf[..len]).context("echo send failed")?;
			}
			Ok(())
		});
		let sender = s.spawn(|| -> TestResult {
			for i in 0..n {
				a.send(format!("message {i}").as_bytes()).context("send failed")?;
			}
			Ok(())
		});

		let mut buf = [0; 64];
		for i in 0..n {
			let len = a.recv(&mut buf).context("receive failed")?;
			ensure_eq!(&buf[..len], format!("message {i}").as_bytes());
		}
		sender.join().unwrap()?;
		echo.join().unwrap()
	})
}
