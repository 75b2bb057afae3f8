use std::{
    env::{var as env_var, var_os as env_var_os},
    io::{self, Write},
};

const ALL_CFGS: &[&str] = &[
    "fdchan_msghdr_iovlen_c_int",
    "fdchan_msghdr_iovlen_size_t",
    "fdchan_msghdr_controllen_socklen_t",
    "fdchan_msghdr_controllen_size_t",
    "fdchan_cmsg_cloexec",
    "fdchan_msg_nosignal",
    "fdchan_seqpacket",
];

fn main() {
    declare_cfgs();
    if is_unix() {
        let target = TargetTriplet::fetch();
        collect_socket_features(&target);
    }
}

fn is_unix() -> bool {
    env_var_os("CARGO_CFG_UNIX").is_some()
}

/// This can define the following:
/// - `msghdr`'s `msg_iovlen` type:
///     - `fdchan_msghdr_iovlen_c_int`
///     - `fdchan_msghdr_iovlen_size_t`, on Linux with GNU, Android, uClibc MIPS64, and uClibc x86-64
/// - `msghdr`'s `msg_controllen` type:
///     - `fdchan_msghdr_controllen_socklen_t`
///     - `fdchan_msghdr_controllen_size_t`, same set of targets as above
/// - `fdchan_cmsg_cloexec`: `MSG_CMSG_CLOEXEC` and `SOCK_CLOEXEC` exist, so received and created
///   descriptors get close-on-exec atomically
/// - `fdchan_msg_nosignal`: `MSG_NOSIGNAL` exists; elsewhere `SO_NOSIGPIPE` is used instead
/// - `fdchan_seqpacket`: `SOCK_SEQPACKET` works for `AF_UNIX` (it doesn't on Apple platforms)
#[rustfmt::skip]
fn collect_socket_features(target: &TargetTriplet) {
    if (target.os("linux") && target.env("gnu"))
    || (target.os("linux") && target.env("uclibc") && target.arch_any(&["x86_64", "mips64"]))
    || target.os("android") {
        ldefine(&["fdchan_msghdr_iovlen_size_t", "fdchan_msghdr_controllen_size_t"]);
    } else {
        ldefine(&["fdchan_msghdr_iovlen_c_int", "fdchan_msghdr_controllen_socklen_t"]);
    }

    if target.os_any(&["linux", "android", "freebsd"]) {
        ldefine(&["fdchan_cmsg_cloexec", "fdchan_msg_nosignal"]);
    }

    if !target.os_any(&["macos", "ios", "tvos", "watchos"]) {
        define("fdchan_seqpacket");
    }
}

fn declare_cfgs() {
    let stdout_ = io::stdout();
    let mut stdout = stdout_.lock();
    for i in ALL_CFGS {
        writeln!(stdout, "cargo:rustc-check-cfg=cfg({i})").unwrap();
    }
}

fn define(cfg: &str) {
    ldefine(&[cfg]);
}
fn ldefine(cfgs: &[&str]) {
    let stdout_ = io::stdout();
    let mut stdout = stdout_.lock();
    for i in cfgs {
        stdout.write_all(b"cargo:rustc-cfg=").unwrap();
        stdout.write_all(i.as_ref()).unwrap();
        stdout.write_all(b"\n").unwrap();
    }
}

struct TargetTriplet {
    arch: String,
    os: String,
    env: Option<String>,
}
#[rustfmt::skip]
impl TargetTriplet {
    fn fetch() -> Self {
        Self {
            arch: env_var("CARGO_CFG_TARGET_ARCH").unwrap(),
            os: env_var("CARGO_CFG_TARGET_OS").unwrap(),
            env: env_var("CARGO_CFG_TARGET_ENV").ok(),
        }
    }
    fn arch_any(&self, arches: &[&str]) -> bool { arches.iter().copied().any(|x| x == self.arch) }
    fn os(&self, os: &str) -> bool { self.os == os }
    fn os_any(&self, oses: &[&str]) -> bool { oses.iter().copied().any(|x| x == self.os) }
    fn env(&self, env: &str) -> bool { self.env.as_deref() == Some(env) }
}
