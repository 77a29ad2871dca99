//! Thin wrappers over the `libc` calls the reactor relies on.

use std::io;
use std::os::fd::RawFd;

/// Returns the number of bytes queued for reading on `fd`.
pub(crate) fn bytes_available(fd: RawFd) -> io::Result<usize> {
    let mut available: libc::c_int = 0;
    // SAFETY: FIONREAD writes a single `c_int` through the supplied pointer,
    // which refers to a live local.
    let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &raw mut available) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(usize::try_from(available).unwrap_or(0))
}

/// Calls `poll(2)` over `fds`, returning the number of ready descriptors.
pub(crate) fn poll(fds: &mut [libc::pollfd], timeout_ms: libc::c_int) -> io::Result<usize> {
    let count = libc::nfds_t::try_from(fds.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many descriptors"))?;
    // SAFETY: the pointer and length describe the caller's slice, which stays
    // borrowed for the duration of the call.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), count, timeout_ms) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(usize::try_from(rc).unwrap_or(0))
}

/// Blocks until `fd` accepts more output or reports a hang-up or error.
///
/// The caller retries its write afterwards and observes any failure there.
pub(crate) fn wait_writable(fd: RawFd) -> io::Result<()> {
    let mut fds = [libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    }];
    loop {
        match poll(&mut fds, -1) {
            Ok(_) => return Ok(()),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}
