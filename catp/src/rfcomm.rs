use std::{
	fs::File,
	io::{self, Write},
	mem,
	os::fd::{AsRawFd, FromRawFd, OwnedFd},
};

use crate::{BdAddr, Backend};

/// The printers listen for serial connections on channel 1.
pub const DEFAULT_CHANNEL: u8 = 1;

// <bluetooth/bluetooth.h>, <bluetooth/rfcomm.h>
const BTPROTO_RFCOMM: libc::c_int = 3;

#[repr(C)]
struct SockaddrRc {
	rc_family: libc::sa_family_t,
	rc_bdaddr: [u8; 6],
	rc_channel: u8,
}

/// A Bluetooth RFCOMM socket backend for [`Printer`](crate::Printer).
pub struct RfcommBackend {
	addr: BdAddr,
	sock: File,
}

impl RfcommBackend {
	/// Connect to the printer at `addr`.
	pub fn connect(addr: BdAddr, channel: u8) -> io::Result<Self> {
		let fd = unsafe {
			libc::socket(libc::AF_BLUETOOTH, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, BTPROTO_RFCOMM)
		};
		if fd < 0 {
			return Err(io::Error::last_os_error());
		}
		// SAFETY: fd was just returned by socket() and is owned by nobody else
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };

		let sa = SockaddrRc {
			rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
			rc_bdaddr: addr.bytes(),
			rc_channel: channel,
		};
		log::debug!("connecting to {addr} on RFCOMM channel {channel}");
		let ret = unsafe {
			libc::connect(
				fd.as_raw_fd(),
				&sa as *const SockaddrRc as *const libc::sockaddr,
				mem::size_of::<SockaddrRc>() as libc::socklen_t,
			)
		};
		if ret < 0 {
			return Err(io::Error::last_os_error());
		}

		log::info!("connected to {addr}");
		Ok(Self {
			addr,
			sock: File::from(fd),
		})
	}

	pub fn addr(&self) -> BdAddr {
		self.addr
	}
}

impl Backend for RfcommBackend {
	fn send(&mut self, buf: &[u8]) -> io::Result<()> {
		self.sock.write_all(buf)
	}
}
