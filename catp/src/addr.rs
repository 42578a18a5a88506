use std::{fmt::{self, Debug, Display, Formatter}, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddrError {
	#[error("expected 6 colon-separated groups, got {0}")]
	Groups(usize),

	#[error("invalid hex group: {0:?}")]
	Group(String),
}

/// Bluetooth device address.
///
/// The bytes are stored the way the kernel's `sockaddr_rc` wants them,
/// i.e. in reverse order of the usual `AA:BB:CC:DD:EE:FF` notation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
	pub fn bytes(&self) -> [u8; 6] {
		self.0
	}
}

impl FromStr for BdAddr {
	type Err = AddrError;

	fn from_str(s: &str) -> Result<Self, AddrError> {
		let groups: Vec<&str> = s.trim().split(':').collect();
		if groups.len() != 6 {
			return Err(AddrError::Groups(groups.len()));
		}

		let mut addr = [0u8; 6];
		for (i, group) in groups.into_iter().enumerate() {
			// from_str_radix() would accept a leading '+'
			if group.is_empty() || group.len() > 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
				return Err(AddrError::Group(group.into()));
			}
			addr[5 - i] = u8::from_str_radix(group, 16)
				.map_err(|_| AddrError::Group(group.into()))?;
		}
		Ok(Self(addr))
	}
}

impl Display for BdAddr {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let [x5, x4, x3, x2, x1, x0] = self.0;
		write!(f, "{x0:02X}:{x1:02X}:{x2:02X}:{x3:02X}:{x4:02X}:{x5:02X}")
	}
}

impl Debug for BdAddr {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		<Self as Display>::fmt(self, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_reverses_groups() {
		let addr: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
		assert_eq!(addr.bytes(), [0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa]);
	}

	#[test]
	fn display_round_trips() {
		let addr: BdAddr = "01:23:45:67:89:ab".parse().unwrap();
		assert_eq!(addr.to_string(), "01:23:45:67:89:AB");
		assert_eq!(format!("{addr:?}"), "01:23:45:67:89:AB");
	}

	#[test]
	fn short_groups() {
		let addr: BdAddr = "1:2:3:4:5:6".parse().unwrap();
		assert_eq!(addr.bytes(), [6, 5, 4, 3, 2, 1]);
	}

	#[test]
	fn rejects_malformed() {
		assert_eq!("AA:BB:CC:DD:EE".parse::<BdAddr>(), Err(AddrError::Groups(5)));
		assert_eq!("AA:BB:CC:DD:EE:FF:00".parse::<BdAddr>(), Err(AddrError::Groups(7)));
		assert_eq!("AA:BB:CC:DD:EE:GG".parse::<BdAddr>(), Err(AddrError::Group("GG".into())));
		assert_eq!("AA:BB:CC:DD:EE:100".parse::<BdAddr>(), Err(AddrError::Group("100".into())));
		assert_eq!("AA::CC:DD:EE:FF".parse::<BdAddr>(), Err(AddrError::Group("".into())));
		assert_eq!("AA:BB:CC:DD:EE:+F".parse::<BdAddr>(), Err(AddrError::Group("+F".into())));
	}
}
