use std::{
	fs::{File, OpenOptions},
	io::{self, Write},
	path::{Path, PathBuf},
};

use crate::Backend;

/// A device-file backend for [`Printer`](crate::Printer),
/// e.g. a RFCOMM tty created by `rfcomm bind 0 AA:BB:CC:DD:EE:FF`.
pub struct FileBackend {
	path: PathBuf,
	file: File,
}

impl FileBackend {
	/// Open a device file for writing.
	pub fn open(path: &Path) -> io::Result<Self> {
		let file = OpenOptions::new()
			.write(true)
			.open(path)?;
		log::info!("opened {}", path.display());
		Ok(Self {
			path: path.into(),
			file,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl Backend for FileBackend {
	fn send(&mut self, buf: &[u8]) -> io::Result<()> {
		self.file.write_all(buf)?;
		self.file.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn writes_through() {
		let path = std::env::temp_dir().join(format!("catp-file-backend-{}", std::process::id()));
		File::create(&path).unwrap();

		let mut backend = FileBackend::open(&path).unwrap();
		assert_eq!(backend.path(), path);
		backend.send(&[0x51, 0x78]).unwrap();
		backend.send(&[0xff]).unwrap();
		drop(backend);

		assert_eq!(std::fs::read(&path).unwrap(), [0x51, 0x78, 0xff]);
		std::fs::remove_file(&path).unwrap();
	}

	#[test]
	fn missing_device() {
		assert!(FileBackend::open(Path::new("/nonexistent/rfcomm0")).is_err());
	}
}
