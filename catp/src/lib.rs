use std::{
	io,
	sync::{atomic::{AtomicBool, Ordering}, Arc},
	time::Duration,
};

use image::RgbaImage;
use thiserror::Error;

macro_rules! backends {
	[$($(# [$($m:tt)*])? $mod:ident :: $name:ident),* $(,)?] => {
		$(
			$(# [$($m)*])*
			mod $mod;
			$(# [$($m)*])*
			pub use crate::$mod::$name;
		)*
	};
}

backends! [
	#[cfg(all(feature = "bluetooth", target_os = "linux"))]
	rfcomm::RfcommBackend,
	#[cfg(feature = "file")]
	file::FileBackend,
];

mod addr;
pub mod bitmap;
pub mod crc;
pub mod frame;
pub mod text;

pub use crate::{
	addr::{AddrError, BdAddr},
	bitmap::{Bitmap, BitmapError},
	frame::{Command, Frame, FrameError},
	text::{RasterizeError, Rasterizer, TextOptions},
};
#[cfg(feature = "text")]
pub use crate::text::CosmicRasterizer;

#[derive(Debug, Error)]
pub enum Error {
	#[error("cannot connect to {target}")]
	Connection {
		target: String,
		#[source]
		source: io::Error,
	},

	#[error("failed to rasterize text")]
	Rasterization(#[from] RasterizeError),

	#[error(transparent)]
	Frame(#[from] FrameError),

	#[error(transparent)]
	Bitmap(#[from] BitmapError),

	#[error("failed to send to printer")]
	Transmission(#[source] io::Error),

	#[error("invalid {0}: {1}")]
	InvalidSetting(&'static str, u8),

	#[error(transparent)]
	Address(#[from] AddrError),

	#[error("printing was cancelled")]
	Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Byte stream to the printer.
pub trait Backend {
	/// Send all of `buf` to the printer.
	fn send(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Value of the [`Command::DrawingMode`] command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DrawingMode {
	Image = 0,
	#[default]
	Text = 1,
}

/// Device configuration, sent once by [`Printer::connect()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
	/// Print head energy, `1..=255`. Higher is darker.
	pub power: u8,

	/// Print quality, `1..=5`.
	pub quality: u8,

	pub mode: DrawingMode,
}

impl ConnectOptions {
	fn validate(&self) -> Result<()> {
		if self.power == 0 {
			return Err(Error::InvalidSetting("power", self.power));
		}
		if !(1..=5).contains(&self.quality) {
			return Err(Error::InvalidSetting("quality", self.quality));
		}
		Ok(())
	}
}

impl Default for ConnectOptions {
	fn default() -> Self {
		Self {
			power: 0xff,
			quality: 3,
			mode: DrawingMode::Text,
		}
	}
}

/// Stops a running print between two rows, see [`Printer::cancel_token()`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	fn reset(&self) {
		self.0.store(false, Ordering::SeqCst);
	}

	fn take(&self) -> bool {
		self.0.swap(false, Ordering::SeqCst)
	}
}

/// A connected cat printer.
pub struct Printer {
	backend: Box<dyn Backend>,
	settle: Duration,
	cancel: CancelToken,
}

impl Printer {
	/// Steps fed after a print, enough to tear off the receipt.
	pub const EJECT_STEPS: u8 = 0x50;

	/// Pause after each row, to give the print head some time.
	pub const SETTLE_INTERVAL: Duration = Duration::from_millis(4);

	/// Take ownership of an open connection and configure the device.
	///
	/// Sends [`Command::SetEnergy`], [`Command::SetQuality`] and [`Command::DrawingMode`],
	/// in this order. The printer does not acknowledge them.
	pub fn connect(backend: impl Backend + 'static, opts: &ConnectOptions) -> Result<Self> {
		opts.validate()?;

		let mut printer = Self {
			backend: Box::new(backend),
			settle: Self::SETTLE_INTERVAL,
			cancel: CancelToken::default(),
		};

		log::debug!("configuring printer: {opts:?}");
		printer.send_command(Command::SetEnergy, &[opts.power])?;
		printer.send_command(Command::SetQuality, &[opts.quality])?;
		printer.send_command(Command::DrawingMode, &[opts.mode as u8])?;
		Ok(printer)
	}

	/// Connect to a printer over Bluetooth, `addr` is e.g. `"AA:BB:CC:DD:EE:FF"`.
	#[cfg(all(feature = "bluetooth", target_os = "linux"))]
	pub fn connect_bluetooth(addr: &str, opts: &ConnectOptions) -> Result<Self> {
		let addr: BdAddr = addr.parse()?;
		let backend = RfcommBackend::connect(addr, rfcomm::DEFAULT_CHANNEL)
			.map_err(|source| Error::Connection { target: addr.to_string(), source })?;
		Self::connect(backend, opts)
	}

	/// Connect to a printer through a device file, like `/dev/rfcomm0`.
	#[cfg(feature = "file")]
	pub fn connect_device(path: &std::path::Path, opts: &ConnectOptions) -> Result<Self> {
		let backend = FileBackend::open(path)
			.map_err(|source| Error::Connection { target: path.display().to_string(), source })?;
		Self::connect(backend, opts)
	}

	/// Change the pause between rows, [`Printer::SETTLE_INTERVAL`] by default.
	pub fn set_settle_interval(&mut self, settle: Duration) {
		self.settle = settle;
	}

	/// A handle to cancel a running print, from any thread.
	///
	/// Every print clears the token when it starts, so a request made while no
	/// print is running has no effect. Cancellation only happens between rows,
	/// so the device is always left at a frame boundary and can be sent
	/// [`Printer::eject()`] afterwards.
	pub fn cancel_token(&self) -> CancelToken {
		self.cancel.clone()
	}

	/// Give back the connection.
	pub fn into_backend(self) -> Box<dyn Backend> {
		self.backend
	}

	/// Send a single command.
	pub fn send_command(&mut self, command: Command, payload: &[u8]) -> Result<()> {
		let frame = Frame::encode(command, payload)?;
		log::trace!("send({command:?}, {}{payload:x?});", payload.len());
		self.backend
			.send(frame.as_bytes())
			.map_err(Error::Transmission)
	}

	/// Push out `steps` rows of paper.
	pub fn feed(&mut self, steps: u8) -> Result<()> {
		self.send_command(Command::FeedPaper, &[steps])
	}

	/// Pull back `steps` rows of paper.
	pub fn retract(&mut self, steps: u8) -> Result<()> {
		self.send_command(Command::RetractPaper, &[steps])
	}

	/// Feed enough paper to tear off what was printed.
	pub fn eject(&mut self) -> Result<()> {
		self.feed(Self::EJECT_STEPS)
	}

	/// Print text, one raster per line.
	///
	/// Every line is rendered `16 * chars` pixels wide and [`TextOptions::font_size`] pixels high,
	/// so lines longer than the paper (384px) get cut off by the printer.
	///
	/// # Errors
	/// Lines too wide for a single frame are rejected before anything is sent.
	/// A rasterizer failure aborts the print, lines before it have already been printed.
	pub fn print_text(&mut self, text: &str, opts: &TextOptions, mut rasterizer: impl Rasterizer) -> Result<()> {
		self.cancel.reset();

		let lines: Vec<&str> = text.split('\n').collect();
		for line in &lines {
			let (width, _) = opts.line_size(line);
			if width > bitmap::MAX_WIDTH {
				return Err(BitmapError::TooWide(width, bitmap::row_len(width)).into());
			}
		}

		for (i, line) in lines.into_iter().enumerate() {
			let (width, height) = opts.line_size(line);
			let img = rasterizer.rasterize(line, opts, width, height)?;
			log::debug!("line {i}: {}x{} {line:?}", img.width(), img.height());
			self.draw(&Bitmap::encode(&img)?)?;
		}
		self.eject()
	}

	/// Print an image, thresholded to black and white, see [`bitmap::is_painted()`].
	pub fn print_image(&mut self, img: &RgbaImage) -> Result<()> {
		self.cancel.reset();
		let bitmap = Bitmap::encode(img)?;
		log::debug!("printing {}x{} image", bitmap.width(), bitmap.height());
		self.draw(&bitmap)?;
		self.eject()
	}

	/// Draw every row, each followed by an empty feed and the settle interval.
	fn draw(&mut self, bitmap: &Bitmap) -> Result<()> {
		for (y, row) in bitmap.rows().enumerate() {
			if self.cancel.take() {
				log::warn!("print cancelled after {y} of {} rows", bitmap.height());
				return Err(Error::Cancelled);
			}

			self.send_command(Command::DrawBitmap, row)?;
			self.feed(0x00)?;
			if !self.settle.is_zero() {
				std::thread::sleep(self.settle);
			}
		}
		Ok(())
	}
}
