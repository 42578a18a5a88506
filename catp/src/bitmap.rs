use std::fmt::{self, Debug, Formatter};

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::frame::MAX_PAYLOAD;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitmapError {
	#[error("raster is {0}px wide, rows would need {1} bytes (max {max})", max = MAX_PAYLOAD)]
	TooWide(u32, usize),
}

/// The widest raster whose rows still fit in one frame.
pub const MAX_WIDTH: u32 = (MAX_PAYLOAD * 8) as u32;

/// Number of bytes a row of `width` pixels packs into.
pub fn row_len(width: u32) -> usize {
	(width as usize).div_ceil(8)
}

/// Whether the printer should burn this pixel: opaque and dark in every channel.
pub fn is_painted(&Rgba([r, g, b, a]): &Rgba<u8>) -> bool {
	r < 0x80 && g < 0x80 && b < 0x80 && a > 0x80
}

/// Pack one raster row.
///
/// Pixel `x` lands in byte `x / 8`, bit `x % 8`: the first pixel of each group is the
/// least significant bit. Unused bits of a partial last byte stay zero.
fn pack_row(img: &RgbaImage, y: u32) -> Vec<u8> {
	let mut row = vec![0u8; row_len(img.width())];
	for x in 0..img.width() {
		if is_painted(img.get_pixel(x, y)) {
			row[x as usize / 8] |= 1 << (x % 8);
		}
	}
	row
}

/// Pack every row of `img`, top to bottom, without a width check.
pub fn encode_rows(img: &RgbaImage) -> Vec<Vec<u8>> {
	(0..img.height())
		.map(|y| pack_row(img, y))
		.collect()
}

/// A monochrome raster, packed into rows the printer can draw.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
	width: u32,
	rows: Vec<Vec<u8>>,
}

impl Bitmap {
	/// Threshold and pack `img`.
	///
	/// Fails if a row would not fit into a single [`Command::DrawBitmap`](crate::Command::DrawBitmap) frame.
	pub fn encode(img: &RgbaImage) -> Result<Self, BitmapError> {
		let width = img.width();
		if width > MAX_WIDTH {
			return Err(BitmapError::TooWide(width, row_len(width)));
		}

		Ok(Self {
			width,
			rows: encode_rows(img),
		})
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> usize {
		self.rows.len()
	}

	pub fn row(&self, y: usize) -> Option<&[u8]> {
		self.rows.get(y).map(Vec::as_slice)
	}

	pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> {
		self.rows.iter().map(Vec::as_slice)
	}

	pub fn get(&self, x: u32, y: usize) -> Option<bool> {
		if x >= self.width {
			return None;
		}

		let b = self.rows.get(y)?[x as usize / 8];
		Some(b & (1 << (x % 8)) != 0)
	}
}

impl Debug for Bitmap {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f
			.debug_struct("Bitmap")
			.field("width", &self.width())
			.field("height", &self.height())
			.finish()
	}
}
