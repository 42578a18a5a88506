use std::{io, path::PathBuf};

use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterizeError {
	#[error("cannot load font {}", .0.display())]
	Font(PathBuf, #[source] io::Error),

	#[error("no usable font face in {}", .0.display())]
	NoFace(PathBuf),

	#[error("{0}")]
	Other(String),
}

/// Font settings for [`Printer::print_text()`](crate::Printer::print_text).
#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
	/// Path to a TrueType/OpenType font file.
	pub font_path: PathBuf,

	/// Font size in pixels. This is also the height of every printed line.
	pub font_size: u32,
}

impl TextOptions {
	pub fn new(font_path: impl Into<PathBuf>, font_size: u32) -> Self {
		Self {
			font_path: font_path.into(),
			font_size,
		}
	}

	/// Raster size used for a line: 16px per character, one font size high.
	/// This is a fixed heuristic, glyphs are not measured.
	pub fn line_size(&self, line: &str) -> (u32, u32) {
		let chars = line.chars().count() as u32;
		(chars.saturating_mul(16), self.font_size)
	}
}

impl Default for TextOptions {
	fn default() -> Self {
		Self::new("./media/default.ttf", 24)
	}
}

/// Turns a line of text into pixels.
///
/// The returned image must be exactly `width` x `height`,
/// with dark opaque pixels where ink should go.
pub trait Rasterizer {
	fn rasterize(&mut self, text: &str, opts: &TextOptions, width: u32, height: u32) -> Result<RgbaImage, RasterizeError>;
}

impl<R: Rasterizer + ?Sized> Rasterizer for &mut R {
	fn rasterize(&mut self, text: &str, opts: &TextOptions, width: u32, height: u32) -> Result<RgbaImage, RasterizeError> {
		(**self).rasterize(text, opts, width, height)
	}
}

#[cfg(feature = "text")]
pub use self::cosmic::CosmicRasterizer;

#[cfg(feature = "text")]
mod cosmic {
	use std::path::{Path, PathBuf};

	use cosmic_text::{fontdb, Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache};
	use image::{Rgba, RgbaImage};

	use super::{RasterizeError, Rasterizer, TextOptions};

	struct LoadedFont {
		path: PathBuf,
		family: String,
		font_system: FontSystem,
	}

	/// A [`Rasterizer`] using [cosmic-text](https://docs.rs/cosmic-text).
	///
	/// Only the font file given in [`TextOptions`] is loaded, system fonts are never consulted.
	/// The last font is kept around, so printing many lines with the same font is cheap.
	pub struct CosmicRasterizer {
		font: Option<LoadedFont>,
		cache: SwashCache,
	}

	impl CosmicRasterizer {
		pub fn new() -> Self {
			Self {
				font: None,
				cache: SwashCache::new(),
			}
		}

		fn load<'a>(slot: &'a mut Option<LoadedFont>, path: &Path) -> Result<&'a mut LoadedFont, RasterizeError> {
			let font = match slot.take() {
				Some(font) if font.path == path => font,
				_ => LoadedFont::open(path)?,
			};
			Ok(slot.insert(font))
		}
	}

	impl LoadedFont {
		fn open(path: &Path) -> Result<Self, RasterizeError> {
			log::debug!("loading font {}", path.display());
			let mut db = fontdb::Database::new();
			db
				.load_font_file(path)
				.map_err(|e| RasterizeError::Font(path.into(), e))?;

			let family = db
				.faces()
				.find_map(|face| face.families.first())
				.map(|(name, _)| name.clone())
				.ok_or_else(|| RasterizeError::NoFace(path.into()))?;
			log::debug!("using font family {family:?}");

			Ok(Self {
				path: path.into(),
				family,
				font_system: FontSystem::new_with_locale_and_db("en-US".into(), db),
			})
		}
	}

	impl Default for CosmicRasterizer {
		fn default() -> Self {
			Self::new()
		}
	}

	impl Rasterizer for CosmicRasterizer {
		fn rasterize(&mut self, text: &str, opts: &TextOptions, width: u32, height: u32) -> Result<RgbaImage, RasterizeError> {
			let font = Self::load(&mut self.font, &opts.font_path)?;
			let mut img = RgbaImage::new(width, height);
			if width == 0 || height == 0 || text.is_empty() {
				return Ok(img);
			}

			let size = opts.font_size as f32;
			let metrics = Metrics::new(size, size);
			let mut buffer = Buffer::new(&mut font.font_system, metrics);
			let mut buffer = buffer.borrow_with(&mut font.font_system);
			buffer.set_size(Some(width as f32), Some(height as f32));

			let attrs = Attrs::new().family(Family::Name(&font.family));
			buffer.set_text(text, attrs, Shaping::Advanced);
			buffer.shape_until_scroll(true);

			buffer.draw(&mut self.cache, Color::rgb(0, 0, 0), |x, y, w, h, color| {
				let a = color.a();
				if x < 0 || y < 0 || a == 0 {
					return;
				}

				let (x, y) = (x as u32, y as u32);
				for py in y..y.saturating_add(h).min(height) {
					for px in x..x.saturating_add(w).min(width) {
						img.put_pixel(px, py, Rgba([color.r(), color.g(), color.b(), a]));
					}
				}
			});

			Ok(img)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn line_size_is_sixteen_per_char() {
		let opts = TextOptions::new("font.ttf", 30);
		assert_eq!(opts.line_size("hello"), (80, 30));
		assert_eq!(opts.line_size(""), (0, 30));
		// characters, not bytes
		assert_eq!(opts.line_size("héllo"), (80, 30));
	}

	#[cfg(feature = "text")]
	#[test]
	fn cosmic_missing_font() {
		let mut r = CosmicRasterizer::new();
		let opts = TextOptions::new("/nonexistent/font.ttf", 24);
		let err = r.rasterize("hi", &opts, 32, 24).unwrap_err();
		assert!(matches!(err, RasterizeError::Font(..)));
	}

	/// Any Latin font installed on this machine, preferring common sans faces.
	#[cfg(feature = "text")]
	fn system_font() -> Option<PathBuf> {
		use cosmic_text::fontdb::{Database, Source};

		let mut db = Database::new();
		db.load_system_fonts();
		let files: Vec<_> = db
			.faces()
			.filter_map(|face| match &face.source {
				Source::File(path) => Some((face, path.clone())),
				_ => None,
			})
			.collect();

		let preferred = ["DejaVu Sans", "Liberation Sans", "Noto Sans", "FreeSans"];
		preferred
			.iter()
			.find_map(|want| {
				files
					.iter()
					.find(|(face, _)| face.families.iter().any(|(name, _)| name == want))
			})
			.or_else(|| files.first())
			.map(|(_, path)| path.clone())
	}

	#[cfg(feature = "text")]
	#[test]
	fn cosmic_draws_text() {
		let Some(font) = system_font() else {
			eprintln!("no system font found, skipping");
			return;
		};

		let mut r = CosmicRasterizer::new();
		let opts = TextOptions::new(&font, 24);
		let (width, height) = opts.line_size("Hi");
		let img = r.rasterize("Hi", &opts, width, height).unwrap();
		assert_eq!(img.dimensions(), (32, 24));
		assert!(img.pixels().any(crate::bitmap::is_painted), "nothing drawn with {}", font.display());

		// same font again, blank input still gets its size
		let img = r.rasterize("", &opts, 0, 24).unwrap();
		assert_eq!(img.dimensions(), (0, 24));
		let img = r.rasterize("  ", &opts, 32, 24).unwrap();
		assert!(!img.pixels().any(crate::bitmap::is_painted));
	}
}
