use anyhow::{bail, Context, Result};
use catp::{ConnectOptions, CosmicRasterizer, DrawingMode, Printer, TextOptions};
use clap::{ArgGroup, Parser};
use clap_num::maybe_hex;
use clap_verbosity::Verbosity;
use image::{
    imageops::{dither, ColorMap, FilterType},
    DynamicImage, ImageReader, Luma, RgbaImage,
};
use std::{
    io::{Cursor, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(group(ArgGroup::new("target").required(true).args(["address", "device"])))]
struct Cli {
    /// Path to the file to be printed, `-` for stdin.
    file: PathBuf,

    /// Bluetooth address of the printer, e.g. `AA:BB:CC:DD:EE:FF`.
    #[arg(short, long)]
    address: Option<String>,

    /// Path to a bound RFCOMM device, e.g. `/dev/rfcomm0`.
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Number of copies.
    #[arg(short, long, default_value_t = 1)]
    num: usize,

    /// Treat `file` as a text file.
    #[arg(short, long)]
    text: bool,

    /// Font file for `--text`.
    #[arg(short = 'F', long, default_value = "./media/default.ttf")]
    font: PathBuf,

    /// Font size for `--text`, in pixels. This is also the line height.
    #[arg(short = 'S', long, default_value_t = 24)]
    size: u32,

    /// Print head energy, `1..=255`. Higher is darker.
    #[arg(short = 'P', long, default_value_t = 0xff, value_parser = maybe_hex::<u8>)]
    power: u8,

    /// Print quality, `1..=5`.
    #[arg(short, long, default_value_t = 3)]
    quality: u8,

    /// Scale images to this width. The paper is 384 pixels wide, 0 keeps the original size.
    #[arg(short, long, default_value_t = 384)]
    width: u32,

    /// Dither images instead of cutting them off at a fixed threshold.
    #[arg(short = 'D', long)]
    dither: bool,

    /// Threshold for dithering.
    #[arg(short = 'T', long, default_value_t = 0x80, value_parser = maybe_hex::<u8>)]
    threshold: u8,

    /// Invert the printed image.
    #[arg(short, long)]
    invert: bool,

    /// Extra paper to feed after printing, in steps.
    #[arg(short, long, value_parser = maybe_hex::<u8>)]
    feed: Option<u8>,

    #[command(flatten)]
    verbose: Verbosity,
}

struct BlackWhiteMap(u8);

impl ColorMap for BlackWhiteMap {
    type Color = Luma<u8>;

    fn index_of(&self, color: &Self::Color) -> usize {
        if color.0[0] >= self.0 {
            1
        } else {
            0
        }
    }

    fn map_color(&self, color: &mut Self::Color) {
        let idx = self.index_of(color);
        *color = Luma([if idx == 0 { 0x00 } else { 0xff }]);
    }

    fn lookup(&self, index: usize) -> Option<Self::Color> {
        match index {
            0 => Some(Luma([0x00])),
            1 => Some(Luma([0xff])),
            _ => None,
        }
    }

    fn has_lookup(&self) -> bool {
        true
    }
}

fn resize(img: DynamicImage, width: u32) -> DynamicImage {
    if width == 0 || img.width() == width {
        return img;
    }

    let s = width as f32 / img.width() as f32;
    let height = (img.height() as f32 * s) as u32 + 1;
    img.resize_exact(width, height, FilterType::Gaussian)
}

fn picture(cli: &Cli, data: &[u8]) -> Result<RgbaImage> {
    log::trace!("parsing...");
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .context("cannot decode image")?;

    log::trace!("resizing...");
    let mut img = resize(img, cli.width);

    if cli.invert {
        img.invert();
    }

    if !cli.dither {
        return Ok(img.into_rgba8());
    }

    log::trace!("dithering...");
    let mut gray = img.into_luma8();
    dither(&mut gray, &BlackWhiteMap(cli.threshold));
    Ok(DynamicImage::ImageLuma8(gray).into_rgba8())
}

#[cfg(target_os = "linux")]
fn connect_bluetooth(addr: &str, opts: &ConnectOptions) -> Result<Printer> {
    Printer::connect_bluetooth(addr, opts).context("cannot connect to printer")
}

#[cfg(not(target_os = "linux"))]
fn connect_bluetooth(_addr: &str, _opts: &ConnectOptions) -> Result<Printer> {
    bail!("bluetooth is only supported on linux, use --device")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::builder()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let data = if cli.file == Path::new("-") {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        data
    } else {
        std::fs::read(&cli.file)
            .with_context(|| format!("cannot read {}", cli.file.display()))?
    };

    let opts = ConnectOptions {
        power: cli.power,
        quality: cli.quality,
        mode: if cli.text { DrawingMode::Text } else { DrawingMode::Image },
    };

    let img = if cli.text {
        None
    } else {
        Some(picture(&cli, &data)?)
    };

    let mut printer = match (&cli.address, &cli.device) {
        (Some(addr), _) => connect_bluetooth(addr, &opts)?,
        (None, Some(dev)) => Printer::connect_device(dev, &opts).context("cannot open printer device")?,
        (None, None) => bail!("either --address or --device is required"),
    };

    if let Some(img) = img {
        for i in 0..cli.num {
            log::trace!("printing copy {i}...");
            printer.print_image(&img)?;
        }
    } else {
        let text = String::from_utf8(data).context("text is not valid UTF-8")?;
        let text = text.trim_end_matches('\n');
        let font = TextOptions::new(&cli.font, cli.size);
        let mut rasterizer = CosmicRasterizer::new();
        for i in 0..cli.num {
            log::trace!("printing copy {i}...");
            printer.print_text(text, &font, &mut rasterizer)?;
        }
    }

    if let Some(steps) = cli.feed {
        log::trace!("feeding...");
        printer.feed(steps)?;
    }

    Ok(())
}
