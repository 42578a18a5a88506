use catp::{ConnectOptions, DrawingMode, Printer};
use image::{Rgba, RgbaImage};

fn main() {
    env_logger::init();
    let addr = std::env::args().nth(1).expect("usage: pattern AA:BB:CC:DD:EE:FF");
    let opts = ConnectOptions {
        mode: DrawingMode::Image,
        ..ConnectOptions::default()
    };
    let mut printer = Printer::connect_bluetooth(&addr, &opts).expect("no printer found");

    let img = RgbaImage::from_fn(384, 384, |x, y| {
        if (x / 24 + y / 24) % 2 == 0 {
            Rgba([0, 0, 0, 0xff])
        } else {
            Rgba([0xff, 0xff, 0xff, 0xff])
        }
    });

    printer
        .print_image(&img)
        .expect("failed to print image");
}
