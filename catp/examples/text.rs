use catp::{ConnectOptions, CosmicRasterizer, Printer, TextOptions};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut args = std::env::args().skip(1);
    let (Some(addr), Some(font)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: text AA:BB:CC:DD:EE:FF FONT.ttf");
    };

    let mut printer = Printer::connect_bluetooth(&addr, &ConnectOptions::default())?;
    printer.print_text(
        "Hello World\nThis is a sample\nreceipt.",
        &TextOptions::new(font, 24),
        CosmicRasterizer::new(),
    )?;
    Ok(())
}
