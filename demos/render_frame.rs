use compograph::{
    Engine, FrameRGBA, HeadlessCanvas, ImageMedia, SourceOptions, TargetOptions,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let (w, h) = (64, 48);
    let mut frame = FrameRGBA::transparent(w, h);
    for y in 0..h {
        for x in 0..w {
            let i = ((y * w + x) * 4) as usize;
            frame.data[i..i + 4].copy_from_slice(&[(x * 4) as u8, (y * 5) as u8, 128, 255]);
        }
    }

    let mut engine = Engine::new();
    let canvas = HeadlessCanvas::new(w, h);
    let out = engine.target(canvas.clone(), None, TargetOptions::default())?;
    let src = engine.source(ImageMedia::loaded(frame), None, SourceOptions::default())?;
    let flip = engine.transform("flip")?;
    let fx = engine.effect("brightness-contrast")?;
    engine.set_source(flip, src)?;
    engine.connect(fx, "source", flip)?;
    engine.set_input(fx, "brightness", 1.2)?;
    engine.set_source(out, fx)?;
    engine.render()?;

    let pixels = engine.read_pixels(fx, 0, 0, w, h)?;
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "target/render_frame.png".to_owned());
    pixels.to_image()?.save(&path)?;
    println!("wrote {path} ({} draws)", canvas.device().draw_log().len());
    Ok(())
}
