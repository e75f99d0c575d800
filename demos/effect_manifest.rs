use compograph::Engine;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let engine = Engine::new();
    let manifest = engine.effect_manifest();
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}
