use std::path::Path;

use prism::{PrismApp, RendererConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RendererConfig::load_or_default(Path::new(RendererConfig::FILE_NAME));
    PrismApp::new(config)?.run()
}
