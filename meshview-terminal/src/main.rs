/// meshview terminal previewer
///
/// Usage: meshview-terminal <asset.stl|asset.gltf|asset.glb> [config.json]
///
/// Controls:
///   - WASD / Arrow Keys / mouse drag: Orbit the camera
///   - +/- / mouse wheel: Zoom
///   - Q/ESC: Quit
use std::env;
use std::fs;
use std::io;

use log::info;
use meshview_core::{FileLoader, SceneConfig};
use meshview_terminal::{TerminalApp, TERMINAL_CONTAINER};

fn load_config(asset: &str, config_path: Option<&String>) -> io::Result<SceneConfig> {
    let Some(path) = config_path else {
        return Ok(SceneConfig::new(TERMINAL_CONTAINER, 1.0, asset));
    };
    let text = fs::read_to_string(path)?;
    let mut config = SceneConfig::from_json(&text)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", path, e)))?;
    config.asset_path = asset.to_string();
    Ok(config)
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let Some(asset) = args.get(1) else {
        eprintln!("Usage: {} <asset.stl|asset.gltf|asset.glb> [config.json]", args[0]);
        std::process::exit(2);
    };

    let config = load_config(asset, args.get(2))?;
    info!("previewing {}", config.asset_path);

    let mut app = TerminalApp::new(config, &FileLoader::new())?;
    app.run()
}
