/// Example: Parse an STL file and preview it in the terminal
///
/// Usage: cargo run --example load_stl -- path/to/file.stl
///
/// Without an argument a cube is written to a temporary file and shown with
/// the axes helper and auto-rotation enabled.
use std::env;
use std::fs;
use std::io;

use meshview_core::{stl, FileLoader, Mesh, SceneConfig};
use meshview_terminal::{TerminalApp, TERMINAL_CONTAINER};

/// Binary STL for a mesh
fn encode_stl(mesh: &Mesh) -> Vec<u8> {
    let mut data = vec![0u8; 80];
    data.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());
    for triangle in &mesh.triangles {
        let normal = triangle.calculate_normal();
        for value in [normal.x, normal.y, normal.z] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        for vertex in &triangle.vertices {
            for value in [vertex.position.x, vertex.position.y, vertex.position.z] {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        data.extend_from_slice(&[0, 0]);
    }
    data
}

fn main() -> io::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let stl_path = match args.get(1) {
        Some(path) => path.clone(),
        None => {
            eprintln!("No STL file provided, using default cube...");
            let path = env::temp_dir().join("meshview-cube.stl");
            fs::write(&path, encode_stl(&Mesh::cube(2.0)))?;
            path.to_string_lossy().into_owned()
        }
    };

    // Parse once up front to report problems before entering the alternate screen
    let data = fs::read(&stl_path)?;
    let mesh = stl::parse_stl(&data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Failed to parse STL: {}", e)))?;
    println!("Loaded {} triangles", mesh.triangles.len());

    let mut config = SceneConfig::new(TERMINAL_CONTAINER, 1.0, stl_path);
    config.show_axes = true;
    config.controls.auto_rotate = true;

    let mut app = TerminalApp::new(config, &FileLoader::new())?;
    app.run()
}
