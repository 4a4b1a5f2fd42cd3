/// Character-cell output surface for terminal rendering
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use std::cell::{Cell as StdCell, RefCell};
use std::io::Write;
use std::rc::Rc;

use meshview_core::config::RendererSettings;
use meshview_core::raster::Rasterizer;
use meshview_core::scene::Scene;
use meshview_core::{Camera, PixelEncoder, Renderer, SurfaceSize};

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Terminal cells are roughly twice as tall as they are wide; surface sizes
/// count one unit per column and two per row
pub const CELL_ASPECT: f64 = 2.0;

/// One shaded cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub character: char,
    pub rgb: [u8; 3],
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            character: ' ',
            rgb: [0, 0, 0],
        }
    }
}

/// Last rendered frame, shared between the renderer and the app that draws it
#[derive(Debug, Clone, Default)]
pub struct CharFrame {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Cell>,
}

impl CharFrame {
    pub fn draw<W: Write>(&self, writer: &mut W, top: u16) -> std::io::Result<()> {
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, top + y as u16))?;
            for cell in &self.cells[y * self.width..(y + 1) * self.width] {
                let [r, g, b] = cell.rgb;
                writer.queue(SetForegroundColor(Color::Rgb { r, g, b }))?;
                writer.queue(Print(cell.character))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Map display brightness to a ramp character
pub fn ramp_character(brightness: f32) -> char {
    let index = (brightness.clamp(0.0, 1.0) * (LUMINOSITY_RAMP.len() - 1) as f32).round() as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

/// [`Renderer`] that rasterizes into a [`CharFrame`]
pub struct TerminalRenderer {
    rasterizer: Rasterizer,
    encoder: PixelEncoder,
    frame: Rc<RefCell<CharFrame>>,
    /// Columns and rows available, updated by the host on terminal resize
    bounds: Rc<StdCell<(usize, usize)>>,
}

impl TerminalRenderer {
    pub fn new(
        size: SurfaceSize,
        settings: &RendererSettings,
        frame: Rc<RefCell<CharFrame>>,
        bounds: Rc<StdCell<(usize, usize)>>,
    ) -> Self {
        let samples = if settings.antialias { 2 } else { 1 };
        let mut renderer = Self {
            rasterizer: Rasterizer::new(1, 1, samples),
            encoder: PixelEncoder::new(settings),
            frame,
            bounds,
        };
        renderer.set_size(size);
        renderer
    }

    /// Grid dimensions for a surface size, bounded by the terminal
    pub fn cells_for(&self, size: SurfaceSize) -> (usize, usize) {
        let (max_columns, max_rows) = self.bounds.get();
        let columns = (size.width.round() as usize).clamp(1, max_columns.max(1));
        let rows = ((size.height / CELL_ASPECT).round() as usize).clamp(1, max_rows.max(1));
        (columns, rows)
    }
}

impl Renderer for TerminalRenderer {
    fn set_size(&mut self, size: SurfaceSize) {
        let (columns, rows) = self.cells_for(size);
        self.rasterizer.resize(columns, rows);
        let mut frame = self.frame.borrow_mut();
        frame.width = columns;
        frame.height = rows;
        frame.cells = vec![Cell::default(); columns * rows];
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.rasterizer.render(scene, camera);
        let pixels = self.rasterizer.resolve();
        let mut frame = self.frame.borrow_mut();
        frame.cells.clear();
        frame.cells.extend(pixels.iter().map(|&color| {
            let [r, g, b, _] = self.encoder.encode(color);
            Cell {
                character: ramp_character(self.encoder.brightness(color)),
                rgb: [r, g, b],
            }
        }));
    }

    fn release(&mut self) {
        let mut frame = self.frame.borrow_mut();
        frame.cells.fill(Cell::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::scene::{Color as SceneColor, Material, Model};
    use meshview_core::Mesh;
    use nalgebra::Point3;

    fn renderer(frame: &Rc<RefCell<CharFrame>>) -> TerminalRenderer {
        TerminalRenderer::new(
            SurfaceSize { width: 40.0, height: 40.0 },
            &RendererSettings::default(),
            Rc::clone(frame),
            Rc::new(StdCell::new((80, 24))),
        )
    }

    #[test]
    fn test_ramp_ends() {
        assert_eq!(ramp_character(0.0), ' ');
        assert_eq!(ramp_character(1.0), '@');
        assert_eq!(ramp_character(7.0), '@');
    }

    #[test]
    fn test_rows_account_for_cell_aspect() {
        let frame = Rc::new(RefCell::new(CharFrame::default()));
        let renderer = renderer(&frame);
        assert_eq!((frame.borrow().width, frame.borrow().height), (40, 20));
        assert_eq!(renderer.cells_for(SurfaceSize { width: 500.0, height: 400.0 }), (80, 24));
    }

    #[test]
    fn test_background_fills_frame() {
        let frame = Rc::new(RefCell::new(CharFrame::default()));
        let mut renderer = renderer(&frame);
        let scene = Scene::new(SceneColor::WHITE);
        renderer.render(&scene, &Camera::default());
        let frame = frame.borrow();
        assert_eq!(frame.cells.len(), 40 * 20);
        assert!(frame.cells.iter().all(|cell| cell.character == '@'));
    }

    #[test]
    fn test_mesh_is_darker_than_background() {
        let frame = Rc::new(RefCell::new(CharFrame::default()));
        let mut renderer = renderer(&frame);
        let mut scene = Scene::with_default_lighting();
        let charcoal = Material {
            color: SceneColor::from_hex(0x202020),
            specular: SceneColor::BLACK,
            shininess: 1.0,
        };
        scene.add_model(Model::from_mesh(Mesh::cube(1.0), charcoal));
        let mut camera = Camera::default();
        camera.position = Point3::new(2.0, 2.0, 2.0);
        camera.set_aspect(40.0, 40.0);
        renderer.render(&scene, &camera);

        let frame = frame.borrow();
        assert!(frame.cells.iter().any(|cell| cell.character != '@'));
    }

    #[test]
    fn test_draw_writes_every_cell() {
        let frame = CharFrame {
            width: 2,
            height: 1,
            cells: vec![Cell { character: 'x', rgb: [1, 2, 3] }; 2],
        };
        let mut out = Vec::new();
        frame.draw(&mut out, 1).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert_eq!(text.matches('x').count(), 2);
    }
}
