/// `<canvas>` output surface drawn through the 2D context
use log::error;
use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, ImageData};

use meshview_core::config::RendererSettings;
use meshview_core::raster::Rasterizer;
use meshview_core::scene::Scene;
use meshview_core::{Camera, PixelEncoder, Renderer, SurfaceSize};

pub struct CanvasRenderer {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    rasterizer: Rasterizer,
    encoder: PixelEncoder,
    pixel_ratio: f64,
    rgba: Vec<u8>,
}

impl CanvasRenderer {
    /// Create a canvas and append it to `container`
    pub fn create(
        document: &Document,
        container: &Element,
        size: SurfaceSize,
        pixel_ratio: f64,
        settings: &RendererSettings,
    ) -> Result<Self, JsValue> {
        let canvas: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into()?;
        container.append_child(&canvas)?;

        let samples = if settings.antialias { 2 } else { 1 };
        let mut renderer = Self {
            canvas,
            context,
            rasterizer: Rasterizer::new(1, 1, samples),
            encoder: PixelEncoder::new(settings),
            pixel_ratio,
            rgba: Vec::new(),
        };
        renderer.set_size(size);
        Ok(renderer)
    }

    fn present(&mut self) -> Result<(), JsValue> {
        let pixels = self.rasterizer.resolve();
        self.encoder.encode_frame(&pixels, &mut self.rgba);
        let image = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(&self.rgba),
            self.rasterizer.width() as u32,
            self.rasterizer.height() as u32,
        )?;
        self.context.put_image_data(&image, 0.0, 0.0)
    }
}

impl Renderer for CanvasRenderer {
    fn set_size(&mut self, size: SurfaceSize) {
        let (width, height) = size.device_pixels(self.pixel_ratio);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        let style = self.canvas.style();
        style.set_property("width", &format!("{}px", size.width)).ok();
        style.set_property("height", &format!("{}px", size.height)).ok();
        self.rasterizer.resize(width as usize, height as usize);
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.rasterizer.render(scene, camera);
        if let Err(err) = self.present() {
            error!("failed to present frame: {:?}", err);
        }
    }

    fn release(&mut self) {
        self.canvas.remove();
    }
}
