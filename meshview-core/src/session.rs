/// Interactive preview bound to one host container.
///
/// [`start`] builds the scene, camera, orbit controls and output surface,
/// requests the asset from a [`MeshLoader`] and registers the frame loop,
/// resize and pointer listeners with the [`Host`]. The returned
/// [`SessionHandle`] owns every registration; [`SessionHandle::stop`] or
/// dropping the handle tears them down.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, error, info, warn};
use nalgebra::Point3;

use crate::animation::AnimationMixer;
use crate::config::{CameraPose, RendererSettings, SceneConfig};
use crate::controls::{OrbitControls, Spherical};
use crate::environment::EnvironmentMap;
use crate::error::{LoadError, SessionError};
use crate::layout::{self, SurfaceSize};
use crate::loader::{LoadProgress, MeshLoader};
use crate::projection::Camera;
use crate::render::Renderer;
use crate::scene::{embedded_camera_pose, Asset, Scene};
use crate::subscription::Subscription;

/// Axes helper length in scene units
const AXES_SIZE: f32 = 5.0;

/// Container and viewport widths measured after a resize
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeEvent {
    pub container_width: f64,
    pub viewport_width: f64,
}

/// Pointer gestures forwarded to the orbit controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    /// Movement in CSS pixels while the primary button is held
    Drag { dx: f32, dy: f32 },
    /// Wheel delta; positive moves away from the target
    Wheel { delta: f32 },
}

/// The page environment a session runs in
pub trait Host {
    /// Width of the container in CSS pixels, or `None` if it does not exist
    fn container_width(&self, container_id: &str) -> Option<f64>;

    fn viewport_width(&self) -> f64;

    /// Create the output surface and insert it into the container
    fn create_renderer(
        &self,
        container_id: &str,
        size: SurfaceSize,
        settings: &RendererSettings,
    ) -> Result<Box<dyn Renderer>, SessionError>;

    /// Append a caption next to the output surface. Ending the subscription
    /// removes it.
    fn add_caption(&self, container_id: &str, text: &str) -> Subscription;

    fn on_resize(&self, container_id: &str, callback: Box<dyn FnMut(ResizeEvent)>) -> Subscription;

    fn bind_pointer(&self, container_id: &str, callback: Box<dyn FnMut(PointerInput)>) -> Subscription;

    /// Call `callback` on every display refresh with a timestamp in milliseconds
    fn animation_loop(&self, callback: Box<dyn FnMut(f64)>) -> Subscription;
}

/// Frame counter sampled over one-second windows
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    frames: u64,
    window_frames: u32,
    window_start: Option<f64>,
    fps: f32,
}

impl FrameStats {
    pub fn record(&mut self, timestamp: f64) {
        self.frames += 1;
        self.window_frames += 1;
        let start = *self.window_start.get_or_insert(timestamp);
        let span = timestamp - start;
        if span >= 1000.0 {
            self.fps = (self.window_frames as f64 * 1000.0 / span) as f32;
            self.window_frames = 0;
            self.window_start = Some(timestamp);
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

struct SessionState {
    config: SceneConfig,
    scene: Scene,
    camera: Camera,
    controls: OrbitControls,
    renderer: Box<dyn Renderer>,
    model: Option<usize>,
    mixer: Option<AnimationMixer>,
    size: SurfaceSize,
    stats: FrameStats,
    last_tick: Option<f64>,
    running: bool,
}

impl SessionState {
    fn tick(&mut self, timestamp: f64) {
        if !self.running {
            return;
        }
        let elapsed = match self.last_tick {
            Some(previous) => ((timestamp - previous) / 1000.0).max(0.0) as f32,
            None => 0.0,
        };
        self.last_tick = Some(timestamp);

        if let (Some(mixer), Some(index)) = (self.mixer.as_mut(), self.model) {
            if let Some(model) = self.scene.models.get_mut(index) {
                mixer.update(elapsed, model);
            }
        }
        self.controls.update(&mut self.camera, elapsed);
        self.renderer.render(&self.scene, &self.camera);
        self.stats.record(timestamp);
    }

    fn resize(&mut self, event: ResizeEvent) {
        if !self.running {
            return;
        }
        let size = layout::resized(self.size, event.container_width, event.viewport_width);
        if size == self.size {
            return;
        }
        debug!(
            "{}: resized to {:.0}x{:.0}",
            self.config.container_id, size.width, size.height
        );
        self.size = size;
        self.camera.set_aspect(size.width as f32, size.height as f32);
        self.renderer.set_size(size);
    }

    fn pointer(&mut self, input: PointerInput) {
        if !self.running {
            return;
        }
        match input {
            PointerInput::Drag { dx, dy } => self.controls.drag(dx, dy, self.size.height as f32),
            PointerInput::Wheel { delta } => self.controls.zoom(delta),
        }
    }

    fn finish_load(&mut self, result: Result<Asset, LoadError>) {
        if !self.running {
            debug!(
                "{}: ignoring load completion after stop",
                self.config.container_id
            );
            return;
        }
        match result {
            Ok(asset) => self.attach(asset),
            Err(err) => error!("failed to load {}: {}", self.config.asset_path, err),
        }
    }

    fn attach(&mut self, mut asset: Asset) {
        asset.model.root = self.config.model_transform();
        let centre = asset.model.bounding_box().center();

        let embedded = if self.config.use_embedded_camera {
            asset
                .first_camera()
                .map(|(camera, world)| (camera.clone(), world))
        } else {
            None
        };

        if let Some(pose) = self.config.camera.clone() {
            self.apply_pose(&pose, centre);
        } else if let Some((camera, world)) = embedded {
            embedded_camera_pose(&camera, &world, &centre, &mut self.camera);
            self.controls.target = self.camera.target;
        } else {
            self.controls.target = centre;
        }

        let Asset {
            model, animations, ..
        } = asset;
        if !animations.is_empty() {
            info!(
                "{}: playing {} animation clip(s)",
                self.config.container_id,
                animations.len()
            );
            self.mixer = Some(AnimationMixer::play_all(animations));
        }
        info!(
            "{}: loaded {} ({} nodes, {} triangles)",
            self.config.container_id,
            self.config.asset_path,
            model.node_count(),
            model.triangle_count()
        );
        self.model = Some(self.scene.add_model(model));
    }

    fn apply_pose(&mut self, pose: &CameraPose, centre: Point3<f32>) {
        if let Some([x, y, z]) = pose.position {
            self.camera.position = Point3::new(x, y, z);
        }
        if let Some(fov) = pose.fov {
            self.camera.fov = fov.to_radians();
        }
        if let Some(near) = pose.near {
            self.camera.near = near;
        }
        if let Some(far) = pose.far {
            self.camera.far = far;
        }
        let target = pose
            .target
            .map(|[x, y, z]| Point3::new(x, y, z))
            .unwrap_or(centre);
        self.camera.target = target;
        self.controls.target = target;
    }

    fn finish_environment(&mut self, result: Result<EnvironmentMap, LoadError>) {
        if !self.running {
            return;
        }
        match result {
            Ok(map) => {
                debug!(
                    "{}: environment {}x{}",
                    self.config.container_id, map.width, map.height
                );
                self.scene.set_environment(map);
            }
            Err(err) => error!("{}: failed to load environment: {}", self.config.container_id, err),
        }
    }
}

/// Owner of a running session
pub struct SessionHandle {
    state: Rc<RefCell<SessionState>>,
    subscriptions: Vec<Subscription>,
}

impl SessionHandle {
    /// Cancel the frame loop and all listeners, then release the output
    /// surface. Later calls do nothing.
    pub fn stop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
        let mut state = self.state.borrow_mut();
        if !state.running {
            return;
        }
        state.running = false;
        state.mixer = None;
        state.renderer.release();
        info!("{}: session stopped", state.config.container_id);
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn container_id(&self) -> String {
        self.state.borrow().config.container_id.clone()
    }

    pub fn node_count(&self) -> usize {
        self.state.borrow().scene.node_count()
    }

    pub fn scene_bounds_center(&self) -> Point3<f32> {
        self.state.borrow().scene.bounding_box().center()
    }

    pub fn controls_target(&self) -> Point3<f32> {
        self.state.borrow().controls.target
    }

    /// Camera angles around the controls target
    pub fn orbit(&self) -> Spherical {
        let state = self.state.borrow();
        state.controls.spherical(&state.camera)
    }

    pub fn camera(&self) -> Camera {
        self.state.borrow().camera.clone()
    }

    pub fn size(&self) -> SurfaceSize {
        self.state.borrow().size
    }

    pub fn has_animation(&self) -> bool {
        self.state.borrow().mixer.is_some()
    }

    pub fn frames(&self) -> u64 {
        self.state.borrow().stats.frames()
    }

    pub fn fps(&self) -> f32 {
        self.state.borrow().stats.fps()
    }

    /// Forward pointer input as if it came from the host
    pub fn pointer(&self, input: PointerInput) {
        self.state.borrow_mut().pointer(input);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SessionHandle")
            .field("container_id", &state.config.container_id)
            .field("running", &state.running)
            .field("frames", &state.stats.frames())
            .finish()
    }
}

fn with_state(weak: &Weak<RefCell<SessionState>>, f: impl FnOnce(&mut SessionState)) {
    if let Some(state) = weak.upgrade() {
        f(&mut state.borrow_mut());
    }
}

/// Start a preview in `config.container_id`.
///
/// A missing container is logged and reported without touching the host.
/// The asset load and the frame loop run independently: frames render the
/// background until the asset arrives, and a failed load leaves the scene
/// as it was.
pub fn start(
    config: SceneConfig,
    host: &dyn Host,
    loader: &dyn MeshLoader,
) -> Result<SessionHandle, SessionError> {
    let container_id = config.container_id.clone();
    let Some(container_width) = host.container_width(&container_id) else {
        warn!("container '{}' not found, skipping render", container_id);
        return Err(SessionError::MissingContainer(container_id));
    };

    let size = layout::initial_size(container_width, host.viewport_width(), config.height as f64);
    debug!(
        "{}: surface {:.0}x{:.0}",
        container_id, size.width, size.height
    );

    let renderer = host
        .create_renderer(&container_id, size, &config.renderer)
        .map_err(|err| {
            error!("{}: {}", container_id, err);
            err
        })?;
    let caption = config
        .subtitle
        .as_deref()
        .filter(|text| !text.is_empty())
        .map(|subtitle| host.add_caption(&container_id, subtitle));

    let mut scene = Scene::with_default_lighting();
    if config.show_axes {
        scene.add_axes(AXES_SIZE);
    }

    let defaults = &config.camera_defaults;
    let mut camera = Camera::perspective(defaults.fov, size.aspect() as f32, defaults.near, defaults.far);
    let [x, y, z] = defaults.position;
    camera.position = Point3::new(x, y, z);
    let controls = OrbitControls::from_config(&config.controls);
    camera.target = controls.target;

    let asset_path = config.asset_path.clone();
    let environment = config.environment.as_ref().map(|source| source.url());

    let state = Rc::new(RefCell::new(SessionState {
        config,
        scene,
        camera,
        controls,
        renderer,
        model: None,
        mixer: None,
        size,
        stats: FrameStats::default(),
        last_tick: None,
        running: true,
    }));

    if let Some(url) = environment {
        let weak = Rc::downgrade(&state);
        loader.load_environment(
            &url,
            Box::new(move |result| with_state(&weak, |state| state.finish_environment(result))),
        );
    }

    let weak = Rc::downgrade(&state);
    let progress_path = asset_path.clone();
    loader.load(
        &asset_path,
        Box::new(move |progress: LoadProgress| match progress.fraction() {
            Some(fraction) => info!("{}: {:.0}% loaded", progress_path, fraction * 100.0),
            None => info!("{}: {} bytes loaded", progress_path, progress.loaded),
        }),
        Box::new(move |result| with_state(&weak, |state| state.finish_load(result))),
    );

    let mut subscriptions = Vec::with_capacity(4);
    subscriptions.extend(caption);

    let weak = Rc::downgrade(&state);
    subscriptions.push(host.on_resize(
        &container_id,
        Box::new(move |event| with_state(&weak, |state| state.resize(event))),
    ));

    let weak = Rc::downgrade(&state);
    subscriptions.push(host.bind_pointer(
        &container_id,
        Box::new(move |input| with_state(&weak, |state| state.pointer(input))),
    ));

    let weak = Rc::downgrade(&state);
    subscriptions.push(host.animation_loop(Box::new(move |timestamp| {
        with_state(&weak, |state| state.tick(timestamp))
    })));

    info!("{}: session started", container_id);
    Ok(SessionHandle {
        state,
        subscriptions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AxisLock, CameraPose, EnvironmentSource};
    use crate::geometry::Mesh;
    use crate::gltf_import;
    use crate::loader::{decode_asset, AssetCallback, EnvironmentCallback, ProgressCallback};
    use crate::scene::{Material, Model};
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::f32::consts::FRAC_PI_2;

    type Slot<T> = Rc<RefCell<Option<Box<T>>>>;

    #[derive(Default)]
    struct SurfaceLog {
        sizes: Vec<SurfaceSize>,
        renders: usize,
        released: usize,
    }

    struct FakeRenderer(Rc<RefCell<SurfaceLog>>);

    impl Renderer for FakeRenderer {
        fn set_size(&mut self, size: SurfaceSize) {
            self.0.borrow_mut().sizes.push(size);
        }

        fn render(&mut self, _scene: &Scene, _camera: &Camera) {
            self.0.borrow_mut().renders += 1;
        }

        fn release(&mut self) {
            self.0.borrow_mut().released += 1;
        }
    }

    #[derive(Default)]
    struct FakeHost {
        containers: HashMap<String, f64>,
        viewport: f64,
        mutations: Cell<usize>,
        live_listeners: Rc<Cell<usize>>,
        surface: Rc<RefCell<SurfaceLog>>,
        captions: Rc<RefCell<Vec<String>>>,
        frame: Slot<dyn FnMut(f64)>,
        resize: Slot<dyn FnMut(ResizeEvent)>,
        pointer: Slot<dyn FnMut(PointerInput)>,
    }

    impl FakeHost {
        fn with_container(id: &str, width: f64, viewport: f64) -> Self {
            let mut host = Self {
                viewport,
                ..Self::default()
            };
            host.containers.insert(id.to_string(), width);
            host
        }

        fn listen<T: ?Sized + 'static>(&self, slot: &Slot<T>, callback: Box<T>) -> Subscription {
            self.mutations.set(self.mutations.get() + 1);
            self.live_listeners.set(self.live_listeners.get() + 1);
            *slot.borrow_mut() = Some(callback);
            let slot = Rc::clone(slot);
            let live = Rc::clone(&self.live_listeners);
            Subscription::new(move || {
                slot.borrow_mut().take();
                live.set(live.get() - 1);
            })
        }

        fn frames(&self, timestamps: impl IntoIterator<Item = f64>) {
            for timestamp in timestamps {
                if let Some(callback) = self.frame.borrow_mut().as_mut() {
                    callback(timestamp);
                }
            }
        }

        fn fire_resize(&self, container_width: f64) {
            if let Some(callback) = self.resize.borrow_mut().as_mut() {
                callback(ResizeEvent {
                    container_width,
                    viewport_width: self.viewport,
                });
            }
        }

        fn fire_pointer(&self, input: PointerInput) {
            if let Some(callback) = self.pointer.borrow_mut().as_mut() {
                callback(input);
            }
        }
    }

    impl Host for FakeHost {
        fn container_width(&self, container_id: &str) -> Option<f64> {
            self.containers.get(container_id).copied()
        }

        fn viewport_width(&self) -> f64 {
            self.viewport
        }

        fn create_renderer(
            &self,
            _container_id: &str,
            size: SurfaceSize,
            _settings: &RendererSettings,
        ) -> Result<Box<dyn Renderer>, SessionError> {
            self.mutations.set(self.mutations.get() + 1);
            self.surface.borrow_mut().sizes.push(size);
            Ok(Box::new(FakeRenderer(Rc::clone(&self.surface))))
        }

        fn add_caption(&self, _container_id: &str, text: &str) -> Subscription {
            self.mutations.set(self.mutations.get() + 1);
            self.captions.borrow_mut().push(text.to_string());
            let captions = Rc::clone(&self.captions);
            let text = text.to_string();
            Subscription::new(move || captions.borrow_mut().retain(|caption| *caption != text))
        }

        fn on_resize(&self, _container_id: &str, callback: Box<dyn FnMut(ResizeEvent)>) -> Subscription {
            self.listen(&self.resize, callback)
        }

        fn bind_pointer(&self, _container_id: &str, callback: Box<dyn FnMut(PointerInput)>) -> Subscription {
            self.listen(&self.pointer, callback)
        }

        fn animation_loop(&self, callback: Box<dyn FnMut(f64)>) -> Subscription {
            self.listen(&self.frame, callback)
        }
    }

    /// Holds completions until the test delivers them
    #[derive(Default)]
    struct FakeLoader {
        requested: RefCell<Vec<String>>,
        pending: RefCell<Option<AssetCallback>>,
        environment: RefCell<Option<EnvironmentCallback>>,
    }

    impl FakeLoader {
        fn complete(&self, result: Result<Asset, LoadError>) {
            let callback = self.pending.borrow_mut().take();
            if let Some(callback) = callback {
                callback(result);
            }
        }

        fn complete_environment(&self, result: Result<EnvironmentMap, LoadError>) {
            let callback = self.environment.borrow_mut().take();
            if let Some(callback) = callback {
                callback(result);
            }
        }
    }

    impl MeshLoader for FakeLoader {
        fn load(&self, path: &str, mut on_progress: ProgressCallback, on_done: AssetCallback) {
            self.requested.borrow_mut().push(path.to_string());
            on_progress(LoadProgress {
                loaded: 0,
                total: Some(10),
            });
            *self.pending.borrow_mut() = Some(on_done);
        }

        fn load_environment(&self, url: &str, on_done: EnvironmentCallback) {
            self.requested.borrow_mut().push(url.to_string());
            *self.environment.borrow_mut() = Some(on_done);
        }
    }

    fn cube_asset() -> Asset {
        Asset::from_model(Model::from_mesh(Mesh::cube(2.0), Material::default()))
    }

    fn config() -> SceneConfig {
        SceneConfig::new("render1", 400.0, "../assets/part.stl")
    }

    fn assert_close(a: Point3<f32>, b: Point3<f32>) {
        assert!((a - b).norm() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn test_missing_container_leaves_host_untouched() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let mut config = config();
        config.container_id = "does-not-exist".to_string();

        let result = start(config, &host, &loader);
        assert!(matches!(result, Err(SessionError::MissingContainer(id)) if id == "does-not-exist"));
        assert_eq!(host.mutations.get(), 0);
        assert!(loader.requested.borrow().is_empty());
    }

    #[test]
    fn test_narrow_container_sizing() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let handle = start(config(), &host, &FakeLoader::default()).unwrap();
        assert_eq!(handle.size(), SurfaceSize { width: 500.0, height: 400.0 });
        assert!((handle.camera().aspect - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_wide_container_is_clamped_to_viewport() {
        let host = FakeHost::with_container("render1", 1500.0, 1000.0);
        let handle = start(config(), &host, &FakeLoader::default()).unwrap();
        let size = handle.size();
        assert!((size.width - 700.0).abs() < 1e-9);
        assert!((size.height - 400.0 * 700.0 / 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_controls_target_is_bounds_center() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let mut config = config();
        config.position = [3.0, -1.0, 0.5];
        config.scale = [0.5, 0.5, 0.5];
        config.rotation = [0.0, FRAC_PI_2, 0.0];
        let handle = start(config, &host, &loader).unwrap();

        loader.complete(Ok(cube_asset()));
        assert_close(handle.controls_target(), handle.scene_bounds_center());
        assert_close(handle.controls_target(), Point3::new(3.0, -1.0, 0.5));

        host.frames([0.0, 16.0]);
        assert_close(handle.camera().target, handle.scene_bounds_center());
    }

    #[test]
    fn test_load_failure_keeps_scene_and_loop() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let handle = start(config(), &host, &loader).unwrap();
        let before = handle.node_count();

        host.frames([0.0, 16.0]);
        loader.complete(Err(LoadError::UnsupportedFormat("part.obj".to_string())));
        host.frames([32.0, 48.0, 64.0]);

        assert_eq!(handle.node_count(), before);
        assert!(handle.is_running());
        assert_eq!(handle.frames(), 5);
        assert_eq!(host.surface.borrow().renders, 5);
    }

    #[test]
    fn test_loop_runs_before_load_completes() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let handle = start(config(), &host, &loader).unwrap();
        host.frames([0.0, 16.0, 32.0]);
        assert_eq!(handle.frames(), 3);

        let before = handle.node_count();
        loader.complete(Ok(cube_asset()));
        assert_eq!(handle.node_count(), before + 1);
    }

    #[test]
    fn test_axes_helper_counts_as_node() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let plain = start(config(), &host, &FakeLoader::default()).unwrap();
        let mut with_axes = config();
        with_axes.show_axes = true;
        let axes = start(with_axes, &host, &FakeLoader::default()).unwrap();
        assert_eq!(axes.node_count(), plain.node_count() + 1);
    }

    #[test]
    fn test_pose_override() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let mut config = config();
        config.camera = Some(CameraPose {
            position: Some([0.0, 5.0, 10.0]),
            target: Some([1.0, 2.0, 3.0]),
            fov: Some(40.0),
            near: Some(0.5),
            far: Some(200.0),
        });
        let handle = start(config, &host, &loader).unwrap();
        loader.complete(Ok(cube_asset()));

        let camera = handle.camera();
        assert_eq!(camera.position, Point3::new(0.0, 5.0, 10.0));
        assert!((camera.fov - 40f32.to_radians()).abs() < 1e-6);
        assert_eq!(camera.near, 0.5);
        assert_eq!(camera.far, 200.0);
        assert_eq!(handle.controls_target(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_pose_without_target_frames_bounds_center() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let mut config = config();
        config.position = [0.0, 2.0, 0.0];
        config.camera = Some(CameraPose {
            position: Some([0.0, 0.0, 8.0]),
            ..CameraPose::default()
        });
        let handle = start(config, &host, &loader).unwrap();
        loader.complete(Ok(cube_asset()));
        assert_close(handle.controls_target(), handle.scene_bounds_center());
    }

    #[test]
    fn test_embedded_camera_and_animation() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let mut config = SceneConfig::new("render1", 400.0, "part.glb");
        config.use_embedded_camera = true;
        let handle = start(config, &host, &loader).unwrap();

        let asset = decode_asset("part.glb", &gltf_import::tests::animated_triangle_glb()).unwrap();
        loader.complete(Ok(asset));

        let camera = handle.camera();
        assert_close(camera.position, Point3::new(0.0, 0.0, 3.0));
        assert!((camera.fov - 0.7).abs() < 1e-6);
        assert!(handle.has_animation());

        // the clip starts at x = 0 and reaches x = 1 after half a second
        host.frames([0.0]);
        let start_center = handle.scene_bounds_center();
        host.frames([500.0]);
        let moved = handle.scene_bounds_center();
        assert!((moved.x - start_center.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_embedded_camera_ignored_unless_requested() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let handle = start(SceneConfig::new("render1", 400.0, "part.glb"), &host, &loader).unwrap();
        let asset = decode_asset("part.glb", &gltf_import::tests::animated_triangle_glb()).unwrap();
        loader.complete(Ok(asset));

        assert_eq!(handle.camera().position, Point3::new(2.0, 2.0, 2.0));
        assert_close(handle.controls_target(), handle.scene_bounds_center());
    }

    #[test]
    fn test_resize_keeps_height() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let handle = start(config(), &host, &FakeLoader::default()).unwrap();

        host.fire_resize(800.0);
        assert_eq!(handle.size(), SurfaceSize { width: 800.0, height: 400.0 });
        assert!((handle.camera().aspect - 2.0).abs() < 1e-6);

        host.fire_resize(1300.0);
        assert_eq!(handle.size().height, 400.0);
        assert!((handle.size().width - 840.0).abs() < 1e-9);
        assert_eq!(host.surface.borrow().sizes.last(), Some(&handle.size()));
    }

    #[test]
    fn test_horizontal_lock_pins_polar_angle() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let mut config = config();
        config.controls.axis_lock = Some(AxisLock::Horizontal);
        let handle = start(config, &host, &FakeLoader::default()).unwrap();
        host.frames([0.0]);
        let initial = handle.orbit();

        for step in 1..40 {
            host.fire_pointer(PointerInput::Drag { dx: 12.0, dy: -9.0 });
            host.frames([step as f64 * 16.0]);
            assert!((handle.orbit().phi - FRAC_PI_2).abs() < 1e-5);
        }
        assert!((handle.orbit().theta - initial.theta).abs() > 0.1);
    }

    #[test]
    fn test_vertical_lock_pins_azimuth() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let mut config = config();
        config.controls.axis_lock = Some(AxisLock::Vertical);
        let handle = start(config, &host, &FakeLoader::default()).unwrap();
        host.frames([0.0]);
        let initial = handle.orbit();

        for step in 1..40 {
            host.fire_pointer(PointerInput::Drag { dx: 15.0, dy: 6.0 });
            host.frames([step as f64 * 16.0]);
            assert!(handle.orbit().theta.abs() < 1e-5);
        }
        assert!((handle.orbit().phi - initial.phi).abs() > 0.1);
    }

    #[test]
    fn test_wheel_dollies_camera() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let mut config = config();
        config.controls.damping = false;
        let handle = start(config, &host, &FakeLoader::default()).unwrap();
        let before = handle.orbit().radius;
        handle.pointer(PointerInput::Wheel { delta: -100.0 });
        host.frames([0.0]);
        assert!(handle.orbit().radius < before);
    }

    #[test]
    fn test_stop_releases_everything_once() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let mut handle = start(config(), &host, &FakeLoader::default()).unwrap();
        assert_eq!(host.live_listeners.get(), 3);

        handle.stop();
        handle.stop();

        assert!(!handle.is_running());
        assert_eq!(host.live_listeners.get(), 0);
        assert_eq!(host.surface.borrow().released, 1);
        assert!(host.frame.borrow().is_none());
    }

    #[test]
    fn test_completion_after_stop_is_ignored() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let mut handle = start(config(), &host, &loader).unwrap();
        let before = handle.node_count();

        handle.stop();
        loader.complete(Ok(cube_asset()));
        assert_eq!(handle.node_count(), before);
    }

    #[test]
    fn test_dropping_handle_cancels_listeners() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let handle = start(config(), &host, &loader).unwrap();
        drop(handle);
        assert_eq!(host.live_listeners.get(), 0);
        loader.complete(Ok(cube_asset()));
    }

    #[test]
    fn test_subtitle_caption() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let mut config = config();
        config.subtitle = Some("LiDAR mount".to_string());
        let _handle = start(config, &host, &FakeLoader::default()).unwrap();
        assert_eq!(*host.captions.borrow(), vec!["LiDAR mount".to_string()]);
    }

    #[test]
    fn test_stop_removes_caption() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let mut config = config();
        config.subtitle = Some("LiDAR mount".to_string());
        let mut handle = start(config, &host, &FakeLoader::default()).unwrap();
        assert_eq!(host.captions.borrow().len(), 1);

        handle.stop();
        assert!(host.captions.borrow().is_empty());
        assert_eq!(host.live_listeners.get(), 0);
    }

    #[test]
    fn test_environment_becomes_background() {
        let host = FakeHost::with_container("render1", 500.0, 1200.0);
        let loader = FakeLoader::default();
        let mut config = config();
        config.environment = Some(EnvironmentSource {
            path: "../assets/hdr/".to_string(),
            file: "studio.hdr".to_string(),
        });
        let handle = start(config, &host, &loader).unwrap();
        assert!(loader.requested.borrow().contains(&"../assets/hdr/studio.hdr".to_string()));

        let map = EnvironmentMap::new(1, 1, vec![crate::scene::Color::WHITE]).unwrap();
        loader.complete_environment(Ok(map));
        assert!(matches!(
            handle.state.borrow().scene.background,
            crate::scene::Background::Environment(_)
        ));
    }

    #[test]
    fn test_frame_stats_fps() {
        let mut stats = FrameStats::default();
        for i in 0..=60 {
            stats.record(i as f64 * 1000.0 / 60.0);
        }
        assert_eq!(stats.frames(), 61);
        assert!((stats.fps() - 61.0).abs() < 1.0);
    }
}
