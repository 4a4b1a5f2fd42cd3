/// Terminal host for meshview preview sessions
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, MouseEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use std::cell::{Cell, RefCell};
use std::io::{self, stdout, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use meshview_core::config::RendererSettings;
use meshview_core::session::{self, Host, PointerInput, ResizeEvent, SessionHandle};
use meshview_core::{MeshLoader, Renderer, SceneConfig, SessionError, Subscription, SurfaceSize};

pub mod renderer;

pub use renderer::{CharFrame, TerminalRenderer, CELL_ASPECT};

/// The one container a terminal offers
pub const TERMINAL_CONTAINER: &str = "terminal";

/// Rows reserved for the status line
const STATUS_ROWS: u16 = 1;

/// Simulated drag distance per key press, in surface units
const KEY_DRAG: f32 = 12.0;

type Slot<T> = Rc<RefCell<Option<Box<T>>>>;

/// Columns and rows left for the picture below the status line
fn drawable(columns: u16, rows: u16) -> (usize, usize) {
    (columns as usize, rows.saturating_sub(STATUS_ROWS).max(1) as usize)
}

fn register<T: ?Sized + 'static>(slot: &Slot<T>, callback: Box<T>) -> Subscription {
    *slot.borrow_mut() = Some(callback);
    let slot = Rc::clone(slot);
    Subscription::new(move || {
        slot.borrow_mut().take();
    })
}

/// [`Host`] backed by the terminal window. Events are delivered when the
/// owning [`TerminalApp`] pumps them.
pub struct TerminalHost {
    columns: Cell<u16>,
    rows: Cell<u16>,
    bounds: Rc<Cell<(usize, usize)>>,
    frame: Rc<RefCell<CharFrame>>,
    captions: Rc<RefCell<Vec<String>>>,
    on_frame: Slot<dyn FnMut(f64)>,
    on_resize: Slot<dyn FnMut(ResizeEvent)>,
    on_pointer: Slot<dyn FnMut(PointerInput)>,
}

impl TerminalHost {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            columns: Cell::new(columns),
            rows: Cell::new(rows),
            bounds: Rc::new(Cell::new(drawable(columns, rows))),
            frame: Rc::new(RefCell::new(CharFrame::default())),
            captions: Rc::new(RefCell::new(Vec::new())),
            on_frame: Rc::new(RefCell::new(None)),
            on_resize: Rc::new(RefCell::new(None)),
            on_pointer: Rc::new(RefCell::new(None)),
        }
    }

    /// Surface height filling the rows below the status line
    pub fn surface_height(&self) -> f32 {
        (self.rows.get().saturating_sub(STATUS_ROWS).max(1) as f64 * CELL_ASPECT) as f32
    }

    pub fn frame(&self) -> Rc<RefCell<CharFrame>> {
        Rc::clone(&self.frame)
    }

    pub fn captions(&self) -> Vec<String> {
        self.captions.borrow().clone()
    }

    pub fn is_looping(&self) -> bool {
        self.on_frame.borrow().is_some()
    }

    /// Deliver one display refresh
    pub fn refresh(&self, timestamp_ms: f64) {
        if let Some(callback) = self.on_frame.borrow_mut().as_mut() {
            callback(timestamp_ms);
        }
    }

    pub fn resize(&self, columns: u16, rows: u16) {
        self.columns.set(columns);
        self.rows.set(rows);
        self.bounds.set(drawable(columns, rows));
        let event = ResizeEvent {
            container_width: columns as f64,
            viewport_width: self.viewport_width(),
        };
        if let Some(callback) = self.on_resize.borrow_mut().as_mut() {
            callback(event);
        }
    }

    pub fn pointer(&self, input: PointerInput) {
        if let Some(callback) = self.on_pointer.borrow_mut().as_mut() {
            callback(input);
        }
    }
}

impl Host for TerminalHost {
    fn container_width(&self, container_id: &str) -> Option<f64> {
        (container_id == TERMINAL_CONTAINER).then(|| self.columns.get() as f64)
    }

    fn viewport_width(&self) -> f64 {
        // the container always fits, so the surface spans every column
        self.columns.get() as f64 + 1.0
    }

    fn create_renderer(
        &self,
        _container_id: &str,
        size: SurfaceSize,
        settings: &RendererSettings,
    ) -> Result<Box<dyn Renderer>, SessionError> {
        Ok(Box::new(TerminalRenderer::new(
            size,
            settings,
            self.frame(),
            Rc::clone(&self.bounds),
        )))
    }

    fn add_caption(&self, _container_id: &str, text: &str) -> Subscription {
        self.captions.borrow_mut().push(text.to_string());
        let captions = Rc::clone(&self.captions);
        let text = text.to_string();
        Subscription::new(move || captions.borrow_mut().retain(|caption| *caption != text))
    }

    fn on_resize(&self, _container_id: &str, callback: Box<dyn FnMut(ResizeEvent)>) -> Subscription {
        register(&self.on_resize, callback)
    }

    fn bind_pointer(&self, _container_id: &str, callback: Box<dyn FnMut(PointerInput)>) -> Subscription {
        register(&self.on_pointer, callback)
    }

    fn animation_loop(&self, callback: Box<dyn FnMut(f64)>) -> Subscription {
        register(&self.on_frame, callback)
    }
}

/// Map a key to orbit input
pub fn key_input(code: KeyCode) -> Option<PointerInput> {
    match code {
        KeyCode::Char('w') | KeyCode::Up => Some(PointerInput::Drag { dx: 0.0, dy: -KEY_DRAG }),
        KeyCode::Char('s') | KeyCode::Down => Some(PointerInput::Drag { dx: 0.0, dy: KEY_DRAG }),
        KeyCode::Char('a') | KeyCode::Left => Some(PointerInput::Drag { dx: -KEY_DRAG, dy: 0.0 }),
        KeyCode::Char('d') | KeyCode::Right => Some(PointerInput::Drag { dx: KEY_DRAG, dy: 0.0 }),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(PointerInput::Wheel { delta: -1.0 }),
        KeyCode::Char('-') => Some(PointerInput::Wheel { delta: 1.0 }),
        _ => None,
    }
}

/// Main application struct for terminal previews
pub struct TerminalApp {
    host: Rc<TerminalHost>,
    session: SessionHandle,
    running: bool,
    started: Instant,
    last_drag: Option<(u16, u16)>,
}

impl TerminalApp {
    /// Start a session filling the current terminal. The config's container
    /// and height are replaced by the terminal's own.
    pub fn new(mut config: SceneConfig, loader: &dyn MeshLoader) -> io::Result<Self> {
        let (columns, rows) = terminal::size()?;
        let host = Rc::new(TerminalHost::new(columns, rows));

        config.container_id = TERMINAL_CONTAINER.to_string();
        config.height = host.surface_height();

        let session = session::start(config, host.as_ref(), loader)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;

        Ok(Self {
            host,
            session,
            running: true,
            started: Instant::now(),
            last_drag: None,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            cursor::Hide,
            event::EnableMouseCapture
        )?;

        let result = self.main_loop();

        // Cleanup
        self.session.stop();
        terminal::disable_raw_mode()?;
        execute!(
            stdout(),
            event::DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        )?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            while event::poll(Duration::from_millis(0))? {
                self.handle_event(event::read()?);
            }
            if !self.running {
                break;
            }

            self.host.refresh(self.started.elapsed().as_secs_f64() * 1000.0);
            self.draw()?;

            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent { code, .. }) => match code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.session.stop();
                    self.running = false;
                }
                code => {
                    if let Some(input) = key_input(code) {
                        self.host.pointer(input);
                    }
                }
            },
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(_) => self.last_drag = Some((mouse.column, mouse.row)),
                MouseEventKind::Drag(_) => {
                    if let Some((column, row)) = self.last_drag {
                        let dx = mouse.column as f32 - column as f32;
                        let dy = (mouse.row as f32 - row as f32) * CELL_ASPECT as f32;
                        self.host.pointer(PointerInput::Drag { dx, dy });
                    }
                    self.last_drag = Some((mouse.column, mouse.row));
                }
                MouseEventKind::Up(_) => self.last_drag = None,
                MouseEventKind::ScrollUp => self.host.pointer(PointerInput::Wheel { delta: -1.0 }),
                MouseEventKind::ScrollDown => self.host.pointer(PointerInput::Wheel { delta: 1.0 }),
                _ => {}
            },
            Event::Resize(columns, rows) => {
                queue!(stdout(), terminal::Clear(terminal::ClearType::All)).ok();
                self.host.resize(columns, rows);
            }
            _ => {}
        }
    }

    fn draw(&self) -> io::Result<()> {
        let mut stdout = stdout();
        self.host.frame().borrow().draw(&mut stdout, STATUS_ROWS)?;

        // Draw UI overlay
        let caption = self.host.captions().join(" ");
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "meshview | FPS: {:.1} | nodes: {} | WASD/Arrows/drag=Orbit +/-/wheel=Zoom Q=Quit {}",
                self.session.fps(),
                self.session.node_count(),
                caption
            )),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}
