/// Tabular display bound to one container.
///
/// A [`ReactiveTable`] resolves its variant to a fixed dataset, mounts the
/// wrapper markup through a [`TableHost`] and hands the rows to a
/// [`GridRenderer`]. Container and window resizes share one debounce timer
/// that relays out the grid after a quiet window.
use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use log::{debug, warn};
use serde::Serialize;

use crate::subscription::Subscription;

/// Quiet window before a resize triggers a relayout
pub const RELAYOUT_DELAY_MS: u32 = 80;

/// Class of the element the grid renders into
pub const GRID_CONTAINER_CLASS: &str = "grid-container";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    #[default]
    Concepts,
    Contacts,
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Concepts => "concepts",
            Variant::Contacts => "contacts",
        }
    }

    /// Variant for a name, falling back to the default for unknown names
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    pub fn dataset(&self) -> TableDataset {
        match self {
            Variant::Concepts => TableDataset::new(
                &["Concept", "Name", "Key Features"],
                &[
                    &["A", "Baseline Continuous-Rotation BLDC System", "Ungeared BLDC motor, magnetic encoder, external processing"],
                    &["B", "Reciprocating Test Platform", "Geared BLDC motor, optical encoder, onboard processing, reciprocating motion"],
                    &["C", "IMU Test Platform", "Brushed geared DC motor, IMU for angle, external processing"],
                    &["D", "Compact and Integrated System", "Frameless BLDC motor, capacitive encoder, highly integrated, low weight"],
                ],
            ),
            Variant::Contacts => TableDataset::new(
                &["Name", "Email", "Phone Number"],
                &[
                    &["John", "john@example.com", "(353) 01 222 3333"],
                    &["Mark", "mark@gmail.com", "(01) 22 888 4444"],
                    &["Eoin", "eoin@gmail.com", "0097 22 654 00033"],
                    &["Sarah", "sarahcdd@gmail.com", "+322 876 1233"],
                    &["Afshin", "afshin@mail.com", "(353) 22 87 8356"],
                ],
            ),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "concepts" => Ok(Variant::Concepts),
            "contacts" => Ok(Variant::Contacts),
            other => Err(format!("unknown table variant '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableDataset {
    pub fn new(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        }
    }
}

/// Dataset for a variant name; unknown names get the default variant
pub fn resolve_dataset(name: &str) -> TableDataset {
    Variant::resolve(name).dataset()
}

/// Grid options, serialized in the shape Grid.js expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridConfig {
    pub columns: Vec<String>,
    #[serde(rename = "data")]
    pub rows: Vec<Vec<String>>,
    pub sort: bool,
    pub search: bool,
    pub pagination: bool,
}

impl From<TableDataset> for GridConfig {
    /// Static display: sorting, search and pagination off
    fn from(dataset: TableDataset) -> Self {
        Self {
            columns: dataset.columns,
            rows: dataset.rows,
            sort: false,
            search: false,
            pagination: false,
        }
    }
}

/// One grid instance
pub trait GridRenderer {
    /// Render into the grid container inside `container_id`
    fn render(&mut self, container_id: &str);

    /// Recompute the layout for the current container size
    fn force_render(&mut self);

    fn destroy(&mut self) {}
}

pub trait GridFactory {
    fn create(&self, config: &GridConfig) -> Box<dyn GridRenderer>;
}

/// The page environment a table runs in
pub trait TableHost {
    fn container_exists(&self, container_id: &str) -> bool;

    /// Replace the container's content with `markup`
    fn mount_markup(&self, container_id: &str, markup: &str);

    /// Observe size changes of the grid container
    fn observe_resize(&self, container_id: &str, callback: Box<dyn FnMut()>) -> Subscription;

    fn on_window_resize(&self, callback: Box<dyn FnMut()>) -> Subscription;

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Subscription;
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Wrapper markup: the grid container plus an optional caption
pub fn table_markup(subtitle: Option<&str>) -> String {
    let caption = subtitle
        .filter(|text| !text.is_empty())
        .map(|text| format!("<div class=\"subtitle\">{}</div>", escape_html(text)))
        .unwrap_or_default();
    format!(
        "<div class=\"table-wrapper\"><div class=\"{}\"></div>{}</div>",
        GRID_CONTAINER_CLASS, caption
    )
}

#[derive(Default)]
struct TableState {
    variant: String,
    subtitle: Option<String>,
    attached: bool,
    factory: Option<Rc<dyn GridFactory>>,
    grid: Option<Box<dyn GridRenderer>>,
    /// Markup is mounted but the grid waits for its factory
    awaiting_grid: bool,
    observers: Vec<Subscription>,
    relayout: Option<Subscription>,
}

struct TableInner {
    container_id: String,
    host: Rc<dyn TableHost>,
    state: RefCell<TableState>,
}

impl TableInner {
    /// Restart the shared debounce timer
    fn schedule_relayout(self: &Rc<Self>) {
        let previous = self.state.borrow_mut().relayout.take();
        drop(previous);

        let weak = Rc::downgrade(self);
        let timer = self.host.set_timeout(
            RELAYOUT_DELAY_MS,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.relayout();
                }
            }),
        );
        let mut state = self.state.borrow_mut();
        if state.attached {
            state.relayout = Some(timer);
        }
    }

    fn relayout(&self) {
        let (timer, grid) = {
            let mut state = self.state.borrow_mut();
            let grid = if state.attached { state.grid.take() } else { None };
            (state.relayout.take(), grid)
        };
        drop(timer);
        let Some(mut grid) = grid else {
            return;
        };
        debug!("{}: relayout", self.container_id);
        grid.force_render();

        let mut state = self.state.borrow_mut();
        if state.grid.is_none() {
            state.grid = Some(grid);
        }
    }

    fn resize_callback(self: &Rc<Self>) -> Box<dyn FnMut()> {
        let weak: Weak<Self> = Rc::downgrade(self);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.schedule_relayout();
            }
        })
    }

    fn create_grid(self: &Rc<Self>, factory: &dyn GridFactory) {
        let variant = self.state.borrow().variant.clone();
        let config = GridConfig::from(resolve_dataset(&variant));
        let mut grid = factory.create(&config);
        grid.render(&self.container_id);

        let observers = vec![
            self.host
                .observe_resize(&self.container_id, self.resize_callback()),
            self.host.on_window_resize(self.resize_callback()),
        ];

        let mut state = self.state.borrow_mut();
        state.grid = Some(grid);
        state.observers = observers;
        state.awaiting_grid = false;
    }

    fn render(self: &Rc<Self>) {
        if !self.host.container_exists(&self.container_id) {
            warn!("table container '{}' not found, skipping render", self.container_id);
            return;
        }

        let (old_grid, old_observers, old_timer, markup, factory) = {
            let mut state = self.state.borrow_mut();
            (
                state.grid.take(),
                mem::take(&mut state.observers),
                state.relayout.take(),
                table_markup(state.subtitle.as_deref()),
                state.factory.clone(),
            )
        };
        if let Some(mut grid) = old_grid {
            grid.destroy();
        }
        drop(old_observers);
        drop(old_timer);

        self.host.mount_markup(&self.container_id, &markup);

        match factory {
            Some(factory) => self.create_grid(factory.as_ref()),
            None => {
                debug!("{}: grid not ready, deferring", self.container_id);
                self.state.borrow_mut().awaiting_grid = true;
            }
        }
    }
}

/// Table component bound to one container
pub struct ReactiveTable {
    inner: Rc<TableInner>,
}

impl ReactiveTable {
    pub fn new(container_id: impl Into<String>, host: Rc<dyn TableHost>) -> Self {
        Self {
            inner: Rc::new(TableInner {
                container_id: container_id.into(),
                host,
                state: RefCell::new(TableState {
                    variant: Variant::default().name().to_string(),
                    ..TableState::default()
                }),
            }),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.inner.container_id
    }

    /// Variant in effect after fallback
    pub fn variant(&self) -> Variant {
        Variant::resolve(&self.inner.state.borrow().variant)
    }

    pub fn subtitle(&self) -> Option<String> {
        self.inner.state.borrow().subtitle.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.state.borrow().attached
    }

    pub fn has_grid(&self) -> bool {
        self.inner.state.borrow().grid.is_some()
    }

    /// Rebuild markup and grid for the current variant and subtitle
    pub fn render(&self) {
        self.inner.render();
    }

    pub fn set_variant(&self, name: &str) {
        self.inner.state.borrow_mut().variant = name.to_string();
        self.rerender_if_attached();
    }

    pub fn set_subtitle(&self, subtitle: Option<&str>) {
        self.inner.state.borrow_mut().subtitle =
            subtitle.filter(|text| !text.is_empty()).map(str::to_string);
        self.rerender_if_attached();
    }

    /// Attribute adapter: `variant` and `subtitle` are recognised, a removed
    /// attribute restores the default
    pub fn attribute_changed(&self, name: &str, value: Option<&str>) {
        match name {
            "variant" => self.set_variant(value.unwrap_or(Variant::default().name())),
            "subtitle" => self.set_subtitle(value),
            other => debug!("{}: ignoring attribute '{}'", self.inner.container_id, other),
        }
    }

    pub fn connect(&self) {
        self.inner.state.borrow_mut().attached = true;
        self.inner.render();
    }

    /// Stop observing resizes and drop any pending relayout
    pub fn disconnect(&self) {
        let (observers, timer) = {
            let mut state = self.inner.state.borrow_mut();
            state.attached = false;
            state.awaiting_grid = false;
            (mem::take(&mut state.observers), state.relayout.take())
        };
        drop(observers);
        drop(timer);
    }

    /// Supply the grid implementation. A render waiting for it completes now.
    pub fn grid_ready(&self, factory: Rc<dyn GridFactory>) {
        let awaiting = {
            let mut state = self.inner.state.borrow_mut();
            state.factory = Some(Rc::clone(&factory));
            state.awaiting_grid
        };
        if awaiting && self.inner.host.container_exists(&self.inner.container_id) {
            self.inner.create_grid(factory.as_ref());
        }
    }

    fn rerender_if_attached(&self) {
        let attached = self.inner.state.borrow().attached;
        if attached {
            self.inner.render();
        }
    }
}

impl std::fmt::Debug for ReactiveTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ReactiveTable")
            .field("container_id", &self.inner.container_id)
            .field("variant", &state.variant)
            .field("attached", &state.attached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct GridLog {
        created: Vec<GridConfig>,
        live: usize,
        renders: Vec<String>,
        relayouts: usize,
    }

    struct FakeGrid(Rc<RefCell<GridLog>>);

    impl GridRenderer for FakeGrid {
        fn render(&mut self, container_id: &str) {
            self.0.borrow_mut().renders.push(container_id.to_string());
        }

        fn force_render(&mut self) {
            self.0.borrow_mut().relayouts += 1;
        }

        fn destroy(&mut self) {
            self.0.borrow_mut().live -= 1;
        }
    }

    #[derive(Default)]
    struct FakeGridFactory(Rc<RefCell<GridLog>>);

    impl GridFactory for FakeGridFactory {
        fn create(&self, config: &GridConfig) -> Box<dyn GridRenderer> {
            let mut log = self.0.borrow_mut();
            log.created.push(config.clone());
            log.live += 1;
            Box::new(FakeGrid(Rc::clone(&self.0)))
        }
    }

    type Listeners = Rc<RefCell<BTreeMap<u32, Box<dyn FnMut()>>>>;

    /// Records markup and keeps listeners and timers until fired
    #[derive(Default)]
    struct FakeTableHost {
        containers: Vec<String>,
        markup: RefCell<Vec<String>>,
        next_id: Cell<u32>,
        listeners: Listeners,
        timers: Rc<RefCell<BTreeMap<u32, Box<dyn FnOnce()>>>>,
        now: Cell<u32>,
        deadlines: RefCell<BTreeMap<u32, u32>>,
    }

    impl FakeTableHost {
        fn with_container(id: &str) -> Rc<Self> {
            Rc::new(Self {
                containers: vec![id.to_string()],
                ..Self::default()
            })
        }

        fn id(&self) -> u32 {
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            id
        }

        fn listen(&self, callback: Box<dyn FnMut()>) -> Subscription {
            let id = self.id();
            self.listeners.borrow_mut().insert(id, callback);
            let listeners = Rc::clone(&self.listeners);
            Subscription::new(move || {
                listeners.borrow_mut().remove(&id);
            })
        }

        fn listener_count(&self) -> usize {
            self.listeners.borrow().len()
        }

        fn fire_resize(&self) {
            let ids: Vec<u32> = self.listeners.borrow().keys().copied().collect();
            for id in ids {
                let callback = self.listeners.borrow_mut().remove(&id);
                if let Some(mut callback) = callback {
                    callback();
                    self.listeners.borrow_mut().insert(id, callback);
                }
            }
        }

        /// Advance the clock and run every timer that came due
        fn advance(&self, ms: u32) {
            let now = self.now.get() + ms;
            self.now.set(now);
            let due: Vec<u32> = self
                .deadlines
                .borrow()
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(&id, _)| id)
                .collect();
            for id in due {
                self.deadlines.borrow_mut().remove(&id);
                let callback = self.timers.borrow_mut().remove(&id);
                if let Some(callback) = callback {
                    callback();
                }
            }
        }

        fn pending_timers(&self) -> usize {
            self.timers.borrow().len()
        }
    }

    impl TableHost for FakeTableHost {
        fn container_exists(&self, container_id: &str) -> bool {
            self.containers.iter().any(|id| id == container_id)
        }

        fn mount_markup(&self, _container_id: &str, markup: &str) {
            self.markup.borrow_mut().push(markup.to_string());
        }

        fn observe_resize(&self, _container_id: &str, callback: Box<dyn FnMut()>) -> Subscription {
            self.listen(callback)
        }

        fn on_window_resize(&self, callback: Box<dyn FnMut()>) -> Subscription {
            self.listen(callback)
        }

        fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Subscription {
            let id = self.id();
            self.timers.borrow_mut().insert(id, callback);
            self.deadlines
                .borrow_mut()
                .insert(id, self.now.get() + delay_ms);
            let timers = Rc::clone(&self.timers);
            Subscription::new(move || {
                timers.borrow_mut().remove(&id);
            })
        }
    }

    fn ready_table(host: &Rc<FakeTableHost>) -> (ReactiveTable, Rc<RefCell<GridLog>>) {
        let table = ReactiveTable::new("table1", Rc::clone(host) as Rc<dyn TableHost>);
        let factory = FakeGridFactory::default();
        let log = Rc::clone(&factory.0);
        table.grid_ready(Rc::new(factory));
        (table, log)
    }

    #[test]
    fn test_unknown_variant_falls_back() {
        assert_eq!(resolve_dataset("nonexistent"), Variant::Concepts.dataset());
        assert_eq!(resolve_dataset("contacts").rows.len(), 5);
        assert_eq!(resolve_dataset("concepts").columns, vec!["Concept", "Name", "Key Features"]);
    }

    #[test]
    fn test_grid_config_json_shape() {
        let config = GridConfig::from(TableDataset::new(&["A"], &[&["1"]]));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "columns": ["A"],
                "data": [["1"]],
                "sort": false,
                "search": false,
                "pagination": false
            })
        );
    }

    #[test]
    fn test_markup_escapes_subtitle() {
        let markup = table_markup(Some("<b>Fig. 2</b> & \"notes\""));
        assert!(markup.contains("&lt;b&gt;Fig. 2&lt;/b&gt; &amp; &quot;notes&quot;"));
        assert!(!table_markup(None).contains("subtitle"));
        assert!(!table_markup(Some("")).contains("subtitle"));
    }

    #[test]
    fn test_render_twice_keeps_one_grid() {
        let host = FakeTableHost::with_container("table1");
        let (table, log) = ready_table(&host);
        table.connect();
        table.render();

        let log = log.borrow();
        assert_eq!(log.live, 1);
        assert_eq!(log.created.len(), 2);
        assert_eq!(log.created[0], log.created[1]);
        assert_eq!(log.renders, vec!["table1", "table1"]);
        assert_eq!(host.listener_count(), 2);
    }

    #[test]
    fn test_missing_container_is_inert() {
        let host = FakeTableHost::with_container("table1");
        let table = ReactiveTable::new("does-not-exist", Rc::clone(&host) as Rc<dyn TableHost>);
        let factory = FakeGridFactory::default();
        let log = Rc::clone(&factory.0);
        table.grid_ready(Rc::new(factory));
        table.connect();

        assert!(host.markup.borrow().is_empty());
        assert_eq!(host.listener_count(), 0);
        assert!(log.borrow().created.is_empty());
    }

    #[test]
    fn test_unknown_variant_renders_default_rows() {
        let host = FakeTableHost::with_container("table1");
        let (table, log) = ready_table(&host);
        table.set_variant("nonexistent");
        table.connect();
        assert_eq!(table.variant(), Variant::Concepts);
        assert_eq!(log.borrow().created[0].rows, Variant::Concepts.dataset().rows);
    }

    #[test]
    fn test_attribute_changes_rerender_when_attached() {
        let host = FakeTableHost::with_container("table1");
        let (table, log) = ready_table(&host);

        table.attribute_changed("variant", Some("contacts"));
        assert!(log.borrow().created.is_empty());

        table.connect();
        table.attribute_changed("subtitle", Some("Team contacts"));
        table.attribute_changed("color", Some("red"));

        let log = log.borrow();
        assert_eq!(log.created.len(), 2);
        assert_eq!(log.created[1].columns, vec!["Name", "Email", "Phone Number"]);
        assert!(host.markup.borrow().last().unwrap().contains("Team contacts"));
    }

    #[test]
    fn test_removed_variant_attribute_restores_default() {
        let host = FakeTableHost::with_container("table1");
        let (table, _log) = ready_table(&host);
        table.set_variant("contacts");
        table.attribute_changed("variant", None);
        assert_eq!(table.variant(), Variant::Concepts);
    }

    #[test]
    fn test_resizes_are_debounced() {
        let host = FakeTableHost::with_container("table1");
        let (table, log) = ready_table(&host);
        table.connect();

        host.fire_resize();
        host.advance(50);
        host.fire_resize();
        host.advance(50);
        assert_eq!(log.borrow().relayouts, 0);
        assert_eq!(host.pending_timers(), 1);

        host.advance(30);
        assert_eq!(log.borrow().relayouts, 1);
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn test_render_before_ready_is_deferred() {
        let host = FakeTableHost::with_container("table1");
        let table = ReactiveTable::new("table1", Rc::clone(&host) as Rc<dyn TableHost>);
        table.connect();
        assert_eq!(host.markup.borrow().len(), 1);
        assert!(!table.has_grid());
        assert_eq!(host.listener_count(), 0);

        let factory = FakeGridFactory::default();
        let log = Rc::clone(&factory.0);
        table.grid_ready(Rc::new(factory));

        assert!(table.has_grid());
        assert_eq!(log.borrow().live, 1);
        assert_eq!(host.listener_count(), 2);
        assert_eq!(host.markup.borrow().len(), 1);
    }

    #[test]
    fn test_readiness_after_disconnect_registers_nothing() {
        let host = FakeTableHost::with_container("table1");
        let table = ReactiveTable::new("table1", Rc::clone(&host) as Rc<dyn TableHost>);
        table.connect();
        table.disconnect();

        let factory = FakeGridFactory::default();
        let log = Rc::clone(&factory.0);
        table.grid_ready(Rc::new(factory));

        assert!(!table.has_grid());
        assert_eq!(log.borrow().live, 0);
        assert_eq!(host.listener_count(), 0);

        table.connect();
        assert!(table.has_grid());
        assert_eq!(host.listener_count(), 2);
    }

    #[test]
    fn test_disconnect_releases_observers_and_timer() {
        let host = FakeTableHost::with_container("table1");
        let (table, log) = ready_table(&host);
        table.connect();
        host.fire_resize();
        assert_eq!(host.pending_timers(), 1);

        table.disconnect();
        assert_eq!(host.listener_count(), 0);
        assert_eq!(host.pending_timers(), 0);
        host.advance(200);
        assert_eq!(log.borrow().relayouts, 0);
        assert!(!table.is_attached());
    }

    #[test]
    fn test_dropped_table_releases_listeners() {
        let host = FakeTableHost::with_container("table1");
        let (table, _log) = ready_table(&host);
        table.connect();
        drop(table);
        assert_eq!(host.listener_count(), 0);
    }
}
