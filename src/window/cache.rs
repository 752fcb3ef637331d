//! Proactive cache of the game window's geometry.
//!
//! The owner calls [`GeometryCache::revalidate`] on a fixed tick (500 ms in the
//! binary). Readers get the last snapshot, which is at most one tick stale,
//! instead of paying for window enumeration on every read.

use chrono::{DateTime, Local};
use std::path::PathBuf;

use super::dump::{CacheDump, write_cache_dump};
use super::geometry::{OverlayAnchor, PlayableArea, WindowGeometry, calculate_pixel_size};
use super::locator::WindowLocator;

/// Change notifications emitted by [`GeometryCache::revalidate`].
#[derive(Clone, Debug, PartialEq)]
pub enum WindowEvent {
    /// The window appeared after being absent.
    Found(WindowGeometry),
    /// The window moved, resized or was replaced by another handle.
    Changed(WindowGeometry),
    /// The window disappeared.
    Lost,
}

pub type WindowObserver = Box<dyn FnMut(&WindowEvent)>;

/// One fully-formed geometry state. Replaced wholesale, never edited.
#[derive(Clone, Debug)]
struct CachedGeometry {
    window: WindowGeometry,
    playable_area: PlayableArea,
    pixel_size: Option<f64>,
    overlay_position: Option<OverlayAnchor>,
    updated_at: DateTime<Local>,
}

impl CachedGeometry {
    fn derive(window: WindowGeometry) -> Self {
        let playable_area = PlayableArea::for_window(&window);
        let pixel_size = calculate_pixel_size(&playable_area);
        let overlay_position = OverlayAnchor::calculate(&window, &playable_area);
        Self {
            window,
            playable_area,
            pixel_size,
            overlay_position,
            updated_at: Local::now(),
        }
    }
}

pub struct GeometryCache {
    locator: Box<dyn WindowLocator>,
    process_name: String,
    current: Option<CachedGeometry>,
    observers: Vec<WindowObserver>,
    /// Where to mirror the cache for debugging; `None` disables the dump.
    dump_path: Option<PathBuf>,
}

impl GeometryCache {
    pub fn new(locator: Box<dyn WindowLocator>, process_name: impl Into<String>) -> Self {
        Self {
            locator,
            process_name: process_name.into(),
            current: None,
            observers: Vec::new(),
            dump_path: None,
        }
    }

    /// Enables the debug dump at `path`.
    pub fn with_dump_path(mut self, path: PathBuf) -> Self {
        self.dump_path = Some(path);
        self
    }

    /// Registers a callback invoked synchronously on every window event.
    pub fn subscribe(&mut self, observer: impl FnMut(&WindowEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Re-locates the window and updates the cache if anything changed.
    ///
    /// Returns the event that was emitted, if any. Locator failures count as
    /// "window absent" for this tick.
    pub fn revalidate(&mut self) -> Option<WindowEvent> {
        let located = match self.locator.locate(&self.process_name) {
            Ok(window) => window,
            Err(e) => {
                log::warn!("Window lookup failed, treating window as absent: {:#}", e);
                None
            }
        };

        let event = match located {
            None => {
                if self.current.is_none() {
                    return None;
                }
                self.current = None;
                log::info!("Window lost - cache cleared");
                WindowEvent::Lost
            }
            Some(window) => {
                let event = match &self.current {
                    None => WindowEvent::Found(window.clone()),
                    Some(cached) if !cached.window.same_placement(&window) => {
                        WindowEvent::Changed(window.clone())
                    }
                    Some(_) => return None,
                };
                log::info!(
                    "Window {}: handle {:#x}, client {}x{} at ({}, {})",
                    if matches!(event, WindowEvent::Found(_)) { "found" } else { "changed" },
                    window.handle,
                    window.client_width(),
                    window.client_height(),
                    window.client_screen_origin.x,
                    window.client_screen_origin.y
                );
                self.current = Some(CachedGeometry::derive(window));
                event
            }
        };

        self.save_dump();
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
        Some(event)
    }

    /// Synchronous revalidation for callers that can't wait for the next tick.
    pub fn force_refresh(&mut self) -> Option<WindowEvent> {
        self.revalidate()
    }

    pub fn get_window_info(&self) -> Option<WindowGeometry> {
        self.current.as_ref().map(|c| c.window.clone())
    }

    /// Playable area of the current window. A present but degenerate
    /// (e.g. minimized) window yields a zeroed area.
    pub fn get_playable_area(&self) -> Option<PlayableArea> {
        self.current.as_ref().map(|c| c.playable_area)
    }

    pub fn get_pixel_size(&self) -> Option<f64> {
        self.current.as_ref().and_then(|c| c.pixel_size)
    }

    pub fn get_overlay_position(&self) -> Option<OverlayAnchor> {
        self.current.as_ref().and_then(|c| c.overlay_position)
    }

    pub fn is_window_available(&self) -> bool {
        self.current.is_some()
    }

    /// Drops observers and cached geometry. Further ticks start from scratch.
    pub fn shutdown(&mut self) {
        self.observers.clear();
        self.current = None;
        log::debug!("Geometry cache shut down");
    }

    fn save_dump(&self) {
        let Some(path) = &self.dump_path else {
            return;
        };
        let dump = match &self.current {
            Some(c) => CacheDump::new(
                c.updated_at,
                Some(&c.window),
                Some(c.playable_area),
                c.pixel_size,
                c.overlay_position,
            ),
            None => CacheDump::new(Local::now(), None, None, None, None),
        };
        // Dump failures never affect the cache itself
        if let Err(e) = write_cache_dump(path, &dump) {
            log::debug!("Could not save cache dump: {:#}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::window::geometry::tests::window_with_client;
    use anyhow::{Result, anyhow};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Locator that replays a scripted sequence of lookups.
    pub(crate) struct ScriptedLocator {
        pub(crate) script: RefCell<VecDeque<Result<Option<WindowGeometry>>>>,
    }

    impl ScriptedLocator {
        pub(crate) fn new(steps: Vec<Result<Option<WindowGeometry>>>) -> Self {
            Self {
                script: RefCell::new(steps.into()),
            }
        }
    }

    impl WindowLocator for ScriptedLocator {
        fn locate(&self, _process_name: &str) -> Result<Option<WindowGeometry>> {
            self.script.borrow_mut().pop_front().unwrap_or(Ok(None))
        }
    }

    fn cache_with(steps: Vec<Result<Option<WindowGeometry>>>) -> GeometryCache {
        GeometryCache::new(Box::new(ScriptedLocator::new(steps)), "WidgetInc.exe")
    }

    #[test]
    fn test_found_then_unchanged_then_lost() {
        let window = window_with_client(0, 0, 1800, 1200);
        let mut cache = cache_with(vec![
            Ok(Some(window.clone())),
            Ok(Some(window.clone())),
            Ok(None),
            Ok(None),
        ]);

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        cache.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        assert_eq!(cache.revalidate(), Some(WindowEvent::Found(window.clone())));
        assert!(cache.is_window_available());
        assert_eq!(cache.get_pixel_size(), Some(9.375));

        // Unchanged tick: no event, no recomputation
        assert_eq!(cache.revalidate(), None);

        assert_eq!(cache.revalidate(), Some(WindowEvent::Lost));
        assert!(!cache.is_window_available());
        assert_eq!(cache.get_playable_area(), None);
        assert_eq!(cache.get_pixel_size(), None);
        assert_eq!(cache.get_overlay_position(), None);

        // Still absent: nothing to report
        assert_eq!(cache.revalidate(), None);

        assert_eq!(
            *events.borrow(),
            vec![WindowEvent::Found(window), WindowEvent::Lost]
        );
    }

    #[test]
    fn test_resize_replaces_snapshot() {
        let small = window_with_client(0, 0, 1800, 1200);
        let wide = window_with_client(0, 0, 1920, 1200);
        let mut cache = cache_with(vec![Ok(Some(small)), Ok(Some(wide.clone()))]);

        cache.revalidate();
        assert_eq!(cache.get_playable_area().unwrap().x, 0);

        assert_eq!(cache.revalidate(), Some(WindowEvent::Changed(wide)));
        let area = cache.get_playable_area().unwrap();
        assert_eq!((area.x, area.width, area.height), (60, 1800, 1200));
    }

    #[test]
    fn test_locator_error_discards_previous_value() {
        let window = window_with_client(0, 0, 1800, 1200);
        let mut cache = cache_with(vec![
            Ok(Some(window.clone())),
            Err(anyhow!("EnumWindows failed")),
            Ok(Some(window.clone())),
        ]);

        cache.revalidate();
        assert_eq!(cache.revalidate(), Some(WindowEvent::Lost));
        assert_eq!(cache.get_window_info(), None);
        assert_eq!(cache.revalidate(), Some(WindowEvent::Found(window)));
    }

    #[test]
    fn test_minimized_window_has_zeroed_area() {
        let minimized = window_with_client(-32000, -32000, 0, 0);
        let mut cache = cache_with(vec![Ok(Some(minimized))]);

        cache.revalidate();
        assert!(cache.is_window_available());
        assert_eq!(cache.get_playable_area(), Some(PlayableArea::default()));
        assert_eq!(cache.get_pixel_size(), None);
        assert_eq!(cache.get_overlay_position(), None);
    }

    #[test]
    fn test_dump_written_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("cache").join("cache.cache");
        let window = window_with_client(0, 0, 1800, 1200);
        let mut cache = cache_with(vec![Ok(Some(window))]).with_dump_path(dump_path.clone());

        cache.force_refresh();
        let text = std::fs::read_to_string(&dump_path).unwrap();
        assert!(text.contains("\"is_valid\": true"));
    }

    #[test]
    fn test_shutdown_clears_state_and_observers() {
        let window = window_with_client(0, 0, 1800, 1200);
        let mut cache = cache_with(vec![Ok(Some(window.clone())), Ok(Some(window))]);
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        cache.subscribe(move |_| *counter.borrow_mut() += 1);

        cache.revalidate();
        cache.shutdown();
        assert!(!cache.is_window_available());

        // Window reappears, but nobody is listening anymore
        cache.revalidate();
        assert_eq!(*calls.borrow(), 1);
    }
}
