//! The composed engine: geometry cache, frame corpus and detector.
//!
//! One `Engine` is owned by whoever drives the timers (the binary's message
//! loop). Every public operation absorbs failures into `None` or an empty
//! result; details go to the log.

use image::RgbImage;
use std::path::PathBuf;
use std::time::Instant;

use crate::capture::FrameSource;
use crate::config::EngineConfig;
use crate::coords;
use crate::detection::{
    ClassificationResult, CorpusPaths, DisambiguationResolver, FrameCorpusStore,
    FrameDetector,
};
use crate::window::{
    GeometryCache, OverlayAnchor, PlayableArea, WindowEvent, WindowGeometry, WindowLocator,
};

pub struct Engine {
    cache: GeometryCache,
    corpus: FrameCorpusStore,
    detector: FrameDetector,
}

impl Engine {
    /// Builds the engine and stages/loads the corpus. Does not look for the
    /// window yet; the first `tick_geometry` does.
    pub fn new(
        config: &EngineConfig,
        locator: Box<dyn WindowLocator>,
        corpus_paths: CorpusPaths,
        dump_path: Option<PathBuf>,
    ) -> Self {
        let mut cache = GeometryCache::new(locator, config.process_name.clone());
        if let Some(path) = dump_path {
            cache = cache.with_dump_path(path);
        }
        let detector = FrameDetector::new(
            config.classifier_settings(),
            DisambiguationResolver::new(config.probe_tolerance),
            config.classify_interval(),
        );
        Self {
            cache,
            corpus: FrameCorpusStore::open(corpus_paths),
            detector,
        }
    }

    /// Geometry tick. A moved, resized or lost window invalidates the last
    /// classification since it was made against the old geometry.
    pub fn tick_geometry(&mut self) -> Option<WindowEvent> {
        let event = self.cache.revalidate();
        if matches!(event, Some(WindowEvent::Changed(_) | WindowEvent::Lost)) {
            self.detector.invalidate();
        }
        event
    }

    /// Immediate geometry revalidation outside the regular tick.
    pub fn force_refresh(&mut self) -> Option<WindowEvent> {
        let event = self.cache.force_refresh();
        if matches!(event, Some(WindowEvent::Changed(_) | WindowEvent::Lost)) {
            self.detector.invalidate();
        }
        event
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&WindowEvent) + 'static) {
        self.cache.subscribe(observer);
    }

    pub fn get_window_info(&self) -> Option<WindowGeometry> {
        self.cache.get_window_info()
    }

    pub fn get_playable_area(&self) -> Option<PlayableArea> {
        self.cache.get_playable_area()
    }

    pub fn get_pixel_size(&self) -> Option<f64> {
        self.cache.get_pixel_size()
    }

    pub fn get_overlay_position(&self) -> Option<OverlayAnchor> {
        self.cache.get_overlay_position()
    }

    pub fn is_window_available(&self) -> bool {
        self.cache.is_window_available()
    }

    /// Classifies an already-captured playable-area image. Uncached.
    pub fn classify_frame(&self, frame_image: &RgbImage) -> Option<ClassificationResult> {
        let corpus = self.corpus.snapshot();
        self.detector.classify_frame(frame_image, &corpus)
    }

    /// Rate-limited detection: captures through `source` only when the last
    /// result has expired.
    pub fn detect_frame(&mut self, source: &mut dyn FrameSource, now: Instant) -> Option<ClassificationResult> {
        self.detect(source, now, false)
    }

    /// Detection that ignores the rate limit, for explicit user requests.
    pub fn detect_frame_now(&mut self, source: &mut dyn FrameSource, now: Instant) -> Option<ClassificationResult> {
        self.detect(source, now, true)
    }

    fn detect(&mut self, source: &mut dyn FrameSource, now: Instant, force: bool) -> Option<ClassificationResult> {
        let window = self.cache.get_window_info()?;
        let area = self.cache.get_playable_area().filter(|a| !a.is_empty())?;
        let corpus = self.corpus.snapshot();
        let capture = || source.capture(&window, &area);
        if force {
            self.detector.detect_now(now, &corpus, capture)
        } else {
            self.detector.detect(now, &corpus, capture)
        }
    }

    pub fn last_detection(&self) -> Option<&ClassificationResult> {
        self.detector.last_result()
    }

    /// Reloads the corpus from disk and drops the cached classification.
    pub fn reload_corpus(&mut self) -> usize {
        let count = self.corpus.reload();
        self.detector.invalidate();
        count
    }

    /// Screen point to frame-relative coordinates on the current playable area.
    pub fn screen_to_frame(&self, screen_x: i32, screen_y: i32) -> Option<(i32, i32)> {
        let area = self.cache.get_playable_area()?;
        coords::screen_to_frame(&area, screen_x, screen_y)
    }

    pub fn frame_to_screen(&self, frame_x: i32, frame_y: i32) -> Option<(i32, i32)> {
        let area = self.cache.get_playable_area()?;
        Some(coords::frame_to_screen(&area, frame_x, frame_y))
    }

    /// Grid cell of a frame point. `(0, 0)` while no pixel size is known.
    pub fn frame_to_grid(&self, frame_x: i32, frame_y: i32) -> (u8, u8) {
        let pixel_size = self.cache.get_pixel_size().unwrap_or(0.0);
        coords::frame_to_grid(pixel_size, frame_x, frame_y)
    }

    pub fn grid_to_frame(&self, grid_x: u8, grid_y: u8) -> Option<(i32, i32)> {
        let pixel_size = self.cache.get_pixel_size()?;
        Some(coords::grid_to_frame(pixel_size, grid_x, grid_y))
    }

    pub fn screen_to_grid(&self, screen_x: i32, screen_y: i32) -> Option<(u8, u8)> {
        let area = self.cache.get_playable_area()?;
        let pixel_size = self.cache.get_pixel_size()?;
        coords::screen_to_grid(&area, pixel_size, screen_x, screen_y)
    }

    pub fn shutdown(&mut self) {
        self.cache.shutdown();
        self.detector.invalidate();
        log::info!("Engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::crop_playable_area;
    use crate::window::cache::tests::ScriptedLocator;
    use crate::window::geometry::tests::window_with_client;
    use anyhow::Result;
    use image::Rgb;
    use std::fs;
    use std::time::Duration;

    /// Renders a client-sized capture with the given border colors on the
    /// playable area and black pillars around it.
    struct PaintedSource {
        left: [u8; 3],
        right: [u8; 3],
        captures: usize,
    }

    impl FrameSource for PaintedSource {
        fn capture(&mut self, window: &WindowGeometry, area: &PlayableArea) -> Result<RgbImage> {
            self.captures += 1;
            let (left, right) = (self.left, self.right);
            let offset_x = (area.x - window.client_screen_origin.x) as u32;
            let width = area.width as u32;
            let client = RgbImage::from_fn(
                window.client_width() as u32,
                window.client_height() as u32,
                |x, _| {
                    if x < offset_x || x >= offset_x + width {
                        Rgb([0, 0, 0])
                    } else if x < offset_x + width / 10 {
                        Rgb(left)
                    } else if x >= offset_x + width - width / 10 {
                        Rgb(right)
                    } else {
                        Rgb([128, 128, 128])
                    }
                },
            );
            Ok(crop_playable_area(&client, window, area))
        }
    }

    fn write_corpus(paths: &CorpusPaths) {
        fs::create_dir_all(&paths.data_dir).unwrap();
        let entry = |id: &str, name: &str, left: [u8; 3], right: [u8; 3]| {
            serde_json::json!({
                "frame_id": id,
                "frame_name": name,
                "left_border": {"average_color": left, "color_variance": 0.0},
                "right_border": {"average_color": right, "color_variance": 0.0}
            })
        };
        let corpus = serde_json::json!({
            "iron_mine": entry("1.1", "Iron Mine", [60, 40, 30], [62, 41, 29]),
            "sand_pit": entry("2.1", "Sand Pit", [200, 180, 120], [198, 182, 121]),
        });
        fs::write(paths.json_path(), corpus.to_string()).unwrap();
    }

    fn engine_with(steps: Vec<Result<Option<WindowGeometry>>>) -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let paths = CorpusPaths::new(dir.path().join("data"), dir.path().join("analysis"));
        write_corpus(&paths);
        let engine = Engine::new(
            &EngineConfig::default(),
            Box::new(ScriptedLocator::new(steps)),
            paths,
            None,
        );
        (dir, engine)
    }

    #[test]
    fn test_geometry_queries_follow_the_window() {
        let window = window_with_client(100, 200, 1920, 1200);
        let (_dir, mut engine) = engine_with(vec![Ok(Some(window.clone())), Ok(None)]);

        assert!(!engine.is_window_available());
        assert_eq!(engine.screen_to_frame(160, 200), None);

        assert_eq!(engine.tick_geometry(), Some(WindowEvent::Found(window.clone())));
        assert_eq!(engine.get_window_info(), Some(window));
        assert_eq!(engine.get_pixel_size(), Some(9.375));
        assert_eq!(engine.screen_to_frame(160, 200), Some((0, 0)));
        assert_eq!(engine.frame_to_screen(0, 0), Some((160, 200)));
        assert_eq!(engine.frame_to_grid(1799, 1199), (191, 127));
        assert_eq!(engine.grid_to_frame(2, 1), Some((19, 10)));
        assert_eq!(engine.screen_to_grid(170, 210), Some((1, 1)));
        assert!(engine.get_overlay_position().is_some());

        assert_eq!(engine.tick_geometry(), Some(WindowEvent::Lost));
        assert_eq!(engine.get_playable_area(), None);
        assert_eq!(engine.frame_to_grid(500, 500), (0, 0));
        assert_eq!(engine.grid_to_frame(2, 1), None);
    }

    #[test]
    fn test_detect_frame_end_to_end() {
        let window = window_with_client(0, 0, 1920, 1200);
        let (_dir, mut engine) = engine_with(vec![Ok(Some(window))]);
        engine.tick_geometry();

        let mut source = PaintedSource {
            left: [60, 40, 30],
            right: [62, 41, 29],
            captures: 0,
        };
        let t0 = Instant::now();
        let result = engine.detect_frame(&mut source, t0).unwrap();
        assert_eq!(result.frame_id, "1.1");
        assert_eq!(result.confidence, 1.0);

        // Within the interval the cached answer is reused without capturing
        engine.detect_frame(&mut source, t0 + Duration::from_millis(500));
        assert_eq!(source.captures, 1);

        engine.detect_frame_now(&mut source, t0 + Duration::from_millis(600));
        assert_eq!(source.captures, 2);
    }

    #[test]
    fn test_no_window_means_no_capture() {
        let (_dir, mut engine) = engine_with(vec![]);
        let mut source = PaintedSource {
            left: [60, 40, 30],
            right: [62, 41, 29],
            captures: 0,
        };
        assert_eq!(engine.detect_frame(&mut source, Instant::now()), None);
        assert_eq!(source.captures, 0);
    }

    #[test]
    fn test_window_change_invalidates_detection() {
        let small = window_with_client(0, 0, 1800, 1200);
        let wide = window_with_client(0, 0, 1920, 1200);
        let (_dir, mut engine) = engine_with(vec![Ok(Some(small)), Ok(Some(wide))]);
        let mut source = PaintedSource {
            left: [60, 40, 30],
            right: [62, 41, 29],
            captures: 0,
        };

        engine.tick_geometry();
        let t0 = Instant::now();
        engine.detect_frame(&mut source, t0);
        assert!(engine.last_detection().is_some());

        engine.tick_geometry();
        assert_eq!(engine.last_detection(), None);
        engine.detect_frame(&mut source, t0);
        assert_eq!(source.captures, 2);
    }

    #[test]
    fn test_classify_frame_and_reload() {
        let (dir, mut engine) = engine_with(vec![]);
        let img = RgbImage::from_fn(300, 200, |x, _| {
            if x < 15 {
                Rgb([10, 10, 10])
            } else if x >= 285 {
                Rgb([20, 20, 20])
            } else {
                Rgb([128, 128, 128])
            }
        });
        assert_eq!(engine.classify_frame(&img), None);

        let json_path = dir.path().join("data").join("frame_detection.json");
        fs::write(
            &json_path,
            serde_json::json!({
                "dark": {
                    "frame_id": "3.1",
                    "frame_name": "Coal Shaft",
                    "left_border": {"average_color": [10, 10, 10]},
                    "right_border": {"average_color": [20, 20, 20]}
                }
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(engine.reload_corpus(), 1);
        assert_eq!(engine.classify_frame(&img).unwrap().frame_name, "Coal Shaft");
    }

    #[test]
    fn test_shutdown() {
        let window = window_with_client(0, 0, 1800, 1200);
        let (_dir, mut engine) = engine_with(vec![Ok(Some(window))]);
        engine.tick_geometry();
        engine.shutdown();
        assert!(!engine.is_window_available());
    }
}
