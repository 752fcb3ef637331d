//! WidgetInc Tracker
//!
//! A background Windows application that follows the WidgetInc game window
//! and logs which game screen is showing. Geometry is revalidated on one
//! timer, frames are classified on another, and a few global hotkeys trigger
//! work on demand.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use widgetinc_tracker::{config, logging, paths};

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    let (config, config_message) = config::load_config(&paths::get_config_path());
    paths::ensure_directories()?;
    logging::init(&paths::get_logs_dir(), logging::parse_level(&config.log_level));
    log::info!("{}", config_message);

    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };

    tray::run(config)
}

#[cfg(not(windows))]
fn main() -> anyhow::Result<()> {
    let (config, _) = config::load_config(&paths::get_config_path());
    logging::init(&paths::get_logs_dir(), logging::parse_level(&config.log_level));
    log::error!("WidgetInc Tracker needs Windows (window enumeration and Graphics Capture)");
    Ok(())
}

#[cfg(windows)]
mod tray {
    use anyhow::{Result, anyhow};
    use chrono::Local;
    use std::cell::RefCell;
    use std::time::Instant;

    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        MOD_CONTROL, MOD_NOREPEAT, MOD_SHIFT, RegisterHotKey, UnregisterHotKey,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
        HWND_MESSAGE, KillTimer, MSG, PostQuitMessage, RegisterClassW, SetTimer,
        TranslateMessage, WM_DESTROY, WM_HOTKEY, WM_TIMER, WNDCLASSW,
    };
    use windows::core::w;

    use widgetinc_tracker::capture::{FrameSource, WindowFrameSource, save_snapshot};
    use widgetinc_tracker::detection::CorpusPaths;
    use widgetinc_tracker::window::Win32WindowLocator;
    use widgetinc_tracker::{Engine, EngineConfig, WindowEvent, coords, paths};

    const HOTKEY_DETECT: i32 = 1;
    const HOTKEY_SNAPSHOT: i32 = 2;
    const HOTKEY_RELOAD: i32 = 3;
    const HOTKEY_QUIT: i32 = 4;
    const HOTKEY_CURSOR: i32 = 5;

    const HOTKEYS: [(i32, u32, &str); 5] = [
        (HOTKEY_DETECT, 0x46, "Ctrl+Shift+F (detect frame now)"),
        (HOTKEY_SNAPSHOT, 0x53, "Ctrl+Shift+S (save playable-area snapshot)"),
        (HOTKEY_RELOAD, 0x52, "Ctrl+Shift+R (reload frame corpus)"),
        (HOTKEY_QUIT, 0x51, "Ctrl+Shift+Q (quit)"),
        (HOTKEY_CURSOR, 0x47, "Ctrl+Shift+G (cursor position)"),
    ];

    const TIMER_GEOMETRY: usize = 1;
    const TIMER_CLASSIFY: usize = 2;

    struct App {
        engine: Engine,
        source: WindowFrameSource,
    }

    thread_local! {
        static APP: RefCell<Option<App>> = const { RefCell::new(None) };
    }

    fn with_app(f: impl FnOnce(&mut App)) {
        APP.with(|cell| {
            if let Some(app) = cell.borrow_mut().as_mut() {
                f(app);
            }
        });
    }

    pub fn run(config: EngineConfig) -> Result<()> {
        let locator = Win32WindowLocator::new(config.window_title.clone());
        let corpus_paths = CorpusPaths::new(paths::get_corpus_data_dir(), paths::get_analysis_dir());
        let dump_path = config.debug_cache_dump.then(paths::get_cache_dump_path);
        let mut engine = Engine::new(&config, Box::new(locator), corpus_paths, dump_path);
        let process_name = config.process_name.clone();
        engine.subscribe(move |event| {
            if let WindowEvent::Lost = event {
                log::info!("Waiting for {} to come back", process_name);
            }
        });
        APP.with(|cell| {
            *cell.borrow_mut() = Some(App {
                engine,
                source: WindowFrameSource,
            })
        });

        let hwnd = create_message_window()?;

        unsafe {
            for (id, vk, _) in HOTKEYS {
                RegisterHotKey(hwnd, id, MOD_CONTROL | MOD_SHIFT | MOD_NOREPEAT, vk)?;
            }
            if SetTimer(hwnd, TIMER_GEOMETRY, config.revalidate_interval().as_millis() as u32, None) == 0 {
                return Err(anyhow!("Failed to start geometry timer"));
            }
            if SetTimer(hwnd, TIMER_CLASSIFY, config.classify_interval().as_millis() as u32, None) == 0 {
                return Err(anyhow!("Failed to start classification timer"));
            }
        }

        log::info!(
            "WidgetInc Tracker started, watching {} (\"{}\")",
            config.process_name,
            config.window_title
        );
        for (_, _, description) in HOTKEYS {
            log::info!("Hotkey: {}", description);
        }

        // First geometry pass right away instead of after one interval
        with_app(|app| {
            app.engine.tick_geometry();
        });

        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }

            let _ = KillTimer(hwnd, TIMER_GEOMETRY);
            let _ = KillTimer(hwnd, TIMER_CLASSIFY);
            for (id, _, _) in HOTKEYS {
                let _ = UnregisterHotKey(hwnd, id);
            }
            let _ = DestroyWindow(hwnd);
        }

        with_app(|app| app.engine.shutdown());
        APP.with(|cell| cell.borrow_mut().take());
        log::info!("WidgetInc Tracker exited");
        Ok(())
    }

    fn create_message_window() -> Result<HWND> {
        unsafe {
            let hinstance = GetModuleHandleW(None)?;
            let class_name = w!("WidgetIncTrackerClass");

            let wc = WNDCLASSW {
                lpfnWndProc: Some(window_proc),
                hInstance: hinstance.into(),
                lpszClassName: class_name,
                ..Default::default()
            };

            if RegisterClassW(&wc) == 0 {
                return Err(anyhow!("Failed to register window class"));
            }

            let hwnd = CreateWindowExW(
                Default::default(),
                class_name,
                w!("WidgetInc Tracker"),
                Default::default(),
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                None,
                hinstance,
                None,
            )?;

            Ok(hwnd)
        }
    }

    fn on_timer(timer_id: usize) {
        with_app(|app| match timer_id {
            TIMER_GEOMETRY => {
                app.engine.tick_geometry();
            }
            TIMER_CLASSIFY => {
                if app.engine.is_window_available() {
                    app.engine.detect_frame(&mut app.source, Instant::now());
                }
            }
            _ => {}
        });
    }

    fn on_hotkey(hotkey_id: i32) {
        match hotkey_id {
            HOTKEY_DETECT => with_app(|app| {
                log::info!("Detect hotkey pressed");
                app.engine.force_refresh();
                if app
                    .engine
                    .detect_frame_now(&mut app.source, Instant::now())
                    .is_none()
                {
                    log::info!("No frame recognized");
                }
            }),
            HOTKEY_SNAPSHOT => with_app(|app| {
                if let Err(e) = save_current_frame(app) {
                    log::warn!("Snapshot failed: {:#}", e);
                }
            }),
            HOTKEY_RELOAD => with_app(|app| {
                let count = app.engine.reload_corpus();
                log::info!("Corpus reloaded ({} entries)", count);
            }),
            HOTKEY_CURSOR => with_app(|app| log_cursor_position(&app.engine)),
            HOTKEY_QUIT => {
                log::info!("Quit hotkey pressed");
                unsafe { PostQuitMessage(0) };
            }
            _ => {}
        }
    }

    fn save_current_frame(app: &mut App) -> Result<()> {
        let window = app
            .engine
            .get_window_info()
            .ok_or_else(|| anyhow!("Game window not found"))?;
        let area = app
            .engine
            .get_playable_area()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| anyhow!("Game window has no playable area"))?;
        let frame = app.source.capture(&window, &area)?;
        save_snapshot(&paths::get_screenshots_dir(), &frame, Local::now())?;
        Ok(())
    }

    fn log_cursor_position(engine: &Engine) {
        let (x, y) = match coords::get_cursor_position() {
            Ok(pos) => pos,
            Err(e) => {
                log::warn!("Could not read cursor position: {:#}", e);
                return;
            }
        };
        let Some(window) = engine.get_window_info() else {
            log::info!("Cursor at screen ({}, {}); game window not found", x, y);
            return;
        };
        let (client_x, client_y) = coords::screen_to_client(&window, x, y);
        match (engine.screen_to_frame(x, y), engine.screen_to_grid(x, y)) {
            (Some((fx, fy)), Some((gx, gy))) => log::info!(
                "Cursor at screen ({}, {}) client ({}, {}) frame ({}, {}) grid ({}, {})",
                x, y, client_x, client_y, fx, fy, gx, gy
            ),
            _ => log::info!(
                "Cursor at screen ({}, {}) client ({}, {}); outside the playable area",
                x, y, client_x, client_y
            ),
        }
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        unsafe {
            match msg {
                WM_TIMER => {
                    on_timer(wparam.0);
                    LRESULT(0)
                }
                WM_HOTKEY => {
                    on_hotkey(wparam.0 as i32);
                    LRESULT(0)
                }
                WM_DESTROY => {
                    PostQuitMessage(0);
                    LRESULT(0)
                }
                _ => DefWindowProcW(hwnd, msg, wparam, lparam),
            }
        }
    }
}
