//! Window discovery for the WidgetInc game window.

use anyhow::Result;

use super::geometry::WindowGeometry;

/// Finds the target window and reports its raw geometry.
///
/// `Ok(None)` means the game simply isn't running (or is hidden); errors are
/// reserved for OS calls that failed outright.
pub trait WindowLocator {
    fn locate(&self, process_name: &str) -> Result<Option<WindowGeometry>>;
}

/// Compares an executable path against the wanted process name.
///
/// Only the file name is compared, case-insensitively, so that
/// `C:\Games\WidgetInc.exe` matches `WidgetInc.exe` but
/// `WidgetInc-tracker.exe` does not.
pub fn process_name_matches(full_path: &str, process_name: &str) -> bool {
    let file_name = full_path
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(full_path);
    file_name.eq_ignore_ascii_case(process_name)
}

#[cfg(windows)]
pub use win32::Win32WindowLocator;

#[cfg(windows)]
mod win32 {
    use anyhow::{Result, anyhow};
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    use windows::Win32::Foundation::{BOOL, CloseHandle, HWND, LPARAM, POINT, RECT, TRUE};
    use windows::Win32::Graphics::Gdi::ClientToScreen;
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
        QueryFullProcessImageNameW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
        GetWindowThreadProcessId, IsWindowVisible,
    };

    use super::{WindowLocator, process_name_matches};
    use crate::window::geometry::{Point, Rect, WindowGeometry};

    /// Enumerates top-level windows through Win32.
    pub struct Win32WindowLocator {
        /// Substring every candidate title must contain.
        title_fragment: String,
    }

    impl Win32WindowLocator {
        pub fn new(title_fragment: impl Into<String>) -> Self {
            Self {
                title_fragment: title_fragment.into(),
            }
        }
    }

    struct EnumData<'a> {
        title_fragment: &'a str,
        process_name: &'a str,
        found: Option<(HWND, u32, String)>,
    }

    impl WindowLocator for Win32WindowLocator {
        fn locate(&self, process_name: &str) -> Result<Option<WindowGeometry>> {
            let mut data = EnumData {
                title_fragment: &self.title_fragment,
                process_name,
                found: None,
            };
            unsafe {
                // EnumWindows reports an error when the callback stops it early,
                // which is how a match ends the walk.
                let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
            }

            match data.found {
                Some((hwnd, pid, title)) => build_geometry(hwnd, pid, title).map(Some),
                None => Ok(None),
            }
        }
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }

            let title = window_title(hwnd);
            if title.is_empty() || !title.contains(data.title_fragment) {
                return TRUE;
            }

            let mut process_id: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
            if process_id == 0 {
                return TRUE;
            }

            let Some(full_path) = process_image_path(process_id) else {
                log::debug!("[{}] \"{}\" - could not query process name", process_id, title);
                return TRUE;
            };

            if process_name_matches(&full_path, data.process_name) {
                data.found = Some((hwnd, process_id, title));
                return BOOL(0); // Stop enumeration
            }

            TRUE
        }
    }

    unsafe fn window_title(hwnd: HWND) -> String {
        unsafe {
            let title_len = GetWindowTextLengthW(hwnd);
            if title_len <= 0 {
                return String::new();
            }
            let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
            let copied = GetWindowTextW(hwnd, &mut title_buf).max(0) as usize;
            OsString::from_wide(&title_buf[..copied.min(title_len as usize)])
                .to_string_lossy()
                .to_string()
        }
    }

    unsafe fn process_image_path(process_id: u32) -> Option<String> {
        unsafe {
            let process_handle =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;

            let mut name_buf: Vec<u16> = vec![0; 1024];
            let mut len = name_buf.len() as u32;
            let result = QueryFullProcessImageNameW(
                process_handle,
                PROCESS_NAME_WIN32,
                windows::core::PWSTR(name_buf.as_mut_ptr()),
                &mut len,
            );
            let _ = CloseHandle(process_handle);

            if result.is_err() || len == 0 {
                return None;
            }
            Some(
                OsString::from_wide(&name_buf[..len as usize])
                    .to_string_lossy()
                    .to_string(),
            )
        }
    }

    fn build_geometry(hwnd: HWND, pid: u32, title: String) -> Result<WindowGeometry> {
        let mut window_rect = RECT::default();
        let mut client_rect = RECT::default();
        let mut client_origin = POINT { x: 0, y: 0 };
        unsafe {
            GetWindowRect(hwnd, &mut window_rect)?;
            GetClientRect(hwnd, &mut client_rect)?;
            if !ClientToScreen(hwnd, &mut client_origin).as_bool() {
                return Err(anyhow!("ClientToScreen failed"));
            }
        }

        Ok(WindowGeometry {
            handle: hwnd.0 as isize,
            pid,
            title,
            window_rect: to_rect(&window_rect),
            client_rect: to_rect(&client_rect),
            client_screen_origin: Point::new(client_origin.x, client_origin.y),
        })
    }

    fn to_rect(rect: &RECT) -> Rect {
        Rect::new(rect.left, rect.top, rect.right, rect.bottom)
    }
}
