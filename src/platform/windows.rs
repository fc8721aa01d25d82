//! Windows backend.
//!
//! Input comes from low-level keyboard and mouse hooks (SetWindowsHookEx),
//! the foreground window from GetForegroundWindow, and frames from a GDI
//! BitBlt of the primary screen.

use crate::config::ProbeConfig;
use crate::platform::types::{
    frame_from_bgra, ForegroundWindow, InputEvent, InputKind, PlatformError,
};
use crate::platform::INPUT_CHANNEL_CAPACITY;
use crate::probe::screen::FrameSource;
use crate::probe::window::WindowSource;
use crossbeam_channel::{bounded, Receiver, Sender};
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetForegroundWindow, GetMessageW, GetSystemMetrics, GetWindowTextW,
    PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx, HHOOK, MSG, SM_CXSCREEN,
    SM_CYSCREEN, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_MBUTTONDOWN,
    WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_SYSKEYDOWN,
};

/// Global keyboard and pointer hook.
pub struct InputHook {
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
    /// Id of the hook thread, so `stop` can post WM_QUIT to its message loop
    thread_id: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl InputHook {
    pub fn new() -> Self {
        // Bounded so a stalled consumer cannot grow memory without limit
        let (sender, receiver) = bounded(INPUT_CHANNEL_CAPACITY);

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_id: Arc::new(AtomicU32::new(0)),
            thread_handle: None,
        }
    }

    /// Install the hooks on a background thread with its own message loop.
    pub fn start(&mut self) -> Result<(), PlatformError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(PlatformError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let thread_id = self.thread_id.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sender, &thread_id) {
                warn!("Input hook loop stopped: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            // GetMessageW blocks, so keep posting WM_QUIT until the loop exits
            while !handle.is_finished() {
                let thread_id = self.thread_id.load(Ordering::SeqCst);
                if thread_id != 0 {
                    unsafe {
                        let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
                    }
                }
                thread::sleep(Duration::from_millis(10));
            }
            let _ = handle.join();
        }
        self.thread_id.store(0, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }
}

impl Default for InputHook {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputHook {
    fn drop(&mut self) {
        self.stop();
    }
}

// Hook procedures cannot capture state, so the sender lives in the hook
// thread's thread-local storage.
thread_local! {
    static EVENT_SENDER: std::cell::RefCell<Option<Sender<InputEvent>>> =
        const { std::cell::RefCell::new(None) };
}

fn forward(kind: InputKind) {
    EVENT_SENDER.with(|sender| {
        if let Some(ref s) = *sender.borrow() {
            let _ = s.try_send(InputEvent::new(kind));
        }
    });
}

fn classify_key(message: u32) -> Option<InputKind> {
    match message {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(InputKind::KeyPress),
        _ => None,
    }
}

fn classify_mouse(message: u32) -> Option<InputKind> {
    match message {
        WM_MOUSEMOVE => Some(InputKind::PointerMove),
        WM_LBUTTONDOWN | WM_RBUTTONDOWN | WM_MBUTTONDOWN => Some(InputKind::Click),
        WM_MOUSEWHEEL | WM_MOUSEHWHEEL => Some(InputKind::Scroll),
        _ => None,
    }
}

unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        if let Some(kind) = classify_key(w_param.0 as u32) {
            forward(kind);
        }
    }
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        if let Some(kind) = classify_mouse(w_param.0 as u32) {
            forward(kind);
        }
    }
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

fn run_hook_loop(sender: Sender<InputEvent>, thread_id: &AtomicU32) -> Result<(), PlatformError> {
    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = Some(sender);
    });

    unsafe {
        let keyboard = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
            .map_err(|e| PlatformError::HookFailed(e.to_string()))?;
        let mouse = match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = UnhookWindowsHookEx(keyboard);
                return Err(PlatformError::HookFailed(e.to_string()));
            }
        };

        // Hooks run while this thread pumps messages; WM_QUIT ends the loop
        thread_id.store(GetCurrentThreadId(), Ordering::SeqCst);
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {}

        let _ = UnhookWindowsHookEx(mouse);
        let _ = UnhookWindowsHookEx(keyboard);
    }

    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = None;
    });
    Ok(())
}

/// Foreground window via GetForegroundWindow.
#[derive(Debug, Default)]
pub struct SystemWindowSource;

impl WindowSource for SystemWindowSource {
    fn foreground_window(&mut self) -> Result<ForegroundWindow, PlatformError> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return Err(PlatformError::NoForegroundWindow);
            }

            let mut buffer = [0u16; 512];
            let len = GetWindowTextW(hwnd, &mut buffer).max(0) as usize;
            let title = String::from_utf16_lossy(&buffer[..len]);

            Ok(ForegroundWindow {
                id: hwnd.0 as usize as u64,
                title,
            })
        }
    }
}

/// Captures the primary screen with GDI.
#[derive(Debug, Default)]
pub struct SystemFrameSource;

impl FrameSource for SystemFrameSource {
    fn capture(&mut self) -> Result<DynamicImage, PlatformError> {
        unsafe {
            let width = GetSystemMetrics(SM_CXSCREEN);
            let height = GetSystemMetrics(SM_CYSCREEN);
            if width <= 0 || height <= 0 {
                return Err(PlatformError::CaptureFailed("no primary screen".to_string()));
            }

            let screen_dc = GetDC(HWND::default());
            let memory_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let previous = SelectObject(memory_dc, bitmap);

            let blit = BitBlt(memory_dc, 0, 0, width, height, screen_dc, 0, 0, SRCCOPY);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height gives a top-down bitmap
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let stride = width as usize * 4;
            let mut buffer = vec![0u8; stride * height as usize];
            let lines = GetDIBits(
                memory_dc,
                bitmap,
                0,
                height as u32,
                Some(buffer.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            );

            SelectObject(memory_dc, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(memory_dc);
            ReleaseDC(HWND::default(), screen_dc);

            blit.map_err(|e| PlatformError::CaptureFailed(e.to_string()))?;
            if lines == 0 {
                return Err(PlatformError::CaptureFailed("GetDIBits failed".to_string()));
            }

            frame_from_bgra(&buffer, width as usize, height as usize, stride)
        }
    }
}

/// All three probes have a backend on Windows.
pub fn capabilities() -> ProbeConfig {
    ProbeConfig {
        input: true,
        window: true,
        screen: true,
    }
}

/// Check whether a low-level hook can be installed.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::UI::WindowsAndMessaging::{WM_KEYUP, WM_LBUTTONUP};

    #[test]
    fn test_classify_messages() {
        assert_eq!(classify_key(WM_KEYDOWN), Some(InputKind::KeyPress));
        assert_eq!(classify_key(WM_KEYUP), None);
        assert_eq!(classify_mouse(WM_MOUSEMOVE), Some(InputKind::PointerMove));
        assert_eq!(classify_mouse(WM_LBUTTONDOWN), Some(InputKind::Click));
        assert_eq!(classify_mouse(WM_LBUTTONUP), None);
        assert_eq!(classify_mouse(WM_MOUSEWHEEL), Some(InputKind::Scroll));
    }

    #[test]
    fn test_hook_creation() {
        let hook = InputHook::new();
        assert!(!hook.is_running());
    }
}
