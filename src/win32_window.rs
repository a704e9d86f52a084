//! Win32 top-level window that hosts child content and forwards every
//! message to its [`WindowDelegate`] before applying base handling.
//!
//! ## Base handling
//!
//! - **WM_NCCREATE**: store the owning `Win32Window` pointer, enable
//!   non-client DPI scaling.
//! - **WM_DESTROY**: run `on_destroy`, post `WM_QUIT` if quit-on-close is set.
//! - **WM_DPICHANGED**: move to the rectangle Windows suggests.
//! - **WM_SIZE**: keep the child content filling the client area.
//! - **WM_ACTIVATE**: give keyboard focus to the child content.
//! - **WM_DWMCOLORIZATIONCOLORCHANGED**: re-apply the light/dark title bar.
//! - **All others**: `DefWindowProcW`.

use std::{
    cell::{Cell, RefCell},
    ffi::{OsStr, c_void},
    os::windows::ffi::OsStrExt,
};

use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use windows::{
    core::{PCWSTR, w},
    Win32::{
        Foundation::{GetLastError, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM},
        Graphics::{
            Dwm::{DWMWA_USE_IMMERSIVE_DARK_MODE, DwmSetWindowAttribute},
            Gdi::{HBRUSH, MONITOR_DEFAULTTONEAREST, MonitorFromPoint},
        },
        System::{
            LibraryLoader::GetModuleHandleW,
            Registry::{HKEY_CURRENT_USER, RRF_RT_REG_DWORD, RegGetValueW},
        },
        UI::{
            HiDpi::EnableNonClientDpiScaling,
            Input::KeyboardAndMouse::SetFocus,
            WindowsAndMessaging::{
                CREATESTRUCTW, CS_HREDRAW, CS_VREDRAW, CreateWindowExW, DefWindowProcW,
                DestroyWindow, GWL_STYLE, GWLP_USERDATA, GetClientRect, GetWindowLongPtrW,
                IDC_ARROW, LoadCursorW, LoadIconW, MoveWindow, PostQuitMessage, RegisterClassW,
                SW_SHOWNORMAL, SWP_NOACTIVATE, SWP_NOZORDER, SetParent, SetWindowLongPtrW,
                SetWindowPos, ShowWindow, WINDOW_EX_STYLE, WM_NCCREATE, WNDCLASSW, WS_CHILD,
                WS_OVERLAPPEDWINDOW, WS_POPUP, WS_VISIBLE,
            },
        },
    },
};

use crate::{
    constants::{BASE_DPI, WINDOW_CLASS_NAME},
    error::RunnerError,
    flutter_dll::FlutterDll,
    window::{
        BaseAction, BaseWindow, NativeHandle, Point, Rect, Size, WindowDelegate, WindowMessage,
        WindowSurface, dispatch_message, scale_for_dpi,
    },
};

/// Resource id of the application icon in the executable.
const IDI_APP_ICON: u16 = 101;

/// Build a null-terminated UTF-16 string for Win32 APIs.
pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(Some(0)).collect()
}

fn to_native(hwnd: HWND) -> NativeHandle {
    NativeHandle(hwnd.0 as isize)
}

fn from_native(handle: NativeHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

static WINDOW_CLASS: OnceCell<u16> = OnceCell::new();

/// Registers the window class on first use and returns its atom.
fn window_class() -> Result<u16, RunnerError> {
    WINDOW_CLASS
        .get_or_try_init(|| unsafe {
            let hinst = GetModuleHandleW(None)
                .map_err(|e| RunnerError::WindowCreate(format!("GetModuleHandleW: {e}")))?;
            let class_name = to_wide(WINDOW_CLASS_NAME);
            let wc = WNDCLASSW {
                hInstance: hinst.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                lpfnWndProc: Some(wnd_proc),
                style: CS_HREDRAW | CS_VREDRAW,
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                hIcon: LoadIconW(Some(hinst.into()), PCWSTR(IDI_APP_ICON as usize as *const u16))
                    .unwrap_or_default(),
                hbrBackground: HBRUSH::default(),
                lpszMenuName: PCWSTR::null(),
                cbClsExtra: 0,
                cbWndExtra: 0,
            };
            let atom = RegisterClassW(&wc);
            if atom == 0 {
                return Err(RunnerError::WindowCreate(format!(
                    "RegisterClassW failed: {:?}",
                    GetLastError()
                )));
            }
            info!("[Win32 Window] Window class registered");
            Ok(atom)
        })
        .copied()
}

/// Applies a dark title bar when the user's app theme is dark.
fn update_theme(hwnd: HWND) {
    let mut light_mode: u32 = 1;
    let mut size = std::mem::size_of::<u32>() as u32;
    let status = unsafe {
        RegGetValueW(
            HKEY_CURRENT_USER,
            w!("Software\\Microsoft\\Windows\\CurrentVersion\\Themes\\Personalize"),
            w!("AppsUseLightTheme"),
            RRF_RT_REG_DWORD,
            None,
            Some(&mut light_mode as *mut u32 as *mut c_void),
            Some(&mut size as *mut u32),
        )
    };
    if status.is_err() {
        return;
    }
    let dark: i32 = (light_mode == 0).into();
    if let Err(e) = unsafe {
        DwmSetWindowAttribute(
            hwnd,
            DWMWA_USE_IMMERSIVE_DARK_MODE,
            &dark as *const i32 as *const c_void,
            std::mem::size_of::<i32>() as u32,
        )
    } {
        debug!("[Win32 Window] DwmSetWindowAttribute failed: {e}");
    }
}

/// The HWND-owning half of the window; what delegates see as a [`WindowSurface`].
///
/// Interior mutability only: messages re-enter the window procedure while a
/// delegate call is still on the stack.
struct Win32Host {
    hwnd: Cell<HWND>,
    child_content: Cell<HWND>,
}

impl WindowSurface for Win32Host {
    fn client_area(&self) -> Rect {
        let mut rc = RECT::default();
        if let Err(e) = unsafe { GetClientRect(self.hwnd.get(), &mut rc) } {
            warn!("[Win32 Window] GetClientRect failed: {e}");
        }
        Rect { left: rc.left, top: rc.top, right: rc.right, bottom: rc.bottom }
    }

    fn set_child_content(&self, content: NativeHandle) {
        let child = from_native(content);
        self.child_content.set(child);
        unsafe {
            let old = GetWindowLongPtrW(child, GWL_STYLE);
            let new = (old & !(WS_POPUP.0 as isize)) | WS_CHILD.0 as isize | WS_VISIBLE.0 as isize;
            SetWindowLongPtrW(child, GWL_STYLE, new);

            if let Err(e) = SetParent(child, Some(self.hwnd.get())) {
                warn!("[Win32 Window] SetParent error: {e}");
            }
        }
        self.resize_child_content();
        self.focus_child_content();
        debug!("[Win32 Window] Child content {:?} attached to {:?}", child, self.hwnd.get());
    }

    fn deferred_show(&self) -> Box<dyn FnOnce()> {
        let hwnd = self.hwnd.get();
        Box::new(move || unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNORMAL);
        })
    }
}

impl Win32Host {
    fn resize_child_content(&self) {
        let child = self.child_content.get();
        if child.0.is_null() {
            return;
        }
        let frame = self.client_area();
        unsafe {
            let _ = MoveWindow(child, frame.left, frame.top, frame.width(), frame.height(), true);
        }
    }

    fn focus_child_content(&self) {
        let child = self.child_content.get();
        if !child.0.is_null() {
            unsafe {
                let _ = SetFocus(Some(child));
            }
        }
    }
}

/// A top-level window driven by a [`WindowDelegate`].
///
/// Always boxed: its address is handed to the window procedure, which only
/// ever takes shared references to it.
pub struct Win32Window {
    host: Win32Host,
    base: RefCell<BaseWindow>,
}

impl Win32Window {
    pub fn new(delegate: Box<dyn WindowDelegate>) -> Box<Self> {
        Box::new(Self {
            host: Win32Host {
                hwnd: Cell::new(HWND::default()),
                child_content: Cell::new(HWND::default()),
            },
            base: RefCell::new(BaseWindow::new(delegate)),
        })
    }

    /// Creates a hidden window with `title` at `origin` and `size`, both in
    /// logical pixels scaled for the monitor containing `origin`, then runs
    /// the delegate's `on_create`.
    pub fn create(&self, title: &str, origin: Point, size: Size) -> Result<(), RunnerError> {
        self.destroy();
        let class = window_class()?;

        let monitor = unsafe { MonitorFromPoint(POINT { x: origin.x, y: origin.y }, MONITOR_DEFAULTTONEAREST) };
        let dpi = match FlutterDll::get() {
            Ok(dll) => unsafe { (dll.FlutterDesktopGetDpiForMonitor)(monitor.0) },
            Err(_) => BASE_DPI,
        };
        debug!("[Win32 Window] Monitor DPI {}", dpi);

        let title_w = to_wide(title);
        let this = self as *const Self as *const c_void;
        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR(class as usize as *const u16),
                PCWSTR(title_w.as_ptr()),
                WS_OVERLAPPEDWINDOW,
                scale_for_dpi(origin.x, dpi),
                scale_for_dpi(origin.y, dpi),
                scale_for_dpi(size.width, dpi),
                scale_for_dpi(size.height, dpi),
                None,
                None,
                GetModuleHandleW(None).ok().map(Into::into),
                Some(this),
            )
        }
        .map_err(|e| RunnerError::WindowCreate(format!("CreateWindowExW failed: {e}")))?;

        self.host.hwnd.set(hwnd);
        update_theme(hwnd);
        info!("[Win32 Window] Created {:?}", hwnd);

        // Messages sent while on_create runs see the base borrowed and take
        // the delegate-free path in `message_handler`.
        let created = self.base.borrow_mut().finish_create(&self.host);
        if created.is_err() {
            self.destroy_native();
        }
        created
    }

    /// Makes the window visible.
    pub fn show(&self) -> bool {
        unsafe { ShowWindow(self.host.hwnd.get(), SW_SHOWNORMAL) }.as_bool()
    }

    /// When set, destroying this window ends the message loop.
    pub fn set_quit_on_close(&self, quit_on_close: bool) {
        self.base.borrow_mut().set_quit_on_close(quit_on_close);
    }

    pub fn client_area(&self) -> Rect {
        self.host.client_area()
    }

    pub fn handle(&self) -> NativeHandle {
        to_native(self.host.hwnd.get())
    }

    /// Runs `on_destroy` and destroys the native window if it still exists.
    pub fn destroy(&self) {
        match self.base.try_borrow_mut() {
            Ok(mut base) => {
                base.teardown();
            }
            Err(_) => warn!("[Win32 Window] destroy() re-entered; skipping on_destroy"),
        }
        self.destroy_native();
    }

    fn destroy_native(&self) {
        self.host.child_content.set(HWND::default());
        let hwnd = self.host.hwnd.replace(HWND::default());
        if hwnd.0.is_null() {
            return;
        }
        unsafe {
            // Messages sent during teardown no longer reach this object.
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            if let Err(e) = DestroyWindow(hwnd) {
                error!("[Win32 Window] DestroyWindow failed: {e}");
            }
        }
    }

    fn message_handler(&self, hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        let message = WindowMessage {
            hwnd: to_native(hwnd),
            message: msg,
            wparam: wparam.0,
            lparam: lparam.0,
        };
        match dispatch_message(&self.base, &message) {
            BaseAction::Handled(result) => LRESULT(result),

            BaseAction::Destroyed { post_quit } => {
                info!("[Win32 Window] WM_DESTROY");
                self.host.hwnd.set(HWND::default());
                self.host.child_content.set(HWND::default());
                if post_quit {
                    unsafe { PostQuitMessage(0) };
                }
                LRESULT(0)
            }

            BaseAction::ApplySuggestedRect => {
                // lParam is a *const RECT of new bounds
                if let Some(r) = unsafe { (lparam.0 as *const RECT).as_ref() } {
                    unsafe {
                        let _ = SetWindowPos(
                            hwnd,
                            None,
                            r.left,
                            r.top,
                            r.right - r.left,
                            r.bottom - r.top,
                            SWP_NOZORDER | SWP_NOACTIVATE,
                        );
                    }
                }
                LRESULT(0)
            }

            BaseAction::ResizeChild => {
                self.host.resize_child_content();
                LRESULT(0)
            }

            BaseAction::FocusChild => {
                self.host.focus_child_content();
                LRESULT(0)
            }

            BaseAction::UpdateTheme => {
                update_theme(hwnd);
                LRESULT(0)
            }

            BaseAction::Default => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        }
    }
}

impl Drop for Win32Window {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// # Safety
/// Registered as the class `lpfnWndProc`; `lpCreateParams` in
/// `WM_NCCREATE` must be the creating `*const Win32Window`.
unsafe extern "system" fn wnd_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    unsafe {
        if msg == WM_NCCREATE {
            if let Some(cs) = (lparam.0 as *const CREATESTRUCTW).as_ref() {
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, cs.lpCreateParams as isize);
                if let Some(window) = (cs.lpCreateParams as *const Win32Window).as_ref() {
                    window.host.hwnd.set(hwnd);
                }
                let _ = EnableNonClientDpiScaling(hwnd);
            } else {
                warn!("[Win32 Window] CREATESTRUCTW was null");
            }
            return DefWindowProcW(hwnd, msg, wparam, lparam);
        }

        match (GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const Win32Window).as_ref() {
            Some(window) => window.message_handler(hwnd, msg, wparam, lparam),
            None => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}
