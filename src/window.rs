//! Platform-neutral window contracts.
//!
//! `win32_window` implements [`WindowSurface`] over a real HWND; the
//! Flutter window only sees these traits, which keeps its lifecycle
//! logic independent of the OS.

use std::cell::RefCell;

use log::debug;

use crate::{constants::BASE_DPI, error::RunnerError};

pub const WM_DESTROY: u32 = 0x0002;
pub const WM_SIZE: u32 = 0x0005;
pub const WM_ACTIVATE: u32 = 0x0006;
/// `WM_FONTCHANGE`: broadcast after the system font table changes.
pub const WM_FONTCHANGE: u32 = 0x001D;
pub const WM_DPICHANGED: u32 = 0x02E0;
pub const WM_DWMCOLORIZATIONCOLORCHANGED: u32 = 0x0320;

/// A native window handle, stored as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub isize);

impl NativeHandle {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Client-area rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// One window message as delivered to the window procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    pub hwnd: NativeHandle,
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

/// Host-side operations a window delegate may call.
pub trait WindowSurface {
    /// Current client area in physical pixels.
    fn client_area(&self) -> Rect;

    /// Re-parents `content` into this window and sizes it to the client area.
    fn set_child_content(&self, content: NativeHandle);

    /// Returns a callback that makes this window visible when invoked.
    ///
    /// The callback holds only the raw handle, never the window itself.
    fn deferred_show(&self) -> Box<dyn FnOnce()>;
}

/// The overridable half of a top-level window.
pub trait WindowDelegate {
    /// Called once the native window exists. Returning `false` aborts creation.
    fn on_create(&mut self, _surface: &dyn WindowSurface) -> bool {
        true
    }

    /// Called while the native window is being destroyed.
    fn on_destroy(&mut self) {}

    /// Offered every message first. `Some` is returned verbatim from the
    /// window procedure; `None` falls through to the base handling.
    fn message_handler(&mut self, _msg: &WindowMessage) -> Option<isize> {
        None
    }
}

/// What the native window must do after a message went through
/// [`BaseWindow::handle_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseAction {
    /// The delegate consumed the message; return this result.
    Handled(isize),
    /// `on_destroy` ran; forget the handle and post `WM_QUIT` if asked.
    Destroyed { post_quit: bool },
    ResizeChild,
    FocusChild,
    /// Move to the rectangle carried by `WM_DPICHANGED`.
    ApplySuggestedRect,
    UpdateTheme,
    /// Hand the message to the default window procedure.
    Default,
}

impl BaseAction {
    /// Base handling that needs no delegate.
    pub fn for_message(message: u32) -> Self {
        match message {
            WM_SIZE => BaseAction::ResizeChild,
            WM_ACTIVATE => BaseAction::FocusChild,
            WM_DPICHANGED => BaseAction::ApplySuggestedRect,
            WM_DWMCOLORIZATIONCOLORCHANGED => BaseAction::UpdateTheme,
            _ => BaseAction::Default,
        }
    }
}

/// Platform-independent half of a top-level window: owns the delegate,
/// tracks whether `on_create` succeeded, and decides what each message
/// means. The native window executes the returned [`BaseAction`].
pub struct BaseWindow {
    delegate: Box<dyn WindowDelegate>,
    created: bool,
    quit_on_close: bool,
}

impl BaseWindow {
    pub fn new(delegate: Box<dyn WindowDelegate>) -> Self {
        Self { delegate, created: false, quit_on_close: false }
    }

    /// When set, destroying the window ends the message loop.
    pub fn set_quit_on_close(&mut self, quit_on_close: bool) {
        self.quit_on_close = quit_on_close;
    }

    pub fn quit_on_close(&self) -> bool {
        self.quit_on_close
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Runs the delegate's `on_create` once the native window exists.
    /// On refusal the delegate is torn down again.
    pub fn finish_create(&mut self, surface: &dyn WindowSurface) -> Result<(), RunnerError> {
        self.created = true;
        if self.delegate.on_create(surface) {
            return Ok(());
        }
        self.teardown();
        Err(RunnerError::WindowCreate("on_create rejected the window".into()))
    }

    /// Runs `on_destroy` if the window was created. Returns whether it ran.
    pub fn teardown(&mut self) -> bool {
        if !self.created {
            return false;
        }
        self.created = false;
        self.delegate.on_destroy();
        true
    }

    /// Offers `msg` to the delegate, then applies base handling.
    pub fn handle_message(&mut self, msg: &WindowMessage) -> BaseAction {
        if let Some(result) = self.delegate.message_handler(msg) {
            return BaseAction::Handled(result);
        }
        if msg.message == WM_DESTROY {
            self.teardown();
            debug!("[Base Window] Destroyed, quit_on_close={}", self.quit_on_close);
            return BaseAction::Destroyed { post_quit: self.quit_on_close };
        }
        BaseAction::for_message(msg.message)
    }
}

/// Routes `msg` through `base`. While a delegate call already holds the
/// borrow (messages sent synchronously from inside it), only the base
/// handling applies.
pub fn dispatch_message(base: &RefCell<BaseWindow>, msg: &WindowMessage) -> BaseAction {
    match base.try_borrow_mut() {
        Ok(mut base) => base.handle_message(msg),
        Err(_) => {
            debug!("[Base Window] Re-entrant message {:#06x}", msg.message);
            BaseAction::for_message(msg.message)
        }
    }
}

/// Origin that centers a window of `window` size on a screen of `screen` size.
pub fn centered_origin(screen: Size, window: Size) -> Point {
    Point::new(
        (screen.width - window.width) / 2,
        (screen.height - window.height) / 2,
    )
}

/// Scales a logical coordinate by `dpi`, where [`BASE_DPI`] is 1.0.
pub fn scale_for_dpi(value: i32, dpi: u32) -> i32 {
    let factor = f64::from(dpi.max(1)) / f64::from(BASE_DPI);
    (f64::from(value) * factor) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::{Rc, Weak};

    #[test]
    fn centers_default_window_on_full_hd() {
        let origin = centered_origin(Size::new(1920, 1080), Size::new(1280, 720));
        assert_eq!(origin, Point::new(320, 180));
    }

    #[test]
    fn centering_on_small_screen_goes_negative() {
        let origin = centered_origin(Size::new(1024, 600), Size::new(1280, 720));
        assert_eq!(origin, Point::new(-128, -60));
    }

    #[test]
    fn dpi_scaling() {
        assert_eq!(scale_for_dpi(1280, 96), 1280);
        assert_eq!(scale_for_dpi(1280, 144), 1920);
        assert_eq!(scale_for_dpi(720, 192), 1440);
        assert_eq!(scale_for_dpi(100, 120), 125);
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create,
        Destroy,
        Message(u32),
    }

    struct Recorder {
        calls: Rc<RefCell<Vec<Call>>>,
        accept: bool,
        consumes: Option<u32>,
    }

    impl WindowDelegate for Recorder {
        fn on_create(&mut self, _surface: &dyn WindowSurface) -> bool {
            self.calls.borrow_mut().push(Call::Create);
            self.accept
        }

        fn on_destroy(&mut self) {
            self.calls.borrow_mut().push(Call::Destroy);
        }

        fn message_handler(&mut self, msg: &WindowMessage) -> Option<isize> {
            self.calls.borrow_mut().push(Call::Message(msg.message));
            (self.consumes == Some(msg.message)).then_some(42)
        }
    }

    struct NullSurface;

    impl WindowSurface for NullSurface {
        fn client_area(&self) -> Rect {
            Rect::default()
        }

        fn set_child_content(&self, _content: NativeHandle) {}

        fn deferred_show(&self) -> Box<dyn FnOnce()> {
            Box::new(|| {})
        }
    }

    fn base(accept: bool, consumes: Option<u32>) -> (BaseWindow, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let recorder = Recorder { calls: calls.clone(), accept, consumes };
        (BaseWindow::new(Box::new(recorder)), calls)
    }

    fn msg(message: u32) -> WindowMessage {
        WindowMessage { hwnd: NativeHandle(1), message, wparam: 0, lparam: 0 }
    }

    #[test]
    fn rejected_create_tears_down_and_errors() {
        let (mut window, calls) = base(false, None);
        let err = window.finish_create(&NullSurface).unwrap_err();
        assert!(matches!(err, RunnerError::WindowCreate(_)));
        assert!(!window.is_created());
        assert_eq!(*calls.borrow(), [Call::Create, Call::Destroy]);

        assert!(!window.teardown());
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn destroy_posts_quit_only_when_asked() {
        let (mut window, calls) = base(true, None);
        window.finish_create(&NullSurface).unwrap();
        window.set_quit_on_close(true);
        assert_eq!(
            window.handle_message(&msg(WM_DESTROY)),
            BaseAction::Destroyed { post_quit: true }
        );
        assert_eq!(*calls.borrow(), [Call::Create, Call::Message(WM_DESTROY), Call::Destroy]);

        let (mut window, _) = base(true, None);
        window.finish_create(&NullSurface).unwrap();
        assert_eq!(
            window.handle_message(&msg(WM_DESTROY)),
            BaseAction::Destroyed { post_quit: false }
        );
    }

    #[test]
    fn on_destroy_runs_once() {
        let (mut window, calls) = base(true, None);
        window.finish_create(&NullSurface).unwrap();
        window.handle_message(&msg(WM_DESTROY));
        assert!(!window.teardown());
        let destroys = calls.borrow().iter().filter(|c| **c == Call::Destroy).count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn delegate_result_wins_over_base_handling() {
        let (mut window, _) = base(true, Some(WM_SIZE));
        window.finish_create(&NullSurface).unwrap();
        assert_eq!(window.handle_message(&msg(WM_SIZE)), BaseAction::Handled(42));
        assert_eq!(window.handle_message(&msg(WM_ACTIVATE)), BaseAction::FocusChild);
        assert_eq!(window.handle_message(&msg(WM_FONTCHANGE)), BaseAction::Default);
    }

    #[test]
    fn base_actions_without_delegate() {
        assert_eq!(BaseAction::for_message(WM_SIZE), BaseAction::ResizeChild);
        assert_eq!(BaseAction::for_message(WM_DPICHANGED), BaseAction::ApplySuggestedRect);
        assert_eq!(
            BaseAction::for_message(WM_DWMCOLORIZATIONCOLORCHANGED),
            BaseAction::UpdateTheme
        );
        assert_eq!(BaseAction::for_message(WM_DESTROY), BaseAction::Default);
    }

    /// Attaches child content during `on_create`, which on Win32 sends
    /// messages back into the same window.
    struct Attacher;

    impl WindowDelegate for Attacher {
        fn on_create(&mut self, surface: &dyn WindowSurface) -> bool {
            surface.set_child_content(NativeHandle(7));
            true
        }

        fn message_handler(&mut self, _msg: &WindowMessage) -> Option<isize> {
            Some(1)
        }
    }

    struct ReentrantSurface {
        base: Weak<RefCell<BaseWindow>>,
        seen: RefCell<Vec<BaseAction>>,
    }

    impl WindowSurface for ReentrantSurface {
        fn client_area(&self) -> Rect {
            Rect::default()
        }

        fn set_child_content(&self, _content: NativeHandle) {
            let base = self.base.upgrade().expect("window alive");
            self.seen.borrow_mut().push(dispatch_message(&base, &msg(WM_SIZE)));
        }

        fn deferred_show(&self) -> Box<dyn FnOnce()> {
            Box::new(|| {})
        }
    }

    #[test]
    fn reentrant_message_gets_base_handling_only() {
        let base = Rc::new(RefCell::new(BaseWindow::new(Box::new(Attacher))));
        let surface = ReentrantSurface { base: Rc::downgrade(&base), seen: RefCell::default() };

        base.borrow_mut().finish_create(&surface).unwrap();
        assert_eq!(*surface.seen.borrow(), [BaseAction::ResizeChild]);

        // Outside a delegate call the delegate sees the message again.
        assert_eq!(dispatch_message(&base, &msg(WM_SIZE)), BaseAction::Handled(1));
    }

    #[test]
    fn rect_dimensions() {
        let rc = Rect { left: 8, top: 31, right: 1288, bottom: 751 };
        assert_eq!((rc.width(), rc.height()), (1280, 720));
    }
}
