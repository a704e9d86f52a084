//! Mock embedder, view controller and window surface shared by unit tests.

use std::{cell::RefCell, rc::Rc};

use anyhow::{Result, bail};

use crate::{
    dart_project::DartProject,
    view_controller::{Embedder, NextFrameCallback, ViewController},
    window::{NativeHandle, Point, Rect, Size, WindowMessage, WindowSurface},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created(i32, i32, usize),
    PluginsRegistered,
    ChildAttached(NativeHandle),
    CallbackSet,
    CallbackCleared,
    ForceRedraw,
    FontsReloaded,
    Shown,
    Released,
    ComInitialized,
    ComUninitialized,
    WindowCreated(String, Point, Size),
    QuitOnClose,
    LoopStarted,
    QuitPosted,
}

pub type Log = Rc<RefCell<Vec<Event>>>;
pub type Slot = Rc<RefCell<Option<NextFrameCallback>>>;

pub const VIEW: NativeHandle = NativeHandle(0x4242);
pub const TOP: NativeHandle = NativeHandle(0x1010);

pub struct MockController {
    log: Log,
    slot: Slot,
    engine: bool,
    view: Option<NativeHandle>,
    handles: Option<(u32, isize)>,
}

impl ViewController for MockController {
    fn has_engine(&self) -> bool {
        self.engine
    }

    fn view_handle(&self) -> Option<NativeHandle> {
        self.view
    }

    fn handle_top_level_window_proc(&mut self, msg: &WindowMessage) -> Option<isize> {
        self.handles
            .filter(|(message, _)| *message == msg.message)
            .map(|(_, result)| result)
    }

    fn set_next_frame_callback(&mut self, callback: Option<NextFrameCallback>) {
        self.log.borrow_mut().push(if callback.is_some() {
            Event::CallbackSet
        } else {
            Event::CallbackCleared
        });
        *self.slot.borrow_mut() = callback;
    }

    fn force_redraw(&mut self) {
        self.log.borrow_mut().push(Event::ForceRedraw);
    }

    fn reload_system_fonts(&mut self) {
        self.log.borrow_mut().push(Event::FontsReloaded);
    }
}

impl Drop for MockController {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Event::Released);
    }
}

pub struct MockEmbedder {
    pub log: Log,
    pub slot: Slot,
    pub fail: bool,
    pub engine: bool,
    pub view: Option<NativeHandle>,
    pub handles: Option<(u32, isize)>,
}

impl MockEmbedder {
    pub fn healthy(log: &Log, slot: &Slot) -> Self {
        Self {
            log: log.clone(),
            slot: slot.clone(),
            fail: false,
            engine: true,
            view: Some(VIEW),
            handles: None,
        }
    }
}

impl Embedder for MockEmbedder {
    type Controller = MockController;

    fn create_view_controller(
        &self,
        width: i32,
        height: i32,
        project: &DartProject,
    ) -> Result<MockController> {
        if self.fail {
            bail!("engine refused to start");
        }
        self.log.borrow_mut().push(Event::Created(
            width,
            height,
            project.dart_entrypoint_arguments().len(),
        ));
        Ok(MockController {
            log: self.log.clone(),
            slot: self.slot.clone(),
            engine: self.engine,
            view: self.view,
            handles: self.handles,
        })
    }

    fn register_plugins(&self, _controller: &MockController) {
        self.log.borrow_mut().push(Event::PluginsRegistered);
    }
}

pub struct MockSurface {
    pub log: Log,
}

impl WindowSurface for MockSurface {
    fn client_area(&self) -> Rect {
        Rect { left: 0, top: 0, right: 1264, bottom: 681 }
    }

    fn set_child_content(&self, content: NativeHandle) {
        self.log.borrow_mut().push(Event::ChildAttached(content));
    }

    fn deferred_show(&self) -> Box<dyn FnOnce()> {
        let log = self.log.clone();
        Box::new(move || log.borrow_mut().push(Event::Shown))
    }
}

pub fn setup() -> (Log, Slot) {
    (Rc::new(RefCell::new(Vec::new())), Rc::new(RefCell::new(None)))
}

pub fn fire_first_frame(slot: &Slot) {
    let callback = slot.borrow_mut().take();
    callback.expect("first-frame callback installed")();
}
