//! A top-level window that hosts a Flutter view.
//!
//! Startup keeps the window hidden until the engine reports its first frame,
//! so the user never sees an unpainted client area:
//!
//! 1. build the view controller at the client-area size
//! 2. register plugins
//! 3. attach the engine view as child content
//! 4. install a one-shot next-frame callback that shows the window
//! 5. force the first frame
//!
//! Teardown clears that callback before the controller is released, which
//! breaks the callback's back-reference to the window.

use std::{
    cell::Cell,
    rc::{Rc, Weak},
};

use log::{debug, error, info};

use crate::{
    dart_project::DartProject,
    error::RunnerError,
    view_controller::{Embedder, ViewController},
    window::{WM_FONTCHANGE, WindowDelegate, WindowMessage, WindowSurface},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLifecycle {
    Uncreated,
    CreatedHidden,
    Visible,
    Destroying,
    Destroyed,
}

pub struct FlutterWindow<E: Embedder> {
    embedder: E,
    project: DartProject,
    controller: Option<E::Controller>,
    lifecycle: Rc<Cell<WindowLifecycle>>,
}

impl<E: Embedder> FlutterWindow<E> {
    pub fn new(embedder: E, project: DartProject) -> Self {
        Self {
            embedder,
            project,
            controller: None,
            lifecycle: Rc::new(Cell::new(WindowLifecycle::Uncreated)),
        }
    }

    pub fn lifecycle(&self) -> WindowLifecycle {
        self.lifecycle.get()
    }

    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    fn fail_create(&mut self, err: RunnerError) -> bool {
        error!("[Flutter Window] {err}");
        self.lifecycle.set(WindowLifecycle::Destroyed);
        false
    }
}

fn first_frame_callback(
    lifecycle: Weak<Cell<WindowLifecycle>>,
    show: Box<dyn FnOnce()>,
) -> Box<dyn FnOnce()> {
    Box::new(move || {
        let Some(state) = lifecycle.upgrade() else {
            return;
        };
        if state.get() != WindowLifecycle::CreatedHidden {
            debug!("[Flutter Window] First frame in state {:?}; not showing", state.get());
            return;
        }
        state.set(WindowLifecycle::Visible);
        show();
        info!("[Flutter Window] First frame ready, window shown");
    })
}

impl<E: Embedder> WindowDelegate for FlutterWindow<E> {
    fn on_create(&mut self, surface: &dyn WindowSurface) -> bool {
        let frame = surface.client_area();
        let (width, height) = (frame.width(), frame.height());

        let controller = match self.embedder.create_view_controller(width, height, &self.project) {
            Ok(controller) => controller,
            Err(e) => return self.fail_create(RunnerError::EngineInit(format!("{e:#}"))),
        };
        if !controller.has_engine() {
            return self.fail_create(RunnerError::EngineInit("view controller has no engine".into()));
        }
        let Some(view) = controller.view_handle() else {
            return self.fail_create(RunnerError::EngineInit("view controller has no view".into()));
        };
        self.lifecycle.set(WindowLifecycle::CreatedHidden);

        // Plugins before child content, so startup does not re-layout.
        self.embedder.register_plugins(&controller);
        surface.set_child_content(view);

        let controller = self.controller.insert(controller);
        controller.set_next_frame_callback(Some(first_frame_callback(
            Rc::downgrade(&self.lifecycle),
            surface.deferred_show(),
        )));
        controller.force_redraw();

        info!("[Flutter Window] Created ({}×{}), waiting for first frame", width, height);
        true
    }

    fn on_destroy(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            self.lifecycle.set(WindowLifecycle::Destroying);
            controller.set_next_frame_callback(None);
            drop(controller);
            debug!("[Flutter Window] View controller released");
        }
        self.lifecycle.set(WindowLifecycle::Destroyed);
    }

    fn message_handler(&mut self, msg: &WindowMessage) -> Option<isize> {
        // Flutter and its plugins see every message first.
        if let Some(controller) = self.controller.as_mut() {
            if let Some(result) = controller.handle_top_level_window_proc(msg) {
                return Some(result);
            }
        }

        if msg.message == WM_FONTCHANGE {
            if let Some(controller) = self.controller.as_mut().filter(|c| c.has_engine()) {
                debug!("[Flutter Window] WM_FONTCHANGE → reload system fonts");
                controller.reload_system_fonts();
            }
        }
        None
    }
}
