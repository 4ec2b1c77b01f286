//! Handler subscriptions and the feedback-loop guard.
//!
//! User code observes property traffic through handlers registered for a
//! `(device, vector)` pair or a `(device, vector, element)` triple. All
//! dispatch happens on the caller's thread inside
//! [`process_events`](crate::IndiClient::process_events), once per
//! received update.
//!
//! Handlers that drive widgets which can themselves originate changes
//! (a connect toggle, a coordinate entry) face a feedback hazard: when a
//! received update changes the widget, the widget's change signal fires
//! while the handler is still running, and naively forwarding it to the
//! device starts a change→send→receive→change loop. The
//! [`FeedbackGuard`] breaks the loop: dispatch holds the guard around
//! `on_changed`, and the widget-signal path checks it, routing to
//! `on_blocked` when the change was the handler's own update in progress.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indi_protocol::{DeviceMessage, PropertyElement, PropertyKind, PropertyVector};

// ============================================================================
// FeedbackGuard
// ============================================================================

/// Reentrancy counter shared between a subscription's dispatch path and
/// the handler it protects.
///
/// Clones share the same counter. The guard is handed to a handler via
/// [`VectorHandler::attach`]/[`ElementHandler::attach`] at registration
/// time; widget-signal code keeps a clone and consults
/// [`is_active`](Self::is_active) to tell its own echoes apart from
/// genuine user edits.
#[derive(Debug, Clone, Default)]
pub struct FeedbackGuard {
    depth: Arc<AtomicUsize>,
}

impl FeedbackGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a device-originated update is currently being dispatched
    /// under this guard.
    pub fn is_active(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn enter(&self) -> GuardToken {
        self.depth.fetch_add(1, Ordering::SeqCst);
        GuardToken {
            depth: Arc::clone(&self.depth),
        }
    }
}

/// Releases one level of the guard on drop.
pub(crate) struct GuardToken {
    depth: Arc<AtomicUsize>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Handler traits
// ============================================================================

/// Observer of every update to one `(device, vector)` pair.
pub trait VectorHandler: Send {
    /// Called once at registration with the subscription's
    /// [`FeedbackGuard`]. Handlers wiring up bidirectional widgets keep a
    /// clone; display-only handlers can ignore it.
    fn attach(&mut self, guard: FeedbackGuard) {
        let _ = guard;
    }

    /// Called once, before the first `on_changed`, as soon as the vector
    /// exists. The place for one-time setup that needs the real schema.
    fn configure(&mut self, vector: &PropertyVector) {
        let _ = vector;
    }

    /// Called once per received update of the vector, on the caller's
    /// thread, with the guard held.
    fn on_changed(&mut self, vector: &PropertyVector);

    /// Called by the widget-signal path when a change arrives while
    /// `on_changed` is still running, i.e. the widget is echoing this
    /// handler's own update rather than a user edit.
    fn on_blocked(&mut self, vector: &PropertyVector) {
        tracing::warn!(
            device = vector.device(),
            vector = vector.name(),
            "widget signal during update dispatch, feedback loop averted"
        );
    }
}

/// Observer of every update to one `(device, vector, element)` triple.
pub trait ElementHandler: Send {
    fn attach(&mut self, guard: FeedbackGuard) {
        let _ = guard;
    }

    fn configure(&mut self, vector: &PropertyVector, element: &PropertyElement) {
        let _ = (vector, element);
    }

    fn on_changed(&mut self, vector: &PropertyVector, element: &PropertyElement);

    fn on_blocked(&mut self, vector: &PropertyVector, element: &PropertyElement) {
        tracing::warn!(
            device = vector.device(),
            vector = vector.name(),
            element = element.name(),
            "widget signal during update dispatch, feedback loop averted"
        );
    }
}

/// Adapter turning a closure into an [`ElementHandler`].
pub(crate) struct ElementCallback<F> {
    callback: F,
}

impl<F> ElementCallback<F>
where
    F: FnMut(&PropertyVector, &PropertyElement) + Send,
{
    pub(crate) fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ElementHandler for ElementCallback<F>
where
    F: FnMut(&PropertyVector, &PropertyElement) + Send,
{
    fn on_changed(&mut self, vector: &PropertyVector, element: &PropertyElement) {
        (self.callback)(vector, element);
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

pub(crate) struct VectorSubscription {
    pub(crate) device: String,
    pub(crate) vector: String,
    guard: FeedbackGuard,
    handler: Box<dyn VectorHandler>,
}

impl VectorSubscription {
    pub(crate) fn new(
        device: impl Into<String>,
        vector: impl Into<String>,
        guard: FeedbackGuard,
        handler: Box<dyn VectorHandler>,
    ) -> Self {
        Self {
            device: device.into(),
            vector: vector.into(),
            guard,
            handler,
        }
    }

    pub(crate) fn matches(&self, vector: &PropertyVector) -> bool {
        self.device == vector.device() && self.vector == vector.name()
    }

    pub(crate) fn configure(&mut self, vector: &PropertyVector) {
        self.handler.configure(vector);
    }

    pub(crate) fn dispatch(&mut self, vector: &PropertyVector) {
        let _token = self.guard.enter();
        self.handler.on_changed(vector);
    }
}

pub(crate) struct ElementSubscription {
    pub(crate) device: String,
    pub(crate) vector: String,
    pub(crate) element: String,
    guard: FeedbackGuard,
    handler: Box<dyn ElementHandler>,
}

impl ElementSubscription {
    pub(crate) fn new(
        device: impl Into<String>,
        vector: impl Into<String>,
        element: impl Into<String>,
        guard: FeedbackGuard,
        handler: Box<dyn ElementHandler>,
    ) -> Self {
        Self {
            device: device.into(),
            vector: vector.into(),
            element: element.into(),
            guard,
            handler,
        }
    }

    pub(crate) fn matches(&self, vector: &PropertyVector, element: &PropertyElement) -> bool {
        self.device == vector.device()
            && self.vector == vector.name()
            && self.element == element.name()
    }

    pub(crate) fn configure(&mut self, vector: &PropertyVector, element: &PropertyElement) {
        self.handler.configure(vector, element);
    }

    pub(crate) fn dispatch(&mut self, vector: &PropertyVector, element: &PropertyElement) {
        let _token = self.guard.enter();
        self.handler.on_changed(vector, element);
    }
}

// ============================================================================
// Replaceable client-level callbacks
// ============================================================================

/// Whether a blocking accessor should keep waiting after its timeout
/// handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Keep blocking; the handler only wanted to observe the delay.
    Continue,
    /// Stop waiting; the accessor returns empty-handed.
    GiveUp,
}

pub(crate) type MessageHandler = Box<dyn FnMut(&DeviceMessage) + Send>;
pub(crate) type TimeoutHandler = Box<dyn FnMut(&str, &str) -> WaitPolicy + Send>;
pub(crate) type DefHandler = Box<dyn FnMut(&PropertyVector) + Send>;

/// One define handler per element kind, each fired at most once per
/// `(device, vector)` pair, on the first define transfer.
pub(crate) struct DefHandlers {
    text: DefHandler,
    switch: DefHandler,
    number: DefHandler,
    blob: DefHandler,
    light: DefHandler,
}

impl DefHandlers {
    pub(crate) fn for_kind(&mut self, kind: PropertyKind) -> &mut DefHandler {
        match kind {
            PropertyKind::Text => &mut self.text,
            PropertyKind::Switch => &mut self.switch,
            PropertyKind::Number => &mut self.number,
            PropertyKind::Blob => &mut self.blob,
            PropertyKind::Light => &mut self.light,
        }
    }

    pub(crate) fn set(
        &mut self,
        blob: DefHandler,
        number: DefHandler,
        switch: DefHandler,
        text: DefHandler,
        light: DefHandler,
    ) {
        self.blob = blob;
        self.number = number;
        self.switch = switch;
        self.text = text;
        self.light = light;
    }
}

impl Default for DefHandlers {
    fn default() -> Self {
        Self {
            text: Box::new(|_| {}),
            switch: Box::new(|_| {}),
            number: Box::new(|_| {}),
            blob: Box::new(|_| {}),
            light: Box::new(|_| {}),
        }
    }
}

pub(crate) fn default_message_handler() -> MessageHandler {
    Box::new(|message: &DeviceMessage| {
        tracing::info!(device = %message.device, text = %message.text, "device message");
    })
}

pub(crate) fn default_timeout_handler() -> TimeoutHandler {
    Box::new(|device: &str, vector: &str| {
        tracing::warn!(device, vector, "timeout waiting for vector");
        WaitPolicy::Continue
    })
}
