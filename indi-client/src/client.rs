//! The client facade: blocking property access, event processing, and
//! convenience send helpers.

use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use indi_protocol::{
    serialize_vector, LightState, PropertyElement, PropertyVector, Transfer, WireEvent,
};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, ClientResult};
use crate::handlers::{
    default_message_handler, default_timeout_handler, DefHandler, DefHandlers, ElementCallback,
    ElementHandler, ElementSubscription, FeedbackGuard, MessageHandler, TimeoutHandler,
    VectorHandler, VectorSubscription, WaitPolicy,
};
use crate::registry::Registry;

/// A synchronous client for one device server.
///
/// Construction connects, announces `getProperties`, and starts the
/// background receive worker. Everything user-visible then happens on the
/// caller's thread: blocking accessors drain received snapshots into the
/// registry, and all handler dispatch runs inside
/// [`process_events`](Self::process_events), which the caller must invoke
/// periodically.
///
/// ```no_run
/// use indi_client::{ClientConfig, IndiClient};
///
/// let mut client = IndiClient::connect(ClientConfig::new("localhost", 7624))?;
/// let ra = client.get_float("Telescope Simulator", "EQUATORIAL_COORD", "RA");
/// client.set_and_send_float("Telescope Simulator", "EQUATORIAL_COORD", "RA", 2.0)?;
/// client.process_events()?;
/// client.shutdown();
/// # Ok::<(), indi_client::ClientError>(())
/// ```
pub struct IndiClient {
    config: ClientConfig,
    connection: Connection,
    registry: Registry,
    vector_subscriptions: Vec<VectorSubscription>,
    element_subscriptions: Vec<ElementSubscription>,
    def_handlers: DefHandlers,
    message_handler: MessageHandler,
    timeout_handler: TimeoutHandler,
}

impl IndiClient {
    /// Connect to a server and start receiving.
    pub fn connect(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let connection = Connection::open(&config)?;
        Ok(Self {
            config,
            connection,
            registry: Registry::new(),
            vector_subscriptions: Vec::new(),
            element_subscriptions: Vec::new(),
            def_handlers: DefHandlers::default(),
            message_handler: default_message_handler(),
            timeout_handler: default_timeout_handler(),
        })
    }

    /// Connect with default timings.
    pub fn connect_to(host: &str, port: u16) -> ClientResult<Self> {
        Self::connect(ClientConfig::new(host, port))
    }

    // ------------------------------------------------------------------
    // Registry access
    // ------------------------------------------------------------------

    /// Absorb every queued registry update without blocking.
    fn drain_registry_queue(&mut self) {
        while let Ok(vector) = self.connection.registry_rx.try_recv() {
            self.registry.merge(vector);
        }
    }

    /// The current snapshot of a vector, blocking until it has been
    /// received.
    ///
    /// While waiting, the registered timeout handler is invoked once per
    /// configured `wait_timeout`; unless it returns
    /// [`WaitPolicy::GiveUp`], waiting continues. Returns `None` only
    /// when the handler gives up or the client is shut down, so absent
    /// hardware never crashes a monitoring client.
    pub fn get_vector(&mut self, device: &str, name: &str) -> Option<PropertyVector> {
        loop {
            self.drain_registry_queue();
            if let Some(vector) = self.registry.get(device, name) {
                return Some(vector.clone());
            }
            match self
                .connection
                .registry_rx
                .recv_timeout(self.config.wait_timeout)
            {
                Ok(vector) => self.registry.merge(vector),
                Err(RecvTimeoutError::Timeout) => {
                    let policy = (self.timeout_handler)(device, name);
                    if policy == WaitPolicy::GiveUp || self.connection.is_shutdown() {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = (self.timeout_handler)(device, name);
                    return None;
                }
            }
        }
    }

    /// The current snapshot of a vector if it has already been received;
    /// never blocks.
    pub fn try_get_vector(&mut self, device: &str, name: &str) -> Option<PropertyVector> {
        self.drain_registry_queue();
        self.registry.get(device, name).cloned()
    }

    /// A named element of a vector, with the same blocking contract as
    /// [`get_vector`](Self::get_vector).
    pub fn get_element(
        &mut self,
        device: &str,
        vector: &str,
        element: &str,
    ) -> Option<PropertyElement> {
        self.get_vector(device, vector)?.element(element).cloned()
    }

    /// Numeric value of a number element (sexagesimal-decoded).
    pub fn get_float(&mut self, device: &str, vector: &str, element: &str) -> Option<f64> {
        self.get_element(device, vector, element)?.as_float()
    }

    /// Display text of an element.
    pub fn get_text(&mut self, device: &str, vector: &str, element: &str) -> Option<String> {
        Some(self.get_element(device, vector, element)?.text())
    }

    /// State of a switch element.
    pub fn get_bool(&mut self, device: &str, vector: &str, element: &str) -> Option<bool> {
        Some(self.get_element(device, vector, element)?.is_on())
    }

    /// Every vector received so far.
    pub fn vectors(&self) -> impl Iterator<Item = &PropertyVector> {
        self.registry.vectors()
    }

    /// Number of distinct vectors received so far.
    pub fn vector_count(&self) -> usize {
        self.registry.len()
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Serialize the current snapshot of a vector as a client-originated
    /// change, transmit it, and optimistically mark the local state
    /// `Busy` pending the device's acknowledgement. Blocks until the
    /// vector exists; returns the transmitted snapshot.
    pub fn send_vector(&mut self, device: &str, name: &str) -> ClientResult<PropertyVector> {
        if self.get_vector(device, name).is_none() {
            return Err(ClientError::Disconnected);
        }
        let vector = self
            .registry
            .get_mut(device, name)
            .ok_or(ClientError::Disconnected)?;
        let frame = serialize_vector(vector, Transfer::New)?;
        vector.set_state(LightState::Busy);
        let snapshot = vector.clone();
        self.connection.send(&frame);
        Ok(snapshot)
    }

    /// Set an element's value from text and send the vector.
    pub fn set_and_send_text(
        &mut self,
        device: &str,
        vector: &str,
        element: &str,
        text: &str,
    ) -> ClientResult<PropertyVector> {
        if self.get_vector(device, vector).is_none() {
            return Err(ClientError::Disconnected);
        }
        if let Some(stored) = self.registry.get_mut(device, vector) {
            stored.set_element_text(element, text);
        }
        self.send_vector(device, vector)
    }

    /// Set a number element and send the vector.
    pub fn set_and_send_float(
        &mut self,
        device: &str,
        vector: &str,
        element: &str,
        value: f64,
    ) -> ClientResult<PropertyVector> {
        if self.get_vector(device, vector).is_none() {
            return Err(ClientError::Disconnected);
        }
        if let Some(stored) = self.registry.get_mut(device, vector) {
            stored.set_element_float(element, value);
        }
        self.send_vector(device, vector)
    }

    /// Set a switch element and send the vector.
    pub fn set_and_send_bool(
        &mut self,
        device: &str,
        vector: &str,
        element: &str,
        on: bool,
    ) -> ClientResult<PropertyVector> {
        if self.get_vector(device, vector).is_none() {
            return Err(ClientError::Disconnected);
        }
        if let Some(stored) = self.registry.get_mut(device, vector) {
            stored.set_element_on(element, on);
        }
        self.send_vector(device, vector)
    }

    /// Turn the switch with the given display label on, every sibling
    /// off, and send the vector.
    pub fn set_and_send_switch_by_label(
        &mut self,
        device: &str,
        vector: &str,
        label: &str,
    ) -> ClientResult<PropertyVector> {
        if self.get_vector(device, vector).is_none() {
            return Err(ClientError::Disconnected);
        }
        if let Some(stored) = self.registry.get_mut(device, vector) {
            stored.select_switch_by_label(label);
        }
        self.send_vector(device, vector)
    }

    /// Block until the vector's state turns `Ok`, usually meaning the
    /// device finished the operation a previous send requested.
    pub fn wait_until_ok(
        &mut self,
        device: &str,
        name: &str,
        timeout: Duration,
    ) -> ClientResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain_registry_queue();
            if let Some(vector) = self.registry.get(device, name) {
                if vector.state().is_ok() {
                    return Ok(());
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ClientError::WaitTimeout {
                    device: device.to_string(),
                    vector: name.to_string(),
                });
            }
            match self.connection.registry_rx.recv_timeout(deadline - now) {
                Ok(vector) => self.registry.merge(vector),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(ClientError::Disconnected),
            }
        }
    }

    // ------------------------------------------------------------------
    // Event processing and handler registration
    // ------------------------------------------------------------------

    /// Drain the event queue, dispatching every completed protocol object
    /// to its observers on this thread, in the order the codec completed
    /// them.
    ///
    /// Per vector update: vector handlers first, then element handlers
    /// for each element, then (for a first-time define) the matching
    /// per-kind define handler. Messages go to the message handler. This
    /// is the only place user callbacks run; call it from the
    /// application's main loop.
    pub fn process_events(&mut self) -> ClientResult<()> {
        if self.connection.is_shutdown() {
            return Err(ClientError::Disconnected);
        }
        self.drain_registry_queue();
        while let Ok(event) = self.connection.event_rx.try_recv() {
            match event {
                WireEvent::Message(message) => {
                    if message.is_valid() {
                        (self.message_handler)(&message);
                    }
                }
                WireEvent::Vector(received, transfer) => {
                    // The worker posts to the registry queue before the
                    // event queue, so the canonical entry is already
                    // mergeable; dispatch always sees registry state.
                    self.drain_registry_queue();
                    let canonical = match self.registry.get(received.device(), received.name()) {
                        Some(vector) => vector.clone(),
                        None => {
                            self.registry.merge(received.clone());
                            received
                        }
                    };

                    for subscription in &mut self.vector_subscriptions {
                        if subscription.matches(&canonical) {
                            subscription.dispatch(&canonical);
                        }
                    }
                    for element in canonical.elements() {
                        for subscription in &mut self.element_subscriptions {
                            if subscription.matches(&canonical, element) {
                                subscription.dispatch(&canonical, element);
                            }
                        }
                    }
                    if transfer == Transfer::Define
                        && self
                            .registry
                            .mark_defined(canonical.device(), canonical.name())
                    {
                        let kind = canonical.kind().property_kind();
                        (self.def_handlers.for_kind(kind))(&canonical);
                    }
                }
            }
        }
        Ok(())
    }

    /// Register a vector handler.
    ///
    /// Blocks until the target vector exists, then attaches the
    /// subscription's [`FeedbackGuard`], runs the one-time `configure`,
    /// and delivers an immediate first `on_changed`, so a handler always
    /// sees at least one value before this returns. Subsequent updates
    /// are delivered from [`process_events`](Self::process_events).
    /// Returns a clone of the guard, or `None` when the vector never
    /// arrived.
    pub fn add_vector_handler(
        &mut self,
        device: &str,
        name: &str,
        handler: impl VectorHandler + 'static,
    ) -> Option<FeedbackGuard> {
        let vector = self.get_vector(device, name)?;
        let guard = FeedbackGuard::new();
        let mut handler: Box<dyn VectorHandler> = Box::new(handler);
        handler.attach(guard.clone());
        let mut subscription = VectorSubscription::new(device, name, guard.clone(), handler);
        subscription.configure(&vector);
        subscription.dispatch(&vector);
        self.vector_subscriptions.push(subscription);
        Some(guard)
    }

    /// Register an element handler; same contract as
    /// [`add_vector_handler`](Self::add_vector_handler).
    pub fn add_element_handler(
        &mut self,
        device: &str,
        vector: &str,
        element: &str,
        handler: impl ElementHandler + 'static,
    ) -> Option<FeedbackGuard> {
        let snapshot = self.get_vector(device, vector)?;
        let target = snapshot.element(element)?.clone();
        let guard = FeedbackGuard::new();
        let mut handler: Box<dyn ElementHandler> = Box::new(handler);
        handler.attach(guard.clone());
        let mut subscription =
            ElementSubscription::new(device, vector, element, guard.clone(), handler);
        subscription.configure(&snapshot, &target);
        subscription.dispatch(&snapshot, &target);
        self.element_subscriptions.push(subscription);
        Some(guard)
    }

    /// Register a bare closure as an element handler.
    pub fn add_element_callback(
        &mut self,
        device: &str,
        vector: &str,
        element: &str,
        callback: impl FnMut(&PropertyVector, &PropertyElement) + Send + 'static,
    ) -> Option<FeedbackGuard> {
        self.add_element_handler(device, vector, element, ElementCallback::new(callback))
    }

    /// Replace the handler for standalone device messages.
    pub fn set_message_handler(
        &mut self,
        handler: impl FnMut(&indi_protocol::DeviceMessage) + Send + 'static,
    ) {
        self.message_handler = Box::new(handler);
    }

    /// Replace the handler invoked when a blocking accessor's wait
    /// interval expires. The returned [`WaitPolicy`] decides whether the
    /// accessor keeps waiting.
    pub fn set_timeout_handler(
        &mut self,
        handler: impl FnMut(&str, &str) -> WaitPolicy + Send + 'static,
    ) {
        self.timeout_handler = Box::new(handler);
    }

    /// Replace the per-kind define handlers, each fired at most once per
    /// `(device, vector)` pair on its first define transfer.
    pub fn set_def_handlers(
        &mut self,
        blob: impl FnMut(&PropertyVector) + Send + 'static,
        number: impl FnMut(&PropertyVector) + Send + 'static,
        switch: impl FnMut(&PropertyVector) + Send + 'static,
        text: impl FnMut(&PropertyVector) + Send + 'static,
        light: impl FnMut(&PropertyVector) + Send + 'static,
    ) {
        self.def_handlers.set(
            Box::new(blob) as DefHandler,
            Box::new(number) as DefHandler,
            Box::new(switch) as DefHandler,
            Box::new(text) as DefHandler,
            Box::new(light) as DefHandler,
        );
    }

    // ------------------------------------------------------------------
    // Connection control
    // ------------------------------------------------------------------

    /// Opt in to receiving BLOB vectors; without this the server never
    /// transmits them.
    pub fn enable_blob(&self) {
        self.connection.enable_blob();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.connection.is_shutdown()
    }

    /// Stop the background worker and close the connection. No events
    /// are dispatched afterwards; `process_events` returns
    /// [`ClientError::Disconnected`].
    pub fn shutdown(&mut self) {
        self.connection.shutdown();
    }
}
