//! Typed property model for the INDI protocol.
//!
//! Devices expose named, typed values grouped into property vectors. An
//! element is a single value of one of five kinds (text, number, switch,
//! light, BLOB); a vector is a device-owned group of elements that is
//! defined, updated, and written as a unit.
//!
//! The model is deliberately tolerant: assignments that violate a kind's
//! value domain (an unknown light state, a non-numeric number body, a write
//! to a read-only vector) are silently ignored rather than rejected, so a
//! misbehaving device or caller can never poison the stream.

use std::fmt;
use std::time::Duration;

use crate::blob;
use crate::error::ProtocolResult;
use crate::sexagesimal;

/// Collapse runs of whitespace to single spaces and trim the ends.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Kind and attribute enums
// ============================================================================

/// The five element kinds of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Text,
    Switch,
    Number,
    Blob,
    Light,
}

impl PropertyKind {
    pub const ALL: [PropertyKind; 5] = [
        PropertyKind::Text,
        PropertyKind::Switch,
        PropertyKind::Number,
        PropertyKind::Blob,
        PropertyKind::Light,
    ];

    /// The basename used to compose wire tag names (`defTextVector`,
    /// `oneBLOB`, ...).
    pub fn basename(&self) -> &'static str {
        match self {
            PropertyKind::Text => "Text",
            PropertyKind::Switch => "Switch",
            PropertyKind::Number => "Number",
            PropertyKind::Blob => "BLOB",
            PropertyKind::Light => "Light",
        }
    }
}

/// Operating state reported by a device, for a vector or a light element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightState {
    /// Not connected or nothing to report.
    #[default]
    Idle,
    /// Ready; the last operation settled.
    Ok,
    /// An operation is in progress.
    Busy,
    /// Responding, but something is wrong.
    Alert,
}

impl LightState {
    /// Parse a wire state string. Unknown strings yield `None` so callers
    /// can keep their previous state.
    pub fn from_wire(text: &str) -> Option<Self> {
        match text {
            "Idle" => Some(LightState::Idle),
            "Ok" => Some(LightState::Ok),
            "Busy" => Some(LightState::Busy),
            "Alert" => Some(LightState::Alert),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            LightState::Idle => "Idle",
            LightState::Ok => "Ok",
            LightState::Busy => "Busy",
            LightState::Alert => "Alert",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, LightState::Idle)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, LightState::Ok)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, LightState::Busy)
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, LightState::Alert)
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Read/write permission of a vector.
///
/// An absent `perm` attribute parses to [`Permission::Unset`] rather than
/// being conflated with read-only; only an explicit `ro` blocks writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Unset,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Permission {
    pub fn from_wire(text: &str) -> Self {
        match text {
            "ro" => Permission::ReadOnly,
            "wo" => Permission::WriteOnly,
            "rw" => Permission::ReadWrite,
            _ => Permission::Unset,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Permission::Unset => "",
            Permission::ReadOnly => "ro",
            Permission::WriteOnly => "wo",
            Permission::ReadWrite => "rw",
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, Permission::ReadOnly | Permission::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Permission::WriteOnly | Permission::ReadWrite)
    }

    /// Whether local mutation should be ignored. `Unset` permits writes:
    /// a device that never declared permissions still accepts commands.
    pub(crate) fn blocks_writes(&self) -> bool {
        matches!(self, Permission::ReadOnly)
    }
}

/// Constraint on which switches of a vector may be on at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchRule {
    /// Exactly one switch is on.
    OneOfMany,
    /// At most one switch is on.
    AtMostOne,
    /// Any combination.
    #[default]
    AnyOfMany,
}

impl SwitchRule {
    pub fn from_wire(text: &str) -> Self {
        match text {
            "OneOfMany" => SwitchRule::OneOfMany,
            "AtMostOne" => SwitchRule::AtMostOne,
            _ => SwitchRule::AnyOfMany,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            SwitchRule::OneOfMany => "OneOfMany",
            SwitchRule::AtMostOne => "AtMostOne",
            SwitchRule::AnyOfMany => "AnyOfMany",
        }
    }
}

// ============================================================================
// Elements
// ============================================================================

/// Kind-specific metadata carried by an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementPayload {
    Text,
    Number {
        /// printf-style display format; `m` marks sexagesimal.
        format: String,
        min: f64,
        max: f64,
        step: f64,
    },
    Switch,
    Light,
    Blob {
        /// File-format tag, e.g. `.fits` or `.fits.z` when compressed.
        format: String,
    },
}

impl ElementPayload {
    pub fn kind(&self) -> PropertyKind {
        match self {
            ElementPayload::Text => PropertyKind::Text,
            ElementPayload::Number { .. } => PropertyKind::Number,
            ElementPayload::Switch => PropertyKind::Switch,
            ElementPayload::Light => PropertyKind::Light,
            ElementPayload::Blob { .. } => PropertyKind::Blob,
        }
    }
}

/// A single named, typed value owned by exactly one [`PropertyVector`].
///
/// The element keeps its value in wire form (a string) alongside the value
/// it had when [`take_changed`](Self::take_changed) was last called, which
/// is how per-element change detection works.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyElement {
    name: String,
    label: String,
    value: String,
    previous: String,
    payload: ElementPayload,
}

impl PropertyElement {
    /// Create an element with an empty value. An empty label defaults to
    /// the name.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        payload: ElementPayload,
    ) -> Self {
        let name = name.into();
        let label = label.into();
        let label = if label.is_empty() { name.clone() } else { label };
        Self {
            name,
            label,
            value: String::new(),
            previous: String::new(),
            payload,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> PropertyKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &ElementPayload {
        &self.payload
    }

    /// The raw wire value. For BLOBs this is the base64 text, not the
    /// decoded payload.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The display text of the value. Numbers are rendered through their
    /// declared format (sexagesimal when requested); other kinds return the
    /// wire value as-is.
    pub fn text(&self) -> String {
        if let ElementPayload::Number { format, .. } = &self.payload {
            if let Some(value) = self.as_float() {
                return sexagesimal::format_number(format, value);
            }
        }
        self.value.clone()
    }

    /// Store an inbound wire value, applying the kind's tolerance rules:
    /// number bodies must parse (decimal or sexagesimal), light bodies must
    /// name a valid state, BLOB bodies keep only non-whitespace characters.
    /// Values that fail validation are dropped and the element keeps its
    /// previous value.
    pub(crate) fn set_wire_value(&mut self, raw: &str) {
        match &self.payload {
            ElementPayload::Blob { .. } => {
                self.value = raw.chars().filter(|c| !c.is_whitespace()).collect();
            }
            ElementPayload::Number { .. } => {
                let text = normalize_whitespace(raw);
                if sexagesimal::parse_number(&text).is_some() {
                    self.value = text;
                }
            }
            ElementPayload::Light => {
                let text = normalize_whitespace(raw);
                if LightState::from_wire(&text).is_some() {
                    self.value = text;
                }
            }
            ElementPayload::Text | ElementPayload::Switch => {
                self.value = normalize_whitespace(raw);
            }
        }
    }

    /// Set the value from text. Numbers accept decimal or sexagesimal input
    /// and ignore anything else; lights accept only valid state names;
    /// BLOBs treat the text as a plain payload and encode it with a
    /// `.text` format.
    pub fn set_text(&mut self, text: &str) {
        if let ElementPayload::Blob { .. } = self.payload {
            // Infallible: text encoding never goes through zlib.
            if let Ok(encoded) = blob::encode(text.as_bytes(), ".text") {
                self.payload = ElementPayload::Blob {
                    format: ".text".to_string(),
                };
                self.value = encoded;
            }
            return;
        }
        self.set_wire_value(text);
    }

    /// Numeric value of the element, decoding sexagesimal text when
    /// present. `None` for empty or non-numeric values.
    pub fn as_float(&self) -> Option<f64> {
        sexagesimal::parse_number(&self.value)
    }

    /// The numeric value rounded to the nearest integer.
    pub fn as_int(&self) -> Option<i64> {
        self.as_float().map(|v| v.round() as i64)
    }

    /// Set a number element's value. Sexagesimal-formatted numbers store
    /// the plain decimal (display formatting happens in [`text`](Self::text));
    /// others store the format's rendering. Ignored for non-number kinds.
    pub fn set_float(&mut self, value: f64) {
        if let ElementPayload::Number { format, .. } = &self.payload {
            self.value = if sexagesimal::is_sexagesimal(format) {
                value.to_string()
            } else {
                sexagesimal::format_number(format, value)
            };
        }
    }

    /// Whether the element's value reads `On`.
    pub fn is_on(&self) -> bool {
        self.value == "On"
    }

    /// Set a switch element on or off. Ignored for other kinds.
    pub fn set_on(&mut self, on: bool) {
        if let ElementPayload::Switch = self.payload {
            self.value = if on { "On" } else { "Off" }.to_string();
        }
    }

    /// The state of a light element, `None` when unset or not a light.
    pub fn light_state(&self) -> Option<LightState> {
        LightState::from_wire(&self.value)
    }

    /// Set a light element's state.
    pub fn set_light_state(&mut self, state: LightState) {
        if let ElementPayload::Light = self.payload {
            self.value = state.as_wire().to_string();
        }
    }

    /// Decode a BLOB element's payload (base64, plus zlib when the format
    /// ends in `.z`).
    pub fn data(&self) -> ProtocolResult<Vec<u8>> {
        let format = match &self.payload {
            ElementPayload::Blob { format } => format.as_str(),
            _ => "",
        };
        blob::decode(&self.value, format)
    }

    /// Load a BLOB element from plain bytes, encoding for the wire and
    /// adopting the given format tag. Ignored for non-BLOB kinds.
    pub fn set_data(&mut self, data: &[u8], format: &str) -> ProtocolResult<()> {
        if let ElementPayload::Blob { .. } = self.payload {
            self.value = blob::encode(data, format)?;
            self.payload = ElementPayload::Blob {
                format: format.to_string(),
            };
        }
        Ok(())
    }

    /// The BLOB format with any `.z` compression suffix removed. `None`
    /// for non-BLOB elements.
    pub fn plain_format(&self) -> Option<&str> {
        match &self.payload {
            ElementPayload::Blob { format } => Some(blob::plain_format(format)),
            _ => None,
        }
    }

    /// Size of the wire representation of the value. For BLOBs this is the
    /// encoded length, not the decoded payload size.
    pub fn wire_size(&self) -> usize {
        self.value.len()
    }

    /// Smallest allowed value of a number element.
    pub fn min(&self) -> Option<f64> {
        match &self.payload {
            ElementPayload::Number { min, .. } => Some(*min),
            _ => None,
        }
    }

    /// Largest allowed value of a number element.
    pub fn max(&self) -> Option<f64> {
        match &self.payload {
            ElementPayload::Number { max, .. } => Some(*max),
            _ => None,
        }
    }

    /// Step increment of a number element.
    pub fn step(&self) -> Option<f64> {
        match &self.payload {
            ElementPayload::Number { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Number of steps between min and max, 0 when the element does not
    /// describe a usable range.
    pub fn step_count(&self) -> u64 {
        match &self.payload {
            ElementPayload::Number { min, max, step, .. } if *step > 0.0 && max > min => {
                ((max - min) / step).floor() as u64
            }
            _ => 0,
        }
    }

    /// Whether the value changed since this method was last called.
    ///
    /// True exactly once per distinct stored value; receiving the same
    /// value twice in a row reads as unchanged.
    pub fn take_changed(&mut self) -> bool {
        if self.previous == self.value {
            false
        } else {
            self.previous = self.value.clone();
            true
        }
    }

    /// Synchronize this element's value from a freshly received copy,
    /// matching by name is the caller's responsibility. Change-detection
    /// state is preserved so [`take_changed`](Self::take_changed) still
    /// reports the transition.
    pub fn update_from(&mut self, other: &PropertyElement) {
        self.value = other.value.clone();
        if let (ElementPayload::Blob { format }, ElementPayload::Blob { format: incoming }) =
            (&mut self.payload, &other.payload)
        {
            *format = incoming.clone();
        }
    }
}

impl fmt::Display for PropertyElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "    {} {} {} {}",
            self.name,
            self.label,
            self.kind().basename(),
            self.text()
        )
    }
}

// ============================================================================
// Vectors
// ============================================================================

/// The kind of a vector; switch vectors carry their exclusivity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    Text,
    Number,
    Switch(SwitchRule),
    Light,
    Blob,
}

impl VectorKind {
    pub fn property_kind(&self) -> PropertyKind {
        match self {
            VectorKind::Text => PropertyKind::Text,
            VectorKind::Number => PropertyKind::Number,
            VectorKind::Switch(_) => PropertyKind::Switch,
            VectorKind::Light => PropertyKind::Light,
            VectorKind::Blob => PropertyKind::Blob,
        }
    }

    pub fn rule(&self) -> Option<SwitchRule> {
        match self {
            VectorKind::Switch(rule) => Some(*rule),
            _ => None,
        }
    }
}

/// A named, typed, device-owned group of elements: the unit of definition,
/// update, and transmission in the protocol.
///
/// `(device, name)` uniquely identifies a vector in a registry. Element
/// names are unique within the vector.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyVector {
    device: String,
    name: String,
    label: String,
    group: String,
    kind: VectorKind,
    permission: Permission,
    timeout: Option<Duration>,
    timestamp: String,
    state: LightState,
    message: Option<String>,
    elements: Vec<PropertyElement>,
}

impl PropertyVector {
    /// Create an empty vector. Light vectors are forced read-only.
    pub fn new(device: impl Into<String>, name: impl Into<String>, kind: VectorKind) -> Self {
        let permission = if matches!(kind, VectorKind::Light) {
            Permission::ReadOnly
        } else {
            Permission::Unset
        };
        let name = name.into();
        Self {
            device: device.into(),
            label: name.clone(),
            name,
            group: String::new(),
            kind,
            permission,
            timeout: None,
            timestamp: String::new(),
            state: LightState::Idle,
            message: None,
            elements: Vec::new(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn kind(&self) -> VectorKind {
        self.kind
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Advisory worst-case settle time for a write, as reported by the
    /// device.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Server-reported timestamp of the last transfer, kept opaque.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Summary state of the vector.
    pub fn state(&self) -> LightState {
        self.state
    }

    /// Free-text message the device attached to the last transfer.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !label.is_empty() {
            self.label = label;
        }
    }

    pub fn set_group(&mut self, group: impl Into<String>) {
        self.group = group.into();
    }

    /// Set the permission. Ignored for light vectors, which stay read-only.
    pub fn set_permission(&mut self, permission: Permission) {
        if !matches!(self.kind, VectorKind::Light) {
            self.permission = permission;
        }
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn set_timestamp(&mut self, timestamp: impl Into<String>) {
        self.timestamp = timestamp.into();
    }

    pub fn set_state(&mut self, state: LightState) {
        self.state = state;
    }

    pub fn set_message(&mut self, message: Option<String>) {
        self.message = message;
    }

    /// Append an element. A later element with a duplicate name replaces
    /// the earlier one, keeping element names unique within the vector.
    pub fn push_element(&mut self, element: PropertyElement) {
        if let Some(existing) = self.elements.iter_mut().find(|e| e.name() == element.name()) {
            *existing = element;
        } else {
            self.elements.push(element);
        }
    }

    pub fn elements(&self) -> &[PropertyElement] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [PropertyElement] {
        &mut self.elements
    }

    pub fn element(&self, name: &str) -> Option<&PropertyElement> {
        self.elements.iter().find(|e| e.name() == name)
    }

    pub fn element_mut(&mut self, name: &str) -> Option<&mut PropertyElement> {
        self.elements.iter_mut().find(|e| e.name() == name)
    }

    pub fn first_element(&self) -> Option<&PropertyElement> {
        self.elements.first()
    }

    /// Whether local writes are allowed. Only an explicit read-only
    /// permission blocks them.
    pub fn is_writable(&self) -> bool {
        !self.permission.blocks_writes()
    }

    /// Set a named element's value from text, honoring the vector's
    /// permission: writes to read-only vectors are silently ignored.
    pub fn set_element_text(&mut self, element: &str, text: &str) {
        if self.is_writable() {
            if let Some(el) = self.element_mut(element) {
                el.set_text(text);
            }
        }
    }

    /// Set a named number element, honoring the vector's permission.
    pub fn set_element_float(&mut self, element: &str, value: f64) {
        if self.is_writable() {
            if let Some(el) = self.element_mut(element) {
                el.set_float(value);
            }
        }
    }

    /// Set a named switch element, honoring the vector's permission.
    pub fn set_element_on(&mut self, element: &str, on: bool) {
        if self.is_writable() {
            if let Some(el) = self.element_mut(element) {
                el.set_on(on);
            }
        }
    }

    /// Turn the named switch on and every sibling off. A no-op unless
    /// exactly one element matches, and for non-switch or read-only
    /// vectors.
    pub fn select_switch(&mut self, name: &str) {
        self.select_switch_where(|e| e.name() == name);
    }

    /// Like [`select_switch`](Self::select_switch), matching on the
    /// display label instead of the name.
    pub fn select_switch_by_label(&mut self, label: &str) {
        self.select_switch_where(|e| e.label() == label);
    }

    /// Turn the switch at `index` on and every sibling off.
    pub fn select_switch_index(&mut self, index: usize) {
        if !matches!(self.kind, VectorKind::Switch(_)) || !self.is_writable() {
            return;
        }
        if index >= self.elements.len() {
            return;
        }
        for (i, element) in self.elements.iter_mut().enumerate() {
            element.set_on(i == index);
        }
    }

    fn select_switch_where(&mut self, matches: impl Fn(&PropertyElement) -> bool) {
        if !matches!(self.kind, VectorKind::Switch(_)) || !self.is_writable() {
            return;
        }
        if self.elements.iter().filter(|e| matches(e)).count() != 1 {
            return;
        }
        for element in &mut self.elements {
            let on = matches(element);
            element.set_on(on);
        }
    }

    /// The first switch element that is on, `None` when all are off.
    pub fn active_switch(&self) -> Option<&PropertyElement> {
        self.elements.iter().find(|e| e.is_on())
    }

    /// Whether any element's value changed since the last inspection.
    /// Consumes every element's change flag.
    pub fn changed(&mut self) -> bool {
        let mut changed = false;
        for element in &mut self.elements {
            if element.take_changed() {
                changed = true;
            }
        }
        changed
    }

    /// Apply a freshly received snapshot of the same vector: transfer
    /// metadata (timestamp, timeout, state) is overwritten wholesale,
    /// element values are synchronized in place by matching names so
    /// existing elements keep their identity and change-detection state.
    /// Incoming elements with no local counterpart are appended.
    pub fn update_from(&mut self, incoming: &PropertyVector) {
        self.timestamp = incoming.timestamp.clone();
        self.timeout = incoming.timeout;
        self.state = incoming.state;
        for received in &incoming.elements {
            match self.element_mut(received.name()) {
                Some(existing) => existing.update_from(received),
                None => self.elements.push(received.clone()),
            }
        }
    }
}

impl fmt::Display for PropertyVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = match self.kind {
            VectorKind::Switch(rule) => rule.as_wire(),
            _ => self.permission.as_wire(),
        };
        writeln!(
            f,
            "{} {} {} {}Vector {}",
            self.device,
            self.name,
            self.label,
            self.kind.property_kind().basename(),
            detail
        )?;
        for element in &self.elements {
            writeln!(f, "{element}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A timestamped free-text notification from a device, not tied to any
/// vector. Delivered once and never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMessage {
    pub device: String,
    pub timestamp: String,
    pub text: String,
}

impl DeviceMessage {
    pub fn is_valid(&self) -> bool {
        !self.text.is_empty()
    }
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.device, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_element(name: &str, format: &str) -> PropertyElement {
        PropertyElement::new(
            name,
            "",
            ElementPayload::Number {
                format: format.to_string(),
                min: 0.0,
                max: 0.0,
                step: 0.0,
            },
        )
    }

    fn switch_vector(rule: SwitchRule, names: &[&str]) -> PropertyVector {
        let mut vector = PropertyVector::new("Tele", "MODE", VectorKind::Switch(rule));
        for name in names {
            vector.push_element(PropertyElement::new(*name, "", ElementPayload::Switch));
        }
        vector
    }

    #[test]
    fn test_label_defaults_to_name() {
        let element = PropertyElement::new("RA", "", ElementPayload::Text);
        assert_eq!(element.label(), "RA");

        let element = PropertyElement::new("RA", "Right Ascension", ElementPayload::Text);
        assert_eq!(element.label(), "Right Ascension");
    }

    #[test]
    fn test_change_flag_once_per_distinct_value() {
        let mut element = number_element("RA", "%10.6m");
        element.set_wire_value("1.5");
        assert!(element.take_changed());
        assert!(!element.take_changed());

        // Same value again: no change.
        element.set_wire_value("1.5");
        assert!(!element.take_changed());

        element.set_wire_value("2.0");
        assert!(element.take_changed());
        assert!(!element.take_changed());
    }

    #[test]
    fn test_number_accepts_sexagesimal_text() {
        let mut element = number_element("RA", "%10.6m");
        element.set_text("1:30:00");
        assert!((element.as_float().unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(element.text(), "1:30:0.00");
    }

    #[test]
    fn test_number_rejects_garbage_silently() {
        let mut element = number_element("RA", "%10.6m");
        element.set_text("1.5");
        element.set_text("not a number");
        assert!((element.as_float().unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_number_set_float_honors_format() {
        let mut sexagesimal = number_element("RA", "%10.6m");
        sexagesimal.set_float(1.5);
        assert_eq!(sexagesimal.value(), "1.5");
        assert_eq!(sexagesimal.text(), "1:30:0.00");

        let mut fixed = number_element("TEMP", "%6.2f");
        fixed.set_float(3.14159);
        assert_eq!(fixed.value(), "3.14");
    }

    #[test]
    fn test_light_invalid_state_ignored() {
        let mut element = PropertyElement::new("STATUS", "", ElementPayload::Light);
        element.set_wire_value("Busy");
        assert_eq!(element.light_state(), Some(LightState::Busy));

        element.set_wire_value("Broken");
        assert_eq!(element.light_state(), Some(LightState::Busy));
    }

    #[test]
    fn test_switch_on_off() {
        let mut element = PropertyElement::new("CONNECT", "", ElementPayload::Switch);
        assert!(!element.is_on());
        element.set_on(true);
        assert!(element.is_on());
        element.set_on(false);
        assert!(!element.is_on());
    }

    #[test]
    fn test_blob_round_trip_through_element() {
        let mut element = PropertyElement::new(
            "IMG",
            "",
            ElementPayload::Blob {
                format: String::new(),
            },
        );
        element.set_data(b"pixels", ".fits.z").unwrap();
        assert_eq!(element.data().unwrap(), b"pixels");
        assert_eq!(element.plain_format(), Some(".fits"));
    }

    #[test]
    fn test_select_switch_exclusive() {
        let mut vector = switch_vector(SwitchRule::OneOfMany, &["SLEW", "TRACK", "SYNC"]);
        vector.element_mut("SLEW").unwrap().set_on(true);

        vector.select_switch("TRACK");
        assert!(!vector.element("SLEW").unwrap().is_on());
        assert!(vector.element("TRACK").unwrap().is_on());
        assert!(!vector.element("SYNC").unwrap().is_on());
        assert_eq!(vector.active_switch().unwrap().name(), "TRACK");
    }

    #[test]
    fn test_select_switch_unknown_name_is_noop() {
        let mut vector = switch_vector(SwitchRule::OneOfMany, &["SLEW", "TRACK"]);
        vector.element_mut("SLEW").unwrap().set_on(true);

        vector.select_switch("WARP");
        assert!(vector.element("SLEW").unwrap().is_on());
    }

    #[test]
    fn test_select_switch_ambiguous_label_is_noop() {
        let mut vector = PropertyVector::new("Tele", "MODE", VectorKind::Switch(SwitchRule::OneOfMany));
        vector.push_element(PropertyElement::new("A", "Same", ElementPayload::Switch));
        vector.push_element(PropertyElement::new("B", "Same", ElementPayload::Switch));
        vector.element_mut("A").unwrap().set_on(true);

        vector.select_switch_by_label("Same");
        assert!(vector.element("A").unwrap().is_on());
        assert!(!vector.element("B").unwrap().is_on());
    }

    #[test]
    fn test_light_vector_forced_read_only() {
        let mut vector = PropertyVector::new("Tele", "STATUS", VectorKind::Light);
        assert_eq!(vector.permission(), Permission::ReadOnly);

        vector.set_permission(Permission::ReadWrite);
        assert_eq!(vector.permission(), Permission::ReadOnly);
    }

    #[test]
    fn test_read_only_vector_ignores_writes() {
        let mut vector = PropertyVector::new("Tele", "EQ", VectorKind::Number);
        vector.set_permission(Permission::ReadOnly);
        let mut element = number_element("RA", "%10.6m");
        element.set_wire_value("1.5");
        vector.push_element(element);

        vector.set_element_float("RA", 2.0);
        assert!((vector.element("RA").unwrap().as_float().unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_update_from_merges_in_place() {
        let mut stored = PropertyVector::new("Tele", "EQ", VectorKind::Number);
        let mut ra = number_element("RA", "%10.6m");
        ra.set_wire_value("1.5");
        stored.push_element(ra);
        let mut dec = number_element("DEC", "%10.6m");
        dec.set_wire_value("0");
        stored.push_element(dec);
        assert!(stored.changed());

        let mut incoming = PropertyVector::new("Tele", "EQ", VectorKind::Number);
        incoming.set_timestamp("2024-01-01T00:00:00");
        incoming.set_state(LightState::Ok);
        let mut ra = number_element("RA", "%10.6m");
        ra.set_wire_value("2.0");
        incoming.push_element(ra);

        stored.update_from(&incoming);
        assert_eq!(stored.timestamp(), "2024-01-01T00:00:00");
        assert_eq!(stored.state(), LightState::Ok);
        assert!((stored.element("RA").unwrap().as_float().unwrap() - 2.0).abs() < 1e-9);
        // DEC untouched by the partial update.
        assert_eq!(stored.element("DEC").unwrap().value(), "0");
        // RA changed, reported once.
        assert!(stored.changed());
        assert!(!stored.changed());
    }

    #[test]
    fn test_update_from_is_idempotent() {
        let mut stored = PropertyVector::new("Tele", "EQ", VectorKind::Number);
        let mut ra = number_element("RA", "%10.6m");
        ra.set_wire_value("1.5");
        stored.push_element(ra);

        let mut incoming = stored.clone();
        incoming.set_state(LightState::Ok);

        stored.update_from(&incoming);
        let after_once = stored.clone();
        stored.update_from(&incoming);
        assert_eq!(stored, after_once);
    }

    #[test]
    fn test_duplicate_element_names_replace() {
        let mut vector = PropertyVector::new("Tele", "EQ", VectorKind::Number);
        vector.push_element(number_element("RA", "%10.6m"));
        vector.push_element(number_element("RA", "%g"));
        assert_eq!(vector.elements().len(), 1);
    }

    #[test]
    fn test_display_dump() {
        let mut vector = PropertyVector::new("Tele", "EQ", VectorKind::Number);
        vector.set_permission(Permission::ReadWrite);
        let mut ra = number_element("RA", "%10.6m");
        ra.set_wire_value("1.5");
        vector.push_element(ra);

        let dump = vector.to_string();
        assert!(dump.starts_with("Tele EQ EQ NumberVector rw"));
        assert!(dump.contains("RA RA Number 1:30:0.00"));
    }
}
