//! Incremental decoder for the streamed wire format.
//!
//! Data arrives as a continuous byte stream of top-level XML-like tags,
//! possibly fragmented across socket reads. [`StreamCodec`] accumulates
//! bytes, isolates each complete top-level tag with a quote-aware depth
//! scan, and parses the completed fragment event-wise. Unrecognized or
//! malformed fragments are dropped without interrupting the stream.

use std::collections::HashMap;
use std::time::Duration;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::codec::tags::{self, TagRole, Transfer};
use crate::property::{
    normalize_whitespace, DeviceMessage, ElementPayload, LightState, Permission, PropertyElement,
    PropertyKind, PropertyVector, SwitchRule, VectorKind,
};

/// A completed protocol object decoded from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// A fully received vector, tagged with its transfer direction.
    Vector(PropertyVector, Transfer),
    /// A standalone device message.
    Message(DeviceMessage),
}

/// Incremental stream decoder.
///
/// Feed raw socket bytes with [`feed`](Self::feed); completed protocol
/// objects come back in the order their closing tags were observed. Bytes
/// belonging to an unfinished tag are retained for the next call.
#[derive(Debug, Default)]
pub struct StreamCodec {
    buf: Vec<u8>,
}

impl StreamCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes from the wire and decode every fragment they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some((start, end)) = next_fragment(&self.buf) {
            let fragment = String::from_utf8_lossy(&self.buf[start..end]).into_owned();
            self.buf.drain(..end);
            if let Some(event) = parse_fragment(&fragment) {
                events.push(event);
            }
        }
        events
    }
}

/// Locate the next complete top-level tag in the buffer, returning its
/// byte bounds. `None` when the buffer holds only a partial tag.
fn next_fragment(buf: &[u8]) -> Option<(usize, usize)> {
    let start = buf.iter().position(|&b| b == b'<')?;
    let mut depth = 0usize;
    let mut i = start;
    while i < buf.len() {
        if buf[i] != b'<' {
            i += 1;
            continue;
        }
        let is_close = matches!(buf.get(i + 1), Some(b'/'));
        let is_markup = matches!(buf.get(i + 1), Some(b'?') | Some(b'!'));
        let mut j = i + 1;
        let mut quote: Option<u8> = None;
        let mut terminated = false;
        while j < buf.len() {
            let b = buf[j];
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'>' => {
                        terminated = true;
                        break;
                    }
                    _ => {}
                },
            }
            j += 1;
        }
        if !terminated {
            // Tag split across reads; wait for more bytes.
            return None;
        }
        if is_markup {
            // Declarations and comments: standalone at top level, inert
            // inside a fragment.
            if depth == 0 {
                return Some((start, j + 1));
            }
        } else if is_close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some((start, j + 1));
            }
        } else if buf[j - 1] == b'/' {
            // Self-closing.
            if depth == 0 {
                return Some((start, j + 1));
            }
        } else {
            depth += 1;
        }
        i = j + 1;
    }
    None
}

/// Parse one complete top-level fragment into a protocol object, or `None`
/// for anything unrecognized.
fn parse_fragment(fragment: &str) -> Option<WireEvent> {
    let mut reader = Reader::from_str(fragment);
    // (vector under construction, its transfer, its wire tag)
    let mut vector: Option<(PropertyVector, Transfer, String)> = None;
    // (element under construction, its wire tag, accumulated body text)
    let mut element: Option<(PropertyElement, String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if let Some(event) = handle_open(&start, false, &mut vector, &mut element) {
                    return Some(event);
                }
            }
            Ok(Event::Empty(start)) => {
                if let Some(event) = handle_open(&start, true, &mut vector, &mut element) {
                    return Some(event);
                }
            }
            Ok(Event::Text(text)) => {
                if let Some((_, _, data)) = element.as_mut() {
                    if let Ok(chunk) = text.unescape() {
                        data.push_str(&chunk);
                    }
                }
            }
            Ok(Event::End(end)) => {
                let tag = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                if let Some((el, element_tag, data)) = element.take() {
                    if element_tag == tag {
                        if let Some((v, _, _)) = vector.as_mut() {
                            v.push_element(finish_element(el, &data));
                        }
                        continue;
                    }
                    element = Some((el, element_tag, data));
                }
                if let Some((v, transfer, vector_tag)) = vector.take() {
                    if vector_tag == tag {
                        return Some(WireEvent::Vector(v, transfer));
                    }
                    vector = Some((v, transfer, vector_tag));
                }
            }
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(error) => {
                tracing::debug!(%error, "dropping malformed wire fragment");
                return None;
            }
        }
    }
}

fn handle_open(
    start: &BytesStart<'_>,
    self_closing: bool,
    vector: &mut Option<(PropertyVector, Transfer, String)>,
    element: &mut Option<(PropertyElement, String, String)>,
) -> Option<WireEvent> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    match tags::classify(&tag) {
        Some(TagRole::Message) => {
            let attrs = attr_map(start);
            return Some(WireEvent::Message(DeviceMessage {
                device: attr(&attrs, "device"),
                timestamp: attr(&attrs, "timestamp"),
                text: attr(&attrs, "message"),
            }));
        }
        Some(TagRole::Vector(kind, transfer)) if vector.is_none() => {
            let built = vector_from_attrs(kind, &attr_map(start));
            if self_closing {
                return Some(WireEvent::Vector(built, transfer));
            }
            *vector = Some((built, transfer, tag));
        }
        Some(TagRole::Element(kind, _)) if vector.is_some() && element.is_none() => {
            let built = element_from_attrs(kind, &attr_map(start));
            if self_closing {
                if let Some((v, _, _)) = vector.as_mut() {
                    v.push_element(finish_element(built, ""));
                }
            } else {
                *element = Some((built, tag, String::new()));
            }
        }
        _ => {
            tracing::debug!(tag = %tag, "skipping unrecognized wire tag");
        }
    }
    None
}

fn finish_element(mut element: PropertyElement, body: &str) -> PropertyElement {
    element.set_wire_value(body);
    element
}

fn vector_from_attrs(kind: PropertyKind, attrs: &HashMap<String, String>) -> PropertyVector {
    let vector_kind = match kind {
        PropertyKind::Text => VectorKind::Text,
        PropertyKind::Number => VectorKind::Number,
        PropertyKind::Switch => VectorKind::Switch(SwitchRule::from_wire(&attr(attrs, "rule"))),
        PropertyKind::Light => VectorKind::Light,
        PropertyKind::Blob => VectorKind::Blob,
    };
    let mut vector = PropertyVector::new(attr(attrs, "device"), attr(attrs, "name"), vector_kind);
    vector.set_label(attr(attrs, "label"));
    vector.set_group(attr(attrs, "group"));
    vector.set_permission(Permission::from_wire(&attr(attrs, "perm")));
    vector.set_timestamp(attr(attrs, "timestamp"));
    vector.set_timeout(parse_timeout(&attr(attrs, "timeout")));
    // An absent or unparseable state attribute reads as Alert, not Idle.
    vector.set_state(LightState::from_wire(&attr(attrs, "state")).unwrap_or(LightState::Alert));
    let message = attr(attrs, "message");
    vector.set_message(if message.is_empty() { None } else { Some(message) });
    vector
}

fn element_from_attrs(kind: PropertyKind, attrs: &HashMap<String, String>) -> PropertyElement {
    let payload = match kind {
        PropertyKind::Text => ElementPayload::Text,
        PropertyKind::Switch => ElementPayload::Switch,
        PropertyKind::Light => ElementPayload::Light,
        PropertyKind::Number => ElementPayload::Number {
            format: attr(attrs, "format"),
            min: parse_bound(&attr(attrs, "min")),
            max: parse_bound(&attr(attrs, "max")),
            step: parse_bound(&attr(attrs, "step")),
        },
        PropertyKind::Blob => ElementPayload::Blob {
            format: attr(attrs, "format"),
        },
    };
    PropertyElement::new(attr(attrs, "name"), attr(attrs, "label"), payload)
}

fn attr_map(start: &BytesStart<'_>) -> HashMap<String, String> {
    start
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_default();
            (key, value)
        })
        .collect()
}

fn attr(attrs: &HashMap<String, String>, key: &str) -> String {
    attrs
        .get(key)
        .map(|v| normalize_whitespace(v))
        .unwrap_or_default()
}

fn parse_bound(text: &str) -> f64 {
    text.parse().unwrap_or(0.0)
}

fn parse_timeout(text: &str) -> Option<Duration> {
    let seconds: f64 = text.parse().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}
