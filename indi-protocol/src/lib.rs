//! # indi-protocol
//!
//! Property model and streaming wire codec for the INDI device protocol:
//! devices expose typed named properties grouped into vectors, announced
//! and updated over a continuous stream of self-describing XML-like tags.
//!
//! This crate is the stateless half of the SDK. It turns bytes into
//! [`WireEvent`]s and vectors back into bytes; connection handling, the
//! property registry, and handler dispatch live in `indi-client`.
//!
//! ## Decoding
//!
//! ```
//! use indi_protocol::{StreamCodec, WireEvent};
//!
//! let mut codec = StreamCodec::new();
//! let events = codec.feed(
//!     b"<defNumberVector device=\"Telescope\" name=\"EQ\">\
//!       <defNumber name=\"RA\" format=\"%10.6m\">1:30:00</defNumber>\
//!       </defNumberVector>",
//! );
//! match &events[0] {
//!     WireEvent::Vector(vector, _) => {
//!         let ra = vector.element("RA").unwrap();
//!         assert!((ra.as_float().unwrap() - 1.5).abs() < 1e-9);
//!     }
//!     _ => unreachable!(),
//! }
//! ```
//!
//! ## Encoding
//!
//! ```
//! use indi_protocol::{serialize_vector, PropertyVector, Transfer, VectorKind};
//!
//! let vector = PropertyVector::new("Telescope", "EQ", VectorKind::Number);
//! let wire = serialize_vector(&vector, Transfer::New).unwrap();
//! assert_eq!(wire, "<newNumberVector device=\"Telescope\" name=\"EQ\"></newNumberVector>");
//! ```

pub mod blob;
pub mod codec;
pub mod error;
pub mod property;
pub mod sexagesimal;

pub use codec::{
    enable_blob_frame, get_properties_frame, serialize_vector, StreamCodec, TagRole, Transfer,
    WireEvent,
};
pub use error::{ProtocolError, ProtocolResult};
pub use property::{
    DeviceMessage, ElementPayload, LightState, Permission, PropertyElement, PropertyKind,
    PropertyVector, SwitchRule, VectorKind,
};
