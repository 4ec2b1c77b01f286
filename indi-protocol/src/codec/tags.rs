//! The wire tag vocabulary.
//!
//! Tag names are composed from a transfer verb and a kind basename:
//! `def`/`set`/`new` + kind + `Vector` for vectors, `def` + kind for
//! elements inside a define, `one` + kind for elements in set and new
//! transfers, plus the standalone `message` tag. The full vocabulary is a
//! closed set, built once into a lookup table.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::property::PropertyKind;

/// Direction and novelty of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Server announces a vector the client must not assume prior
    /// knowledge of.
    Define,
    /// Server updates an already-known vector.
    Set,
    /// Client requests a change.
    New,
}

/// What a recognized tag denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRole {
    Vector(PropertyKind, Transfer),
    Element(PropertyKind, Transfer),
    Message,
}

/// Classify a wire tag name. Unknown tags yield `None` and are skipped by
/// the codec.
pub fn classify(tag: &str) -> Option<TagRole> {
    table().get(tag).copied()
}

/// The wire tag of a vector in the given transfer direction.
pub fn vector_tag(kind: PropertyKind, transfer: Transfer) -> String {
    format!("{}{}Vector", verb(transfer), kind.basename())
}

/// The wire tag of an element in the given transfer direction.
pub fn element_tag(kind: PropertyKind, transfer: Transfer) -> String {
    match transfer {
        Transfer::Define => format!("def{}", kind.basename()),
        Transfer::Set | Transfer::New => format!("one{}", kind.basename()),
    }
}

/// The standalone message tag.
pub const MESSAGE_TAG: &str = "message";

fn verb(transfer: Transfer) -> &'static str {
    match transfer {
        Transfer::Define => "def",
        Transfer::Set => "set",
        Transfer::New => "new",
    }
}

fn table() -> &'static HashMap<String, TagRole> {
    static TABLE: OnceLock<HashMap<String, TagRole>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::new();
        for kind in PropertyKind::ALL {
            for transfer in [Transfer::Define, Transfer::Set, Transfer::New] {
                map.insert(vector_tag(kind, transfer), TagRole::Vector(kind, transfer));
                map.insert(element_tag(kind, transfer), TagRole::Element(kind, transfer));
            }
        }
        map.insert(MESSAGE_TAG.to_string(), TagRole::Message);
        map
    })
}
