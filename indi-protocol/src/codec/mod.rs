//! Wire codec: incremental decoding of the streamed tag vocabulary and
//! serialization back to it.

pub mod parser;
pub mod tags;
pub mod writer;

pub use parser::{StreamCodec, WireEvent};
pub use tags::{classify, element_tag, vector_tag, TagRole, Transfer};
pub use writer::{enable_blob_frame, get_properties_frame, serialize_vector};
