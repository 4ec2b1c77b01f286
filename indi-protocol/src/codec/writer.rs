//! Serialization of vectors and handshake frames to the wire form.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::codec::tags::{self, Transfer};
use crate::error::{ProtocolError, ProtocolResult};
use crate::property::{ElementPayload, PropertyVector};

/// The announcement a client sends on connect to request every property.
pub fn get_properties_frame() -> &'static str {
    "<getProperties version='1.5'/>"
}

/// The opt-in frame that makes the server transmit BLOB vectors.
pub fn enable_blob_frame() -> &'static str {
    "<enableBLOB>Also</enableBLOB>\n"
}

/// Serialize a vector for the given transfer direction.
///
/// Produces `<tag device=".." name=".."><element-tag name="..">value
/// </element-tag>...</tag>`, with BLOB elements additionally carrying
/// their declared `size` and `format` attributes.
pub fn serialize_vector(vector: &PropertyVector, transfer: Transfer) -> ProtocolResult<String> {
    let mut writer = Writer::new(Vec::new());
    let kind = vector.kind().property_kind();
    let vector_tag = tags::vector_tag(kind, transfer);

    let mut open = BytesStart::new(vector_tag.as_str());
    open.push_attribute(("device", vector.device()));
    open.push_attribute(("name", vector.name()));
    write(&mut writer, Event::Start(open))?;

    for element in vector.elements() {
        let element_tag = tags::element_tag(element.kind(), transfer);
        let mut open = BytesStart::new(element_tag.as_str());
        open.push_attribute(("name", element.name()));
        if let ElementPayload::Blob { format } = element.payload() {
            open.push_attribute(("size", element.wire_size().to_string().as_str()));
            open.push_attribute(("format", format.as_str()));
        }
        write(&mut writer, Event::Start(open))?;
        write(&mut writer, Event::Text(BytesText::new(element.value())))?;
        write(&mut writer, Event::End(BytesEnd::new(element_tag.as_str())))?;
    }

    write(&mut writer, Event::End(BytesEnd::new(vector_tag.as_str())))?;
    String::from_utf8(writer.into_inner()).map_err(|e| ProtocolError::Serialize(e.to_string()))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> ProtocolResult<()> {
    writer
        .write_event(event)
        .map_err(|e| ProtocolError::Serialize(e.to_string()))
}
