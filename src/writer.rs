//! MusicXML writer: serializes a Score back into indented MusicXML.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;
use crate::model::{Element, Score, XmlNode};

const PARTWISE_DOCTYPE: &str = r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#;

/// Serialize a score to a MusicXML string.
pub fn to_musicxml(score: &Score) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
    if score.root.name == "score-partwise" {
        writer.write_event(Event::DocType(BytesText::from_escaped(PARTWISE_DOCTYPE)))?;
    }

    writer.write_event(Event::Start(start_tag(&score.root)))?;
    for section in &score.metadata {
        write_element(&mut writer, section)?;
    }
    for part in &score.parts {
        let part_el = Element::new("part").with_attribute("id", part.id.as_str());
        writer.write_event(Event::Start(start_tag(&part_el)))?;
        for measure in &part.measures {
            write_element(&mut writer, measure.element())?;
        }
        writer.write_event(Event::End(BytesEnd::new("part")))?;
    }
    writer.write_event(Event::End(BytesEnd::new(score.root.name.as_str())))?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    xml.push('\n');
    Ok(xml)
}

/// Serialize a score and write it to `path`.
pub fn write_file<P: AsRef<Path>>(score: &Score, path: P) -> Result<()> {
    let xml = to_musicxml(score)?;
    std::fs::write(path, xml)?;
    Ok(())
}

fn start_tag(element: &Element) -> BytesStart<'_> {
    let mut tag = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        tag.push_attribute((key.as_str(), value.as_str()));
    }
    tag
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start_tag(element)))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start_tag(element)))?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
