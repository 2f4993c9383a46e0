//! Shared fixtures: MusicXML builders and a deterministic stub renderer.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object};
use scoresplit::{load_file, Measure, Renderer, Score};

/// Build a score-partwise document from `(part id, measures xml)` pairs.
pub fn score_xml(parts: &[(&str, Vec<String>)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <work><work-title>Fixture</work-title></work>
  <identification><creator type="composer">Nobody</creator></identification>
  <defaults><page-layout><page-height>1683</page-height><page-width>1190</page-width></page-layout></defaults>
  <part-list>
"#,
    );
    for (id, _) in parts {
        xml.push_str(&format!(
            "    <score-part id=\"{id}\"><part-name>{id}</part-name></score-part>\n"
        ));
    }
    xml.push_str("  </part-list>\n");
    for (id, measures) in parts {
        xml.push_str(&format!("  <part id=\"{id}\">\n"));
        for m in measures {
            xml.push_str(m);
            xml.push('\n');
        }
        xml.push_str("  </part>\n");
    }
    xml.push_str("</score-partwise>\n");
    xml
}

/// A measure holding one whole note, with `head` placed before it.
pub fn measure(number: usize, head: &str) -> String {
    format!(
        r#"    <measure number="{number}">{head}<note><pitch><step>C</step><octave>5</octave></pitch><duration>16</duration><type>whole</type></note></measure>"#
    )
}

pub fn opening_attributes() -> &'static str {
    r#"<attributes><divisions>4</divisions><key><fifths>1</fifths></key><time><beats>4</beats><beat-type>4</beat-type></time><clef><sign>G</sign><line>2</line></clef></attributes>"#
}

pub fn tempo(bpm: u32) -> String {
    format!(
        r#"<direction placement="above"><direction-type><metronome><beat-unit>quarter</beat-unit><per-minute>{bpm}</per-minute></metronome></direction-type><sound tempo="{bpm}"/></direction>"#
    )
}

pub fn dynamic(tag: &str) -> String {
    format!(r#"<direction placement="below"><direction-type><dynamics><{tag}/></dynamics></direction-type></direction>"#)
}

/// Whether a measure is one of the synthetic whole-bar rests.
pub fn is_pad(measure: &Measure) -> bool {
    let notes: Vec<_> = measure.element().children_named("note").collect();
    notes.len() == 1
        && notes[0]
            .child("rest")
            .is_some_and(|r| r.attribute("measure") == Some("yes"))
}

/// Write a PDF with `pages` empty pages.
pub fn write_pdf(path: &Path, pages: usize) -> scoresplit::Result<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(595),
                    Object::Integer(842),
                ],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages as i64),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

/// Renderer that reads the written fragment back and decides its page
/// count from the parsed score, then emits a real PDF of that length.
pub struct StubRenderer<F> {
    pages: F,
    pub documents: RefCell<Vec<PathBuf>>,
}

impl<F: Fn(&Score) -> usize> StubRenderer<F> {
    pub fn new(pages: F) -> Self {
        Self {
            pages,
            documents: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.documents.borrow().len()
    }
}

impl<F: Fn(&Score) -> usize> Renderer for StubRenderer<F> {
    fn render(&self, document: &Path, artifact: &Path) -> scoresplit::Result<usize> {
        self.documents.borrow_mut().push(document.to_path_buf());
        let score = load_file(document)?;
        let pages = (self.pages)(&score);
        write_pdf(artifact, pages)?;
        Ok(pages)
    }
}

/// Page count of a layout that fits `capacity` real measures per page:
/// one page for the leading pad, the content pages, and one page for a
/// trailing pad when present.
pub fn capacity_layout(capacity: usize) -> impl Fn(&Score) -> usize {
    move |score: &Score| {
        let measures = &score.parts[0].measures;
        let content = measures.iter().filter(|m| !is_pad(m)).count();
        let trailing = measures.len() > 1 && measures.last().is_some_and(is_pad);
        1 + content.div_ceil(capacity) + usize::from(trailing)
    }
}
