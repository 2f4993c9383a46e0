//! Data model for a MusicXML score that is split page by page.
//!
//! Unlike a rendering model, nothing here is interpreted beyond what the
//! splitter needs: measures keep their full element tree so notes, lyrics
//! and everything else pass through untouched, while the few attributes
//! that matter for carry-forward (divisions, key, time, clef, tempo,
//! dynamics) are reached through accessor helpers.

/// A node in the owned XML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
}

/// An owned XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Local tag name (e.g. "measure", "attributes")
    pub name: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
}

/// A complete score: root element, metadata, and parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Root element name and attributes (children are held below)
    pub root: Element,
    /// Every non-part child of the root, in document order
    /// (work, identification, defaults, credit, part-list, ...)
    pub metadata: Vec<Element>,
    /// Parts in document order
    pub parts: Vec<Part>,
}

/// A musical part (one instrument or voice).
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// Part identifier (e.g., "P1")
    pub id: String,
    /// Ordered list of measures
    pub measures: Vec<Measure>,
}

/// A single measure (bar) of music.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    element: Element,
}

/// Attribute-block children in MusicXML schema order.
const ATTRIBUTE_ORDER: &[&str] = &[
    "footnote",
    "level",
    "divisions",
    "key",
    "time",
    "staves",
    "part-symbol",
    "instruments",
    "clef",
    "staff-details",
    "transpose",
    "for-part",
    "directive",
    "measure-style",
];

/// Measure children that advance the time position.
const MOVES_TIME: &[&str] = &["note", "backup", "forward"];

/// Divisions used for blank measures when the score never declares any.
pub const DEFAULT_DIVISIONS: u32 = 4;

// ─── Element ─────────────────────────────────────────────────────────

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning whether it was present.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(k, _)| k != name);
        self.attributes.len() != before
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Follow a `/`-separated path of child names, e.g. `"direction-type/dynamics"`.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/').try_fold(self, |e, name| e.child(name))
    }

    /// Trimmed text of the first text child.
    pub fn text(&self) -> Option<&str> {
        self.children.iter().find_map(|n| match n {
            XmlNode::Text(t) => Some(t.trim()),
            XmlNode::Element(_) => None,
        })
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(XmlNode::Element(child));
    }

    /// Insert a child element before the `index`-th child node.
    pub fn insert(&mut self, index: usize, child: Element) {
        let index = index.min(self.children.len());
        self.children.insert(index, XmlNode::Element(child));
    }

    /// Insert into an `<attributes>` block at the position the schema
    /// expects for `child.name`.
    fn insert_in_schema_order(&mut self, child: Element) {
        let rank = |name: &str| ATTRIBUTE_ORDER.iter().position(|n| *n == name);
        let Some(child_rank) = rank(&child.name) else {
            self.push(child);
            return;
        };
        let index = self
            .children
            .iter()
            .position(|n| match n {
                XmlNode::Element(e) => rank(&e.name).is_some_and(|r| r > child_rank),
                XmlNode::Text(_) => false,
            })
            .unwrap_or(self.children.len());
        self.insert(index, child);
    }
}

// ─── Measure ─────────────────────────────────────────────────────────

impl Measure {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            element: Element::new("measure").with_attribute("number", number),
        }
    }

    /// A whole-bar rest measure used as padding around real content.
    ///
    /// The empty `<attributes>` block is the slot carry-forward state is
    /// injected into.
    pub fn blank(divisions: Option<u32>) -> Self {
        let duration = divisions.unwrap_or(DEFAULT_DIVISIONS);
        let mut measure = Self::new("0");
        measure.element.push(Element::new("attributes"));
        measure.element.push(
            Element::new("note")
                .with_child(Element::new("rest").with_attribute("measure", "yes"))
                .with_child(Element::new("duration").with_text(duration.to_string())),
        );
        measure
    }

    pub fn from_element(element: Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn into_element(self) -> Element {
        self.element
    }

    pub fn number(&self) -> Option<&str> {
        self.element.attribute("number")
    }

    pub fn set_number(&mut self, number: impl Into<String>) {
        self.element.set_attribute("number", number);
    }

    /// All `<direction>` children.
    pub fn directions(&self) -> impl Iterator<Item = &Element> {
        self.element.children_named("direction")
    }

    /// All `<attributes>` blocks (usually zero or one).
    pub fn attribute_blocks(&self) -> impl Iterator<Item = &Element> {
        self.element.children_named("attributes")
    }

    /// The `<attributes>` block that opens the measure, before any note,
    /// backup or forward. Blocks after that are mid-measure changes.
    pub fn leading_attributes(&self) -> Option<&Element> {
        self.element
            .elements()
            .take_while(|e| !MOVES_TIME.contains(&e.name.as_str()))
            .find(|e| e.name == "attributes")
    }

    /// Whether the leading attributes block declares a child named `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.leading_attributes()
            .is_some_and(|a| a.child(name).is_some())
    }

    /// Tempo declared by a `<sound tempo>`, either inside a direction or
    /// directly in the measure. The last one in document order wins.
    pub fn tempo(&self) -> Option<f64> {
        self.element
            .elements()
            .filter_map(|e| match e.name.as_str() {
                "direction" => e.child("sound"),
                "sound" => Some(e),
                _ => None,
            })
            .filter_map(|s| s.attribute("tempo")?.trim().parse::<f64>().ok())
            .filter(|t| *t > 0.0)
            .last()
    }

    /// Tag of the first symbol of the last dynamics marking.
    pub fn dynamic(&self) -> Option<&str> {
        self.directions()
            .flat_map(|d| d.children_named("direction-type"))
            .filter_map(|dt| dt.child("dynamics"))
            .filter_map(|dyn_el| dyn_el.elements().next())
            .map(|e| e.name.as_str())
            .last()
    }

    pub(crate) fn insert(&mut self, index: usize, child: Element) {
        self.element.insert(index, child);
    }

    /// Index just past the leading `<print>` and `<attributes>` children,
    /// where injected directions belong.
    pub(crate) fn direction_slot(&self) -> usize {
        self.element
            .children
            .iter()
            .position(|n| match n {
                XmlNode::Element(e) => e.name != "print" && e.name != "attributes",
                XmlNode::Text(_) => false,
            })
            .unwrap_or(self.element.children.len())
    }

    /// Insert a child into the leading `<attributes>` block, creating one
    /// at the front of the measure (after any `<print>`) if needed.
    pub(crate) fn insert_attribute(&mut self, child: Element) {
        let children = &self.element.children;
        let leading = children
            .iter()
            .take_while(|n| !matches!(n, XmlNode::Element(e) if MOVES_TIME.contains(&e.name.as_str())))
            .position(|n| matches!(n, XmlNode::Element(e) if e.name == "attributes"));
        let index = match leading {
            Some(i) => i,
            None => {
                let i = children
                    .iter()
                    .position(|n| !matches!(n, XmlNode::Element(e) if e.name == "print"))
                    .unwrap_or(children.len());
                self.element.insert(i, Element::new("attributes"));
                i
            }
        };
        if let XmlNode::Element(attrs) = &mut self.element.children[index] {
            attrs.insert_in_schema_order(child);
        }
    }

    /// Remove `new-system` / `new-page` flags from every `<print>`.
    /// Returns how many flags were removed.
    pub fn strip_layout_hints(&mut self) -> usize {
        let mut removed = 0;
        for print in self.element.elements_mut().filter(|e| e.name == "print") {
            removed += print.remove_attribute("new-system") as usize;
            removed += print.remove_attribute("new-page") as usize;
        }
        removed
    }

    pub fn has_page_break(&self) -> bool {
        self.element
            .children_named("print")
            .any(|p| p.attribute("new-page") == Some("yes"))
    }

    /// Force this measure to start a new page.
    pub fn add_page_break(&mut self) {
        match self.element.child_mut("print") {
            Some(print) => print.set_attribute("new-page", "yes"),
            None => self
                .element
                .insert(0, Element::new("print").with_attribute("new-page", "yes")),
        }
    }

    /// Turn the closing barline into a final (light-heavy) double bar.
    pub fn set_final_barline(&mut self) {
        let existing = self.element.children.iter().rposition(|n| {
            matches!(n, XmlNode::Element(e)
                if e.name == "barline" && e.attribute("location").unwrap_or("right") == "right")
        });
        let index = match existing {
            Some(i) => i,
            None => {
                self.element
                    .push(Element::new("barline").with_attribute("location", "right"));
                self.element.children.len() - 1
            }
        };
        let XmlNode::Element(barline) = &mut self.element.children[index] else {
            return;
        };

        match barline.child_mut("bar-style") {
            Some(style) => {
                style.children = vec![XmlNode::Text("light-heavy".to_string())];
            }
            None => barline.insert(0, Element::new("bar-style").with_text("light-heavy")),
        }
    }

    pub fn bar_style(&self) -> Option<&str> {
        self.element
            .children_named("barline")
            .filter(|b| b.attribute("location").unwrap_or("right") == "right")
            .filter_map(|b| b.child("bar-style"))
            .filter_map(|s| s.text())
            .last()
    }
}

// ─── Score ───────────────────────────────────────────────────────────

impl Score {
    /// Create a new empty `score-partwise` score.
    pub fn new() -> Self {
        Self {
            root: Element::new("score-partwise"),
            metadata: Vec::new(),
            parts: Vec::new(),
        }
    }

    /// Get the total number of measures across all parts.
    pub fn measure_count(&self) -> usize {
        self.parts.iter().map(|p| p.measures.len()).sum()
    }

    /// Remove explicit system and page breaks from every measure so that
    /// pagination is recomputed rather than inherited.
    pub fn strip_layout_hints(&mut self) -> usize {
        self.parts
            .iter_mut()
            .flat_map(|p| p.measures.iter_mut())
            .map(Measure::strip_layout_hints)
            .sum()
    }

    /// Build a standalone score holding only `measures` for `part_id`.
    ///
    /// Metadata is copied verbatim; the part list is narrowed to the one
    /// score-part the fragment contains.
    pub fn fragment(&self, part_id: &str, measures: Vec<Measure>) -> Score {
        let metadata = self
            .metadata
            .iter()
            .map(|section| {
                if section.name != "part-list" {
                    return section.clone();
                }
                let mut list = Element::new("part-list");
                list.attributes = section.attributes.clone();
                for sp in section.children_named("score-part") {
                    if sp.attribute("id") == Some(part_id) {
                        list.push(sp.clone());
                    }
                }
                list
            })
            .collect();

        Score {
            root: self.root.clone(),
            metadata,
            parts: vec![Part {
                id: part_id.to_string(),
                measures,
            }],
        }
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::new()
    }
}
