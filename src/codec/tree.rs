use std::collections::BTreeMap;
use std::slice;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::errors::{Error, Result};

/// Same-named children of an element. A lone child is kept as `One`, a
/// repeated one as `Many` in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Children {
    One(Element),
    Many(Vec<Element>),
}

impl Children {
    /// Uniform view over both shapes.
    pub fn as_slice(&self) -> &[Element] {
        match self {
            Children::One(element) => slice::from_ref(element),
            Children::Many(elements) => elements,
        }
    }

    fn push(self, element: Element) -> Children {
        match self {
            Children::One(first) => Children::Many(vec![first, element]),
            Children::Many(mut elements) => {
                elements.push(element);
                Children::Many(elements)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: BTreeMap<String, Children>,
}

impl Element {
    fn from_start(start: &BytesStart) -> Result<Element> {
        let name = str::from_utf8(start.name().as_ref())?.to_string();
        let mut attrs = BTreeMap::new();
        for attribute_res in start.attributes() {
            let attribute = attribute_res?;
            let key = str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            attrs.insert(key, value);
        }
        Ok(Element {
            name,
            attrs,
            ..Element::default()
        })
    }

    fn add_child(&mut self, child: Element) {
        let name = child.name.clone();
        let slot = match self.children.remove(&name) {
            Some(existing) => existing.push(child),
            None => Children::One(child),
        };
        self.children.insert(name, slot);
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Children named `name`, whether the document held one or many.
    pub fn children_named(&self, name: &str) -> &[Element] {
        self.children
            .get(name)
            .map(Children::as_slice)
            .unwrap_or_default()
    }
}

/// Parses a whole document into an element tree. Returns `None` when the
/// document has no root element.
pub fn parse(buffer: &[u8]) -> Result<Option<Element>> {
    let mut reader = Reader::from_reader(buffer);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => stack.push(Element::from_start(&e)?),
            Event::Empty(e) => {
                let element = Element::from_start(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Parse("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            // Features live in attributes; text, declarations, comments and
            // the like carry nothing for the tree.
            _ => (),
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(Error::Parse(format!("unclosed element <{}>", open.name)));
    }
    Ok(root)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.add_child(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(Error::Parse("multiple root elements".to_string())),
    }
    Ok(())
}
