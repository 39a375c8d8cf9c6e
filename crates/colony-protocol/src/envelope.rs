//! Inbound envelope decoding.
//!
//! Every client message (except the legacy policy request) looks like:
//!
//! ```text
//! <msg t='sys'><body action='joinRoom' r='1'><room id='7'/></body></msg>
//! ```
//!
//! We parse it once into an owned [`Element`] tree and pull the action code
//! and room context out into an [`Envelope`]. Handlers then read the parts
//! they need through explicit accessors (`child`, `attr`, `text`).

use crate::{ProtocolError, RoomId};

/// The literal request legacy clients send before anything else.
pub const POLICY_REQUEST: &str = "<policy-file-request/>";

/// An owned XML element: name, attributes in document order, child
/// elements, and the concatenation of its direct text (including CDATA).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Parses a complete document and returns its root element.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Malformed`] for anything that is not
    /// well-formed XML.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok(Self::from_node(doc.root_element()))
    }

    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let mut element = Element {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            ..Default::default()
        };
        for child in node.children() {
            if child.is_element() {
                element.children.push(Self::from_node(child));
            } else if child.is_text() {
                if let Some(text) = child.text() {
                    element.text.push_str(text);
                }
            }
        }
        element
    }

    /// Returns the value of an attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of an attribute or a `MissingAttribute` error.
    pub fn require_attr(&self, name: &str) -> Result<&str, ProtocolError> {
        self.attr(name).ok_or_else(|| ProtocolError::MissingAttribute {
            element: self.name.clone(),
            attribute: name.to_string(),
        })
    }

    /// Returns the first child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns the first child element with the given name or a
    /// `MissingElement` error.
    pub fn require_child(&self, name: &str) -> Result<&Element, ProtocolError> {
        self.child(name)
            .ok_or_else(|| ProtocolError::MissingElement(name.to_string()))
    }

    /// Iterates over all child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// The element's direct text content.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A decoded command envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Message type from `<msg t='...'>` (`sys` for everything we handle).
    pub kind: String,
    /// The action code that selects a handler.
    pub action: String,
    /// The raw room context from `r='...'`, if present.
    pub room: Option<i64>,
    /// The `<body>` element, with its attributes and children.
    pub body: Element,
}

impl Envelope {
    /// Decodes a `<msg><body action=... r=...>` envelope.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let root = Element::parse(frame)?;
        if root.name != "msg" {
            return Err(ProtocolError::MissingElement("msg".into()));
        }
        let kind = root.attr("t").unwrap_or("sys").to_string();

        let body = root.require_child("body")?;
        let action = body.require_attr("action")?.to_string();
        let room = match body.attr("r") {
            Some(r) => Some(
                r.trim()
                    .parse::<i64>()
                    .map_err(|_| ProtocolError::invalid("r", r))?,
            ),
            None => None,
        };

        Ok(Self {
            kind,
            action,
            room,
            body: body.clone(),
        })
    }

    /// The room context as a room id. `None` when absent or negative.
    pub fn room_id(&self) -> Option<RoomId> {
        self.room
            .and_then(|r| u32::try_from(r).ok())
            .map(RoomId)
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The legacy cross-domain policy request.
    PolicyRequest,
    /// A regular command envelope.
    Envelope(Envelope),
}

/// Classifies and decodes one frame.
///
/// The policy request is matched literally and never goes through the tree
/// parser.
pub fn decode_frame(frame: &str) -> Result<Inbound, ProtocolError> {
    if frame == POLICY_REQUEST {
        return Ok(Inbound::PolicyRequest);
    }
    Envelope::decode(frame).map(Inbound::Envelope)
}
