//! The data-object sub-protocol.
//!
//! Game clients nest a second XML document inside an envelope's CDATA body
//! to carry structured payloads:
//!
//! ```text
//! <dataObj>
//!   <var n='id' t='s'>updateTeamDisplay</var>
//!   <obj t='o' o='sub'>
//!     <obj t='a' o='array'><var n='0' t='s'>3</var>...</obj>
//!   </obj>
//! </dataObj>
//! ```
//!
//! `var` nodes carry a name (`n`) and a type tag (`t`); `obj` nodes carry a
//! kind (`t`: object or array) and an orientation label (`o`). Order of
//! children is preserved so payloads can be relayed without reshuffling.

use std::collections::HashMap;
use std::fmt;

use crate::envelope::Element;
use crate::ProtocolError;

/// Type tag of a `var` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Number,
    String,
    Boolean,
    Null,
}

impl VarType {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Number => "n",
            Self::String => "s",
            Self::Boolean => "b",
            Self::Null => "x",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, ProtocolError> {
        match tag {
            "n" => Ok(Self::Number),
            "s" => Ok(Self::String),
            "b" => Ok(Self::Boolean),
            "x" => Ok(Self::Null),
            other => Err(ProtocolError::invalid("var type", other)),
        }
    }
}

/// Kind tag of an `obj` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjKind {
    Object,
    Array,
}

impl ObjKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Object => "o",
            Self::Array => "a",
        }
    }
}

/// A named, typed scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub name: String,
    pub kind: VarType,
    pub value: String,
}

impl Var {
    pub fn new(
        name: impl Into<String>,
        kind: VarType,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
        }
    }

    /// Parses a `<var n='..' t='..'>value</var>` element.
    pub fn from_element(el: &Element) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: el.require_attr("n")?.to_string(),
            kind: VarType::from_tag(el.attr("t").unwrap_or("s"))?,
            value: el.text().to_string(),
        })
    }

    /// Renders the variable with its value wrapped in CDATA, the form used
    /// inside envelope `<vars>` blocks.
    pub fn to_cdata_xml(&self) -> String {
        format!(
            "<var n='{}' t='{}'><![CDATA[{}]]></var>",
            self.name,
            self.kind.tag(),
            self.value
        )
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<var n='{}' t='{}'>{}</var>",
            self.name,
            self.kind.tag(),
            self.value
        )
    }
}

/// A child of a data object or of an `obj` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Var(Var),
    Obj(Obj),
}

/// A nested object or array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obj {
    pub kind: ObjKind,
    pub orientation: String,
    pub nodes: Vec<Node>,
}

impl Obj {
    pub fn new(kind: ObjKind, orientation: impl Into<String>) -> Self {
        Self {
            kind,
            orientation: orientation.into(),
            nodes: Vec::new(),
        }
    }

    pub fn with_var(mut self, var: Var) -> Self {
        self.nodes.push(Node::Var(var));
        self
    }

    pub fn with_obj(mut self, obj: Obj) -> Self {
        self.nodes.push(Node::Obj(obj));
        self
    }

    /// Builds an array whose entries are named by index: `0`, `1`, ...
    pub fn indexed_array<I, S>(orientation: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        items
            .into_iter()
            .enumerate()
            .fold(Self::new(ObjKind::Array, orientation), |obj, (i, item)| {
                obj.with_var(Var::new(i.to_string(), VarType::String, item))
            })
    }

    fn from_element(el: &Element) -> Result<Self, ProtocolError> {
        let kind = match el.attr("t") {
            Some("a") => ObjKind::Array,
            _ => ObjKind::Object,
        };
        Ok(Self {
            kind,
            orientation: el.attr("o").unwrap_or_default().to_string(),
            nodes: parse_nodes(el)?,
        })
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        vars_of(&self.nodes)
    }

    pub fn objs(&self) -> impl Iterator<Item = &Obj> {
        objs_of(&self.nodes)
    }

    pub fn first_obj(&self) -> Option<&Obj> {
        self.objs().next()
    }

    pub fn first_var(&self) -> Option<&Var> {
        self.vars().next()
    }

    /// The value of the first direct `var` with this name.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Like [`var`](Self::var), but a missing variable is an error.
    pub fn require_var(&self, name: &str) -> Result<&str, ProtocolError> {
        self.var(name)
            .ok_or_else(|| ProtocolError::MissingElement(format!("var {name}")))
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<obj t='{}' o='{}'>", self.kind.tag(), self.orientation)?;
        write_nodes(f, &self.nodes)?;
        f.write_str("</obj>")
    }
}

/// A complete `<dataObj>` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataObject {
    pub nodes: Vec<Node>,
    raw: String,
}

impl DataObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a payload taken from an envelope body.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim();
        let root = Element::parse(trimmed)?;
        if root.name != "dataObj" {
            return Err(ProtocolError::MissingElement("dataObj".into()));
        }
        Ok(Self {
            nodes: parse_nodes(&root)?,
            raw: trimmed.to_string(),
        })
    }

    pub fn with_var(mut self, var: Var) -> Self {
        self.nodes.push(Node::Var(var));
        self
    }

    pub fn with_obj(mut self, obj: Obj) -> Self {
        self.nodes.push(Node::Obj(obj));
        self
    }

    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        vars_of(&self.nodes)
    }

    pub fn objs(&self) -> impl Iterator<Item = &Obj> {
        objs_of(&self.nodes)
    }

    /// The first top-level `obj`, which is where clients put the payload.
    pub fn first_obj(&self) -> Option<&Obj> {
        self.objs().next()
    }

    pub fn require_first_obj(&self) -> Result<&Obj, ProtocolError> {
        self.first_obj()
            .ok_or_else(|| ProtocolError::MissingElement("obj".into()))
    }

    /// Flattens the direct `var` children of the root into name → text.
    ///
    /// These carry the payload's `id` discriminator and, for game
    /// messages, the acting user in `_$$_`.
    pub fn room_vars(&self) -> HashMap<String, String> {
        self.vars()
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }

    /// Flattens the arrays nested in the first top-level `obj` into
    /// `(orientation, values)` pairs, in document order.
    ///
    /// Only attempted when the raw payload mentions "array" anywhere
    /// (case-insensitive); payloads without that substring yield nothing.
    pub fn array_objects(&self) -> Vec<(String, Vec<String>)> {
        if !self.raw.to_ascii_lowercase().contains("array") {
            return Vec::new();
        }
        let Some(outer) = self.first_obj() else {
            return Vec::new();
        };
        outer
            .objs()
            .map(|obj| {
                let values = obj.vars().map(|v| v.value.clone()).collect();
                (obj.orientation.clone(), values)
            })
            .collect()
    }

    /// Looks up one array by orientation label.
    pub fn array(&self, orientation: &str) -> Option<Vec<String>> {
        self.array_objects()
            .into_iter()
            .find(|(o, _)| o == orientation)
            .map(|(_, values)| values)
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<dataObj>")?;
        write_nodes(f, &self.nodes)?;
        f.write_str("</dataObj>")
    }
}

fn parse_nodes(el: &Element) -> Result<Vec<Node>, ProtocolError> {
    el.children
        .iter()
        .filter_map(|child| match child.name.as_str() {
            "var" => Some(Var::from_element(child).map(Node::Var)),
            "obj" => Some(Obj::from_element(child).map(Node::Obj)),
            _ => None,
        })
        .collect()
}

fn vars_of(nodes: &[Node]) -> impl Iterator<Item = &Var> {
    nodes.iter().filter_map(|n| match n {
        Node::Var(v) => Some(v),
        Node::Obj(_) => None,
    })
}

fn objs_of(nodes: &[Node]) -> impl Iterator<Item = &Obj> {
    nodes.iter().filter_map(|n| match n {
        Node::Obj(o) => Some(o),
        Node::Var(_) => None,
    })
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for node in nodes {
        match node {
            Node::Var(v) => write!(f, "{v}")?,
            Node::Obj(o) => write!(f, "{o}")?,
        }
    }
    Ok(())
}
