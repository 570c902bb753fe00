//! XML request bodies and response trees for the server API.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::SessionError;

/// A child element of a request: scalar text or a list of items.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Field {
    Text { name: String, value: String },
    List { name: String, items: Vec<RequestItem> },
}

/// One element of a list parameter (for example an `AttributeNameValue`).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestItem {
    name: String,
    fields: Vec<Field>,
}

impl RequestItem {
    /// Starts an item element called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a child text element.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a nested list element.
    #[must_use]
    pub fn list(mut self, name: impl Into<String>, items: Vec<Self>) -> Self {
        self.fields.push(Field::List {
            name: name.into(),
            items,
        });
        self
    }
}

/// Body of an API call: a root element named after the method holding one
/// child element per parameter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestBody {
    method: String,
    fields: Vec<Field>,
}

impl RequestBody {
    /// Starts a request for `method`.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a scalar parameter.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a list parameter.
    #[must_use]
    pub fn list(mut self, name: impl Into<String>, items: Vec<RequestItem>) -> Self {
        self.fields.push(Field::List {
            name: name.into(),
            items,
        });
        self
    }

    /// API method this body calls.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Serialises the body as an XML document.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MalformedResponse`] if the writer fails, which
    /// only happens when the underlying buffer cannot grow.
    pub fn to_xml(&self) -> Result<String, SessionError> {
        let fail = |message: String| SessionError::MalformedResponse {
            method: self.method.clone(),
            message,
        };
        let mut writer = Writer::new(Vec::new());
        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None))).map_err(fail)?;
        write_element(&mut writer, &self.method, &self.fields).map_err(fail)?;
        String::from_utf8(writer.into_inner()).map_err(|err| fail(err.to_string()))
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, fields: &[Field]) -> Result<(), String> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    for field in fields {
        match field {
            Field::Text { name, value } => {
                write(writer, Event::Start(BytesStart::new(name.as_str())))?;
                write(writer, Event::Text(BytesText::new(value)))?;
                write(writer, Event::End(BytesEnd::new(name.as_str())))?;
            }
            Field::List { name, items } => {
                write(writer, Event::Start(BytesStart::new(name.as_str())))?;
                for item in items {
                    write_element(writer, &item.name, &item.fields)?;
                }
                write(writer, Event::End(BytesEnd::new(name.as_str())))?;
            }
        }
    }
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), String> {
    writer.write_event(event).map_err(|err| err.to_string())
}

/// Owned element tree parsed from a response document.
///
/// Namespace prefixes are dropped from element and attribute names.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct XmlNode {
    /// Local element name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Self>,
    /// Concatenated text content, trimmed.
    pub text: String,
}

impl XmlNode {
    /// Parses `xml` into its root element.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first syntax error, or a missing
    /// root element.
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut stack: Vec<Self> = Vec::new();
        let mut root = None;

        loop {
            let event = reader.read_event().map_err(|err| err.to_string())?;
            match event {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let node = Self::from_start(&start)?;
                    attach(&mut stack, &mut root, node);
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| String::from("unbalanced end tag"))?;
                    attach(&mut stack, &mut root, node);
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(|err| err.to_string())?;
                    append_text(&mut stack, &value);
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    append_text(&mut stack, &String::from_utf8_lossy(&bytes));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(String::from("unexpected end of document"));
        }
        root.ok_or_else(|| String::from("document has no root element"))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for item in start.attributes() {
            let attribute = item.map_err(|err| err.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map(Cow::into_owned)
                .map_err(|err| err.to_string())?;
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Returns the value of attribute `name`.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the first child element called `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Iterates over child elements called `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Returns `name` as an attribute, falling back to a child element's text.
    ///
    /// The server emits most scalar fields as attributes but some older
    /// methods nest them as elements.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.attr(name)
            .or_else(|| self.child(name).map(|child| child.text.as_str()))
    }

    /// Like [`Self::field`] but yields an owned empty string when absent.
    #[must_use]
    pub fn field_or_empty(&self, name: &str) -> String {
        self.field(name).unwrap_or_default().to_owned()
    }
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    let Some(parent) = stack.last_mut() else {
        if root.is_none() {
            *root = Some(node);
        }
        return;
    };
    parent.children.push(node);
}

fn append_text(stack: &mut [XmlNode], value: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.push_str(value);
    }
}

/// Parses an API response and returns its `ResponseInfo` element.
///
/// A response whose root carries `Success="false"` becomes
/// [`SessionError::Api`] with the server's `ErrorCode` and `ErrorMessage`.
/// Methods without a payload yield an empty node.
///
/// # Errors
///
/// Returns [`SessionError::MalformedResponse`] when the body is not XML and
/// [`SessionError::Api`] when the server reports a failure.
pub fn parse_response(method: &str, body: &str) -> Result<XmlNode, SessionError> {
    let root = XmlNode::parse(body).map_err(|message| SessionError::MalformedResponse {
        method: method.to_owned(),
        message,
    })?;

    let success = root.field("Success").unwrap_or("true");
    if !success.eq_ignore_ascii_case("true") {
        return Err(SessionError::Api {
            method: method.to_owned(),
            code: root.field_or_empty("ErrorCode"),
            message: root.field_or_empty("ErrorMessage"),
        });
    }

    Ok(root.child("ResponseInfo").cloned().unwrap_or_default())
}
