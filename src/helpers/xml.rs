//! Streaming XML plumbing shared by the xlsx and ods readers.

use crate::error::SheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum XmlError {
    #[error("Unknown entity '&{0};'")]
    UnknownEntity(String),

    #[error("Cannot parse attribute '{name}' value '{value}'")]
    AttributeValue { name: String, value: String },
}

/// Event reader configured for large spreadsheet parts: empty elements are
/// expanded into start/end pairs and text is kept verbatim.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Next event, or `None` at end of document.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, SheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute access on start tags.
pub(crate) trait StartTagExt<'a> {
    /// Unescaped value of attribute `name`, if present.
    fn attr(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError>;

    /// Attribute `name` parsed into `T`.
    fn parse_attr<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError>;
}

impl<'a> StartTagExt<'a> for BytesStart<'a> {
    fn attr(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, SheetError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn parse_attr<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, SheetError> {
        match self.attr(name)? {
            Some(value) => value.parse::<T>().map(Some).map_err(|_| {
                XmlError::AttributeValue {
                    name: name.to_owned(),
                    value: value.to_string(),
                }
                .into()
            }),
            None => Ok(None),
        }
    }
}

/// Appends a general entity or character reference (`&amp;`, `&#x41;`) to `text`.
pub(crate) fn push_reference(text: &mut String, reference: &BytesRef) -> Result<(), SheetError> {
    let raw = reference.xml_content()?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16)?,
            None => number.parse::<u32>()?,
        };
        if let Some(character) = char::from_u32(code) {
            text.push(character);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        text.push_str(entity);
    } else {
        Err(XmlError::UnknownEntity(raw.to_string()))?;
    }
    Ok(())
}

/// Loops over the events of an [`XmlReader`], dispatching to the given arms
/// and ignoring everything else.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                $($arms)*
                _ => (),
            }
        }
    };
}
