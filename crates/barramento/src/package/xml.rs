use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::PackageError;

/// Indented XML writer for the generated metadata documents.
pub(crate) struct XmlOut {
    document: &'static str,
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    pub(crate) fn new(document: &'static str) -> Self {
        Self {
            document,
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    pub(crate) fn declaration(&mut self) -> Result<(), PackageError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub(crate) fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), PackageError> {
        self.write(Event::Start(tag(name, attrs)))
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<(), PackageError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), PackageError> {
        self.write(Event::Empty(tag(name, attrs)))
    }

    pub(crate) fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<(), PackageError> {
        self.start(name, attrs)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub(crate) fn finish(self) -> String {
        let mut xml = String::from_utf8_lossy(&self.writer.into_inner()).into_owned();
        xml.push('\n');
        xml
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), PackageError> {
        self.writer
            .write_event(event)
            .map_err(|e| PackageError::Render {
                document: self.document,
                reason: e.to_string(),
            })
    }
}

fn tag<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    start
}
