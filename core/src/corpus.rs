//! Reader for the line-oriented fielded record format.
//!
//! ```text
//! .I 1
//! .T
//! experimental investigation of the aerodynamics of a wing
//! .A
//! brenckman,m.
//! .W
//! experimental investigation of the aerodynamics ...
//! ```
//!
//! A marker line is a `.` followed by one ASCII letter and then end of line
//! or whitespace. `.I` starts a record, `.T`, `.A` and `.W` start the title,
//! author and contents sections. Any other marker (`.B`, `.X`, ...) starts a
//! section whose lines are discarded. Text after a section marker on the same
//! line is ignored; text after `.I` is the document id.
//!
//! This is stricter than treating every line that starts with `.` as a
//! marker: `.25 of chord` stays content and `.I7` does not start a record.
//!
//! Bytes that are not valid UTF-8 are decoded lossily (U+FFFD), so one bad
//! byte affects only the text it appears in.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::io::{self, BufRead};
use std::str::FromStr;

use crate::error::{ConfigError, CorpusRecordError};

/// Indexed document fields, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Author,
    Contents,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Title, Field::Author, Field::Contents];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Contents => "contents",
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Field::Title),
            "author" => Ok(Field::Author),
            "contents" | "content" | "body" => Ok(Field::Contents),
            other => Err(ConfigError::UnknownField(other.to_string())),
        }
    }
}

/// One parsed record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub author: String,
    pub contents: String,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, field: Field, text: impl Into<String>) -> Self {
        *self.field_mut(field) = text.into();
        self
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Author => &self.author,
            Field::Contents => &self.contents,
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Author => &mut self.author,
            Field::Contents => &mut self.contents,
        }
    }
}

/// Failure produced while reading a corpus.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The record is skipped; reading continues.
    #[error(transparent)]
    Record(#[from] CorpusRecordError),
    /// Reading stops.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Field(Field),
    Ignored,
}

#[derive(Debug)]
struct Pending {
    doc: Document,
    line: usize,
}

/// Lines of a byte stream without their terminators. Invalid UTF-8 is
/// replaced rather than ending the stream.
pub(crate) struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new() }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Lazy record reader. Only the record being accumulated is held in memory.
pub struct CorpusReader<R> {
    lines: LossyLines<R>,
    line_no: usize,
    current: Option<Pending>,
    section: Option<Section>,
    done: bool,
}

/// Parse corpus text held in memory.
pub fn parse(raw: &str) -> CorpusReader<&[u8]> {
    CorpusReader::new(raw.as_bytes())
}

impl<R: BufRead> CorpusReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LossyLines::new(reader),
            line_no: 0,
            current: None,
            section: None,
            done: false,
        }
    }

    fn finish(pending: Pending) -> Result<Document, ParseError> {
        if pending.doc.id.is_empty() {
            return Err(CorpusRecordError::EmptyId { line: pending.line }.into());
        }
        Ok(pending.doc)
    }
}

/// Returns the marker letter if `line` is a marker line.
fn marker(line: &str) -> Option<(char, &str)> {
    let rest = line.strip_prefix('.')?;
    let mut chars = rest.chars();
    let letter = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    let tail = chars.as_str();
    match tail.chars().next() {
        None => Some((letter, tail)),
        Some(c) if c.is_whitespace() => Some((letter, tail)),
        Some(_) => None,
    }
}

impl<R: BufRead> Iterator for CorpusReader<R> {
    type Item = Result<Document, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.done = true;
                    self.current = None;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    return self.current.take().map(Self::finish);
                }
            };
            self.line_no += 1;

            if let Some((letter, tail)) = marker(&line) {
                if letter == 'I' {
                    let next = Pending {
                        doc: Document::new(tail.trim()),
                        line: self.line_no,
                    };
                    self.section = None;
                    if let Some(done) = self.current.replace(next) {
                        return Some(Self::finish(done));
                    }
                } else {
                    self.section = Some(match letter {
                        'T' => Section::Field(Field::Title),
                        'A' => Section::Field(Field::Author),
                        'W' => Section::Field(Field::Contents),
                        _ => Section::Ignored,
                    });
                }
                continue;
            }

            let (Some(pending), Some(Section::Field(field))) = (self.current.as_mut(), self.section) else {
                continue;
            };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let buf = pending.doc.field_mut(field);
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(raw: &str) -> Vec<Document> {
        parse(raw).filter_map(Result::ok).collect()
    }

    #[test]
    fn parses_two_records() {
        let raw = ".I 1\n.T\ncat dog\n.A\nsmith\n.W\nthe cat\nsat\n.I 2\n.T\nfish\n.W\na dog barked\n";
        let parsed = docs(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "1");
        assert_eq!(parsed[0].title, "cat dog");
        assert_eq!(parsed[0].author, "smith");
        assert_eq!(parsed[0].contents, "the cat sat");
        assert_eq!(parsed[1].id, "2");
        assert_eq!(parsed[1].author, "");
        assert_eq!(parsed[1].contents, "a dog barked");
    }

    #[test]
    fn missing_body_is_empty_contents() {
        let parsed = docs(".I 7\n.T\nonly a title\n");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].contents, "");
    }

    #[test]
    fn no_record_marker_yields_nothing() {
        assert!(docs(".T\norphan title\n.W\norphan body\n").is_empty());
        assert!(docs("").is_empty());
    }

    #[test]
    fn unknown_markers_end_a_section_and_are_discarded() {
        let raw = ".I 3\n.T\nshock waves\n.B\nj. ae. scs. 25, 1958\n.W\nbody text\n";
        let parsed = docs(raw);
        assert_eq!(parsed[0].title, "shock waves");
        assert_eq!(parsed[0].contents, "body text");
    }

    #[test]
    fn dotted_content_lines_are_not_markers() {
        let raw = ".I 4\n.W\nthickness ratio\n.25 of chord\n";
        assert_eq!(docs(raw)[0].contents, "thickness ratio .25 of chord");
    }

    #[test]
    fn ids_are_opaque_strings() {
        let parsed = docs(".I  doc-0042 \n.W\nx\n");
        assert_eq!(parsed[0].id, "doc-0042");
    }

    #[test]
    fn empty_id_is_a_record_error_and_parsing_continues() {
        let raw = ".I\n.W\nlost\n.I 9\n.W\nkept\n";
        let items: Vec<_> = parse(raw).collect();
        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[0],
            Err(ParseError::Record(CorpusRecordError::EmptyId { line: 1 }))
        ));
        assert_eq!(items[1].as_ref().unwrap().contents, "kept");
    }

    #[test]
    fn invalid_utf8_only_affects_its_own_line() {
        let mut raw = b".I 1\n.W\nfirst\n.I 2\n.W\ncaf".to_vec();
        raw.extend_from_slice(&[0xE9, b'\n']);
        raw.extend_from_slice(b".I 3\r\n.W\r\nthird\r\n");
        let items: Vec<_> = CorpusReader::new(&raw[..]).collect();
        assert_eq!(items.len(), 3);
        let parsed: Vec<Document> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(parsed[1].contents, "caf\u{FFFD}");
        assert_eq!(parsed[2].id, "3");
        assert_eq!(parsed[2].contents, "third");
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("Title".parse::<Field>().unwrap(), Field::Title);
        assert_eq!("contents".parse::<Field>().unwrap(), Field::Contents);
        assert!("abstract".parse::<Field>().is_err());
    }
}
