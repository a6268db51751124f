//! Label maps: the class-name <-> integer-id table the object-detection
//! trainer needs, stored as a `StringIntLabelMap` in protobuf text format.
//!
//! ```text
//! item {
//!   name: "cat"
//!   id: 1
//! }
//! ```

use crate::dataset::{DatasetStore, DatasetView, TRAINING_TAG};
use crate::error::{PrepError, PrepResult};
use crate::layout::FilepathSet;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Seed for the scan order when collecting class names.
pub const MAPPING_SEED: u64 = 2021;

/// Largest class id counted by `count_classes`; items above it are ignored.
pub const MAX_NUM_CLASSES: i32 = 90;

const BACKGROUND: &str = "background";

/// Unique class names in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNameList {
    names: Vec<String>,
}

impl ClassNameList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name` unless an identical (case-sensitive) entry exists. Returns whether it was added.
    pub fn push(&mut self, name: &str) -> bool {
        if self.names.iter().any(|n| n == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for ClassNameList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut list = Self::new();
        for name in iter {
            list.push(name);
        }
        list
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMapItem {
    pub id: i32,
    pub name: String,
    pub display_name: Option<String>,
}

/// Ordered label map entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    items: Vec<LabelMapItem>,
}

impl LabelMap {
    #[must_use]
    pub fn new(items: Vec<LabelMapItem>) -> Self {
        Self { items }
    }

    /// Assign ids `1..=len` in list order.
    pub fn from_class_names(class_names: &ClassNameList) -> PrepResult<Self> {
        let items = class_names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let id = i32::try_from(idx + 1)
                    .map_err(|_| PrepError::LabelMap(format!("too many classes: {}", class_names.len())))?;
                Ok(LabelMapItem { id, name: name.to_string(), display_name: None })
            })
            .collect::<PrepResult<Vec<_>>>()?;
        Ok(Self { items })
    }

    pub fn items(&self) -> &[LabelMapItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Id of the first item named `name`.
    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.items.iter().find(|item| item.name == name).map(|item| item.id)
    }

    /// Serialize in protobuf text format, fields in field-number order.
    #[must_use]
    pub fn to_pbtxt(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str("item {\n");
            let _ = writeln!(out, "  name: \"{}\"", escape_text(&item.name));
            let _ = writeln!(out, "  id: {}", item.id);
            if let Some(display_name) = &item.display_name {
                let _ = writeln!(out, "  display_name: \"{}\"", escape_text(display_name));
            }
            out.push_str("}\n");
        }
        out
    }

    /// Parse and validate a text-format label map.
    pub fn parse(text: &str) -> PrepResult<Self> {
        let tokens = tokenize(text)?;
        let map = Parser { tokens, pos: 0 }.parse_label_map()?;
        map.validate()?;
        Ok(map)
    }

    /// Ids must be non-negative and id 0 is reserved for the background class.
    pub fn validate(&self) -> PrepResult<()> {
        for item in &self.items {
            if item.id < 0 {
                return Err(PrepError::LabelMap("label map ids should be >= 0".to_string()));
            }
            if item.id == 0 && item.name != BACKGROUND && item.display_name.as_deref() != Some(BACKGROUND) {
                return Err(PrepError::LabelMap("label map id 0 is reserved for the background label".to_string()));
            }
        }
        Ok(())
    }

    /// Category index keyed by id: `(id, display name or name)` for ids in `1..=max_num_classes`.
    ///
    /// The first item wins when ids repeat.
    #[must_use]
    pub fn category_index(&self, max_num_classes: i32) -> BTreeMap<i32, String> {
        let mut index = BTreeMap::new();
        for item in &self.items {
            if !(1..=max_num_classes).contains(&item.id) {
                tracing::info!(id = item.id, "Ignoring label map item outside of requested label range");
                continue;
            }
            let name = item.display_name.as_ref().unwrap_or(&item.name);
            index.entry(item.id).or_insert_with(|| name.clone());
        }
        index
    }
}

/// Collect class names from `label_field` across the view, in scan order.
///
/// Samples whose label field is missing or null are skipped.
pub fn collect_class_names(view: &DatasetView<'_>, label_field: &str) -> ClassNameList {
    tracing::info!("Extracting class names from label field");
    let mut class_names = ClassNameList::new();
    for sample in view.iter() {
        if let Some(detections) = sample.label_field(label_field) {
            for detection in &detections.detections {
                class_names.push(&detection.label);
            }
        }
    }
    tracing::info!(classes = class_names.len(), "Finished extracting class names from label field");
    class_names
}

/// Build the label map text for the `"training"` samples of a dataset.
pub fn create_mapping(store: &dyn DatasetStore, dataset_name: &str, label_field: &str) -> PrepResult<String> {
    tracing::info!(dataset = dataset_name, "Creating detection classes to ID mapping");

    let dataset = store.load_dataset(dataset_name)?;
    let view = dataset.match_tags(TRAINING_TAG).shuffle(MAPPING_SEED);

    let class_names = collect_class_names(&view, label_field);
    let mapping = LabelMap::from_class_names(&class_names)?.to_pbtxt();

    tracing::info!("Finished creating detection classes to ID mapping");
    Ok(mapping)
}

/// Write the mapping to `filepaths.label_map_file`, replacing any existing file.
///
/// The parent directory must already exist.
pub fn save_mapping_to_file(mapping: &str, filepaths: &FilepathSet) -> PrepResult<()> {
    tracing::info!(path = %filepaths.label_map_file.display(), "Creating detection classes to ID mapping file");
    std::fs::write(&filepaths.label_map_file, mapping)?;
    tracing::info!("Finished creating detection classes to ID mapping file");
    Ok(())
}

pub fn load_label_map(path: &Path) -> PrepResult<LabelMap> {
    let text = std::fs::read_to_string(path)?;
    LabelMap::parse(&text).map_err(|e| match e {
        PrepError::LabelMap(msg) => PrepError::LabelMap(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Number of classes in the label map file on disk.
pub fn count_classes(filepaths: &FilepathSet) -> PrepResult<usize> {
    tracing::info!("Calculating number of classes in label map file");
    let label_map = load_label_map(&filepaths.label_map_file)?;
    let num_classes = label_map.category_index(MAX_NUM_CLASSES).len();
    tracing::info!(num_classes, "Finished calculating number of classes in label map file");
    Ok(num_classes)
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Open,
    Close,
    Colon,
}

fn tokenize(text: &str) -> PrepResult<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b if b.is_ascii_whitespace() || b == b',' || b == b';' => i += 1,
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'{' | b'<' => {
                tokens.push(Token::Open);
                i += 1;
            }
            b'}' | b'>' => {
                tokens.push(Token::Close);
                i += 1;
            }
            b':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            b'"' | b'\'' => {
                let (value, next) = read_string(bytes, i)?;
                // Adjacent literals concatenate.
                if let Some(Token::Str(prev)) = tokens.last_mut() {
                    prev.push_str(&value);
                } else {
                    tokens.push(Token::Str(value));
                }
                i = next;
            }
            b'-' | b'0'..=b'9' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let literal = &text[start..i];
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| PrepError::LabelMap(format!("invalid integer '{literal}'")))?;
                tokens.push(Token::Int(value));
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(text[start..i].to_string()));
            }
            other => {
                return Err(PrepError::LabelMap(format!(
                    "unexpected character '{}' at byte {}",
                    char::from(other),
                    i
                )));
            }
        }
    }

    Ok(tokens)
}

/// Read a quoted literal starting at `start`; returns the decoded value and the index after the closing quote.
fn read_string(bytes: &[u8], start: usize) -> PrepResult<(String, usize)> {
    let quote = bytes[start];
    let mut out: Vec<u8> = Vec::new();
    let mut i = start + 1;

    loop {
        let Some(&b) = bytes.get(i) else {
            return Err(PrepError::LabelMap("unterminated string literal".to_string()));
        };
        match b {
            b'\n' => return Err(PrepError::LabelMap("newline in string literal".to_string())),
            b if b == quote => {
                i += 1;
                break;
            }
            b'\\' => {
                let esc = *bytes
                    .get(i + 1)
                    .ok_or_else(|| PrepError::LabelMap("unterminated escape sequence".to_string()))?;
                i += 2;
                match esc {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'v' => out.push(0x0b),
                    b'"' | b'\'' | b'\\' | b'?' => out.push(esc),
                    b'0'..=b'7' => {
                        let mut value = u32::from(esc - b'0');
                        let mut digits = 1;
                        while digits < 3 {
                            match bytes.get(i) {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                    digits += 1;
                                }
                                _ => break,
                            }
                        }
                        let byte = u8::try_from(value)
                            .map_err(|_| PrepError::LabelMap(format!("octal escape out of range: {value:o}")))?;
                        out.push(byte);
                    }
                    b'x' => {
                        let mut value: u32 = 0;
                        let mut digits = 0;
                        while digits < 2 {
                            match bytes.get(i).and_then(|d| char::from(*d).to_digit(16)) {
                                Some(d) => {
                                    value = value * 16 + d;
                                    i += 1;
                                    digits += 1;
                                }
                                None => break,
                            }
                        }
                        if digits == 0 {
                            return Err(PrepError::LabelMap("\\x escape without hex digits".to_string()));
                        }
                        out.push(value as u8);
                    }
                    other => {
                        return Err(PrepError::LabelMap(format!("invalid escape '\\{}'", char::from(other))));
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    let value = String::from_utf8(out).map_err(|_| PrepError::LabelMap("string literal is not valid UTF-8".to_string()))?;
    Ok((value, i))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_label_map(&mut self) -> PrepResult<LabelMap> {
        let mut items = Vec::new();
        while let Some(token) = self.next() {
            match token {
                Token::Ident(field) if field == "item" => {
                    if self.peek() == Some(&Token::Colon) {
                        self.pos += 1;
                    }
                    match self.next() {
                        Some(Token::Open) => items.push(self.parse_item()?),
                        _ => return Err(PrepError::LabelMap("expected '{' after 'item'".to_string())),
                    }
                }
                Token::Ident(field) => {
                    return Err(PrepError::LabelMap(format!("unknown field '{field}' in label map")));
                }
                other => return Err(PrepError::LabelMap(format!("unexpected token {other:?}"))),
            }
        }
        Ok(LabelMap { items })
    }

    fn parse_item(&mut self) -> PrepResult<LabelMapItem> {
        let mut item = LabelMapItem::default();
        loop {
            let field = match self.next() {
                Some(Token::Close) => return Ok(item),
                Some(Token::Ident(field)) => field,
                Some(other) => return Err(PrepError::LabelMap(format!("unexpected token {other:?} in item"))),
                None => return Err(PrepError::LabelMap("unterminated item".to_string())),
            };
            if self.next() != Some(Token::Colon) {
                return Err(PrepError::LabelMap(format!("expected ':' after '{field}'")));
            }
            match (field.as_str(), self.next()) {
                ("name", Some(Token::Str(value))) => item.name = value,
                ("display_name", Some(Token::Str(value))) => item.display_name = Some(value),
                ("id", Some(Token::Int(value))) => {
                    item.id = i32::try_from(value)
                        .map_err(|_| PrepError::LabelMap(format!("id out of range: {value}")))?;
                }
                ("name" | "display_name" | "id", _) => {
                    return Err(PrepError::LabelMap(format!("invalid value for '{field}'")));
                }
                (other, _) => return Err(PrepError::LabelMap(format!("unknown field '{other}' in item"))),
            }
        }
    }
}
