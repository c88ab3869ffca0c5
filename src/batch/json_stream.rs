//! Pull-based streaming over the elements of a JSON array
//!
//! [`ArrayStream`] walks a JSON document byte by byte, descends to the
//! container selected by a [`JsonPointer`], and hands out that container's
//! members one at a time. Only the member currently being decoded is held in
//! memory; everything else is skipped as it is read.

use super::source::BatchError;
use serde_json::Value;
use std::io::BufRead;

/// RFC 6901 pointer where a `-` token matches every member at its level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    /// The whole document
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(pointer: &str) -> Result<Self, BatchError> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }
        let rest = pointer.strip_prefix('/').ok_or_else(|| {
            BatchError::Validation(format!("JSON pointer must start with '/': {}", pointer))
        })?;
        let tokens = rest
            .split('/')
            .map(|t| t.replace("~1", "/").replace("~0", "~"))
            .collect();
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.tokens.iter().any(|t| t == "-")
    }

    fn matches_key(&self, level: usize, key: &str) -> bool {
        self.tokens
            .get(level)
            .map(|t| t == "-" || t == key)
            .unwrap_or(false)
    }

    fn matches_index(&self, level: usize, index: u64) -> bool {
        self.tokens
            .get(level)
            .map(|t| t == "-" || t.parse::<u64>().ok() == Some(index))
            .unwrap_or(false)
    }

    /// Equivalent jq path expression (`.` for the root)
    pub fn to_jq_path(&self) -> String {
        if self.tokens.is_empty() {
            return ".".to_string();
        }
        self.tokens
            .iter()
            .map(|token| {
                let quoted = serde_json::to_string(token).unwrap_or_else(|_| "\"\"".to_string());
                if token == "-" {
                    ".[]".to_string()
                } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
                    format!("(if type == \"array\" then .[{}] else .[{}] end)", token, quoted)
                } else {
                    format!(".[{}]", quoted)
                }
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Array,
    Object,
}

impl Container {
    fn closer(self) -> u8 {
        match self {
            Container::Array => b']',
            Container::Object => b'}',
        }
    }
}

/// A container entered on the way to (or at) the pointer target
#[derive(Debug)]
struct Frame {
    container: Container,
    first: bool,
    index: u64,
}

/// Streaming iterator over the members of the container at a pointer
pub struct ArrayStream<R> {
    input: R,
    pointer: JsonPointer,
    frames: Vec<Frame>,
    scratch: Vec<u8>,
    bytes_read: u64,
    started: bool,
    finished: bool,
}

impl<R: BufRead> ArrayStream<R> {
    pub fn new(input: R, pointer: JsonPointer) -> Self {
        Self {
            input,
            pointer,
            frames: Vec::new(),
            scratch: Vec::with_capacity(8192),
            bytes_read: 0,
            started: false,
            finished: false,
        }
    }

    /// Bytes consumed from the input so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Decode the next member of the target container
    pub fn next_value(&mut self) -> Result<Option<Value>, BatchError> {
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            match self.skip_ws()? {
                Some(b'[') => self.enter(Container::Array),
                Some(b'{') => self.enter(Container::Object),
                Some(b) => {
                    return Err(self.syntax(format!(
                        "expected array or object at document root, found '{}'",
                        b as char
                    )))
                }
                None => return Err(self.syntax("empty document")),
            }
        }

        loop {
            let level = match self.frames.len() {
                0 => {
                    self.finished = true;
                    return Ok(None);
                }
                n => n - 1,
            };
            let container = self.frames[level].container;

            let next = match self.skip_ws()? {
                Some(b) => b,
                None => return Err(self.syntax("unexpected end of input")),
            };
            if next == container.closer() {
                self.bump();
                self.frames.pop();
                if self.frames.is_empty()
                    || (level == self.pointer.len() && !self.pointer.has_wildcard())
                {
                    self.finished = true;
                    return Ok(None);
                }
                continue;
            }

            if !self.frames[level].first {
                if next != b',' {
                    return Err(self.syntax(format!("expected ',' found '{}'", next as char)));
                }
                self.bump();
            }
            let frame = &mut self.frames[level];
            frame.first = false;
            let index = frame.index;
            frame.index += 1;

            let key = match container {
                Container::Object => Some(self.read_key()?),
                Container::Array => None,
            };

            if level == self.pointer.len() {
                return self.capture_value().map(Some);
            }

            let matched = match &key {
                Some(key) => self.pointer.matches_key(level, key),
                None => self.pointer.matches_index(level, index),
            };
            if matched {
                match self.skip_ws()? {
                    Some(b'[') => {
                        self.enter(Container::Array);
                        continue;
                    }
                    Some(b'{') => {
                        self.enter(Container::Object);
                        continue;
                    }
                    _ => {}
                }
            }
            self.scan_value(false)?;
        }
    }

    fn enter(&mut self, container: Container) {
        self.bump();
        self.frames.push(Frame {
            container,
            first: true,
            index: 0,
        });
    }

    fn peek(&mut self) -> Result<Option<u8>, BatchError> {
        let buf = self.input.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn bump(&mut self) {
        self.input.consume(1);
        self.bytes_read += 1;
    }

    fn next_byte(&mut self) -> Result<u8, BatchError> {
        match self.peek()? {
            Some(b) => {
                self.bump();
                Ok(b)
            }
            None => Err(self.syntax("unexpected end of input")),
        }
    }

    fn skip_ws(&mut self) -> Result<Option<u8>, BatchError> {
        loop {
            match self.peek()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.bump(),
                other => return Ok(other),
            }
        }
    }

    fn syntax(&self, message: impl Into<String>) -> BatchError {
        BatchError::Parse(format!("{} at byte {}", message.into(), self.bytes_read))
    }

    /// Read `"key" :` and return the decoded key
    fn read_key(&mut self) -> Result<String, BatchError> {
        if self.skip_ws()? != Some(b'"') {
            return Err(self.syntax("expected object key"));
        }
        self.scratch.clear();
        self.scan_string(true)?;
        let key: String = serde_json::from_slice(&self.scratch)
            .map_err(|e| self.syntax(format!("invalid object key: {}", e)))?;

        if self.skip_ws()? != Some(b':') {
            return Err(self.syntax("expected ':' after object key"));
        }
        self.bump();
        Ok(key)
    }

    fn capture_value(&mut self) -> Result<Value, BatchError> {
        self.scratch.clear();
        self.scan_value(true)?;
        serde_json::from_slice(&self.scratch).map_err(|e| self.syntax(e.to_string()))
    }

    /// Consume one value, copying its bytes into `scratch` when `keep` is set
    fn scan_value(&mut self, keep: bool) -> Result<(), BatchError> {
        match self.skip_ws()? {
            Some(b'"') => self.scan_string(keep),
            Some(b'{' | b'[') => self.scan_container(keep),
            Some(b'-' | b'0'..=b'9' | b't' | b'f' | b'n') => self.scan_scalar(keep),
            Some(b) => Err(self.syntax(format!("unexpected '{}'", b as char))),
            None => Err(self.syntax("unexpected end of input")),
        }
    }

    fn scan_string(&mut self, keep: bool) -> Result<(), BatchError> {
        // opening quote
        let quote = self.next_byte()?;
        if keep {
            self.scratch.push(quote);
        }
        let mut escaped = false;
        loop {
            let b = self.next_byte()?;
            if keep {
                self.scratch.push(b);
            }
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                return Ok(());
            }
        }
    }

    fn scan_container(&mut self, keep: bool) -> Result<(), BatchError> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let b = self.next_byte()?;
            if keep {
                self.scratch.push(b);
            }
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_scalar(&mut self, keep: bool) -> Result<(), BatchError> {
        loop {
            match self.peek()? {
                None | Some(b',' | b']' | b'}' | b' ' | b'\t' | b'\n' | b'\r') => return Ok(()),
                Some(b) => {
                    if keep {
                        self.scratch.push(b);
                    }
                    self.bump();
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for ArrayStream<R> {
    type Item = Result<Value, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_value() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn collect(doc: &str, pointer: &str) -> Vec<Value> {
        let pointer = JsonPointer::parse(pointer).unwrap();
        ArrayStream::new(Cursor::new(doc.as_bytes().to_vec()), pointer)
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_root_array() {
        let values = collect(r#"[1, "two", {"three": [3]}, null, true, -4.5e1]"#, "");
        assert_eq!(
            values,
            vec![json!(1), json!("two"), json!({"three": [3]}), json!(null), json!(true), json!(-45.0)]
        );
    }

    #[test]
    fn test_empty_array() {
        assert!(collect("  [ ]  ", "").is_empty());
    }

    #[test]
    fn test_pointer_into_object() {
        let doc = r#"{"meta": {"count": 2}, "results": [{"id": 1}, {"id": 2}], "after": [9]}"#;
        assert_eq!(collect(doc, "/results"), vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn test_pointer_with_index_and_escapes() {
        let doc = r#"{"a/b": [[1, 2], [3, 4]], "c~d": {"x": [5]}}"#;
        assert_eq!(collect(doc, "/a~1b/1"), vec![json!(3), json!(4)]);
        assert_eq!(collect(doc, "/c~0d/x"), vec![json!(5)]);
    }

    #[test]
    fn test_wildcard_pointer() {
        let doc = r#"{"pages": [{"items": [1, 2]}, {"other": 0}, {"items": [3]}]}"#;
        assert_eq!(collect(doc, "/pages/-/items"), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_object_target_yields_member_values() {
        let doc = r#"{"authors": {"a": {"name": "Ann"}, "b": {"name": "Ben"}}}"#;
        assert_eq!(
            collect(doc, "/authors"),
            vec![json!({"name": "Ann"}), json!({"name": "Ben"})]
        );
    }

    #[test]
    fn test_missing_pointer_yields_nothing() {
        assert!(collect(r#"{"results": [1]}"#, "/missing").is_empty());
        assert!(collect(r#"{"results": 5}"#, "/results/0").is_empty());
    }

    #[test]
    fn test_strings_with_brackets_and_escapes() {
        let doc = r#"[{"t": "a ] } \" [ {"}, "\\", "é"]"#;
        assert_eq!(
            collect(doc, ""),
            vec![json!({"t": "a ] } \" [ {"}), json!("\\"), json!("é")]
        );
    }

    #[test]
    fn test_syntax_error_after_valid_elements() {
        let mut stream = ArrayStream::new(Cursor::new(b"[1, 2 3]".to_vec()), JsonPointer::root());
        assert_eq!(stream.next().unwrap().unwrap(), json!(1));
        assert_eq!(stream.next().unwrap().unwrap(), json!(2));
        assert!(matches!(stream.next(), Some(Err(BatchError::Parse(_)))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_trailing_comma_rejected() {
        let mut stream = ArrayStream::new(Cursor::new(b"[1,]".to_vec()), JsonPointer::root());
        assert_eq!(stream.next().unwrap().unwrap(), json!(1));
        assert!(matches!(stream.next(), Some(Err(BatchError::Parse(_)))));
    }

    #[test]
    fn test_scalar_root_rejected() {
        let mut stream = ArrayStream::new(Cursor::new(b"42".to_vec()), JsonPointer::root());
        assert!(matches!(stream.next(), Some(Err(BatchError::Parse(_)))));
    }

    #[test]
    fn test_pointer_parse() {
        assert!(JsonPointer::parse("").unwrap().is_empty());
        assert_eq!(JsonPointer::parse("/a/-").unwrap().tokens(), &["a", "-"]);
        assert!(JsonPointer::parse("a").is_err());
    }

    #[test]
    fn test_jq_path() {
        assert_eq!(JsonPointer::root().to_jq_path(), ".");
        assert_eq!(
            JsonPointer::parse("/results/-/items").unwrap().to_jq_path(),
            r#".["results"] | .[] | .["items"]"#
        );
        assert_eq!(
            JsonPointer::parse("/2").unwrap().to_jq_path(),
            r#"(if type == "array" then .[2] else .["2"] end)"#
        );
    }
}
