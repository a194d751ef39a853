use std::{fmt, str, collections::HashMap};
use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected character {0:?} at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("invalid byte string length")]
    InvalidLength,
    #[error("dictionary key is not valid utf-8")]
    InvalidKey,
    #[error("trailing data after value")]
    TrailingData,
    #[error("nesting too deep")]
    NestingTooDeep,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    ByteString(Vec<u8>),
    List(Vec<Node>),
    Dictionary(HashMap<String, Node>),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Node {
    pub value: Value,
}

impl Node {
    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self.value {
            Some(i)
        } else {
            None
        }
    }

    pub fn as_byte_string(&self) -> Option<&[u8]> {
        if let Value::ByteString(bs) = &self.value {
            Some(bs)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        str::from_utf8(self.as_byte_string()?).ok()
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        if let Value::List(l) = &self.value {
            Some(l)
        } else {
            None
        }
    }

    pub fn as_dictionary(&self) -> Option<&HashMap<String, Node>> {
        if let Value::Dictionary(d) = &self.value {
            Some(d)
        } else {
            None
        }
    }

    /// Name of the bencode type held by this node, for error messages.
    pub fn kind(&self) -> &'static str {
        match self.value {
            Value::Integer(_) => "integer",
            Value::ByteString(_) => "byte string",
            Value::List(_) => "list",
            Value::Dictionary(_) => "dictionary",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::ByteString(s) => write!(
                f,
                "\"{}\"",
                str::from_utf8(s).unwrap_or("[non-utf8 byte string]")
            ),
            Value::Integer(i) => write!(f, "Integer: {}", i),
            Value::List(l) => write!(
                f,
                "[{}]",
                l
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            Value::Dictionary(d) => {
                let mut keys = d.keys().collect::<Vec<&String>>();
                keys.sort();
                write!(
                    f,
                    "{{\n{} }}",
                    keys
                        .iter()
                        .map(|key| format!("\t{}: {}", key, d[*key]))
                        .collect::<Vec<String>>()
                        .join(", \n")
                )
            }
        }
    }
}

/// Decodes a single bencoded value that must span all of `content`.
pub fn parse(content: &[u8]) -> Result<Node, ParseError> {
    let (value, parse_len) = parse_value(content, 0, 0)?;

    if parse_len == content.len() {
        Ok(Node { value })
    } else {
        Err(ParseError::TrailingData)
    }
}

// `offset` is the position of `content` inside the full input; it only feeds error messages.
fn parse_value(content: &[u8], offset: usize, depth: usize) -> Result<(Value, usize), ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::NestingTooDeep);
    }

    match content.first() {
        None => Err(ParseError::UnexpectedEof),
        Some(b'l') => parse_list(content, offset, depth).map(|(l, len)| (Value::List(l), len)),
        Some(b'd') => parse_dictionary(content, offset, depth).map(|(d, len)| (Value::Dictionary(d), len)),
        Some(b'i') => parse_integer(content).map(|(i, len)| (Value::Integer(i), len)),
        Some(b'0'..=b'9') => parse_byte_string(content).map(|(bs, len)| (Value::ByteString(bs), len)),
        Some(&c) => Err(ParseError::UnexpectedChar(c as char, offset)),
    }
}

fn parse_list(content: &[u8], offset: usize, depth: usize) -> Result<(Vec<Node>, usize), ParseError> {
    let mut list = Vec::new();
    let mut parse_len = 1;

    loop {
        let unparsed = &content[parse_len..];
        match unparsed.first() {
            None => return Err(ParseError::UnexpectedEof),
            Some(b'e') => {
                parse_len += 1;
                break;
            }
            Some(_) => {
                let (value, value_parse_len) = parse_value(unparsed, offset + parse_len, depth + 1)?;
                list.push(Node { value });
                parse_len += value_parse_len;
            }
        };
    }

    Ok((list, parse_len))
}

fn parse_dictionary(content: &[u8], offset: usize, depth: usize) -> Result<(HashMap<String, Node>, usize), ParseError> {
    let mut dict = HashMap::new();
    let mut parse_len = 1;

    loop {
        let unparsed = &content[parse_len..];
        match unparsed.first() {
            None => return Err(ParseError::UnexpectedEof),
            Some(b'e') => {
                parse_len += 1;
                break;
            }
            Some(b'0'..=b'9') => {
                let (key_byte_str, key_parse_len) = parse_byte_string(unparsed)?;
                let key = String::from_utf8(key_byte_str).map_err(|_| ParseError::InvalidKey)?;
                parse_len += key_parse_len;

                let (value, value_parse_len) =
                    parse_value(&content[parse_len..], offset + parse_len, depth + 1)?;
                dict.insert(key, Node { value });
                parse_len += value_parse_len;
            }
            Some(&c) => return Err(ParseError::UnexpectedChar(c as char, offset + parse_len)),
        };
    }

    Ok((dict, parse_len))
}

fn parse_byte_string(content: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
    let colon_idx = content
        .iter()
        .position(|c| c == &b':')
        .ok_or(ParseError::UnexpectedEof)?;
    let digits = &content[..colon_idx];
    if digits.is_empty()
        || !digits.iter().all(|c| c.is_ascii_digit())
        || (digits[0] == b'0' && digits.len() > 1)
    {
        return Err(ParseError::InvalidLength);
    }
    let length = str::from_utf8(digits)
        .ok()
        .and_then(|length| length.parse::<usize>().ok())
        .ok_or(ParseError::InvalidLength)?;

    let value_idx = colon_idx + 1;
    let value_end_idx = value_idx.checked_add(length).ok_or(ParseError::InvalidLength)?;
    if value_end_idx > content.len() {
        return Err(ParseError::UnexpectedEof);
    }
    let value = content[value_idx..value_end_idx].to_vec();

    Ok((value, value_end_idx))
}

fn parse_integer(content: &[u8]) -> Result<(i64, usize), ParseError> {
    let e_idx = content
        .iter()
        .position(|c| c == &b'e')
        .ok_or(ParseError::UnexpectedEof)?;
    let digits = str::from_utf8(&content[1..e_idx])
        .map_err(|_| ParseError::InvalidInteger("not ascii".into()))?;

    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidInteger(digits.into()));
    }
    if (unsigned.starts_with('0') && unsigned.len() > 1) || digits == "-0" {
        return Err(ParseError::InvalidInteger(digits.into()));
    }
    let int = digits
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidInteger(digits.into()))?;

    Ok((int, e_idx + 1))
}
