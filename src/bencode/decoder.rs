use crate::error::{BittorrentError, Result};
use super::BencodeValue;
use std::collections::BTreeMap;

/// Nesting bound for lists and dictionaries
pub const MAX_DEPTH: usize = 1000;

/// Decode bencoded data into a BencodeValue. The whole input must be
/// consumed by exactly one value.
pub fn decode(data: &[u8]) -> Result<BencodeValue> {
    let (value, consumed) = decode_prefix(data)?;

    if consumed != data.len() {
        return Err(BittorrentError::MalformedEncoding(format!(
            "{} trailing bytes after value",
            data.len() - consumed
        )));
    }

    Ok(value)
}

/// Decode one value from the front of `data`, returning it together with
/// the number of bytes it occupied.
pub fn decode_prefix(data: &[u8]) -> Result<(BencodeValue, usize)> {
    let mut pos = 0;
    let value = decode_value(data, &mut pos, 0)?;
    Ok((value, pos))
}

fn malformed(msg: impl Into<String>) -> BittorrentError {
    BittorrentError::MalformedEncoding(msg.into())
}

fn decode_value(data: &[u8], pos: &mut usize, depth: usize) -> Result<BencodeValue> {
    if depth > MAX_DEPTH {
        return Err(malformed("nesting too deep"));
    }

    if *pos >= data.len() {
        return Err(BittorrentError::UnexpectedEndOfInput);
    }

    match data[*pos] {
        b'i' => decode_integer(data, pos),
        b'l' => decode_list(data, pos, depth),
        b'd' => decode_dict(data, pos, depth),
        b'0'..=b'9' => decode_string(data, pos).map(BencodeValue::String),
        c => Err(malformed(format!(
            "invalid token {:?} at offset {}",
            c as char, *pos
        ))),
    }
}

fn decode_integer(data: &[u8], pos: &mut usize) -> Result<BencodeValue> {
    *pos += 1; // Skip 'i'

    let start = *pos;
    while *pos < data.len() && data[*pos] != b'e' {
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(BittorrentError::UnexpectedEndOfInput);
    }

    let digits = &data[start..*pos];
    let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);

    if unsigned.is_empty() {
        return Err(malformed("integer has no digits"));
    }
    if !unsigned.iter().all(u8::is_ascii_digit) {
        return Err(malformed("integer contains non-digit characters"));
    }
    if unsigned[0] == b'0' && (unsigned.len() > 1 || unsigned.len() != digits.len()) {
        return Err(malformed("integer has a leading zero or negative zero"));
    }

    // All bytes are ASCII at this point
    let num = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| malformed("integer does not fit in 64 bits"))?;

    *pos += 1; // Skip 'e'

    Ok(BencodeValue::Integer(num))
}

fn decode_string(data: &[u8], pos: &mut usize) -> Result<Vec<u8>> {
    let start = *pos;
    while *pos < data.len() && data[*pos] != b':' {
        if !data[*pos].is_ascii_digit() {
            return Err(malformed("non-numeric string length prefix"));
        }
        *pos += 1;
    }

    if *pos >= data.len() {
        return Err(BittorrentError::UnexpectedEndOfInput);
    }

    if *pos == start {
        return Err(malformed("empty string length prefix"));
    }

    let len = std::str::from_utf8(&data[start..*pos])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| malformed("string length out of range"))?;

    *pos += 1; // Skip ':'

    if len > data.len() - *pos {
        return Err(BittorrentError::UnexpectedEndOfInput);
    }

    let string = data[*pos..*pos + len].to_vec();
    *pos += len;

    Ok(string)
}

fn decode_list(data: &[u8], pos: &mut usize, depth: usize) -> Result<BencodeValue> {
    *pos += 1; // Skip 'l'

    let mut list = Vec::new();

    while *pos < data.len() && data[*pos] != b'e' {
        list.push(decode_value(data, pos, depth + 1)?);
    }

    if *pos >= data.len() {
        return Err(BittorrentError::UnexpectedEndOfInput);
    }

    *pos += 1; // Skip 'e'

    Ok(BencodeValue::List(list))
}

fn decode_dict(data: &[u8], pos: &mut usize, depth: usize) -> Result<BencodeValue> {
    *pos += 1; // Skip 'd'

    let mut dict = BTreeMap::new();

    while *pos < data.len() && data[*pos] != b'e' {
        if !data[*pos].is_ascii_digit() {
            return Err(malformed("dictionary key must be a byte string"));
        }
        let key = decode_string(data, pos)?;

        let value = decode_value(data, pos, depth + 1)?;
        if dict.insert(key, value).is_some() {
            return Err(malformed("duplicate dictionary key"));
        }
    }

    if *pos >= data.len() {
        return Err(BittorrentError::UnexpectedEndOfInput);
    }

    *pos += 1; // Skip 'e'

    Ok(BencodeValue::Dict(dict))
}
