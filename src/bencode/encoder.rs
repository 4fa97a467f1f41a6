use super::BencodeValue;

/// Canonical encoding: integers in shortest decimal form, dictionary keys
/// in ascending byte order.
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut Vec<u8>, value: &BencodeValue) {
    match value {
        BencodeValue::Integer(n) => out.extend(format!("i{}e", n).bytes()),
        BencodeValue::String(raw) => write_bytes(out, raw),
        BencodeValue::List(items) => {
            out.push(b'l');
            items.iter().for_each(|item| write_value(out, item));
            out.push(b'e');
        }
        BencodeValue::Dict(entries) => {
            out.push(b'd');
            for (key, item) in entries {
                write_bytes(out, key);
                write_value(out, item);
            }
            out.push(b'e');
        }
    }
}

fn write_bytes(out: &mut Vec<u8>, raw: &[u8]) {
    out.extend(format!("{}:", raw.len()).bytes());
    out.extend_from_slice(raw);
}
