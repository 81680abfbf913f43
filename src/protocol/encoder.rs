//! RESP reply encoder
//!
//! Each function returns the raw reply bytes to append to a connection's
//! outbound buffer.

/// Simple string: `+<s>\r\n`
pub fn simple_string(s: &str) -> Vec<u8> {
    format!("+{}\r\n", s).into_bytes()
}

/// Error: `-ERR <message>\r\n`
pub fn error(message: &str) -> Vec<u8> {
    format!("-ERR {}\r\n", message).into_bytes()
}

/// Integer: `:<n>\r\n`
pub fn integer(value: i64) -> Vec<u8> {
    format!(":{}\r\n", value).into_bytes()
}

/// Bulk string: `$<len>\r\n<bytes>\r\n`; an empty value is `$0\r\n\r\n`
pub fn bulk_string(value: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", value.len()).into_bytes();
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
    out
}

/// Null bulk string, the "absent" reply for GET: `$-1\r\n`
pub fn null_bulk_string() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}
