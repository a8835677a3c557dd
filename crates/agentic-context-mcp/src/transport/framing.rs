//! Message framing for newline-delimited JSON.

/// Strip the line terminator (`\n` or `\r\n`) and surrounding whitespace.
pub fn unframe_line(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

/// Append the line terminator to an encoded message.
pub fn frame_message(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.extend_from_slice(payload);
    framed.push(b'\n');
    framed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unframe() {
        assert_eq!(unframe_line(b"{\"a\":1}\r\n"), b"{\"a\":1}");
        assert_eq!(unframe_line(b"  {}  \n"), b"{}");
        assert_eq!(unframe_line(b"\n"), b"");
        assert_eq!(unframe_line(b""), b"");
    }

    #[test]
    fn test_frame() {
        assert_eq!(frame_message(b"{}"), b"{}\n".to_vec());
    }
}
