//! Small shared helpers.

use std::fmt::Write;

/// Render a byte buffer as a classic hex dump: a four-digit offset column,
/// sixteen hex bytes per row and an ASCII gutter with non-printable bytes
/// replaced by `.`. Used for debug-level logging of rejected serial data.
pub fn hex_dump(data: &[u8]) -> String {
    if data.is_empty() {
        return "  ZERO LENGTH\n".to_string();
    }

    let mut out = String::new();
    let mut ascii = String::new();

    for (i, byte) in data.iter().enumerate() {
        if i % 16 == 0 {
            if i != 0 {
                let _ = writeln!(out, " {ascii}");
                ascii.clear();
            }
            let _ = write!(out, "{i:04x}");
        }
        let _ = write!(out, " {byte:02x}");
        ascii.push(if (0x20..=0x7e).contains(byte) {
            *byte as char
        } else {
            '.'
        });
    }

    // Pad the last row out to the ASCII gutter column.
    let mut i = data.len();
    while i % 16 != 0 {
        out.push_str("   ");
        i += 1;
    }
    let _ = writeln!(out, " {ascii}");
    out
}
