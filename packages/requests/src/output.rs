//! Line-delimited JSON output.

use std::io::{self, Write};

use serde_json::Value;

/// Writes each record as one compact JSON object per line, unmodified.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn write_json_lines<W: Write + ?Sized>(out: &mut W, records: &[Value]) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record).map_err(io::Error::from)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
