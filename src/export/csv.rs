use std::io::{self, Write};

use crate::state::TraceResult;

/// Export a trace result to CSV format
pub fn export_csv<W: Write>(result: &TraceResult, mut writer: W) -> io::Result<()> {
    writeln!(writer, "ttl,ip,hostname,latency_ms,reachable")?;

    for hop in &result.hops {
        writeln!(
            writer,
            "{},{},{},{:.3},{}",
            hop.ttl,
            hop.address,
            escape_csv(&hop.host),
            hop.latency_ms,
            hop.reachable
        )?;
    }

    Ok(())
}

/// Escape a string for CSV (quote if contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
