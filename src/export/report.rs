use std::io::{self, Write};

use crate::state::{Hop, TraceResult};

/// One traceroute-style line for a hop
pub fn format_hop(hop: &Hop) -> String {
    if !hop.responded() {
        return format!("{:>3}  *", hop.ttl);
    }

    let host = if hop.host.is_empty() {
        hop.address.clone()
    } else {
        format!("{} ({})", hop.host, hop.address)
    };
    let marker = if hop.reachable { "" } else { "  !" };
    format!("{:>3}  {:<50} {:>9.3} ms{}", hop.ttl, host, hop.latency_ms, marker)
}

/// Generate a text report similar to classic traceroute output
pub fn generate_report<W: Write>(result: &TraceResult, mut writer: W) -> io::Result<()> {
    match result.destination {
        Some(destination) => writeln!(writer, "traceroute to {} ({})", result.target, destination)?,
        None => writeln!(writer, "traceroute to {}", result.target)?,
    }
    writeln!(writer, "Started: {}", result.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(writer)?;

    for hop in &result.hops {
        writeln!(writer, "{}", format_hop(hop))?;
    }

    if let Some(termination) = result.termination {
        writeln!(writer)?;
        writeln!(writer, "Stopped: {}", termination)?;
    }

    Ok(())
}
