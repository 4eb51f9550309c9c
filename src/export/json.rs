use std::io::Write;

use crate::state::TraceResult;

/// Export a trace result as pretty-printed JSON
pub fn export_json<W: Write>(result: &TraceResult, mut writer: W) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(&mut writer, result)?;
    writeln!(writer).map_err(serde_json::Error::io)
}
