use crate::render;
use csv::WriterBuilder;
use pingboard_common::protocol::HostRecord;
use std::io::Write;

/// Writes the snapshot as `;`-separated CSV with the table's columns and
/// cell formatting.
pub(crate) fn write_csv<W: Write>(hosts: &[HostRecord], out: W) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b';').from_writer(out);

    writer.write_record(render::COLUMNS)?;
    for record in hosts {
        writer.write_record(render::cells(record))?;
    }

    writer.flush()?;
    Ok(())
}
