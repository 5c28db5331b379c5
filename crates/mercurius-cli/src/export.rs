//! Listing export formats for the `list` command.

use std::io::Write;

use mercurius_core::Listing;

use crate::config::ExportFormat;

/// Writes `listings` to `out` in the requested format.
pub fn write_listings<W: Write>(
    out: &mut W,
    listings: &[Listing],
    format: ExportFormat,
) -> anyhow::Result<()> {
    match format {
        ExportFormat::Jsonl => export_jsonl(out, listings),
        ExportFormat::Json => export_json(out, listings),
        ExportFormat::Csv => export_csv(out, listings),
    }
}

/// Export listings in JSON Lines format (one JSON object per line)
fn export_jsonl<W: Write>(out: &mut W, listings: &[Listing]) -> anyhow::Result<()> {
    for listing in listings {
        let json = serde_json::to_string(listing)?;
        writeln!(out, "{}", json)?;
    }
    Ok(())
}

/// Export listings as a JSON array
fn export_json<W: Write>(out: &mut W, listings: &[Listing]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(listings)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

/// Export listings in CSV format
fn export_csv<W: Write>(out: &mut W, listings: &[Listing]) -> anyhow::Result<()> {
    writeln!(out, "id,listing_number,price,status,created_at,updated_at")?;

    for listing in listings {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            listing.id,
            escape_csv(&listing.listing_number),
            listing.price,
            escape_csv(&listing.status),
            listing.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
            listing.updated_at.format("%Y-%m-%dT%H:%M:%SZ"),
        )?;
    }
    Ok(())
}

/// Escape a string for CSV output
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
