//! Schema command - Print the telemetry event schema.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use stmtscope_event::{CancelRecord, ConnectionRecord, EventKind, EventRecord, StatementRecord};

use crate::OutputFormat;

/// Fields present on every serialized event.
const ENVELOPE_FIELDS: &[&str] = &["sessionId", "startedAt", "durationNanos", "kind"];

/// Arguments for the schema command.
#[derive(Args)]
pub struct SchemaArgs {
    /// Only show this event kind
    #[arg(long)]
    pub kind: Option<KindArg>,
}

/// Event kind selector.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum KindArg {
    Statement,
    Connection,
    Cancel,
}

impl From<KindArg> for EventKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Statement => EventKind::Statement,
            KindArg::Connection => EventKind::Connection,
            KindArg::Cancel => EventKind::Cancel,
        }
    }
}

#[derive(Debug, Serialize)]
struct KindSchema {
    kind: EventKind,
    fields: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct Schema {
    envelope: &'static [&'static str],
    kinds: Vec<KindSchema>,
}

fn fields_of(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::Statement => StatementRecord::FIELDS,
        EventKind::Connection => ConnectionRecord::FIELDS,
        EventKind::Cancel => CancelRecord::FIELDS,
    }
}

fn schema(only: Option<EventKind>) -> Schema {
    let kinds = EventKind::ALL
        .into_iter()
        .filter(|kind| only.is_none_or(|only| only == *kind))
        .map(|kind| KindSchema {
            kind,
            fields: fields_of(kind).to_vec(),
        })
        .collect();
    Schema {
        envelope: ENVELOPE_FIELDS,
        kinds,
    }
}

/// Execute the schema command.
pub fn execute(args: SchemaArgs, format: OutputFormat) -> Result<()> {
    let schema = schema(args.kind.map(EventKind::from));

    match format {
        OutputFormat::Human => {
            println!("Envelope: {}", schema.envelope.join(", "));
            println!();
            for kind in &schema.kinds {
                println!("{} ({} fields):", kind.kind, kind.fields.len());
                for field in &kind.fields {
                    println!("  {}", field);
                }
                println!();
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&schema)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&schema)?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_schema() {
        let schema = schema(None);
        let kinds: Vec<_> = schema.kinds.iter().map(|kind| kind.kind).collect();
        assert_eq!(kinds, EventKind::ALL);
        assert!(schema.kinds[0].fields.contains(&"statementClassName"));
    }

    #[test]
    fn test_filtered_schema() {
        let schema = schema(Some(EventKind::Cancel));
        assert_eq!(schema.kinds.len(), 1);
        assert_eq!(schema.kinds[0].fields, ["connectionId", "statementId"]);
    }
}
