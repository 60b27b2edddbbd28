//! Replay command - Run a scenario through an instrumented statement.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use stmtscope::prelude::*;
use stmtscope_event::EventPayload;

use crate::OutputFormat;
use crate::config::CliConfig;
use crate::scenario::{Scenario, Step};

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Path to the scenario file
    #[arg(required = true)]
    pub scenario: PathBuf,

    /// Also append events as JSON lines to this file
    #[arg(long)]
    pub jsonl: Option<PathBuf>,

    /// Truncate recorded SQL to this many characters
    #[arg(long)]
    pub max_sql_length: Option<usize>,

    /// Maximum number of events to keep for the report
    #[arg(long, default_value = "10000")]
    pub max_events: usize,

    /// Stop at the first failing step and exit with an error
    #[arg(long)]
    pub fail_fast: bool,
}

/// Result of one step.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepOutcome {
    index: usize,
    op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Everything a replay produced.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayReport {
    scenario: String,
    connection_id: ResourceId,
    statement_id: ResourceId,
    steps: Vec<StepOutcome>,
    events: Vec<RecordedEvent>,
}

impl ReplayReport {
    fn failures(&self) -> usize {
        self.steps.iter().filter(|step| step.error.is_some()).count()
    }
}

/// Execute the replay command.
pub fn execute(
    args: ReplayArgs,
    config: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;

    let mut proxy_config = match config {
        Some(path) => CliConfig::load(path)?.proxy.apply(ProxyConfig::default()),
        None => ProxyConfig::default(),
    };
    if let Some(max) = args.max_sql_length {
        proxy_config = proxy_config.with_max_sql_length(max);
    }

    let collected = Arc::new(CollectingRecorder::new(args.max_events));
    let mut builder = Instrumentation::builder()
        .with_recorder(collected.clone())
        .with_config(proxy_config);
    if let Some(path) = &args.jsonl {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        builder = builder.with_recorder(Arc::new(JsonLinesRecorder::new(BufWriter::new(file))));
    }
    let instrumentation = builder.build().context("Invalid proxy configuration")?;

    let name = scenario
        .name
        .clone()
        .unwrap_or_else(|| args.scenario.display().to_string());
    if !quiet {
        tracing::info!(scenario = %name, steps = scenario.steps.len(), "Replaying scenario");
    }

    let report = replay(&scenario, name, &instrumentation, &collected, args.fail_fast)?;

    match format {
        OutputFormat::Human => print_human(&report, quiet),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&report)?),
    }

    if args.fail_fast && report.failures() > 0 {
        anyhow::bail!("Step {} failed", report.steps.len());
    }
    Ok(())
}

fn replay(
    scenario: &Scenario,
    name: String,
    instrumentation: &Instrumentation,
    collected: &CollectingRecorder,
    fail_fast: bool,
) -> Result<ReplayReport> {
    let connection = scenario.build_connection();
    let connected = instrumentation
        .connect(&scenario.connect_info(), || Ok(connection))
        .context("Failed to open scripted connection")?;

    let delegate = scenario.build_statement(Arc::clone(&connected.connection));
    let mut statement = instrumentation.wrap_on(delegate, connected.id);

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let outcome = run_step(&mut statement, step);
        tracing::debug!(index = index, op = step.op(), ok = outcome.is_ok(), "Step finished");

        let failed = outcome.is_err();
        let (result, error) = match outcome {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error.to_string())),
        };
        steps.push(StepOutcome {
            index: index + 1,
            op: step.op(),
            sql: step.sql().map(String::from),
            result,
            error,
        });
        if failed && fail_fast {
            break;
        }
    }

    Ok(ReplayReport {
        scenario: name,
        connection_id: connected.id,
        statement_id: statement.id(),
        steps,
        events: collected.events(),
    })
}

fn run_step<S: Statement>(statement: &mut StatementProxy<S>, step: &Step) -> SqlResult<String> {
    match step {
        Step::Query { sql } => {
            let mut rows = statement.execute_query(sql)?;
            Ok(format!("{} rows", drain(&mut *rows)?))
        }
        Step::Update { sql } => Ok(format!("{} updated", statement.execute_update(sql)?)),
        Step::Execute { sql } => Ok(if statement.execute(sql)? {
            "result set".to_string()
        } else {
            format!("{} updated", statement.get_update_count()?)
        }),
        Step::AddBatch { sql } => {
            statement.add_batch(sql)?;
            Ok(format!("{} queued", statement.batch().len()))
        }
        Step::ClearBatch => {
            statement.clear_batch()?;
            Ok("cleared".to_string())
        }
        Step::ExecuteBatch => Ok(format!("counts {:?}", statement.execute_batch()?)),
        Step::Cancel => {
            statement.cancel()?;
            Ok("cancelled".to_string())
        }
        Step::GeneratedKeys => {
            let mut keys = statement.get_generated_keys()?;
            Ok(format!("{} keys", drain(&mut *keys)?))
        }
        Step::ResultSet => match statement.get_result_set()? {
            Some(mut rows) => Ok(format!("{} rows", drain(&mut *rows)?)),
            None => Ok("no result set".to_string()),
        },
        Step::Close => {
            statement.close()?;
            Ok("closed".to_string())
        }
    }
}

/// Read a cursor to the end and close it, returning the row count.
fn drain(rows: &mut dyn ResultSet) -> SqlResult<usize> {
    let mut count = 0;
    while rows.next()? {
        count += 1;
    }
    rows.close()?;
    Ok(count)
}

fn print_human(report: &ReplayReport, quiet: bool) {
    if !quiet {
        println!("Scenario: {}", report.scenario);
        println!(
            "Connection #{}, statement #{}",
            report.connection_id, report.statement_id
        );
        println!();
    }

    println!("Steps ({}):", report.steps.len());
    for step in &report.steps {
        let sql = step.sql.as_deref().map(|sql| format!(" {}", sql)).unwrap_or_default();
        match (&step.result, &step.error) {
            (_, Some(error)) => println!("  {}. {}{} -> error: {}", step.index, step.op, sql, error),
            (Some(result), None) => println!("  {}. {}{} -> {}", step.index, step.op, sql, result),
            (None, None) => println!("  {}. {}{}", step.index, step.op, sql),
        }
    }
    println!();

    println!("Events ({}):", report.events.len());
    for event in &report.events {
        println!("  {}", describe_event(event));
    }

    if !quiet && report.failures() > 0 {
        println!();
        println!("{} of {} steps failed", report.failures(), report.steps.len());
    }
}

fn describe_event(event: &RecordedEvent) -> String {
    let duration = format!("{:?}", event.duration);
    match &event.payload {
        EventPayload::Statement(record) => format!(
            "statement  #{} conn={} {:>10} closed={} poolable={} autoCommit={} sql={:?}",
            record.statement_id,
            record
                .connection_id
                .map(|id| format!("#{}", id))
                .unwrap_or_else(|| "-".to_string()),
            duration,
            record.closed,
            record.poolable,
            record.auto_commit,
            record.sql
        ),
        EventPayload::Connection(record) => format!(
            "connection #{} {:>10} url={} user={}",
            record.connection_id,
            duration,
            record.url,
            record.user_name.as_deref().unwrap_or("-")
        ),
        EventPayload::Cancel(record) => format!(
            "cancel     #{} conn={} {:>10}",
            record.statement_id,
            record
                .connection_id
                .map(|id| format!("#{}", id))
                .unwrap_or_else(|| "-".to_string()),
            duration
        ),
    }
}
