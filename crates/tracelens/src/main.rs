mod client;
mod output;

use std::io::IsTerminal;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tracelens_core::config::Config;
use tracelens_core::filter::Filter;
use tracelens_core::model::Attribute;
use tracelens_core::query::{
    Aggregate, AggregateSource, AggregateType, QuerySpec, TimeBin, TraceSearchRequest,
};
use tracelens_core::time::BinUnit;
use tracelens_store::Store;

use crate::client::QueryClient;
use crate::output::{
    print_attribute_keys_human, print_logs_human, print_series_human, print_spans_human,
    print_status_human, print_trace_tree_human, print_traces_human,
};

#[derive(Parser, Debug)]
#[command(name = "tracelens")]
#[command(about = "Local telemetry store with a trace/log/time-series query API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    /// Address of a running server, e.g. 127.0.0.1:8080 or a full URL.
    #[arg(long, global = true)]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the store and query facade")]
    Run {
        #[arg(long)]
        http_addr: Option<String>,
    },
    #[command(about = "Search traces")]
    Traces {
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        operation: Option<String>,
        #[arg(long)]
        status_code: Option<i32>,
        #[arg(long)]
        min_duration_ns: Option<i64>,
        #[arg(long)]
        max_duration_ns: Option<i64>,
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    #[command(about = "Inspect one trace as a waterfall")]
    Trace { trace_id: String },
    #[command(about = "List spans, most recent first")]
    Spans,
    #[command(about = "List logs, most recent first")]
    Logs,
    #[command(about = "List distinct span attribute keys")]
    Attrs,
    #[command(about = "Run a time-bucketed aggregation over spans")]
    Query {
        /// count, sum, avg, min, or max.
        #[arg(long, default_value = "count")]
        agg: String,
        /// Column or attribute the aggregate reads (required unless count).
        #[arg(long)]
        column: Option<String>,
        /// Where the aggregate column lives: column or attribute.
        #[arg(long, default_value = "column")]
        source: String,
        #[arg(long)]
        group: Option<String>,
        /// second, minute, hour, or day.
        #[arg(long, default_value = "minute")]
        bin: String,
        #[arg(long, default_value_t = 1)]
        bin_value: u32,
        #[arg(long = "filter", value_name = "COLUMN=VALUE")]
        filters: Vec<String>,
    },
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Run { http_addr } => run_server(http_addr).await,
        Commands::Traces {
            service,
            operation,
            status_code,
            min_duration_ns,
            max_duration_ns,
            attrs,
            limit,
            offset,
        } => {
            let client = QueryClient::connect(cli.addr);
            let req = TraceSearchRequest {
                service_name: service,
                operation_name: operation,
                min_duration_ns,
                max_duration_ns,
                status_code,
                span_attributes: attrs
                    .iter()
                    .map(|a| parse_attr(a))
                    .collect::<anyhow::Result<Vec<_>>>()?,
                offset: Some(offset),
                limit: Some(limit),
            };
            let traces = client.traces(&req).await?;
            if cli.json {
                print_json(&traces)
            } else {
                print_traces_human(&traces);
                Ok(())
            }
        }
        Commands::Trace { trace_id } => {
            let client = QueryClient::connect(cli.addr);
            let tree = client.trace_tree(&trace_id).await?;
            if cli.json {
                print_json(&tree)
            } else {
                print_trace_tree_human(&tree);
                Ok(())
            }
        }
        Commands::Spans => {
            let client = QueryClient::connect(cli.addr);
            let spans = client.spans().await?;
            if cli.json {
                print_json(&spans)
            } else {
                print_spans_human(&spans);
                Ok(())
            }
        }
        Commands::Logs => {
            let client = QueryClient::connect(cli.addr);
            let logs = client.logs().await?;
            if cli.json {
                print_json(&logs)
            } else {
                print_logs_human(&logs);
                Ok(())
            }
        }
        Commands::Attrs => {
            let client = QueryClient::connect(cli.addr);
            let keys = client.span_attributes().await?;
            if cli.json {
                print_json(&keys)
            } else {
                print_attribute_keys_human(&keys);
                Ok(())
            }
        }
        Commands::Query {
            agg,
            column,
            source,
            group,
            bin,
            bin_value,
            filters,
        } => {
            let client = QueryClient::connect(cli.addr);
            let spec = QuerySpec {
                aggregate: Aggregate {
                    agg_type: parse_aggregate(&agg, column.as_deref())?,
                    source: parse_source(&source)?,
                },
                filters: filters
                    .iter()
                    .map(|f| parse_filter(f))
                    .collect::<anyhow::Result<Vec<_>>>()?,
                group,
                time_bin: Some(TimeBin {
                    bin: parse_bin(&bin)?,
                    value: bin_value,
                }),
            };
            let series = client.query(&spec).await?;
            if cli.json {
                print_json(&series)
            } else {
                print_series_human(&series);
                Ok(())
            }
        }
        Commands::Status => {
            let client = QueryClient::connect(cli.addr);
            let status = client.status().await?;
            if cli.json {
                print_json(&status)
            } else {
                print_status_human(&status);
                Ok(())
            }
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .try_init();
}

async fn run_server(http_addr: Option<String>) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    if let Some(addr) = http_addr {
        cfg.http_addr = addr;
    }

    let store = Store::new();

    eprintln!("tracelens run");
    eprintln!("  http: {}", cfg.http_addr);
    eprintln!("  query timeout: {}s", cfg.query_timeout.as_secs());
    eprintln!("  retention ttl: {}s", cfg.retention_ttl.as_secs());

    let retention_task = tokio::spawn({
        let store = store.clone();
        let ttl = cfg.retention_ttl;
        let interval = cfg.retention_interval;
        async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh server
            // does not prune before anything arrived.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = store.run_retention(ttl) {
                    tracing::warn!(error = ?err, "retention pass failed");
                }
            }
        }
    });

    let server_task = tokio::spawn(async move { tracelens_server::serve(store, &cfg).await });

    tokio::select! {
        res = server_task => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    retention_task.abort();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_aggregate(agg: &str, column: Option<&str>) -> anyhow::Result<AggregateType> {
    if agg == "count" {
        return Ok(AggregateType::Count);
    }
    let column = column
        .ok_or_else(|| anyhow::anyhow!("--column is required for {agg} aggregates"))?
        .to_string();
    match agg {
        "sum" => Ok(AggregateType::Sum(column)),
        "avg" => Ok(AggregateType::Avg(column)),
        "min" => Ok(AggregateType::Min(column)),
        "max" => Ok(AggregateType::Max(column)),
        other => anyhow::bail!("unknown aggregate: {other}"),
    }
}

fn parse_source(source: &str) -> anyhow::Result<AggregateSource> {
    match source {
        "column" => Ok(AggregateSource::SpanColumn),
        "attribute" => Ok(AggregateSource::SpanAttribute),
        other => anyhow::bail!("unknown aggregate source: {other} (expected column or attribute)"),
    }
}

fn parse_bin(bin: &str) -> anyhow::Result<BinUnit> {
    match bin {
        "second" => Ok(BinUnit::Second),
        "minute" => Ok(BinUnit::Minute),
        "hour" => Ok(BinUnit::Hour),
        "day" => Ok(BinUnit::Day),
        other => anyhow::bail!("unknown bin unit: {other}"),
    }
}

fn parse_attr(input: &str) -> anyhow::Result<Attribute> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid attribute filter (expected KEY=VALUE): {input}"))?;
    if key.trim().is_empty() {
        anyhow::bail!("invalid attribute filter (empty key): {input}");
    }
    Ok(Attribute::new(key.trim(), value.trim()))
}

fn parse_filter(input: &str) -> anyhow::Result<Filter> {
    let attr = parse_attr(input)?;
    Ok(Filter::equals(attr.key, attr.value))
}
