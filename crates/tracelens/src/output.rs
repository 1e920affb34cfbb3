use chrono::SecondsFormat;
use owo_colors::OwoColorize;
use tracelens_core::model::log::LogRecord;
use tracelens_core::model::span::SpanRecord;
use tracelens_core::model::trace::{SpanNode, TraceTree, TraceView};
use tracelens_core::query::{StatusResponse, TimeSeriesValue};

pub fn print_traces_human(traces: &[TraceView]) {
    for trace in traces {
        println!(
            "trace={} start={} duration={}ms spans={}",
            trace.trace_id,
            trace
                .start_time
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            trace.duration_ns / 1_000_000,
            trace.span_count
        );
    }
    println!("-- {} traces --", traces.len());
}

pub fn print_trace_tree_human(tree: &TraceTree) {
    println!(
        "TRACE {} duration={}ms spans={}",
        tree.trace_id,
        tree.duration_ns / 1_000_000,
        tree.span_count
    );
    if tree.truncated_cycles > 0 {
        println!(
            "{}",
            format!("warning: {} parent cycle(s) truncated", tree.truncated_cycles).yellow()
        );
    }
    for root in &tree.roots {
        print_node(root, 0);
    }
}

fn print_node(node: &SpanNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let span = &node.span;
    println!(
        "{}{} {} ({}ms) [{:>5.1}%..{:>5.1}%] {}",
        indent,
        span.service_name.as_deref().unwrap_or("-").cyan(),
        span.operation_name,
        span.duration_ns / 1_000_000,
        node.start_offset,
        node.end_offset,
        status_label(span.status_code)
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

pub fn print_spans_human(spans: &[SpanRecord]) {
    for span in spans {
        println!(
            "{} {} {} trace={} span={} ({}ms) {}",
            span.start_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            span.service_name.as_deref().unwrap_or("-").cyan(),
            span.operation_name,
            span.trace_id,
            span.span_id,
            span.duration_ns / 1_000_000,
            status_label(span.status_code)
        );
    }
    println!("-- {} spans --", spans.len());
}

pub fn print_logs_human(logs: &[LogRecord]) {
    for log in logs {
        let trace = log.trace_id.as_deref().unwrap_or("-");
        println!(
            "{} {} {} trace={} | {}",
            log.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            log.service_name.as_deref().unwrap_or("-").cyan(),
            severity_colored(log),
            trace,
            log.body.as_deref().unwrap_or("")
        );
    }
    println!("-- {} logs --", logs.len());
}

pub fn print_attribute_keys_human(keys: &[String]) {
    for key in keys {
        println!("{key}");
    }
    println!("-- {} attribute keys --", keys.len());
}

pub fn print_series_human(series: &[TimeSeriesValue]) {
    for point in series {
        match &point.group {
            Some(group) => println!(
                "{} group={} value={}",
                point.end_time.to_rfc3339_opts(SecondsFormat::Millis, true),
                group,
                point.value
            ),
            None => println!(
                "{} value={}",
                point.end_time.to_rfc3339_opts(SecondsFormat::Millis, true),
                point.value
            ),
        }
    }
    println!("-- {} points --", series.len());
}

pub fn print_status_human(status: &StatusResponse) {
    println!(
        "spans={} logs={} traces={}",
        status.spans_count, status.logs_count, status.traces_count
    );
    if let Some(oldest) = status.oldest_span_start {
        println!(
            "oldest={}",
            oldest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
    if let Some(newest) = status.newest_span_start {
        println!(
            "newest={}",
            newest.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
}

fn status_label(code: i32) -> String {
    match code {
        1 => "OK".green().to_string(),
        2 => "ERROR".red().to_string(),
        _ => "UNSET".bright_black().to_string(),
    }
}

fn severity_colored(log: &LogRecord) -> String {
    let label = log.severity_label();
    match log.severity_number {
        17.. => label.red().to_string(),
        13..=16 => label.yellow().to_string(),
        9..=12 => label.green().to_string(),
        _ => label.bright_black().to_string(),
    }
}
