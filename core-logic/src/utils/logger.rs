use anyhow::{Context, Result};
use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, FormattedFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Installs the global subscriber.
///
/// The console shows `task_result` events at INFO plus everything at or
/// above `level`. The file layer records the same threshold without colors.
/// When `log_file` is `None` the file layer rolls hourly under `logs/`.
///
/// The returned guard flushes the file writer on drop and must be kept alive.
pub fn setup_logger(level: &str, log_file: Option<&Path>) -> Result<WorkerGuard> {
    let level = parse_level(level);

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_appender::non_blocking(BufWriter::new(file))
        }
        None => {
            std::fs::create_dir_all("logs").ok();
            tracing_appender::non_blocking(tracing_appender::rolling::hourly("logs", "app"))
        }
    };

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target("task_result", Level::INFO)
        .with_default(level);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target("task_result", Level::INFO)
        .with_default(level);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to set global subscriber")?;

    Ok(guard)
}

/// Unknown names fall back to INFO.
pub fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(Level::INFO)
}

// --- Formatters ---

/// The event message plus its other fields as `key=value` pairs.
#[derive(Default)]
struct EventFields {
    message: String,
    fields: Vec<String>,
}

impl EventFields {
    fn of(event: &Event<'_>) -> Self {
        let mut visitor = Self::default();
        event.record(&mut visitor);
        visitor
    }

    fn suffix(&self) -> String {
        if self.fields.is_empty() {
            String::new()
        } else {
            format!(" {}", self.fields.join(" "))
        }
    }
}

impl tracing::field::Visit for EventFields {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

fn level_style(level: &Level) -> Style {
    match *level {
        Level::ERROR => Style::new().fg(Color::LightRed).bold(),
        Level::WARN => Style::new().fg(Color::Yellow),
        Level::INFO => Style::new().fg(Color::LightBlue),
        _ => Style::new().fg(Color::DarkGray),
    }
}

/// `name{fields}` of the innermost span, e.g. `worker{worker_id="003"}`.
fn current_span<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let span = ctx.lookup_current()?;
    let extensions = span.extensions();
    let label = match extensions.get::<FormattedFields<N>>() {
        Some(fields) if !fields.is_empty() => format!("{}{{{}}}", span.name(), fields),
        _ => span.name().to_string(),
    };
    Some(label)
}

/// Colored console lines. Result markers are highlighted.
pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let fields = EventFields::of(event);
        let level = event.metadata().level();

        write!(
            writer,
            "{} {} ",
            Style::new().dimmed().paint(Local::now().format("%H:%M:%S").to_string()),
            level_style(level).paint(format!("{:<5}", level))
        )?;
        if let Some(span) = current_span(ctx) {
            write!(writer, "{} ", Style::new().dimmed().paint(span))?;
        }

        let msg = if fields.message.contains("SUCCESS") {
            let green = Style::new().fg(Color::LightGreen).bold();
            fields.message.replace("SUCCESS", &green.paint("SUCCESS").to_string())
        } else if fields.message.contains("FAILED") || fields.message.contains("SKIPPED") {
            let red = Style::new().fg(Color::LightRed).bold();
            fields
                .message
                .replace("FAILED", &red.paint("FAILED").to_string())
                .replace("SKIPPED", &Color::Yellow.paint("SKIPPED").to_string())
        } else {
            fields.message.clone()
        };

        writeln!(
            writer,
            "{}{}",
            msg,
            Style::new().dimmed().paint(fields.suffix())
        )
    }
}

/// Plain lines with millisecond timestamps for the log file.
pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let fields = EventFields::of(event);
        write!(
            writer,
            "{} [{}] ",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            event.metadata().level()
        )?;
        if let Some(span) = current_span(ctx) {
            write!(writer, "{} ", span)?;
        }
        writeln!(writer, "{}{}", fields.message, fields.suffix())
    }
}
