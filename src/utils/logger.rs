use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::config::ConfigV1;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};

/// Timestamp layout for console lines.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid logging.level '{0}'. Valid values: trace, debug, info, warn, error")]
    InvalidLevel(String),

    #[error("Invalid logging.format '{0}'. Valid values: json, console")]
    InvalidFormat(String),

    #[error("Failed to install the global subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the non-blocking file writer alive.
///
/// Must be held for the lifetime of the application so buffered lines are
/// flushed before shutdown.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Console,
}

impl LogFormat {
    fn parse(format: &str) -> Result<Self, LoggingError> {
        match format.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "console" => Ok(LogFormat::Console),
            _ => Err(LoggingError::InvalidFormat(format.to_string())),
        }
    }
}

#[derive(Default)]
struct JsonFieldVisitor {
    fields: Map<String, Value>,
}

impl JsonFieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonFieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

/// One JSON object per line, laid out after the OpenTelemetry log data model.
#[derive(Clone)]
struct OtelJsonEventFormatter {
    service_name: String,
    service_version: String,
    deployment_environment: String,
}

impl OtelJsonEventFormatter {
    fn new(config: &ConfigV1) -> Self {
        OtelJsonEventFormatter {
            service_name: config.app_name.clone(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            deployment_environment: config.environment.clone(),
        }
    }

    fn severity_number(level: &Level) -> u64 {
        match *level {
            Level::TRACE => 1,
            Level::DEBUG => 5,
            Level::INFO => 9,
            Level::WARN => 13,
            Level::ERROR => 17,
        }
    }
}

impl<S, N> FormatEvent<S, N> for OtelJsonEventFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut attributes = visitor.fields;
        if let Some(v) = attributes.remove("endpoint") {
            attributes.insert("http.route".to_string(), v);
        }
        if let Some(v) = attributes.remove("method") {
            attributes.insert("http.request.method".to_string(), v);
        }
        if let Some(v) = attributes.remove("status") {
            attributes.insert("http.response.status_code".to_string(), v);
        }
        attributes.insert("code.target".to_string(), Value::from(metadata.target()));

        let body = attributes
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| metadata.name().to_string());

        let mut resource = Map::new();
        resource.insert(
            "service.name".to_string(),
            Value::from(self.service_name.clone()),
        );
        resource.insert(
            "service.version".to_string(),
            Value::from(self.service_version.clone()),
        );
        resource.insert(
            "deployment.environment".to_string(),
            Value::from(self.deployment_environment.clone()),
        );

        let mut root = Map::new();
        root.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        root.insert(
            "severity_text".to_string(),
            Value::from(metadata.level().as_str()),
        );
        root.insert(
            "severity_number".to_string(),
            Value::from(Self::severity_number(metadata.level())),
        );
        root.insert("body".to_string(), Value::from(body));
        root.insert("resource".to_string(), Value::Object(resource));
        root.insert("attributes".to_string(), Value::Object(attributes));

        let json = Value::Object(root);
        let serialized = serde_json::to_string(&json).map_err(|_| std::fmt::Error)?;
        writer.write_str(&serialized)?;
        writer.write_char('\n')?;
        Ok(())
    }
}

/// Parse a `logging.level` value.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

fn format_layer<S, W>(
    format: LogFormat,
    formatter: &OtelJsonEventFormatter,
    writer: W,
    ansi: bool,
) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .event_format(formatter.clone())
            .boxed(),
        LogFormat::Console => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
            .boxed(),
    }
}

/// Opens `<dir>/<file_name>` for appending, creating the directory if needed.
fn file_appender(dir: &Path, file_name: &str) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| e.to_string())
}

/// Install the global tracing subscriber.
///
/// Lines always go to stdout; when `logging.log_dir` is set they are also
/// appended to the log file through a non-blocking writer thread. A log
/// file that cannot be opened degrades to stdout only.
pub fn init_logging(config: &ConfigV1) -> Result<LogGuard, LoggingError> {
    let logging_config = &config.logging;
    let level_filter = parse_level(&logging_config.level)?;
    let format = LogFormat::parse(&logging_config.format)?;

    // RUST_LOG directives refine the configured default level.
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    let formatter = OtelJsonEventFormatter::new(config);

    let mut layers = Vec::with_capacity(2);
    layers.push(format_layer(format, &formatter, std::io::stdout, true));

    let mut file_guard = None;
    if let Some(log_dir) = &logging_config.log_dir {
        match file_appender(Path::new(log_dir), &logging_config.log_file_name) {
            Ok(appender) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                file_guard = Some(guard);
                layers.push(format_layer(format, &formatter, non_blocking, false));
            }
            Err(e) => {
                eprintln!(
                    "Failed to open log file in {}: {}, logging to stdout only",
                    log_dir, e
                );
            }
        }
    }

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(layers)
        .try_init()?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("capture lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(parse_level("INFO").expect("level"), LevelFilter::INFO);
        assert_eq!(parse_level(" debug ").expect("level"), LevelFilter::DEBUG);
        assert!(matches!(
            parse_level("verbose"),
            Err(LoggingError::InvalidLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!(LogFormat::parse("JSON").expect("format"), LogFormat::Json);
        assert_eq!(LogFormat::parse("console").expect("format"), LogFormat::Console);
        assert!(matches!(
            LogFormat::parse("jsno"),
            Err(LoggingError::InvalidFormat(format)) if format == "jsno"
        ));
    }

    #[test]
    fn init_logging_rejects_unknown_format_before_installing() {
        let mut config = ConfigV1::default();
        config.logging.format = "jsno".to_string();

        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::InvalidFormat(_))
        ));
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("srewatch-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn file_appender_creates_directory_and_appends() {
        let dir = scratch_dir("file-appender").join("logs");

        let mut first = file_appender(&dir, "app.log").expect("appender");
        first.write_all(b"first line\n").expect("write");
        first.flush().expect("flush");
        drop(first);

        let mut second = file_appender(&dir, "app.log").expect("appender");
        second.write_all(b"second line\n").expect("write");
        second.flush().expect("flush");
        drop(second);

        let contents = std::fs::read_to_string(dir.join("app.log")).expect("log file");
        assert_eq!(contents, "first line\nsecond line\n");

        let _ = std::fs::remove_dir_all(dir.parent().expect("scratch root"));
    }

    #[test]
    fn file_appender_fails_when_directory_cannot_be_created() {
        let root = scratch_dir("file-appender-blocked");
        std::fs::create_dir_all(&root).expect("scratch root");
        let blocker = root.join("not-a-dir");
        std::fs::write(&blocker, b"regular file").expect("blocker file");

        assert!(file_appender(&blocker.join("logs"), "app.log").is_err());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn json_lines_carry_request_fields_and_environment() {
        let config = ConfigV1 {
            environment: "staging".to_string(),
            ..ConfigV1::default()
        };
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(move || writer.clone())
                .event_format(OtelJsonEventFormatter::new(&config)),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(
                endpoint = "/",
                method = "GET",
                status = 200u16,
                latency = "0.004",
                environment = "staging",
                "Request completed"
            );
        });

        let output = String::from_utf8(capture.0.lock().expect("capture lock").clone())
            .expect("utf-8 output");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);

        let line: Value = serde_json::from_str(lines[0]).expect("json line");
        assert_eq!(line["body"], "Request completed");
        assert_eq!(line["severity_text"], "INFO");
        assert_eq!(line["resource"]["service.name"], "sre-pleno-app");
        assert_eq!(line["resource"]["deployment.environment"], "staging");
        assert_eq!(line["attributes"]["http.route"], "/");
        assert_eq!(line["attributes"]["http.request.method"], "GET");
        assert_eq!(line["attributes"]["http.response.status_code"], 200);
        assert_eq!(line["attributes"]["latency"], "0.004");
    }
}
