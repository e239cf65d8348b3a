use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[90m";

/// Formatter printing `[timestamp] [component] LEVEL span: message`
pub struct SocketLogFormatter {
    service_name: String,
    color_enabled: bool,
}

/// Log with a `component` field picked up by [`SocketLogFormatter`]
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

impl SocketLogFormatter {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            color_enabled: stderr_is_terminal(),
        }
    }

    fn source(&self, component: Option<&str>) -> String {
        match component {
            Some(component) => format!("{}/{}", self.service_name, component),
            None => self.service_name.clone(),
        }
    }

    fn level_color(&self, level: &Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }
        match *level {
            Level::ERROR => "\x1b[91m",
            Level::WARN => "\x1b[93m",
            Level::INFO => "\x1b[32m",
            Level::DEBUG | Level::TRACE => DIM,
        }
    }
}

impl<S, N> FormatEvent<S, N> for SocketLogFormatter
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
        let level = event.metadata().level();
        let mut fields = FieldVisitor::default();
        event.record(&mut fields);

        let (dim, color, reset) = if self.color_enabled {
            (DIM, self.level_color(level), RESET)
        } else {
            ("", "", "")
        };

        write!(
            writer,
            "{}[{}]{} [{}] {}{:<5}{} ",
            dim,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            reset,
            self.source(fields.component.as_deref()),
            color,
            level.as_str(),
            reset
        )?;

        // Session span names the peer so interleaved sessions stay readable
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}: ", span.name())?;
            }
        }

        writeln!(writer, "{}", fields.message)
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
}

fn strip_quotes(value: String) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.to_string(),
        None => value,
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = strip_quotes(format!("{:?}", value)),
            "component" => self.component = Some(strip_quotes(format!("{:?}", value))),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            _ => {}
        }
    }
}

/// Logs go to stderr; color only when that is a real terminal
fn stderr_is_terminal() -> bool {
    std::env::var("TERM").map_or(true, |term| term != "dumb") && std::io::stderr().is_terminal()
}
