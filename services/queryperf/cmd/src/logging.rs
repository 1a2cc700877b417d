use std::fmt;
use std::io::IsTerminal;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// ANSI color codes for console output
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Column widths for alignment
const COMPONENT_WIDTH: usize = 18;
const LOG_LEVEL_WIDTH: usize = 7;

/// `[timestamp] [component] [level] message` formatter
pub struct PerfLogFormatter {
    service_name: String,
    color_enabled: bool,
}

/// Log at info level tagged with a component
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log at warn level tagged with a component
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log at error level tagged with a component
#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

impl PerfLogFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled: color_supported(),
        }
    }

    fn format_component(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(comp) => format!("{}-{}", self.service_name, comp),
            None => self.service_name.clone(),
        };

        if name.chars().count() > COMPONENT_WIDTH {
            let truncated: String = name.chars().take(COMPONENT_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = COMPONENT_WIDTH)
        }
    }

    fn format_log_level(&self, level: &tracing::Level) -> String {
        let level_str = match *level {
            tracing::Level::ERROR => "✗ ERROR",
            tracing::Level::WARN => "⚠ WARN",
            tracing::Level::INFO => "ℹ INFO",
            tracing::Level::DEBUG => "◦ DEBUG",
            tracing::Level::TRACE => "◦ TRACE",
        };

        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH)
    }

    fn color_for_level(&self, level: &tracing::Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            tracing::Level::ERROR => COLOR_BRIGHT_RED,
            tracing::Level::WARN => COLOR_BRIGHT_YELLOW,
            tracing::Level::INFO => COLOR_GREEN,
            tracing::Level::DEBUG | tracing::Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for PerfLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let component = self.format_component(visitor.component.as_deref());
        let formatted_level = self.format_log_level(level);

        let color = self.color_for_level(level);
        let (cyan, reset) = if self.color_enabled {
            (COLOR_CYAN, COLOR_RESET)
        } else {
            ("", "")
        };

        write!(
            writer,
            "{}[{}]{} [{}] [{}{}{}] ",
            cyan, timestamp, reset, component, color, formatted_level, reset
        )?;
        writeln!(writer, "{}", visitor.message)
    }
}

/// Pulls the message and component out of an event
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => {
                let comp = format!("{:?}", value);
                self.component = Some(comp.trim_matches('"').to_string());
            }
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

/// Colors only when stderr is a terminal that understands them
fn color_supported() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false) {
        return false;
    }
    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> PerfLogFormatter {
        PerfLogFormatter {
            service_name: name.to_string(),
            color_enabled: false,
        }
    }

    #[test]
    fn test_component_column() {
        let formatter = plain("queryperf");
        assert_eq!(formatter.format_component(None), format!("{:<18}", "queryperf"));
        assert_eq!(
            formatter.format_component(Some("config")),
            format!("{:<18}", "queryperf-config")
        );

        let long = formatter.format_component(Some("something-long"));
        assert_eq!(long.chars().count(), COMPONENT_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_no_color_codes_when_disabled() {
        let formatter = plain("queryperf");
        assert_eq!(formatter.color_for_level(&tracing::Level::ERROR), "");
        assert_eq!(formatter.format_log_level(&tracing::Level::WARN), "⚠ WARN ");
    }
}
