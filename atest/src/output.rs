// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::fmt;
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// Events logged to this target are printed without a level prefix.
pub(crate) const NO_HEADING: &str = "atest::no_heading";

/// The environment variable holding the log filter.
pub(crate) const LOG_ENV: &str = "ATEST_LOG";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects},
    };

    /// Help output colors: green headings, cyan flags and values, red errors.
    pub(crate) const fn style() -> Styles {
        let heading = AnsiColor::Green.on_default().effects(Effects::BOLD);
        let literal = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
        Styles::styled()
            .header(heading)
            .usage(heading)
            .literal(literal)
            .placeholder(AnsiColor::Cyan.on_default())
            .error(AnsiColor::Red.on_default().effects(Effects::BOLD))
            .valid(literal)
            .invalid(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Verbose output: show debug messages
    #[arg(long, short, global = true, env = "ATEST_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN",
        env = "ATEST_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        color.init(verbose);

        OutputContext { color }
    }
}

#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();

        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }

        styles
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

/// Prints `<level>: <message>`, or just the message for [`NO_HEADING`] events.
struct LevelPrefixFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for LevelPrefixFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING {
            let (heading, style) = self.styles.heading(*metadata.level());
            write!(writer, "{}: ", heading.style(style))?;
        }

        let mut message = MessageWriter {
            writer: &mut writer,
            result: Ok(()),
        };
        event.record(&mut message);
        message.result?;
        writeln!(writer)
    }
}

/// Writes the `message` field of an event, ignoring structured fields.
struct MessageWriter<'w, 'a> {
    writer: &'a mut format::Writer<'w>,
    result: fmt::Result,
}

impl Visit for MessageWriter<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" && self.result.is_ok() {
            self.result = write!(self.writer, "{value:?}");
        }
    }
}

/// Parses the log filter. An empty string means `default`.
fn log_targets(level_str: &str, default: LevelFilter) -> Targets {
    if level_str.is_empty() {
        return Targets::new().with_default(default);
    }
    match level_str.parse() {
        Ok(targets) => targets,
        Err(error) => {
            eprintln!("ignoring invalid {LOG_ENV} value `{level_str}`: {error}");
            Targets::new().with_default(default)
        }
    }
}

impl Color {
    /// Installs the stderr logger. Later calls do nothing.
    pub(crate) fn init(self, verbose: bool) {
        let mut styles = LogStyles::default();
        if self.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }
        let default = if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        INIT_LOGGER.call_once(|| {
            let targets = log_targets(&std::env::var(LOG_ENV).unwrap_or_default(), default);
            let layer = tracing_subscriber::fmt::layer()
                .event_format(LevelPrefixFormatter { styles })
                .with_writer(std::io::stderr)
                .with_filter(targets);
            tracing_subscriber::registry().with(layer).init();
        });
    }

    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
}

impl LogStyles {
    fn heading(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warning),
            Level::INFO => ("info", self.info),
            Level::DEBUG => ("debug", self.debug),
            Level::TRACE => ("trace", self.trace),
        }
    }

    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().bold();
        self.debug = style().bold();
        self.trace = style().dimmed();
    }
}

#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
    pub(crate) warning_text: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.bold = style().bold();
        self.warning_text = style().yellow();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", LevelFilter::INFO, Level::DEBUG, false ; "default info")]
    #[test_case("", LevelFilter::DEBUG, Level::DEBUG, true ; "verbose")]
    #[test_case("trace", LevelFilter::INFO, Level::TRACE, true ; "from env")]
    #[test_case("atest=loud", LevelFilter::INFO, Level::INFO, true ; "invalid falls back")]
    fn targets(level_str: &str, default: LevelFilter, level: Level, enabled: bool) {
        let targets = log_targets(level_str, default);
        assert_eq!(targets.would_enable("atest_runner::translator", &level), enabled);
    }

    #[test]
    fn headings() {
        let styles = LogStyles::default();
        assert_eq!(styles.heading(Level::WARN).0, "warning");
        assert_eq!(styles.heading(Level::ERROR).0, "error");
    }

    #[test]
    fn colorize() {
        assert!(Color::Always.should_colorize(supports_color::Stream::Stderr));
        assert!(!Color::Never.should_colorize(supports_color::Stream::Stderr));
    }
}
