//! Compact event formatter (§A.1). Adapted from the teacher's
//! `CustomFormatter`: same timestamp/level/target shape, with the
//! RAM-usage and thread-id columns dropped since a one-shot CLI has no
//! operator watching a live process.

use core::fmt as core_fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{
        self, FmtContext,
        format::{FormatEvent, FormatFields},
    },
    registry::LookupSpan,
};

pub struct CustomFormatter {
    use_ansi: bool,
}

impl CustomFormatter {
    pub fn new(use_ansi: bool) -> Self {
        Self { use_ansi }
    }
}

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> core_fmt::Result {
        let reset = if self.use_ansi { "\x1b[0m" } else { "" };
        let dim = if self.use_ansi { "\x1b[2m" } else { "" };

        let format = time::macros::format_description!("[hour]:[minute]:[second]");
        let now =
            time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
        let timestamp = now
            .format(&format)
            .unwrap_or_else(|_| "--:--:--".to_string());

        if self.use_ansi {
            write!(writer, "{dim}[{timestamp}]{reset} ")?;
        } else {
            write!(writer, "[{timestamp}] ")?;
        }

        let metadata = event.metadata();
        let level = metadata.level();
        let level_str = format!("{:<5}", level.to_string());

        if self.use_ansi {
            let level_color = match *level {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                tracing::Level::DEBUG => "\x1b[34m",
                tracing::Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{level_color}{level_str}{reset} ")?;
        } else {
            write!(writer, "{level_str} ")?;
        }

        write!(writer, "{dim}{}:{reset} ", metadata.target())?;

        ctx.format_fields(writer.by_ref(), event)?;
        write!(writer, "{reset}")?;
        writeln!(writer)
    }
}
