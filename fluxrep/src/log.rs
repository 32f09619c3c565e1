/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io::{self, IsTerminal, Write};

use chrono::Local;
use slog::{Drain, KV, Key, Level, OwnedKVList, Record, Serializer, slog_o};
use slog_scope::GlobalLoggerGuard;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn setup(verbose_level: u8) -> Result<GlobalLoggerGuard, log::SetLoggerError> {
    let drain = StdLogDrain::new(true);
    let logger = slog::Logger::root(drain.fuse(), slog_o!());

    let scope_guard = slog_scope::set_global_logger(logger);

    let log_level = match verbose_level {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    slog_stdlog::init_with_level(log_level)?;
    Ok(scope_guard)
}

struct StdLogValue {
    level: Level,
    message: String,
    kv_pairs: Vec<(String, String)>,
    location: Option<String>,
}

impl StdLogValue {
    fn message_str(&self) -> &str {
        if self.message.is_empty() {
            "()"
        } else {
            &self.message
        }
    }
}

#[derive(Default)]
struct KvCollector(Vec<(String, String)>);

impl Serializer for KvCollector {
    fn emit_arguments(&mut self, key: Key, val: &fmt::Arguments) -> slog::Result {
        self.0.push((key.to_string(), val.to_string()));
        Ok(())
    }
}

/// Writes every record to stderr, coloured when stderr is a terminal.
struct StdLogDrain {
    append_code_position: bool,
    console: bool,
}

impl StdLogDrain {
    fn new(append_code_position: bool) -> Self {
        StdLogDrain {
            append_code_position,
            console: io::stderr().is_terminal(),
        }
    }
}

impl Drain for StdLogDrain {
    type Ok = ();
    type Err = slog::Never;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), slog::Never> {
        let mut kv = KvCollector::default();
        let _ = logger_values.serialize(record, &mut kv);
        let _ = record.kv().serialize(record, &mut kv);

        let value = StdLogValue {
            level: record.level(),
            message: record.msg().to_string(),
            kv_pairs: kv.0,
            location: self
                .append_code_position
                .then(|| format!("{}:{}", record.file(), record.line())),
        };

        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        let _ = if self.console {
            write_console(&mut buf, &value)
        } else {
            write_plain(&mut buf, &value)
        };

        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(&buf);
        let _ = stderr.flush();
        Ok(())
    }
}

fn write_time<IO: Write>(io: &mut IO) -> io::Result<()> {
    write!(io, "{}", Local::now().format(TIME_FORMAT))
}

fn write_plain<IO: Write>(io: &mut IO, v: &StdLogValue) -> io::Result<()> {
    write_time(io)?;
    write!(io, " {}", v.level)?;
    for (k, v) in &v.kv_pairs {
        write!(io, " {k}: {v},")?;
    }
    write!(io, " {}", v.message_str())?;
    if let Some(location) = &v.location {
        write!(io, " <{location}>")?;
    }
    writeln!(io)
}

fn write_console<IO: Write>(io: &mut IO, v: &StdLogValue) -> io::Result<()> {
    use anstyle::{AnsiColor, Color, Style};

    const COLOR_MAGENTA: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Magenta)));
    const COLOR_RED: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
    const COLOR_YELLOW: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
    const COLOR_GREEN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
    const COLOR_CYAN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan)));
    const COLOR_BLUE: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Blue)));
    const STYLE_BOLD: Style = Style::new().bold();
    const STYLE_ITALIC: Style = Style::new().italic();

    let bold_s = STYLE_BOLD.render();
    let bold_e = STYLE_BOLD.render_reset();

    write_time(io)?;
    let level_color = match v.level {
        Level::Critical => COLOR_MAGENTA,
        Level::Error => COLOR_RED,
        Level::Warning => COLOR_YELLOW,
        Level::Info => COLOR_GREEN,
        Level::Debug => COLOR_CYAN,
        Level::Trace => COLOR_BLUE,
    };
    write!(
        io,
        " {}{}{}",
        level_color.render(),
        v.level,
        level_color.render_reset(),
    )?;

    for (k, v) in &v.kv_pairs {
        write!(io, " {bold_s}{k}{bold_e}={v},")?;
    }

    write!(io, " {bold_s}{}{bold_e}", v.message_str())?;

    if let Some(location) = &v.location {
        write!(
            io,
            " <{}{location}{}>",
            STYLE_ITALIC.render(),
            STYLE_ITALIC.render_reset()
        )?;
    }
    writeln!(io)
}
