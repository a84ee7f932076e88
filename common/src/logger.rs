use std::io::Write;

use log::{Level, LevelFilter};

const RESET: &str = "\x1b[0m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const WHITE: &str = "\x1b[37m";
const BLUE: &str = "\x1b[34m";
const BOLD: &str = "\x1b[1m";

/// Log target for "this finished well" lines.
pub const SUCCESS: &str = "success";
/// Log target for progress markers (next wallet, next swap).
pub const STEP: &str = "step";

/// Installs the colored stdout dispatcher. `level` is a bare level name
/// such as `info` or `debug`; unknown values fall back to `info`.
pub fn setup_logging(level: &str) -> Result<(), fern::InitError> {
    let level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            let (color, marker) = style(record.level(), record.target());
            out.finish(format_args!("{color}[{marker}] {message}{RESET}"))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("rustls", LevelFilter::Warn)
        .level_for("alloy_transport_http", LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

fn style(level: Level, target: &str) -> (&'static str, &'static str) {
    match (level, target) {
        (Level::Error, _) => (RED, "✗"),
        (Level::Warn, _) => (YELLOW, "⚠"),
        (Level::Info, SUCCESS) => (GREEN, "✅"),
        (Level::Info, STEP) => (WHITE, "➤"),
        (Level::Info, _) => (GREEN, "✓"),
        (Level::Debug | Level::Trace, _) => (WHITE, "·"),
    }
}

pub fn banner() {
    println!("{CYAN}{BOLD}");
    println!("---------------------------------------------");
    println!("            Faroswap Auto Bot  ");
    println!("---------------------------------------------{RESET}");
    println!();
}

/// Redraws the countdown in place.
pub fn countdown(message: &str) {
    let mut out = std::io::stdout().lock();
    // A broken stdout only loses the redraw.
    let _ = write!(out, "\r{BLUE}[⏰] {message}{RESET}");
    let _ = out.flush();
}

pub fn end_countdown() {
    println!();
}
