//! Styled terminal output for `openverse-ctl`.
//!
//! `anstream` strips the ANSI styles when stdout is piped or the terminal
//! has no color support.

mod styles;

use std::fmt::Display;
use std::io::Write;

use openverse_maintenance::StepStatus;

pub(crate) use styles::clap_styles;

use styles::{DIM, ERROR, HEADER, LABEL, SUCCESS, WARNING};

pub(crate) fn success(msg: impl Display) {
    let mut out = anstream::stdout().lock();
    writeln!(out, "{SUCCESS}✓{SUCCESS:#} {SUCCESS}{msg}{SUCCESS:#}").ok();
}

/// Print an error message to stderr.
pub(crate) fn error(msg: impl Display) {
    let mut out = anstream::stderr().lock();
    writeln!(out, "{ERROR}✗ {msg}{ERROR:#}").ok();
}

pub(crate) fn warning(msg: impl Display) {
    let mut out = anstream::stdout().lock();
    writeln!(out, "{WARNING}! {msg}{WARNING:#}").ok();
}

pub(crate) fn header(msg: impl Display) {
    let mut out = anstream::stdout().lock();
    writeln!(out, "{HEADER}{msg}{HEADER:#}").ok();
}

/// "  Label: value" with the label bolded.
pub(crate) fn label(name: impl Display, value: impl Display) {
    let mut out = anstream::stdout().lock();
    writeln!(out, "  {LABEL}{name}:{LABEL:#} {value}").ok();
}

pub(crate) fn dim(msg: impl Display) {
    let mut out = anstream::stdout().lock();
    writeln!(out, "{DIM}{msg}{DIM:#}").ok();
}

pub(crate) fn item(msg: impl Display) {
    let mut out = anstream::stdout().lock();
    writeln!(out, "  • {msg}").ok();
}

/// Step line with an icon colored by status.
pub(crate) fn step_status(status: StepStatus, msg: impl Display) {
    let mut out = anstream::stdout().lock();
    match status {
        StepStatus::Succeeded => writeln!(out, "  {SUCCESS}✓{SUCCESS:#} {msg}"),
        StepStatus::UpstreamFailed => writeln!(out, "  {WARNING}-{WARNING:#} {msg}"),
        StepStatus::Failed | StepStatus::TimedOut => writeln!(out, "  {ERROR}✗{ERROR:#} {msg}"),
    }
    .ok();
}

pub(crate) fn blank() {
    let mut out = anstream::stdout().lock();
    writeln!(out).ok();
}

/// Unstyled text, for machine-readable output.
pub(crate) fn plain(msg: impl Display) {
    let mut out = anstream::stdout().lock();
    writeln!(out, "{msg}").ok();
}
