use std::io::{self, Stdout, Write};

use colored::{Color, ColoredString, Colorize};
use isotone_types::{format_uptime, Phase, ServiceStatus, StateChange, StatusReport};

pub struct Logger<W: Write = Stdout> {
    output: W,
}

impl<W: Write> Logger<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    fn phase_color(phase: Phase) -> Option<Color> {
        match phase {
            Phase::Running => Some(Color::Green),
            Phase::Starting => Some(Color::Yellow),
            Phase::Stopping => Some(Color::Blue),
            Phase::Restarting => Some(Color::Magenta),
            Phase::Error => Some(Color::Red),
            Phase::Stopped | Phase::NotInstalled | Phase::Unknown => None,
        }
    }

    fn phase_label(phase: Phase) -> ColoredString {
        let label = format!("{:<12}", phase.as_str());
        match Self::phase_color(phase) {
            Some(color) => label.color(color),
            None => label.dimmed(),
        }
    }

    fn service_line(status: &ServiceStatus) -> String {
        let ports = status
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut line = format!(
            "{:<8} {} {:<28} {:<12}",
            status.name,
            Self::phase_label(status.phase),
            status.display_name,
            ports
        );
        if let Some(uptime) = status.uptime_seconds {
            line.push_str(&format!(
                " up {}",
                format_uptime(std::time::Duration::from_secs(uptime))
            ));
        }
        if let Some(operation) = status.in_flight {
            line.push_str(&format!(" ({operation} in progress)"));
        }
        if let Some(error) = &status.last_error {
            line.push_str(&format!(" {}", error.as_str().red()));
        }
        line.trim_end().to_owned()
    }

    pub fn status(&mut self, report: &StatusReport) {
        for service in &report.services {
            let _ = writeln!(self.output, "{}", Self::service_line(service));
        }
        let _ = writeln!(self.output, "{}", report.aggregate.to_string().bold());
    }

    pub fn change(&mut self, change: &StateChange) {
        let prefix = format!("[{}]", change.service).bold();
        let _ = writeln!(
            self.output,
            "{prefix} {} -> {}",
            change.previous.phase.as_str().dimmed(),
            Self::phase_label(change.current.phase).to_string().trim_end()
        );
        if change.current.phase == Phase::Error {
            if let Some(error) = &change.current.last_error {
                let _ = writeln!(self.output, "{prefix} {}", error.as_str().red());
            }
        }
    }

    pub fn system(&mut self, message: &str) {
        let prefix = "[isotone]".color(Color::Cyan);
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }

    pub fn error(&mut self, message: &str) {
        let prefix = "[isotone]".color(Color::Red);
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }
}

impl Logger {
    pub fn default() -> Self {
        Self::new(io::stdout())
    }
}
