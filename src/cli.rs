use std::time::Duration;

use clap::{Parser, Subcommand};
use dragout::ServiceConfig;

#[derive(Parser)]
#[command(name = "dragout", about = "Hand a file to the native OS drag channel")]
pub struct Cli {
    /// X11 display to connect to (defaults to $DISPLAY)
    #[arg(long, global = true)]
    pub display: Option<String>,

    /// Milliseconds to let a forced focus change settle before the drag
    /// session starts (Windows)
    #[arg(long, global = true, default_value_t = 100)]
    pub settle_ms: u64,

    /// Allow dropping onto this process's own windows (Windows)
    #[arg(long, global = true)]
    pub allow_self_drop: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            display: self.display.clone(),
            settle_delay: Duration::from_millis(self.settle_ms),
            reject_self_drop: !self.allow_self_drop,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Put one file into the drag channel and keep it there
    Drag {
        /// File to drag; relative paths resolve against the current directory
        path: String,

        /// Seconds to keep serving the drag channel before shutting down
        #[arg(long, default_value_t = 30)]
        hold_secs: u64,
    },

    /// Read web events as JSON lines on stdin, e.g.
    /// {"name":"start-drag","data":["/tmp/report.pdf"]}
    Serve,

    /// Report whether the drag mechanism is available
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_service_config() {
        let cli = Cli::parse_from(["dragout", "check"]);
        let config = cli.service_config();
        assert_eq!(config.display, None);
        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert!(config.reject_self_drop);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "dragout",
            "drag",
            "/tmp/report.pdf",
            "--display",
            ":1",
            "--allow-self-drop",
            "--hold-secs",
            "5",
        ]);
        let config = cli.service_config();
        assert_eq!(config.display.as_deref(), Some(":1"));
        assert!(!config.reject_self_drop);
        assert!(matches!(
            cli.command,
            Command::Drag { ref path, hold_secs: 5 } if path == "/tmp/report.pdf"
        ));
    }
}
