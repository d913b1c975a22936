//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "barbot", version, about = "Bar robot carriage CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/barbot.toml")]
    pub config: PathBuf,

    /// Emit results, errors, and logs as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Override the inter-step delay for this invocation (microseconds);
    /// clamped to the configured minimum
    #[arg(long, value_name = "US")]
    pub step_delay_us: Option<u64>,

    /// Trust that the carriage currently sits at this step offset and
    /// skip homing (manual recovery)
    #[arg(long, value_name = "STEPS", allow_hyphen_values = true)]
    pub assume_at: Option<i32>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DirArg {
    Left,
    Right,
}

impl From<DirArg> for barbot_traits::Direction {
    fn from(d: DirArg) -> Self {
        match d {
            DirArg::Left => barbot_traits::Direction::Left,
            DirArg::Right => barbot_traits::Direction::Right,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SpeedArg {
    Slow,
    Medium,
    Fast,
}

impl From<SpeedArg> for barbot_config::SpeedPreset {
    fn from(s: SpeedArg) -> Self {
        match s {
            SpeedArg::Slow => barbot_config::SpeedPreset::Slow,
            SpeedArg::Medium => barbot_config::SpeedPreset::Medium,
            SpeedArg::Fast => barbot_config::SpeedPreset::Fast,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ToggleAction {
    Init,
    Enable,
    Disable,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Home the carriage against both end stops and discover the travel
    Calibrate,
    /// Move the carriage to a named position (homes first when needed)
    Move {
        /// Position name or numeric id
        position: String,
        /// Speed preset for this move
        #[arg(long, value_enum)]
        speed: Option<SpeedArg>,
    },
    /// Dispense a recipe: visit each station and dwell for its pour time
    Pour {
        /// Recipe name from the recipes file
        recipe: String,
        /// Speed preset for the whole run
        #[arg(long, value_enum)]
        speed: Option<SpeedArg>,
    },
    /// Step the carriage a few steps without a target position
    Jog {
        #[arg(value_enum)]
        dir: DirArg,
        /// Number of steps
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print the motor status
    Status,
    /// Enable the motor driver
    Enable,
    /// Disable the motor driver
    Disable,
    /// Override the tracked position without moving (manual recovery)
    SetPosition {
        #[arg(value_name = "STEPS", allow_hyphen_values = true)]
        steps: i32,
    },
    /// List the positions known to the store
    Positions,
    /// Control the pour-valve servo
    Servo {
        #[arg(value_enum)]
        action: ToggleAction,
    },
    /// Control the cup scale
    Scale {
        #[arg(value_enum)]
        action: ToggleAction,
    },
    /// Exercise the simulated stage end-to-end (no hardware touched)
    SelfCheck,
}
