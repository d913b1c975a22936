#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the bar robot.
//!
//! `Config` and sub-structs are deserialized from TOML and validated.
//! Pin numbers, step timing, and data-file paths all come from here; the
//! motion crates never hardcode them.
use serde::Deserialize;

/// BCM pin assignments for the stepper stage.
#[derive(Debug, Deserialize)]
pub struct Pins {
    pub step: u8,
    pub dir: u8,
    /// Optional enable line; stages without one leave it unset.
    pub enable: Option<u8>,
    /// End-stop switch at the zero (left) end of the track, wired
    /// active-low with the internal pull-up.
    pub end_stop_left: u8,
    /// End-stop switch at the far (right) end of the track.
    pub end_stop_right: u8,
}

/// Step timing and travel limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorCfg {
    /// Default delay between step pulses (microseconds). Larger = slower.
    pub step_delay_us: u64,
    /// Floor for the inter-step delay. Requests below this are clamped;
    /// faster pulse trains risk silently skipped steps.
    pub min_step_delay_us: u64,
    /// Step pin high time per pulse (microseconds).
    pub pulse_width_us: u64,
    /// Upper bound on steps per calibration sweep. A sweep that runs this
    /// long without hitting an end stop is treated as a hardware fault.
    pub max_travel_steps: u32,
    /// Named speed presets (inter-step delay in microseconds).
    pub slow_delay_us: u64,
    pub medium_delay_us: u64,
    pub fast_delay_us: u64,
}

impl Default for MotorCfg {
    fn default() -> Self {
        Self {
            step_delay_us: 1_500,
            min_step_delay_us: 400,
            pulse_width_us: 20,
            max_travel_steps: 4_000,
            slow_delay_us: 3_000,
            medium_delay_us: 1_500,
            fast_delay_us: 700,
        }
    }
}

/// Paths to the JSON data files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreCfg {
    pub positions: String,
    pub recipes: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            positions: "etc/positions.json".to_string(),
            recipes: "etc/recipes.json".to_string(),
        }
    }
}

/// Geometry of the simulated track used when built without hardware.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    /// Steps between the two simulated end stops.
    pub track_steps: i32,
    /// Carriage position at process start (uncalibrated).
    pub start_pos: i32,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            track_steps: 900,
            start_pos: 0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub motor: MotorCfg,
    #[serde(default)]
    pub store: StoreCfg,
    #[serde(default)]
    pub simulation: SimulationCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Cross-field validation beyond what serde can express.
    pub fn validate(&self) -> eyre::Result<()> {
        let p = &self.pins;
        let mut assigned = vec![p.step, p.dir, p.end_stop_left, p.end_stop_right];
        if let Some(en) = p.enable {
            assigned.push(en);
        }
        assigned.sort_unstable();
        for w in assigned.windows(2) {
            if w[0] == w[1] {
                eyre::bail!("pin {} assigned to more than one signal", w[0]);
            }
        }

        let m = &self.motor;
        if m.step_delay_us == 0 || m.pulse_width_us == 0 {
            eyre::bail!("motor delays must be > 0");
        }
        if m.min_step_delay_us == 0 {
            eyre::bail!("min_step_delay_us must be > 0");
        }
        if m.step_delay_us < m.min_step_delay_us {
            eyre::bail!(
                "step_delay_us ({}) is below min_step_delay_us ({})",
                m.step_delay_us,
                m.min_step_delay_us
            );
        }
        if m.max_travel_steps == 0 {
            eyre::bail!("max_travel_steps must be > 0");
        }
        for (name, d) in [
            ("slow_delay_us", m.slow_delay_us),
            ("medium_delay_us", m.medium_delay_us),
            ("fast_delay_us", m.fast_delay_us),
        ] {
            if d < m.min_step_delay_us {
                eyre::bail!("{name} ({d}) is below min_step_delay_us ({})", m.min_step_delay_us);
            }
        }

        if self.simulation.track_steps <= 0 {
            eyre::bail!("simulation.track_steps must be > 0");
        }
        let sim = self.simulation;
        if sim.start_pos < 0 || sim.start_pos > sim.track_steps {
            eyre::bail!("simulation.start_pos must be within the simulated track");
        }
        Ok(())
    }
}

/// Named inter-step delay presets, resolvable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Slow,
    Medium,
    Fast,
}

impl MotorCfg {
    /// Inter-step delay for a preset, in microseconds.
    pub fn preset_delay_us(&self, preset: SpeedPreset) -> u64 {
        match preset {
            SpeedPreset::Slow => self.slow_delay_us,
            SpeedPreset::Medium => self.medium_delay_us,
            SpeedPreset::Fast => self.fast_delay_us,
        }
    }
}
