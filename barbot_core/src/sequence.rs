//! Recipe definitions and their validated, executable form.
//!
//! A raw recipe references positions by identifier; `Sequence::from_definition`
//! resolves every reference against the position store *before* the first
//! pulse is issued. A definition with any bad step is rejected wholesale so
//! a pour never starts that cannot finish.

use crate::error::{MotionError, Result};
use crate::store::{Position, PositionStore};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// One step of a recipe as written in the recipes file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    /// Position identifier (name or numeric id).
    pub position: String,
    /// Pour/dwell time at the position, in seconds. Zero means no dwell.
    #[serde(default)]
    pub dwell_s: f64,
}

/// A named recipe as written in the recipes file.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeDef {
    pub name: String,
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RecipesFile {
    recipes: Vec<RecipeDef>,
}

/// All recipes known to the robot, keyed by name.
#[derive(Debug, Default)]
pub struct RecipeBook {
    recipes: Vec<RecipeDef>,
}

impl RecipeBook {
    pub fn from_json(s: &str) -> Result<Self> {
        let file: RecipesFile =
            serde_json::from_str(s).map_err(|e| MotionError::StoreUnavailable(e.to_string()))?;
        Ok(Self {
            recipes: file.recipes,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            MotionError::StoreUnavailable(format!("{}: {e}", path.display()))
        })?;
        let book = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), count = book.recipes.len(), "recipes loaded");
        Ok(book)
    }

    pub fn recipe(&self, name: &str) -> Result<&RecipeDef> {
        self.recipes
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| MotionError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.iter().map(|r| r.name.as_str())
    }
}

/// One resolved step: where to go and how long to stay.
#[derive(Debug, Clone)]
pub struct SequenceStep {
    pub position: Position,
    pub dwell: Duration,
}

/// A validated, immutable dispensing plan. Iteration order is the
/// physical pour order.
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    steps: Vec<SequenceStep>,
}

/// Longest plausible single pour. Anything above this is a data-entry
/// mistake, not a recipe.
const MAX_DWELL_SECS: f64 = 3_600.0;

impl Sequence {
    /// Resolve and validate a raw definition against the current store.
    pub fn from_definition(name: &str, raw: &[RawStep], store: &PositionStore) -> Result<Self> {
        let mut steps = Vec::with_capacity(raw.len());
        for (i, step) in raw.iter().enumerate() {
            let ordinal = i + 1;
            if !step.dwell_s.is_finite() || step.dwell_s < 0.0 {
                return Err(MotionError::InvalidSequence {
                    sequence: name.to_string(),
                    reason: format!("step {ordinal}: dwell must be a non-negative number"),
                });
            }
            if step.dwell_s > MAX_DWELL_SECS {
                return Err(MotionError::InvalidSequence {
                    sequence: name.to_string(),
                    reason: format!(
                        "step {ordinal}: dwell {}s exceeds the {MAX_DWELL_SECS}s limit",
                        step.dwell_s
                    ),
                });
            }
            let position = store.resolve(&step.position).map_err(|_| {
                MotionError::InvalidSequence {
                    sequence: name.to_string(),
                    reason: format!("step {ordinal}: unknown position '{}'", step.position),
                }
            })?;
            steps.push(SequenceStep {
                position: position.clone(),
                dwell: Duration::from_secs_f64(step.dwell_s),
            });
        }
        Ok(Self {
            name: name.to_string(),
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
