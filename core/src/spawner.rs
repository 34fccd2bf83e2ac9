//! Configuration record shared by horde-spawner objectives and the host coordinator.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EntityId;

/// Errors raised when a spawner configuration cannot be started.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// No spawn group names remain after trimming.
    #[error("spawner configuration lists no spawn groups")]
    NoSpawnGroups,
    /// The spawner could never have an entity alive.
    #[error("max_entity_count must be greater than zero")]
    ZeroMaxEntityCount,
    /// The spawner would be satisfied before spawning anything.
    #[error("needed_kills must be greater than zero")]
    ZeroNeededKills,
    /// A timing or distance window is reversed or negative.
    #[error("window `{field}` is invalid: min {min} max {max}")]
    InvalidWindow {
        /// Name of the offending field.
        field: &'static str,
        /// Configured lower bound.
        min: f32,
        /// Configured upper bound.
        max: f32,
    },
    /// A probability lies outside `[0, 1]`.
    #[error("chance `{field}` must lie within [0, 1], got {value}")]
    ChanceOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Configured probability.
        value: f32,
    },
    /// An interval that drives a polling cadence is not positive.
    #[error("interval `{field}` must be positive, got {value}")]
    NonPositiveInterval {
        /// Name of the offending field.
        field: &'static str,
        /// Configured interval in seconds.
        value: f32,
    },
}

/// Inclusive range of values sampled uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl Window {
    /// Creates a new window.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Draws a value uniformly from the window.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    /// Reports whether the value lies within the window.
    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let valid = self.min.is_finite()
            && self.max.is_finite()
            && self.min >= 0.0
            && self.min <= self.max;
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidWindow {
                field,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Chances and durations used when pointing spawned entities at a target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingTuning {
    /// Probability of assigning the configured target.
    pub chance: f32,
    /// Probability of assigning the owning player instead.
    pub player_chance: f32,
    /// Seconds the assignment lasts.
    pub time: Window,
}

impl TargetingTuning {
    fn validate(&self, prefix: &'static str) -> Result<(), ConfigError> {
        validate_chance(prefix, self.chance)?;
        validate_chance(prefix, self.player_chance)?;
        self.time.validate(prefix)
    }
}

impl Default for TargetingTuning {
    fn default() -> Self {
        Self {
            chance: 0.75,
            player_chance: 0.125,
            time: Window::new(15.0, 90.0),
        }
    }
}

/// Chances, speeds and durations used when enraging spawned entities.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RageTuning {
    /// Probability of enraging an entity.
    pub chance: f32,
    /// Speed multiplier applied while raging.
    pub speed: Window,
    /// Seconds the rage lasts.
    pub time: Window,
}

impl RageTuning {
    fn validate(&self, prefix: &'static str) -> Result<(), ConfigError> {
        validate_chance(prefix, self.chance)?;
        self.speed.validate(prefix)?;
        self.time.validate(prefix)
    }
}

impl Default for RageTuning {
    fn default() -> Self {
        Self {
            chance: 0.25,
            speed: Window::new(1.5, 2.5),
            time: Window::new(12.0, 24.0),
        }
    }
}

/// Configuration attached to a horde objective and transmitted to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    /// Entity spawned enemies should attack. Defaults to the requesting player.
    pub target: Option<EntityId>,
    /// Kills by the owning player required to finish the task.
    pub needed_kills: u32,
    /// Upper bound on concurrently alive spawned entities.
    pub max_entity_count: u32,
    /// Headroom of spawns beyond the remaining kill requirement.
    pub spawn_excess_count: u32,
    /// Seconds between regular spawns.
    pub spawn_wait: Window,
    /// Distance band around the target where entities appear.
    pub player_distance: Window,
    /// Minimum height above the target for airborne spawns.
    pub entity_height_offset: f32,
    /// Targeting rolled once when an entity spawns.
    pub targeting: TargetingTuning,
    /// Targeting rolled periodically for tracked entities.
    pub retargeting: TargetingTuning,
    /// Seconds between retargeting rolls.
    pub retarget_delay: Window,
    /// Rage rolled once when an entity spawns.
    pub rage: RageTuning,
    /// Rage rolled periodically for tracked entities that are calm.
    pub rerage: RageTuning,
    /// Seconds between rerage rolls.
    pub rerage_delay: Window,
    /// Seconds without spawns or kills after which a spawn is forced.
    pub force_spawn_after: f32,
    /// Seconds between coordinator polls.
    pub poll_interval: f32,
    /// Seconds between progress reports.
    pub report_interval: f32,
    /// Names of the spawn groups entities are drawn from.
    pub spawn_groups: Vec<String>,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            target: None,
            needed_kills: 12,
            max_entity_count: 4,
            spawn_excess_count: 2,
            spawn_wait: Window::new(1.5, 4.5),
            player_distance: Window::new(12.0, 34.0),
            entity_height_offset: 1.5,
            targeting: TargetingTuning::default(),
            retargeting: TargetingTuning {
                time: Window::new(10.0, 45.0),
                ..TargetingTuning::default()
            },
            retarget_delay: Window::new(0.75, 1.25),
            rage: RageTuning::default(),
            rerage: RageTuning {
                chance: 0.0075,
                ..RageTuning::default()
            },
            rerage_delay: Window::new(2.75, 5.25),
            force_spawn_after: 30.0,
            poll_interval: 0.25,
            report_interval: 4.0,
            spawn_groups: Vec::new(),
        }
    }
}

impl SpawnerConfig {
    /// Adds comma separated spawn group names, skipping blanks.
    pub fn add_spawn_groups(&mut self, names: &str) {
        self.spawn_groups.extend(
            names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned),
        );
    }

    /// Spawns still allowed, including excess headroom, after `kills` kills.
    #[must_use]
    pub fn remaining_spawn_count(&self, kills: u32) -> u32 {
        self.needed_kills
            .saturating_add(self.spawn_excess_count)
            .saturating_sub(kills)
    }

    /// Maximum number of entities that may be tracked at once after `kills` kills.
    #[must_use]
    pub fn concurrent_cap(&self, kills: u32) -> u32 {
        self.remaining_spawn_count(kills).min(self.max_entity_count)
    }

    /// Checks the configuration before a task is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.spawn_groups.iter().any(|name| !name.trim().is_empty()) {
            return Err(ConfigError::NoSpawnGroups);
        }
        if self.max_entity_count == 0 {
            return Err(ConfigError::ZeroMaxEntityCount);
        }
        if self.needed_kills == 0 {
            return Err(ConfigError::ZeroNeededKills);
        }

        self.spawn_wait.validate("spawn_wait")?;
        self.player_distance.validate("player_distance")?;
        self.targeting.validate("targeting")?;
        self.retargeting.validate("retargeting")?;
        self.retarget_delay.validate("retarget_delay")?;
        self.rage.validate("rage")?;
        self.rerage.validate("rerage")?;
        self.rerage_delay.validate("rerage_delay")?;

        validate_interval("force_spawn_after", self.force_spawn_after)?;
        validate_interval("poll_interval", self.poll_interval)?;
        validate_interval("report_interval", self.report_interval)
    }
}

fn validate_chance(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ChanceOutOfRange { field, value })
    }
}

fn validate_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveInterval { field, value })
    }
}
