//! Session settings loaded from TOML.

use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use questline_core::EntityClassId;
use questline_system_air_drop::AirDropTuning;
use questline_system_position::SearchLimits;
use questline_world::{PoiRecord, SpawnGroup, SpawnGroupEntry, TerrainFeature, WorldConfig};
use serde::{Deserialize, Serialize};

const DEFAULT_TICK_MILLIS: u64 = 100;
const DEFAULT_GROUP: &str = "zombies";
const DEFAULT_GROUP_CLASS: EntityClassId = EntityClassId::new(5);

/// Everything needed to build a [`crate::Session`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seed every random stream of the session derives from.
    pub seed: u64,
    /// Simulated milliseconds advanced by one tick.
    pub tick_millis: u64,
    /// Simulated world parameters.
    pub world: WorldConfig,
    /// Bounds of host-side position searches.
    pub search: SearchLimits,
    /// Tuning of every air drop the host flies.
    pub air_drop: AirDropTuning,
    /// Spawn groups hordes may draw from, by name.
    pub spawn_groups: BTreeMap<String, SpawnGroup>,
    /// Pre-placed structures.
    pub pois: Vec<PoiRecord>,
    /// Names of structures players are locked out of.
    pub locked_pois: Vec<String>,
    /// Terrain shaping the flat default ground.
    pub features: Vec<TerrainFeature>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut spawn_groups = BTreeMap::new();
        let _ = spawn_groups.insert(
            DEFAULT_GROUP.to_owned(),
            SpawnGroup {
                entries: vec![SpawnGroupEntry {
                    class: DEFAULT_GROUP_CLASS,
                    weight: 1.0,
                    min_game_stage: 0,
                }],
                airborne: false,
            },
        );
        Self {
            seed: 0,
            tick_millis: DEFAULT_TICK_MILLIS,
            world: WorldConfig::default(),
            search: SearchLimits::default(),
            air_drop: AirDropTuning::default(),
            spawn_groups,
            pois: Vec::new(),
            locked_pois: Vec::new(),
            features: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse session config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read session config {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("invalid session config {}", path.display()))
    }

    /// Rejects settings the session could not run with.
    pub fn validate(&self) -> Result<()> {
        if self.tick_millis == 0 {
            bail!("tick_millis must be positive");
        }
        if self.world.half_extent <= 0.0 {
            bail!("world half_extent must be positive, got {}", self.world.half_extent);
        }
        if self.world.day_length_secs <= 0.0 {
            bail!(
                "world day_length_secs must be positive, got {}",
                self.world.day_length_secs
            );
        }
        self.air_drop
            .validate()
            .context("invalid air drop tuning")?;
        for (name, group) in &self.spawn_groups {
            if group.entries.is_empty() {
                bail!("spawn group {name} has no entries");
            }
            if group.entries.iter().any(|entry| entry.weight <= 0.0) {
                bail!("spawn group {name} has an entry without weight");
            }
        }
        for name in &self.locked_pois {
            if !self.pois.iter().any(|poi| &poi.name == name) {
                bail!("locked structure {name} is not placed");
            }
        }
        Ok(())
    }

    /// Simulated time advanced by one tick.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.tick(), Duration::from_millis(100));
        assert!(config.spawn_groups.contains_key("zombies"));
    }

    #[test]
    fn partial_documents_fill_in_defaults() {
        let config = SessionConfig::from_toml(
            r#"
            seed = 42

            [world]
            half_extent = 512.0

            [spawn_groups.raiders]
            entries = [{ class = 7, weight = 2.0 }]
            "#,
        )
        .expect("valid document");

        assert_eq!(config.seed, 42);
        assert_eq!(config.tick_millis, 100);
        assert_eq!(config.world.half_extent, 512.0);
        assert_eq!(config.world.ground_height, 70.0);
        let raiders = &config.spawn_groups["raiders"];
        assert_eq!(raiders.entries[0].class, EntityClassId::new(7));
        assert_eq!(raiders.entries[0].min_game_stage, 0);
        assert!(!config.spawn_groups.contains_key("zombies"));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let error = SessionConfig::from_toml("tick_millis = 0").expect_err("zero tick");
        assert!(error.to_string().contains("tick_millis"));
    }

    #[test]
    fn broken_air_drop_tuning_is_rejected() {
        let error = SessionConfig::from_toml(
            r#"
            [air_drop]
            flight_height = { min = 200.0, max = 100.0 }
            "#,
        )
        .expect_err("reversed window");
        assert!(format!("{error:#}").contains("air drop"));
    }

    #[test]
    fn locking_unknown_structures_is_rejected() {
        let error =
            SessionConfig::from_toml(r#"locked_pois = ["bunker"]"#).expect_err("unknown poi");
        assert!(error.to_string().contains("bunker"));
    }
}
