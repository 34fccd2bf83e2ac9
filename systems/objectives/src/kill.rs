//! Counting kills of a horde spawned for the player.

use questline_core::{
    EntityRole, Message, SpawnerConfig, TrackedEntitySet, WorldEvent, WorldEventKind,
};
use questline_system_events::Interest;
use serde::{Deserialize, Serialize};

use crate::{
    context::ObjectiveEffect,
    objective::{previous_crate, Step},
};

/// Objective counting kills of enemies spawned by the player's horde.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KillCount {
    config: SpawnerConfig,
    kills: u32,
    #[serde(default)]
    tracked: TrackedEntitySet,
}

impl KillCount {
    /// Creates a kill objective driving a spawner with the provided tuning.
    #[must_use]
    pub fn new(config: SpawnerConfig) -> Self {
        Self {
            config,
            kills: 0,
            tracked: TrackedEntitySet::new(),
        }
    }

    /// Spawner tuning.
    #[must_use]
    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    /// Kills credited so far.
    #[must_use]
    pub fn kills(&self) -> u32 {
        self.kills
    }

    /// Kills needed to complete.
    #[must_use]
    pub fn needed(&self) -> u32 {
        self.config.needed_kills
    }

    /// Horde members currently tracked.
    #[must_use]
    pub fn tracked(&self) -> &TrackedEntitySet {
        &self.tracked
    }

    pub(crate) fn activate(&mut self, step: &mut Step<'_, '_>) {
        if self.kills >= self.config.needed_kills {
            step.status.complete();
            return;
        }
        if let Err(error) = self.config.validate() {
            log::warn!(
                "kill objective of quest {} rejected: {error}",
                step.quest.name()
            );
            step.status.fail();
            return;
        }

        step.hooks.ensure(
            step.ctx.bus(),
            Interest::only(&[
                WorldEventKind::Spawned,
                WorldEventKind::Killed,
                WorldEventKind::Removed,
            ]),
        );
        let mut config = self.config.clone();
        config.needed_kills = self.config.needed_kills.saturating_sub(self.kills);
        config.target = previous_crate(step.previous);
        log::debug!(
            "quest {} starts a horde needing {} kills",
            step.quest.name(),
            config.needed_kills
        );
        step.ctx.emit(ObjectiveEffect::Send(Message::StartSpawnerTask {
            player: step.ctx.player(),
            config,
        }));
    }

    pub(crate) fn update(&mut self, events: &[WorldEvent], step: &mut Step<'_, '_>) {
        let player = step.ctx.player();
        for event in events {
            match *event {
                WorldEvent::EntitySpawned {
                    entity,
                    role: EntityRole::Enemy,
                    spawned_by: Some(owner),
                    ..
                } if owner == player => {
                    let _ = self.tracked.insert(entity);
                }
                WorldEvent::EntityKilled { deceased, killer } => {
                    if self.tracked.remove(deceased) && killer == Some(player) {
                        self.kills = self.kills.saturating_add(1);
                    }
                }
                WorldEvent::EntityRemoved { entity, .. } => {
                    let _ = self.tracked.remove(entity);
                }
                WorldEvent::EntitySpawned { .. } => {}
            }
        }
        if self.kills >= self.config.needed_kills {
            step.status.complete();
        } else if step.hooks.is_active() && step.ctx.player_position().is_none() {
            log::info!(
                "player {} fell while quest {} had a horde running",
                player.get(),
                step.quest.name()
            );
            step.status.fail();
        }
    }

    pub(crate) fn handle_failed(&mut self, step: &mut Step<'_, '_>) {
        if !step.hooks.is_active() {
            return;
        }
        step.ctx.emit(ObjectiveEffect::Send(Message::StopSpawnerTask {
            player: step.ctx.player(),
        }));
        self.tracked = TrackedEntitySet::new();
    }
}
