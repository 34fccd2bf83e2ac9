#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host-side horde spawner keeping a bounded group of enemies around a player.
//!
//! The spawner works in fixed poll steps. Each step drains the kill and
//! removal events it subscribed to, decides whether the task is over, keeps
//! the tracked enemies busy with periodic retargeting and rage rolls, and
//! spawns at most one new enemy while the concurrency cap allows it.

use std::{f32::consts::TAU, time::Duration};

use questline_core::{
    horizontal_distance, ConfigError, EntityId, EntityRole, RageTuning, SpawnerConfig,
    TargetingTuning, TrackedEntitySet, Vec3, WorldEvent, WorldEventKind,
};
use questline_system_coordinator::{Coordinator, Disposal, Outcome, Poll};
use questline_system_events::{EventBus, Interest, Subscription};
use questline_world::{EntityHost, SpawnOrder};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Draws taken when looking for a spawn point far enough from the player.
const SPAWN_POSITION_DRAWS: usize = 32;

/// Horde spawner owned by one player.
#[derive(Debug)]
pub struct HordeSpawner {
    owner: EntityId,
    config: SpawnerConfig,
    rng: ChaCha8Rng,
    events: Option<Subscription>,
    tracked: TrackedEntitySet,
    /// Members pruned as dead whose kill event may still be in flight.
    pruned: TrackedEntitySet,
    kills: u32,
    spawned: u32,
    aborted: bool,
    clock: f32,
    since_poll: f32,
    next_spawn_at: f32,
    last_spawn_at: f32,
    last_kill_at: f32,
    retarget_at: f32,
    rerage_at: f32,
    report_at: f32,
}

impl HordeSpawner {
    /// Creates a spawner for `owner`, listening for kills and removals on `bus`.
    pub fn new(owner: EntityId, config: SpawnerConfig, bus: &EventBus, mut rng: ChaCha8Rng) -> Self {
        let events = bus.subscribe(Interest::only(&[
            WorldEventKind::Killed,
            WorldEventKind::Removed,
        ]));
        let next_spawn_at = config.spawn_wait.sample(&mut rng);
        let report_at = config.report_interval;
        let since_poll = config.poll_interval;
        Self {
            owner,
            config,
            rng,
            events: Some(events),
            tracked: TrackedEntitySet::new(),
            pruned: TrackedEntitySet::new(),
            kills: 0,
            spawned: 0,
            aborted: false,
            clock: 0.0,
            since_poll,
            next_spawn_at,
            last_spawn_at: 0.0,
            last_kill_at: 0.0,
            retarget_at: 0.0,
            rerage_at: 0.0,
            report_at,
        }
    }

    /// Spawner tuning.
    #[must_use]
    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    /// Kills credited to the owner so far.
    #[must_use]
    pub fn kills(&self) -> u32 {
        self.kills
    }

    /// Entities spawned so far.
    #[must_use]
    pub fn spawned(&self) -> u32 {
        self.spawned
    }

    /// Enemies currently tracked.
    #[must_use]
    pub fn tracked(&self) -> &TrackedEntitySet {
        &self.tracked
    }

    fn drain_events(&mut self) {
        let Some(subscription) = &mut self.events else {
            return;
        };
        for event in subscription.drain() {
            match event {
                WorldEvent::EntityKilled { deceased, killer } => {
                    let member = self.tracked.remove(deceased) | self.pruned.remove(deceased);
                    if !member {
                        continue;
                    }
                    if killer == Some(self.owner) {
                        self.kills = self.kills.saturating_add(1);
                        self.last_kill_at = self.clock;
                        log::debug!(
                            "horde of player {} lost {} ({}/{})",
                            self.owner.get(),
                            deceased.get(),
                            self.kills,
                            self.config.needed_kills
                        );
                    }
                }
                WorldEvent::EntityRemoved { entity, reason } => {
                    if self.tracked.remove(entity) | self.pruned.remove(entity) {
                        self.last_kill_at = self.clock;
                        log::debug!("horde member {} removed: {reason:?}", entity.get());
                    }
                }
                WorldEvent::EntitySpawned { .. } => {}
            }
        }
        let _ = self.pruned.drain();
    }

    fn target(&self, host: &dyn EntityHost) -> EntityId {
        self.config
            .target
            .filter(|target| host.is_alive(*target))
            .unwrap_or(self.owner)
    }

    fn roll_targeting(
        &mut self,
        host: &mut dyn EntityHost,
        entity: EntityId,
        tuning: TargetingTuning,
    ) {
        let target = if self.rng.gen::<f32>() < tuning.player_chance {
            self.owner
        } else {
            self.target(host)
        };
        if self.rng.gen::<f32>() > tuning.chance {
            return;
        }
        if host.attack_target(entity).is_some() {
            return;
        }
        let time = tuning.time.sample(&mut self.rng);
        host.set_attack_target(entity, target, Duration::from_secs_f32(time));
    }

    fn roll_rage(&mut self, host: &mut dyn EntityHost, entity: EntityId, tuning: RageTuning) {
        if self.rng.gen::<f32>() > tuning.chance {
            return;
        }
        let speed = tuning.speed.sample(&mut self.rng);
        let time = tuning.time.sample(&mut self.rng);
        host.start_rage(entity, speed, Duration::from_secs_f32(time));
    }

    fn retarget(&mut self, host: &mut dyn EntityHost) {
        if self.clock < self.retarget_at {
            return;
        }
        self.retarget_at = self.clock + self.config.retarget_delay.sample(&mut self.rng);
        let Some(entity) = self.tracked.pick(&mut self.rng) else {
            return;
        };
        if host.attack_target(entity).is_none() {
            self.roll_targeting(host, entity, self.config.retargeting);
        }
    }

    fn rerage(&mut self, host: &mut dyn EntityHost) {
        if self.clock < self.rerage_at {
            return;
        }
        self.rerage_at = self.clock + self.config.rerage_delay.sample(&mut self.rng);
        let Some(entity) = self.tracked.pick(&mut self.rng) else {
            return;
        };
        if !host.is_raging(entity) {
            self.roll_rage(host, entity, self.config.rerage);
        }
    }

    fn report(&mut self, host: &dyn EntityHost) {
        if self.clock < self.report_at {
            return;
        }
        self.report_at = self.clock + self.config.report_interval;
        log::info!(
            "horde of player {}: kills {}/{}, alive {}, excess {}",
            self.owner.get(),
            self.kills,
            self.config.needed_kills,
            self.tracked.len(),
            self.config.spawn_excess_count
        );
        for entity in self.tracked.iter() {
            log::debug!(
                "  {} targets {:?}",
                entity.get(),
                host.attack_target(entity).map(|target| target.get())
            );
        }
    }

    fn should_spawn(&self) -> bool {
        let cap = self.config.concurrent_cap(self.kills) as usize;
        if self.tracked.len() >= cap {
            return false;
        }
        let idle = self.clock - self.last_spawn_at.max(self.last_kill_at);
        idle > self.config.force_spawn_after || self.clock >= self.next_spawn_at
    }

    fn spawn(&mut self, host: &mut dyn EntityHost) {
        self.next_spawn_at = self.clock + self.config.spawn_wait.sample(&mut self.rng);
        self.last_spawn_at = self.clock;

        let groups = &self.config.spawn_groups;
        if groups.is_empty() {
            return;
        }
        let group = groups[self.rng.gen_range(0..groups.len())].clone();
        let stage = host.game_stage(self.owner);
        let Some(choice) = host.pick_from_group(&group, stage, self.rng.gen()) else {
            log::warn!("spawn group {group} has nothing for game stage {stage}");
            return;
        };

        let (Some(player), Some(anchor)) = (
            host.position_of(self.owner),
            host.position_of(self.target(host)),
        ) else {
            return;
        };
        let mut position = self.spawn_position(host, player, anchor);
        if choice.airborne {
            position.y = position.y.max(anchor.y + self.config.entity_height_offset);
        }
        let facing = player - position;
        let order = SpawnOrder {
            class: choice.class,
            role: EntityRole::Enemy,
            position,
            yaw_degrees: facing.x.atan2(facing.z).to_degrees(),
            velocity: Vec3::ZERO,
            spawned_by: Some(self.owner),
        };
        let Some(entity) = host.spawn(order) else {
            return;
        };

        let _ = self.tracked.insert(entity);
        self.spawned = self.spawned.saturating_add(1);
        log::debug!(
            "horde of player {} spawned {} from {group} at {position} ({:.1} away)",
            self.owner.get(),
            entity.get(),
            horizontal_distance(player, position)
        );
        self.roll_targeting(host, entity, self.config.targeting);
        self.roll_rage(host, entity, self.config.rage);
    }

    fn spawn_position(&mut self, host: &dyn EntityHost, player: Vec3, anchor: Vec3) -> Vec3 {
        let min_distance = self.config.player_distance.min;
        let mut position = anchor;
        for _ in 0..SPAWN_POSITION_DRAWS {
            let angle = self.rng.gen_range(0.0..TAU);
            let distance = self.config.player_distance.sample(&mut self.rng);
            let x = anchor.x + angle.cos() * distance;
            let z = anchor.z + angle.sin() * distance;
            position = host.clamp_to_bounds(Vec3::new(x, host.height_at(x, z), z));
            if horizontal_distance(position, player) >= min_distance {
                break;
            }
        }
        position
    }
}

impl Coordinator for HordeSpawner {
    fn owner(&self) -> EntityId {
        self.owner
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    fn poll(&mut self, dt: Duration, host: &mut dyn EntityHost) -> Poll {
        if self.aborted {
            return Poll::Done(Outcome::Aborted);
        }
        let seconds = dt.as_secs_f32();
        self.clock += seconds;
        self.since_poll += seconds;
        if self.since_poll < self.config.poll_interval {
            return Poll::Pending;
        }
        self.since_poll = 0.0;

        self.drain_events();
        if self.kills >= self.config.needed_kills {
            return Poll::Done(Outcome::Completed);
        }
        if !host.is_alive(self.owner) {
            log::warn!("player {} went away, horde stops", self.owner.get());
            return Poll::Done(Outcome::PlayerLost);
        }

        for entity in self.tracked.prune(|entity| host.is_alive(entity)) {
            let _ = self.pruned.insert(entity);
        }
        self.retarget(host);
        self.rerage(host);
        self.report(host);
        if self.should_spawn() {
            self.spawn(host);
        }
        Poll::Pending
    }

    fn abort(&mut self) {
        self.aborted = true;
    }

    fn shutdown(&mut self, host: &mut dyn EntityHost, disposal: Disposal) {
        self.events = None;
        let _ = self.pruned.drain();
        let tracked = self.tracked.drain();
        if disposal == Disposal::KillTracked {
            for entity in tracked {
                host.kill(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core::Window;
    use questline_world::SimWorld;
    use rand::SeedableRng;

    fn spawner(config: SpawnerConfig) -> (SimWorld, HordeSpawner, EventBus) {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        let bus = EventBus::new();
        let spawner = HordeSpawner::new(player, config, &bus, ChaCha8Rng::seed_from_u64(4));
        (world, spawner, bus)
    }

    #[test]
    fn spawn_points_keep_minimum_distance() {
        let (world, mut spawner, _bus) = spawner(SpawnerConfig {
            player_distance: Window::new(12.0, 34.0),
            ..SpawnerConfig::default()
        });
        let player = Vec3::new(0.0, 70.0, 0.0);
        for _ in 0..64 {
            let position = spawner.spawn_position(&world, player, player);
            let distance = horizontal_distance(position, player);
            assert!((12.0 - 1e-3..=34.0 + 1e-3).contains(&distance));
        }
    }

    #[test]
    fn force_spawn_ignores_wait_but_not_cap() {
        let (_world, mut spawner, _bus) = spawner(SpawnerConfig {
            needed_kills: 1,
            spawn_excess_count: 0,
            max_entity_count: 1,
            spawn_wait: Window::new(1_000.0, 1_000.0),
            ..SpawnerConfig::default()
        });
        spawner.next_spawn_at = 1_000.0;
        spawner.clock = 10.0;
        assert!(!spawner.should_spawn());

        spawner.clock = 31.0;
        assert!(spawner.should_spawn(), "idle for longer than force_spawn_after");

        let _ = spawner.tracked.insert(EntityId::new(77));
        assert!(!spawner.should_spawn(), "cap still applies");
    }
}
