#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host-side air-drop sequencer.
//!
//! An air drop flies a mover across the sky above a target column and
//! releases a payload over it. The sequencer computes a [`FlightPlan`] on its
//! first poll, keeps the target column loaded through a chunk observer, and
//! then walks through its [`Stage`]s: it waits for the column to load, counts
//! down the launch delay, spawns the mover and finally spawns the payload once
//! the mover is overhead. The payload then belongs to the air-drop objective
//! of the owning player, which learns about it through the spawn event.

use std::time::Duration;

use questline_core::{
    ConfigError, EntityClassId, EntityId, EntityRole, Vec2, Vec3, Window,
};
use questline_system_coordinator::{Coordinator, Disposal, Outcome, Poll};
use questline_world::{ChunkObserverId, EntityHost, SpawnOrder};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Class of the mover flying the payload in.
pub const SUPPLY_PLANE: EntityClassId = EntityClassId::new(2);

/// Timing and geometry of air drops.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirDropTuning {
    /// Fixed part of the delay before the mover launches.
    pub launch_delay: f32,
    /// Random extra launch delay.
    pub launch_jitter: Window,
    /// Height of the flight above the ground at the drop column.
    pub flight_height: Window,
    /// Highest altitude a mover may fly at.
    pub ceiling: f32,
    /// Distance below the flight height at which the payload appears.
    pub drop_below: f32,
    /// Distance flown before and after the drop column.
    pub leg_length: f32,
    /// Speed used to time the payload release over the flight path.
    pub release_speed: f32,
    /// Speed of the mover.
    pub mover_speed: f32,
    /// Class of the mover.
    pub mover_class: EntityClassId,
}

impl Default for AirDropTuning {
    fn default() -> Self {
        Self {
            launch_delay: 10.0,
            launch_jitter: Window::new(0.0, 2.0),
            flight_height: Window::new(160.0, 190.0),
            ceiling: 276.0,
            drop_below: 4.0,
            leg_length: 1_500.0,
            release_speed: 240.0,
            mover_speed: 120.0,
            mover_class: SUPPLY_PLANE,
        }
    }
}

impl AirDropTuning {
    /// Checks the tuning before a sequencer starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        window("launch_delay", Window::new(self.launch_delay, self.launch_delay))?;
        window("launch_jitter", self.launch_jitter)?;
        window("flight_height", self.flight_height)?;
        positive("ceiling", self.ceiling)?;
        positive("leg_length", self.leg_length)?;
        positive("release_speed", self.release_speed)?;
        positive("mover_speed", self.mover_speed)
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveInterval { field, value })
    }
}

fn window(field: &'static str, window: Window) -> Result<(), ConfigError> {
    if window.min.is_finite() && window.max.is_finite() && 0.0 <= window.min && window.min <= window.max {
        Ok(())
    } else {
        Err(ConfigError::InvalidWindow {
            field,
            min: window.min,
            max: window.max,
        })
    }
}

/// Route and timers of one air drop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlightPlan {
    /// Where the payload appears.
    pub drop_point: Vec3,
    /// Where the mover appears.
    pub start: Vec3,
    /// Where the mover heads.
    pub end: Vec3,
    /// Horizontal heading of the mover.
    pub direction: Vec2,
    /// Seconds left before the mover launches.
    pub launch_delay: f32,
    /// Seconds between the mover launch and the payload release.
    pub release_delay: f32,
}

impl FlightPlan {
    /// Plans a drop over `target` for a player standing at `player`.
    pub fn new(
        host: &dyn EntityHost,
        rng: &mut ChaCha8Rng,
        tuning: &AirDropTuning,
        target: Vec3,
        player: Vec3,
    ) -> Self {
        let ground = host.height_at(target.x.trunc(), target.z.trunc());
        let height = (ground + tuning.flight_height.sample(rng)).min(tuning.ceiling);
        let drop_point =
            host.clamp_to_bounds(Vec3::new(target.x, height - tuning.drop_below, target.z));

        let drop_xz = Vec2::new(drop_point.x, drop_point.z);
        let direction = (drop_xz - Vec2::new(player.x, player.z)).normalize_or_zero();
        let direction = if direction == Vec2::ZERO {
            Vec2::Y
        } else {
            direction
        };
        let start = drop_xz - direction * tuning.leg_length;
        let end = drop_xz + direction * tuning.leg_length;
        let start = Vec3::new(start.x, height, start.y);
        let end = Vec3::new(end.x, height, end.y);

        Self {
            drop_point,
            start,
            end,
            direction,
            launch_delay: tuning.launch_delay + tuning.launch_jitter.sample(rng),
            release_delay: start.distance(end) / tuning.release_speed,
        }
    }

    /// Heading of the mover in degrees, clockwise from the z axis.
    #[must_use]
    pub fn heading_degrees(&self) -> f32 {
        self.direction.x.atan2(self.direction.y).to_degrees().rem_euclid(360.0)
    }
}

/// Progress of an air drop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Waiting for the target column to load.
    #[default]
    AwaitingChunk,
    /// Counting down to the mover launch.
    Countdown,
    /// The mover is on its way.
    InFlight,
    /// The payload was released.
    Delivered,
}

/// Air drop owned by one player.
#[derive(Debug)]
pub struct AirDropSequencer {
    owner: EntityId,
    payload_class: EntityClassId,
    target: Vec3,
    tuning: AirDropTuning,
    rng: ChaCha8Rng,
    plan: Option<FlightPlan>,
    stage: Stage,
    observer: Option<ChunkObserverId>,
    mover: Option<EntityId>,
    payload: Option<EntityId>,
    aborted: bool,
}

impl AirDropSequencer {
    /// Creates a sequencer dropping a `payload_class` entity over `target`.
    #[must_use]
    pub fn new(
        owner: EntityId,
        payload_class: EntityClassId,
        target: Vec3,
        tuning: AirDropTuning,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            owner,
            payload_class,
            target,
            tuning,
            rng,
            plan: None,
            stage: Stage::AwaitingChunk,
            observer: None,
            mover: None,
            payload: None,
            aborted: false,
        }
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Active flight plan.
    #[must_use]
    pub fn plan(&self) -> Option<&FlightPlan> {
        self.plan.as_ref()
    }

    /// Mover spawned for the drop.
    #[must_use]
    pub fn mover(&self) -> Option<EntityId> {
        self.mover
    }

    /// Payload released by the drop.
    #[must_use]
    pub fn payload(&self) -> Option<EntityId> {
        self.payload
    }

    fn discard(&mut self, host: &mut dyn EntityHost) {
        self.plan = None;
        if let Some(observer) = self.observer.take() {
            host.remove_chunk_observer(observer);
        }
    }

    fn launch(&mut self, host: &mut dyn EntityHost, plan: &FlightPlan) {
        let direction = Vec3::new(plan.direction.x, 0.0, plan.direction.y);
        self.mover = host.spawn(SpawnOrder {
            class: self.tuning.mover_class,
            role: EntityRole::Mover,
            position: plan.start,
            yaw_degrees: plan.heading_degrees(),
            velocity: direction * self.tuning.mover_speed,
            spawned_by: Some(self.owner),
        });
        match self.mover {
            Some(mover) => log::info!(
                "air drop of player {} launched mover {} at {}",
                self.owner.get(),
                mover.get(),
                plan.start
            ),
            None => log::warn!(
                "air drop of player {} could not launch at {}",
                self.owner.get(),
                plan.start
            ),
        }
    }

    fn release(&mut self, host: &mut dyn EntityHost, plan: &FlightPlan) {
        self.payload = host.spawn(SpawnOrder {
            class: self.payload_class,
            role: EntityRole::Payload,
            position: plan.drop_point,
            yaw_degrees: plan.heading_degrees(),
            velocity: Vec3::ZERO,
            spawned_by: Some(self.owner),
        });
        log::info!(
            "air drop of player {} released payload {:?} at {}",
            self.owner.get(),
            self.payload.map(|payload| payload.get()),
            plan.drop_point
        );
    }
}

impl Coordinator for AirDropSequencer {
    fn owner(&self) -> EntityId {
        self.owner
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.tuning.validate()
    }

    fn poll(&mut self, dt: Duration, host: &mut dyn EntityHost) -> Poll {
        if self.aborted {
            self.discard(host);
            return Poll::Done(Outcome::Aborted);
        }
        let Some(player) = host
            .observe(self.owner)
            .filter(|observation| observation.alive)
        else {
            log::warn!("air drop lost player {}, flight plan dropped", self.owner.get());
            self.discard(host);
            return Poll::Done(Outcome::PlayerLost);
        };
        if self.stage == Stage::Delivered {
            return Poll::Done(Outcome::Completed);
        }

        let mut plan = match self.plan {
            Some(plan) => plan,
            None => {
                let plan =
                    FlightPlan::new(host, &mut self.rng, &self.tuning, self.target, player.position);
                self.observer = Some(host.add_chunk_observer(plan.drop_point));
                log::debug!(
                    "air drop of player {} planned: launch in {:.1}s, release after {:.1}s at {}",
                    self.owner.get(),
                    plan.launch_delay,
                    plan.release_delay,
                    plan.drop_point
                );
                plan
            }
        };

        let seconds = dt.as_secs_f32();
        if self.stage == Stage::AwaitingChunk {
            if !host.is_chunk_loaded(plan.drop_point) {
                self.plan = Some(plan);
                return Poll::Pending;
            }
            self.stage = Stage::Countdown;
        }
        if self.stage == Stage::Countdown {
            plan.launch_delay -= seconds;
            if plan.launch_delay > 0.0 {
                self.plan = Some(plan);
                return Poll::Pending;
            }
            self.launch(host, &plan);
            self.stage = Stage::InFlight;
        }

        plan.release_delay -= seconds;
        if plan.release_delay > 0.0 {
            self.plan = Some(plan);
            return Poll::Pending;
        }
        self.release(host, &plan);
        self.discard(host);
        self.stage = Stage::Delivered;
        Poll::Done(Outcome::Completed)
    }

    fn abort(&mut self) {
        self.aborted = true;
    }

    fn shutdown(&mut self, host: &mut dyn EntityHost, disposal: Disposal) {
        self.discard(host);
        if disposal == Disposal::KillTracked {
            if let Some(mover) = self.mover.take() {
                host.kill(mover);
            }
        }
    }
}
