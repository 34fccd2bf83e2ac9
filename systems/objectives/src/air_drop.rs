//! Air-drop objectives: calling the drop in, waiting for it, guarding it.

use questline_core::{
    horizontal_distance, EntityClassId, EntityId, EntityRole, Message, PositionKind, Vec3,
    WorldEvent, WorldEventKind,
};
use questline_system_events::Interest;
use serde::{Deserialize, Serialize};

use crate::{
    context::ObjectiveEffect,
    objective::{previous_crate, Step},
    progress::TargetProgress,
    reach::{ReachPointConfig, TargetAcquisition},
};

/// Class of the supply crate delivered by default.
pub const AIR_SUPPLY_CRATE: EntityClassId = EntityClassId::new(1);

/// Tuning of an air-drop objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirDropConfig {
    /// How the drop location is negotiated.
    pub reach: ReachPointConfig,
    /// Only call the drop in once the player reached the location.
    pub start_at_pos: bool,
    /// Complete only once the crate rests on the ground with the player nearby.
    pub wait_for_ground: bool,
    /// Alternative completion: crate within this height of the player.
    pub min_ground_height: Option<f32>,
    /// Class of the delivered crate.
    pub payload_class: EntityClassId,
    /// Lock the crate when it spawns.
    pub lock_at_start: bool,
    /// Unlock the crate on completion.
    pub unlock_at_end: bool,
}

impl Default for AirDropConfig {
    fn default() -> Self {
        Self {
            reach: ReachPointConfig::default(),
            start_at_pos: false,
            wait_for_ground: true,
            min_ground_height: None,
            payload_class: AIR_SUPPLY_CRATE,
            lock_at_start: true,
            unlock_at_end: true,
        }
    }
}

/// Objective calling in a supply drop at a host-selected location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AirDrop {
    config: AirDropConfig,
    acquisition: TargetAcquisition,
    crate_entity: Option<EntityId>,
    was_in_distance: bool,
    #[serde(skip)]
    plane: Option<EntityId>,
    #[serde(skip)]
    flight_requested: bool,
    #[serde(skip)]
    since_tick: f32,
}

impl AirDrop {
    /// Creates an air-drop objective.
    #[must_use]
    pub fn new(config: AirDropConfig) -> Self {
        Self {
            config,
            acquisition: TargetAcquisition::default(),
            crate_entity: None,
            was_in_distance: false,
            plane: None,
            flight_requested: false,
            since_tick: 0.0,
        }
    }

    /// Tuning of the objective.
    #[must_use]
    pub fn config(&self) -> &AirDropConfig {
        &self.config
    }

    /// Current progress.
    #[must_use]
    pub fn progress(&self) -> TargetProgress {
        self.acquisition.progress()
    }

    /// Drop location, once known.
    #[must_use]
    pub fn target(&self) -> Option<Vec3> {
        self.acquisition.target()
    }

    /// Delivered crate, once spawned.
    #[must_use]
    pub fn crate_entity(&self) -> Option<EntityId> {
        self.crate_entity
    }

    /// Mover carrying the crate, while it is in the air.
    #[must_use]
    pub fn plane(&self) -> Option<EntityId> {
        self.plane
    }

    /// Whether the drop was called in.
    #[must_use]
    pub fn flight_requested(&self) -> bool {
        self.flight_requested
    }

    pub(crate) fn activate(&mut self, restored: bool, step: &mut Step<'_, '_>) {
        if restored {
            self.acquisition.restore(&self.config.reach, step);
            self.flight_requested = self.crate_entity.is_some();
        }
        self.since_tick = self.config.reach.tick_interval;
    }

    pub(crate) fn update(&mut self, dt: f32, events: &[WorldEvent], step: &mut Step<'_, '_>) {
        if !self.acquisition.is_active() {
            self.acquisition.acquire(&self.config.reach, step);
            if !self.acquisition.is_active() {
                return;
            }
        }
        if self.acquisition.progress() == TargetProgress::Reached {
            return;
        }

        for event in events {
            self.observe_spawn(event, step);
        }

        self.since_tick += dt;
        if self.since_tick < self.config.reach.tick_interval {
            return;
        }
        self.since_tick = 0.0;

        let Some(target) = self.acquisition.target() else {
            return;
        };
        let player = step.ctx.player_position();
        if self.flight_requested && player.is_none() {
            log::info!(
                "player {} fell while quest {} waited for its air drop",
                step.ctx.player().get(),
                step.quest.name()
            );
            clear_tag(PositionKind::CratePosition, step);
            clear_tag(PositionKind::PlanePosition, step);
            step.status.fail();
            return;
        }
        let in_distance = player.map_or(false, |position| {
            horizontal_distance(position, target) <= self.config.reach.completion_distance
        });
        self.was_in_distance |= in_distance;

        self.track_plane(step);

        let Some(crate_entity) = self.crate_entity else {
            if !self.flight_requested && (!self.config.start_at_pos || self.was_in_distance) {
                self.request_flight(target, step);
            }
            return;
        };
        let Some(observed) = step
            .ctx
            .world()
            .observe(crate_entity)
            .filter(|observation| observation.alive)
        else {
            log::info!(
                "air drop crate {} of quest {} was lost",
                crate_entity.get(),
                step.quest.name()
            );
            clear_tag(PositionKind::CratePosition, step);
            clear_tag(PositionKind::PlanePosition, step);
            step.status.fail();
            return;
        };
        track_tag(PositionKind::CratePosition, observed.position, step);

        let delivered = if self.config.wait_for_ground {
            observed.on_ground && in_distance
        } else if let Some(threshold) = self.config.min_ground_height {
            player.map_or(false, |position| {
                (observed.position.y - position.y).abs() < threshold
            })
        } else {
            true
        };
        if !delivered {
            return;
        }

        clear_tag(PositionKind::CratePosition, step);
        clear_tag(PositionKind::PlanePosition, step);
        if self.config.unlock_at_end {
            step.ctx.emit(ObjectiveEffect::SetContainerLocked {
                entity: crate_entity,
                locked: false,
            });
        }
        if self.acquisition.advance(TargetProgress::Reached, false) {
            log::info!("air drop of quest {} delivered", step.quest.name());
            step.status.complete();
        }
        step.hooks.release();
    }

    pub(crate) fn handle_failed(&mut self, step: &mut Step<'_, '_>) {
        if let Some(crate_entity) = self.crate_entity {
            if step.ctx.world().is_alive(crate_entity) {
                step.ctx.emit(ObjectiveEffect::KillEntity(crate_entity));
            }
        }
        clear_tag(PositionKind::CratePosition, step);
        clear_tag(PositionKind::PlanePosition, step);
    }

    fn request_flight(&mut self, target: Vec3, step: &mut Step<'_, '_>) {
        step.hooks
            .ensure(step.ctx.bus(), Interest::only(&[WorldEventKind::Spawned]));
        log::info!(
            "quest {} calls in an air drop at {target}",
            step.quest.name()
        );
        step.ctx.emit(ObjectiveEffect::Send(Message::StartAirDropTask {
            player: step.ctx.player(),
            payload_class: self.config.payload_class,
            position: target,
        }));
        self.flight_requested = true;
    }

    fn observe_spawn(&mut self, event: &WorldEvent, step: &mut Step<'_, '_>) {
        if !self.flight_requested {
            return;
        }
        let WorldEvent::EntitySpawned {
            entity,
            class,
            role,
            spawned_by: Some(owner),
        } = *event
        else {
            return;
        };
        if owner != step.ctx.player() {
            return;
        }
        match role {
            EntityRole::Mover if self.plane.is_none() => {
                log::debug!("air drop plane {} is inbound", entity.get());
                self.plane = Some(entity);
            }
            EntityRole::Payload
                if self.crate_entity.is_none() && class == self.config.payload_class =>
            {
                log::debug!("air drop crate {} released", entity.get());
                self.crate_entity = Some(entity);
                if self.config.lock_at_start {
                    step.ctx.emit(ObjectiveEffect::SetContainerLocked {
                        entity,
                        locked: true,
                    });
                }
            }
            _ => {}
        }
    }

    fn track_plane(&mut self, step: &mut Step<'_, '_>) {
        let Some(plane) = self.plane else {
            return;
        };
        match step
            .ctx
            .world()
            .observe(plane)
            .filter(|observation| observation.alive)
        {
            Some(observed) => track_tag(PositionKind::PlanePosition, observed.position, step),
            None => {
                self.plane = None;
                clear_tag(PositionKind::PlanePosition, step);
            }
        }
    }
}

fn track_tag(kind: PositionKind, position: Vec3, step: &mut Step<'_, '_>) {
    if step.quest.set_position_data(kind, position).is_none() {
        step.ctx.emit(ObjectiveEffect::ShowMarker {
            quest: step.quest.handle(),
            kind,
            position,
            label: None,
        });
    }
}

fn clear_tag(kind: PositionKind, step: &mut Step<'_, '_>) {
    if step.quest.remove_position_data(kind).is_some() {
        step.ctx.emit(ObjectiveEffect::HideMarker {
            quest: step.quest.handle(),
            kind,
        });
    }
}

/// Objective completed once the crate of an earlier air drop lands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirDropWait;

impl AirDropWait {
    pub(crate) fn update(&self, step: &mut Step<'_, '_>) {
        let Some(observed) = previous_crate(step.previous)
            .and_then(|entity| step.ctx.world().observe(entity))
            .filter(|observation| observation.alive)
        else {
            log::info!("quest {} has no crate to wait for", step.quest.name());
            clear_tag(PositionKind::CratePosition, step);
            step.status.fail();
            return;
        };
        if observed.on_ground {
            clear_tag(PositionKind::CratePosition, step);
            step.status.complete();
        } else {
            track_tag(PositionKind::CratePosition, observed.position, step);
        }
    }
}

/// Objective that stays complete while the crate of an earlier air drop survives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirDropAlive;

impl AirDropAlive {
    pub(crate) fn update(&self, step: &mut Step<'_, '_>) {
        let alive = previous_crate(step.previous)
            .map_or(false, |entity| step.ctx.world().is_alive(entity));
        if alive {
            step.status.complete();
        } else {
            log::info!("crate of quest {} was destroyed", step.quest.name());
            step.status.fail();
        }
    }
}
