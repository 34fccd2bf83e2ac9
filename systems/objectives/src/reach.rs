//! Reaching a host-selected location.

use questline_core::{
    Anchor, Message, PositionKind, PositionRequest, TargetKind, Tier, Vec2, Vec3,
};
use serde::{Deserialize, Serialize};

use crate::{
    context::ObjectiveEffect,
    objective::Step,
    progress::TargetProgress,
};

/// Tuning of a reach objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachPointConfig {
    /// Where the host starts its search.
    pub anchor: Anchor,
    /// How the host picks the target.
    pub target: TargetKind,
    /// Minimum distance between anchor and target.
    pub min_distance: f32,
    /// Maximum distance between anchor and target.
    pub max_distance: f32,
    /// Distance at which the target counts as reached.
    pub completion_distance: f32,
    /// Whether leaving the target again keeps the objective complete.
    pub only_reach_once: bool,
    /// Seconds between distance checks.
    pub tick_interval: f32,
    /// Whether the quest giver moves to the resolved target.
    pub update_npc: bool,
    /// Difficulty tier forwarded to point-of-interest searches.
    pub tier: Tier,
    /// Label shown next to the navigation marker.
    pub marker: Option<String>,
}

impl Default for ReachPointConfig {
    fn default() -> Self {
        Self {
            anchor: Anchor::QuestGiver,
            target: TargetKind::FlatArea,
            min_distance: 40.0,
            max_distance: 60.0,
            completion_distance: 10.0,
            only_reach_once: true,
            tick_interval: 1.0,
            update_npc: false,
            tier: Tier::ANY,
            marker: None,
        }
    }
}

/// Target negotiation shared by every target-style objective.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct TargetAcquisition {
    progress: TargetProgress,
    target: Option<Vec3>,
}

impl TargetAcquisition {
    pub(crate) fn progress(&self) -> TargetProgress {
        self.progress
    }

    pub(crate) fn target(&self) -> Option<Vec3> {
        self.target
    }

    pub(crate) fn is_active(&self) -> bool {
        self.progress >= TargetProgress::Active
    }

    pub(crate) fn advance(&mut self, next: TargetProgress, revocable: bool) -> bool {
        if !self.progress.can_advance_to(next, revocable) {
            log::warn!(
                "ignored target progress change {:?} -> {next:?}",
                self.progress
            );
            return false;
        }
        self.progress = next;
        true
    }

    /// Drives the objective from "no target" to "target active".
    pub(crate) fn acquire(&mut self, config: &ReachPointConfig, step: &mut Step<'_, '_>) {
        match self.progress {
            TargetProgress::NotStarted => {
                if step.phase == 1 {
                    if let Some(position) = step.quest.position() {
                        self.mark_active(position, config, step);
                        return;
                    }
                }
                if config.target.creates_position() {
                    self.request(config, step);
                } else {
                    self.reuse(config, step);
                }
            }
            TargetProgress::WaitingForHostAnswer => {
                if let Some(position) = step.quest.position_data(PositionKind::NewTarget) {
                    self.mark_active(position, config, step);
                } else if step.quest.is_unresolved() {
                    log::warn!(
                        "host found no target for quest {}, failing objective",
                        step.quest.name()
                    );
                    step.status.fail();
                }
            }
            TargetProgress::Active | TargetProgress::Reached => {}
        }
    }

    /// Re-shows the marker of a restored target and re-sends lost requests.
    pub(crate) fn restore(&mut self, config: &ReachPointConfig, step: &mut Step<'_, '_>) {
        self.progress = self.progress.rewound();
        if !self.is_active() {
            return;
        }
        let restored = step
            .quest
            .position_data(PositionKind::NewTarget)
            .or_else(|| step.quest.position_data(PositionKind::Location));
        match restored {
            Some(position) => {
                self.target = Some(position);
                step.ctx.emit(ObjectiveEffect::ShowMarker {
                    quest: step.quest.handle(),
                    kind: PositionKind::Location,
                    position,
                    label: config.marker.clone(),
                });
            }
            None => {
                log::warn!(
                    "restored quest {} lost its target, searching again",
                    step.quest.name()
                );
                self.progress = TargetProgress::NotStarted;
                self.target = None;
            }
        }
    }

    fn request(&mut self, config: &ReachPointConfig, step: &mut Step<'_, '_>) {
        let Some(anchor) = anchor_position(config.anchor, step) else {
            log::debug!("no anchor for quest {} yet", step.quest.name());
            return;
        };
        let _ = step.quest.remove_position_data(PositionKind::NewTarget);
        step.quest.clear_unresolved();
        let ticket = step.ctx.next_ticket();
        step.quest.set_pending_ticket(Some(ticket));
        let request = PositionRequest {
            code: step.quest.code(),
            ticket: Some(ticket),
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            position: anchor,
            target: config.target,
            faction: step.quest.faction(),
            update_npc: config.update_npc,
            tier: config.tier,
        };
        log::debug!(
            "quest {} requests a {:?} target near {anchor} (ticket {})",
            step.quest.name(),
            config.target,
            ticket.get()
        );
        step.ctx
            .emit(ObjectiveEffect::Send(Message::PositionRequest(request)));
        let _ = self.advance(TargetProgress::WaitingForHostAnswer, false);
    }

    fn reuse(&mut self, config: &ReachPointConfig, step: &mut Step<'_, '_>) {
        let reused = step
            .quest
            .position_data(PositionKind::NewTarget)
            .or_else(|| step.quest.position_data(PositionKind::Location))
            .or_else(|| step.quest.position());
        match reused {
            Some(position) => self.mark_active(position, config, step),
            None => {
                log::warn!(
                    "quest {} has no position to reuse, failing objective",
                    step.quest.name()
                );
                step.status.fail();
            }
        }
    }

    fn mark_active(&mut self, position: Vec3, config: &ReachPointConfig, step: &mut Step<'_, '_>) {
        step.quest.set_position(position);
        self.target = Some(position);
        step.ctx.emit(ObjectiveEffect::ShowMarker {
            quest: step.quest.handle(),
            kind: PositionKind::Location,
            position,
            label: config.marker.clone(),
        });
        let _ = self.advance(TargetProgress::Active, false);
    }
}

fn anchor_position(anchor: Anchor, step: &Step<'_, '_>) -> Option<Vec3> {
    let anchored = match anchor {
        Anchor::Player => None,
        Anchor::QuestPosition => step.quest.position(),
        other => other
            .position_kind()
            .and_then(|kind| step.quest.position_data(kind)),
    };
    anchored.or_else(|| step.ctx.player_position())
}

/// Objective completed by walking up to a host-selected target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReachPoint {
    config: ReachPointConfig,
    acquisition: TargetAcquisition,
    #[serde(skip)]
    distance: Option<f32>,
    #[serde(skip)]
    since_tick: f32,
}

impl ReachPoint {
    /// Creates a reach objective.
    #[must_use]
    pub fn new(config: ReachPointConfig) -> Self {
        Self {
            config,
            acquisition: TargetAcquisition::default(),
            distance: None,
            since_tick: 0.0,
        }
    }

    /// Tuning of the objective.
    #[must_use]
    pub fn config(&self) -> &ReachPointConfig {
        &self.config
    }

    /// Current progress.
    #[must_use]
    pub fn progress(&self) -> TargetProgress {
        self.acquisition.progress()
    }

    /// Active target, once known.
    #[must_use]
    pub fn target(&self) -> Option<Vec3> {
        self.acquisition.target()
    }

    /// Player distance measured at the last check.
    #[must_use]
    pub fn distance(&self) -> Option<f32> {
        self.distance
    }

    pub(crate) fn activate(&mut self, restored: bool, step: &mut Step<'_, '_>) {
        if restored {
            self.acquisition.restore(&self.config, step);
        }
        self.since_tick = self.config.tick_interval;
    }

    pub(crate) fn update(&mut self, dt: f32, step: &mut Step<'_, '_>) {
        if !self.acquisition.is_active() {
            self.acquisition.acquire(&self.config, step);
            if !self.acquisition.is_active() {
                return;
            }
        }

        self.since_tick += dt;
        if self.since_tick < self.config.tick_interval {
            return;
        }
        self.since_tick = 0.0;

        let (Some(target), Some(player)) = (self.acquisition.target(), step.ctx.player_position())
        else {
            return;
        };
        let distance = player.distance(target);
        self.distance = Some(distance);

        let revocable = !self.config.only_reach_once;
        match self.acquisition.progress() {
            TargetProgress::Active if distance <= self.config.completion_distance => {
                if self.acquisition.advance(TargetProgress::Reached, revocable) {
                    step.status.complete();
                    self.on_reached(step);
                }
            }
            TargetProgress::Reached if revocable && distance >= self.config.completion_distance => {
                if self.acquisition.advance(TargetProgress::Active, revocable) {
                    step.status.revoke();
                }
            }
            _ => {}
        }
    }

    fn on_reached(&self, step: &mut Step<'_, '_>) {
        log::debug!("quest {} target reached", step.quest.name());
        if !(self.config.update_npc && self.config.target.is_trader()) {
            return;
        }
        if let Some(origin) = step.quest.position_data(PositionKind::PoiPosition) {
            let faction = step.quest.faction();
            step.ctx.record_trader(faction, Vec2::new(origin.x, origin.z));
        }
    }
}
