//! A single objective: shared state machine plus kind-specific behavior.

use questline_core::{EntityId, ObjectiveState, QuestHandle, WorldEvent};
use questline_system_events::{EventBus, Interest, Subscription};
use serde::{Deserialize, Serialize};

use crate::{
    air_drop::{AirDrop, AirDropAlive, AirDropWait},
    context::ObjectiveContext,
    countdown::CountDown,
    kill::KillCount,
    progress::{Completion, TargetProgress},
    quest::QuestData,
    reach::{ReachPoint, ReachPointConfig},
    stay::StayNear,
};

/// Behavior attached to an objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectiveKind {
    /// Travel to a host-selected location.
    ReachPoint(ReachPoint),
    /// Remain within a radius of the quest position.
    StayNear(StayNear),
    /// Timer that completes or fails the phase.
    CountDown(CountDown),
    /// Kill enemies spawned by a horde spawner.
    KillCount(KillCount),
    /// Call in an air drop at a host-selected location.
    AirDrop(AirDrop),
    /// Wait until the delivered crate lands.
    AirDropWait(AirDropWait),
    /// Keep the delivered crate alive.
    AirDropAlive(AirDropAlive),
}

impl From<ReachPoint> for ObjectiveKind {
    fn from(kind: ReachPoint) -> Self {
        Self::ReachPoint(kind)
    }
}

impl From<StayNear> for ObjectiveKind {
    fn from(kind: StayNear) -> Self {
        Self::StayNear(kind)
    }
}

impl From<CountDown> for ObjectiveKind {
    fn from(kind: CountDown) -> Self {
        Self::CountDown(kind)
    }
}

impl From<KillCount> for ObjectiveKind {
    fn from(kind: KillCount) -> Self {
        Self::KillCount(kind)
    }
}

impl From<AirDrop> for ObjectiveKind {
    fn from(kind: AirDrop) -> Self {
        Self::AirDrop(kind)
    }
}

impl From<AirDropWait> for ObjectiveKind {
    fn from(kind: AirDropWait) -> Self {
        Self::AirDropWait(kind)
    }
}

impl From<AirDropAlive> for ObjectiveKind {
    fn from(kind: AirDropAlive) -> Self {
        Self::AirDropAlive(kind)
    }
}

/// Displayed state and completion latch of an objective.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Status {
    state: ObjectiveState,
    completion: Completion,
}

impl Status {
    pub(crate) fn complete(&mut self) {
        let _ = self.completion.set_complete();
        if self.completion.is_complete() {
            self.state = ObjectiveState::Complete;
        }
    }

    pub(crate) fn warn(&mut self) {
        if self.completion.is_complete() {
            self.state = ObjectiveState::Warning;
        }
    }

    pub(crate) fn revoke(&mut self) {
        if self.completion.revoke() {
            self.state = ObjectiveState::InProgress;
        }
    }

    pub(crate) fn fail(&mut self) {
        self.completion.fail();
        self.state = ObjectiveState::Failed;
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.completion.is_failed()
    }
}

/// Scoped bus registration owned by an objective.
#[derive(Debug, Default)]
pub(crate) struct Hooks(Option<Subscription>);

impl Hooks {
    pub(crate) fn ensure(&mut self, bus: &EventBus, interest: Interest) {
        if self.0.is_none() {
            self.0 = Some(bus.subscribe(interest));
        }
    }

    pub(crate) fn release(&mut self) {
        self.0 = None;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.0.is_some()
    }

    fn drain(&mut self) -> Vec<WorldEvent> {
        self.0.as_mut().map(Subscription::drain).unwrap_or_default()
    }
}

/// Everything a kind may touch during one activation or update.
pub(crate) struct Step<'s, 'a> {
    pub(crate) phase: u8,
    pub(crate) optional: bool,
    pub(crate) status: &'s mut Status,
    pub(crate) hooks: &'s mut Hooks,
    pub(crate) quest: &'s mut QuestData,
    pub(crate) ctx: &'s mut ObjectiveContext<'a>,
    pub(crate) previous: &'s [Objective],
}

/// One objective of a quest.
///
/// The bus subscription is never cloned: a cloned objective starts detached
/// and registers again when its phase is activated.
#[derive(Debug)]
pub struct Objective {
    id: String,
    phase: u8,
    optional: bool,
    hidden: bool,
    status: Status,
    owner: QuestHandle,
    kind: ObjectiveKind,
    hooks: Hooks,
}

impl Clone for Objective {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            phase: self.phase,
            optional: self.optional,
            hidden: self.hidden,
            status: self.status,
            owner: self.owner,
            kind: self.kind.clone(),
            hooks: Hooks::default(),
        }
    }
}

impl Objective {
    /// Creates a required, visible objective active during `phase`.
    pub fn new(id: impl Into<String>, phase: u8, kind: impl Into<ObjectiveKind>) -> Self {
        Self {
            id: id.into(),
            phase,
            optional: false,
            hidden: false,
            status: Status::default(),
            owner: QuestHandle::new(0),
            kind: kind.into(),
            hooks: Hooks::default(),
        }
    }

    /// Marks the objective optional: its phase may advance without it and
    /// its failure does not fail the quest.
    #[must_use]
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Hides the objective from the quest log.
    #[must_use]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Identifier of the objective within its quest definition.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Phase during which the objective is active.
    #[must_use]
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Reports whether the objective is optional.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Reports whether the objective is hidden from the quest log.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Displayed state.
    #[must_use]
    pub fn state(&self) -> ObjectiveState {
        self.status.state
    }

    /// Reports whether the objective currently counts as complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.completion.is_complete()
    }

    /// Reports whether the objective failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    /// Quest owning the objective.
    #[must_use]
    pub fn owner(&self) -> QuestHandle {
        self.owner
    }

    /// Kind-specific behavior and state.
    #[must_use]
    pub fn kind(&self) -> &ObjectiveKind {
        &self.kind
    }

    /// Reports whether the objective holds a bus subscription.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.hooks.is_active()
    }

    /// Progress of target-style objectives.
    #[must_use]
    pub fn target_progress(&self) -> Option<TargetProgress> {
        match &self.kind {
            ObjectiveKind::ReachPoint(reach) => Some(reach.progress()),
            ObjectiveKind::AirDrop(drop) => Some(drop.progress()),
            _ => None,
        }
    }

    /// Reach settings of target-style objectives.
    #[must_use]
    pub fn reach_config(&self) -> Option<&ReachPointConfig> {
        match &self.kind {
            ObjectiveKind::ReachPoint(reach) => Some(reach.config()),
            ObjectiveKind::AirDrop(drop) => Some(&drop.config().reach),
            _ => None,
        }
    }

    /// Crate delivered by an air-drop objective.
    #[must_use]
    pub fn air_drop_crate(&self) -> Option<EntityId> {
        match &self.kind {
            ObjectiveKind::AirDrop(drop) => drop.crate_entity(),
            _ => None,
        }
    }

    /// Persisted form of the objective.
    #[must_use]
    pub fn record(&self) -> ObjectiveRecord {
        ObjectiveRecord {
            id: self.id.clone(),
            phase: self.phase,
            optional: self.optional,
            hidden: self.hidden,
            state: self.status.state,
            completion: self.status.completion,
            kind: self.kind.clone(),
        }
    }

    /// Rebuilds a detached objective from its persisted form.
    #[must_use]
    pub fn from_record(record: ObjectiveRecord) -> Self {
        Self {
            id: record.id,
            phase: record.phase,
            optional: record.optional,
            hidden: record.hidden,
            status: Status {
                state: record.state,
                completion: record.completion,
            },
            owner: QuestHandle::new(0),
            kind: record.kind,
            hooks: Hooks::default(),
        }
    }

    pub(crate) fn set_owner(&mut self, owner: QuestHandle) {
        self.owner = owner;
    }

    /// Latches objectives of phases the quest already left.
    pub(crate) fn setup(&mut self, current_phase: u8) {
        if self.phase < current_phase {
            self.status.complete();
        }
    }

    pub(crate) fn activate(
        &mut self,
        quest: &mut QuestData,
        ctx: &mut ObjectiveContext<'_>,
        previous: &[Objective],
        restored: bool,
    ) {
        if self.status.is_failed() {
            return;
        }
        if self.status.state == ObjectiveState::NotStarted {
            self.status.state = ObjectiveState::InProgress;
        }
        {
            let mut step = Step {
                phase: self.phase,
                optional: self.optional,
                status: &mut self.status,
                hooks: &mut self.hooks,
                quest: &mut *quest,
                ctx: &mut *ctx,
                previous,
            };
            match &mut self.kind {
                ObjectiveKind::ReachPoint(reach) => reach.activate(restored, &mut step),
                ObjectiveKind::StayNear(stay) => stay.activate(&mut step),
                ObjectiveKind::CountDown(countdown) => countdown.activate(&mut step),
                ObjectiveKind::KillCount(kill) => kill.activate(&mut step),
                ObjectiveKind::AirDrop(drop) => drop.activate(restored, &mut step),
                ObjectiveKind::AirDropWait(_) | ObjectiveKind::AirDropAlive(_) => {}
            }
        }
        log::debug!(
            "objective {} of quest {} activated",
            self.id,
            self.owner.get()
        );
        self.propagate_failure(quest);
    }

    pub(crate) fn update(
        &mut self,
        dt: f32,
        quest: &mut QuestData,
        ctx: &mut ObjectiveContext<'_>,
        previous: &[Objective],
    ) {
        if self.status.is_failed() {
            return;
        }
        let events = self.hooks.drain();
        {
            let mut step = Step {
                phase: self.phase,
                optional: self.optional,
                status: &mut self.status,
                hooks: &mut self.hooks,
                quest: &mut *quest,
                ctx: &mut *ctx,
                previous,
            };
            match &mut self.kind {
                ObjectiveKind::ReachPoint(reach) => reach.update(dt, &mut step),
                ObjectiveKind::StayNear(stay) => stay.update(&mut step),
                ObjectiveKind::CountDown(countdown) => countdown.update(dt, &mut step),
                ObjectiveKind::KillCount(kill) => kill.update(&events, &mut step),
                ObjectiveKind::AirDrop(drop) => drop.update(dt, &events, &mut step),
                ObjectiveKind::AirDropWait(wait) => wait.update(&mut step),
                ObjectiveKind::AirDropAlive(alive) => alive.update(&mut step),
            }
        }
        self.propagate_failure(quest);
    }

    /// Runs kind-specific cleanup when the owning quest fails.
    pub(crate) fn handle_failed(
        &mut self,
        quest: &mut QuestData,
        ctx: &mut ObjectiveContext<'_>,
        previous: &[Objective],
    ) {
        {
            let mut step = Step {
                phase: self.phase,
                optional: self.optional,
                status: &mut self.status,
                hooks: &mut self.hooks,
                quest,
                ctx,
                previous,
            };
            match &mut self.kind {
                ObjectiveKind::StayNear(stay) => stay.handle_failed(&mut step),
                ObjectiveKind::KillCount(kill) => kill.handle_failed(&mut step),
                ObjectiveKind::AirDrop(drop) => drop.handle_failed(&mut step),
                ObjectiveKind::ReachPoint(_)
                | ObjectiveKind::CountDown(_)
                | ObjectiveKind::AirDropWait(_)
                | ObjectiveKind::AirDropAlive(_) => {}
            }
        }
        if !self.status.completion.is_complete() {
            self.status.fail();
        }
    }

    /// Drops the bus subscription.
    pub(crate) fn deactivate(&mut self) {
        self.hooks.release();
    }

    fn propagate_failure(&self, quest: &mut QuestData) {
        if self.status.is_failed() && !self.optional {
            log::info!(
                "required objective {} failed, failing quest {}",
                self.id,
                quest.name()
            );
            quest.request_failure();
        }
    }
}

/// Crate delivered by the most recent earlier air-drop objective.
pub(crate) fn previous_crate(previous: &[Objective]) -> Option<EntityId> {
    previous.iter().rev().find_map(Objective::air_drop_crate)
}

/// Persisted fields of an objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveRecord {
    /// Identifier within the quest definition.
    pub id: String,
    /// Phase during which the objective is active.
    pub phase: u8,
    /// Whether the objective is optional.
    pub optional: bool,
    /// Whether the objective is hidden.
    pub hidden: bool,
    /// Displayed state.
    pub state: ObjectiveState,
    /// Completion latch.
    pub completion: Completion,
    /// Kind-specific persisted state.
    pub kind: ObjectiveKind,
}
