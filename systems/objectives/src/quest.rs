//! Quests: shared data plus a phased list of objectives.

use std::collections::BTreeMap;

use questline_core::{
    EntityId, Faction, PositionKind, QuestCode, QuestHandle, QuestState, RequestTicket, Vec3,
};
use serde::{Deserialize, Serialize};

use crate::{
    context::{ObjectiveContext, ObjectiveEffect},
    objective::{Objective, ObjectiveRecord},
    reach::ReachPointConfig,
};

/// Quest fields shared by all of its objectives.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestData {
    handle: QuestHandle,
    name: String,
    code: QuestCode,
    state: QuestState,
    current_phase: u8,
    position: Option<Vec3>,
    positions: BTreeMap<PositionKind, Vec3>,
    giver: Option<EntityId>,
    faction: Faction,
    pending_ticket: Option<RequestTicket>,
    unresolved: bool,
    failure_requested: bool,
}

impl QuestData {
    /// Journal handle of the quest.
    #[must_use]
    pub fn handle(&self) -> QuestHandle {
        self.handle
    }

    /// Name of the quest definition.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation code shared with the host.
    #[must_use]
    pub fn code(&self) -> QuestCode {
        self.code
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> QuestState {
        self.state
    }

    /// Phase currently being worked on, starting at 1.
    #[must_use]
    pub fn current_phase(&self) -> u8 {
        self.current_phase
    }

    /// Position the quest currently points at.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    /// Assigns the quest position and mirrors it into the `Location` tag.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = Some(position);
        let _ = self.positions.insert(PositionKind::Location, position);
    }

    /// Value stored under a position tag.
    #[must_use]
    pub fn position_data(&self, kind: PositionKind) -> Option<Vec3> {
        self.positions.get(&kind).copied()
    }

    /// Stores a value under a position tag, returning the previous value.
    pub fn set_position_data(&mut self, kind: PositionKind, position: Vec3) -> Option<Vec3> {
        self.positions.insert(kind, position)
    }

    /// Removes a position tag, returning its value.
    pub fn remove_position_data(&mut self, kind: PositionKind) -> Option<Vec3> {
        self.positions.remove(&kind)
    }

    /// Iterates every position tag in tag order.
    pub fn positions(&self) -> impl Iterator<Item = (PositionKind, Vec3)> + '_ {
        self.positions.iter().map(|(kind, position)| (*kind, *position))
    }

    /// NPC that offered the quest.
    #[must_use]
    pub fn giver(&self) -> Option<EntityId> {
        self.giver
    }

    /// Faction of the quest giver.
    #[must_use]
    pub fn faction(&self) -> Faction {
        self.faction
    }

    /// Ticket of the position request in flight.
    #[must_use]
    pub fn pending_ticket(&self) -> Option<RequestTicket> {
        self.pending_ticket
    }

    /// Replaces the ticket of the position request in flight.
    pub fn set_pending_ticket(&mut self, ticket: Option<RequestTicket>) {
        self.pending_ticket = ticket;
    }

    /// Reports whether the host answered the last request without a position.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }

    /// Records that the host could not resolve the last request.
    pub fn mark_unresolved(&mut self) {
        self.unresolved = true;
    }

    pub(crate) fn clear_unresolved(&mut self) {
        self.unresolved = false;
    }

    pub(crate) fn request_failure(&mut self) {
        self.failure_requested = true;
    }
}

/// A quest owned by a journal.
///
/// Cloning copies every objective but none of their bus subscriptions.
#[derive(Clone, Debug)]
pub struct Quest {
    data: QuestData,
    objectives: Vec<Objective>,
}

impl Quest {
    /// Creates a quest that has not been started.
    pub fn new(name: impl Into<String>, code: QuestCode, faction: Faction) -> Self {
        Self {
            data: QuestData {
                handle: QuestHandle::new(0),
                name: name.into(),
                code,
                state: QuestState::NotStarted,
                current_phase: 0,
                position: None,
                positions: BTreeMap::new(),
                giver: None,
                faction,
                pending_ticket: None,
                unresolved: false,
                failure_requested: false,
            },
            objectives: Vec::new(),
        }
    }

    /// Appends an objective.
    #[must_use]
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objectives.push(objective);
        self
    }

    /// Records the NPC offering the quest.
    #[must_use]
    pub fn with_giver(mut self, giver: EntityId, position: Vec3) -> Self {
        self.data.giver = Some(giver);
        let _ = self
            .data
            .positions
            .insert(PositionKind::QuestGiver, position);
        self
    }

    /// Shared quest fields.
    #[must_use]
    pub fn data(&self) -> &QuestData {
        &self.data
    }

    /// Mutable shared quest fields.
    pub fn data_mut(&mut self) -> &mut QuestData {
        &mut self.data
    }

    /// Journal handle of the quest.
    #[must_use]
    pub fn handle(&self) -> QuestHandle {
        self.data.handle
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> QuestState {
        self.data.state
    }

    /// Objectives in definition order.
    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Highest phase any objective belongs to.
    #[must_use]
    pub fn phase_count(&self) -> u8 {
        self.objectives
            .iter()
            .map(Objective::phase)
            .max()
            .unwrap_or(0)
    }

    /// Reach settings of the first target-style objective of phase 1.
    #[must_use]
    pub fn first_reach_config(&self) -> Option<&ReachPointConfig> {
        self.objectives
            .iter()
            .filter(|objective| objective.phase() == 1)
            .find_map(Objective::reach_config)
    }

    pub(crate) fn assign_handle(&mut self, handle: QuestHandle) {
        self.data.handle = handle;
        for objective in &mut self.objectives {
            objective.set_owner(handle);
        }
    }

    /// Starts the quest at phase 1.
    pub(crate) fn start(&mut self, ctx: &mut ObjectiveContext<'_>) -> bool {
        if self.data.state != QuestState::NotStarted {
            return false;
        }
        self.data.state = QuestState::InProgress;
        self.data.current_phase = 1;
        if let Some(position) = ctx.player_position() {
            let _ = self
                .data
                .positions
                .entry(PositionKind::StartLocation)
                .or_insert(position);
        }
        for objective in &mut self.objectives {
            objective.setup(self.data.current_phase);
        }
        log::info!(
            "quest {} started with {} phases",
            self.data.name,
            self.phase_count()
        );
        self.activate_phase(ctx, false);
        self.settle(ctx);
        true
    }

    /// Updates the objectives of the current phase, then advances or fails the quest.
    pub(crate) fn update(&mut self, dt: f32, ctx: &mut ObjectiveContext<'_>) {
        if self.data.state != QuestState::InProgress {
            return;
        }
        let phase = self.data.current_phase;
        for index in 0..self.objectives.len() {
            let (previous, rest) = self.objectives.split_at_mut(index);
            let Some(objective) = rest.first_mut() else {
                continue;
            };
            if objective.phase() == phase {
                objective.update(dt, &mut self.data, ctx, previous);
            }
        }
        self.settle(ctx);
    }

    /// Advances through every phase whose required objectives are complete.
    pub fn check_for_completion(&mut self, ctx: &mut ObjectiveContext<'_>) {
        while self.data.state == QuestState::InProgress {
            let phase = self.data.current_phase;
            let finished = self
                .objectives
                .iter()
                .filter(|objective| objective.phase() == phase)
                .all(|objective| objective.is_optional() || objective.is_complete());
            if !finished {
                return;
            }

            for objective in self
                .objectives
                .iter_mut()
                .filter(|objective| objective.phase() == phase)
            {
                objective.deactivate();
            }

            if phase >= self.phase_count() {
                self.data.state = QuestState::ReadyForTurnIn;
                log::info!("quest {} is ready for turn-in", self.data.name);
                return;
            }
            self.data.current_phase = phase + 1;
            log::debug!(
                "quest {} advanced to phase {}",
                self.data.name,
                self.data.current_phase
            );
            self.activate_phase(ctx, false);
            if self.data.failure_requested {
                return;
            }
        }
    }

    /// Fails the quest, releasing every subscription and position tag.
    pub fn fail(&mut self, ctx: &mut ObjectiveContext<'_>) {
        if matches!(
            self.data.state,
            QuestState::Failed | QuestState::Completed
        ) {
            return;
        }
        let running = self.data.state == QuestState::InProgress;
        self.data.state = QuestState::Failed;
        let phase = self.data.current_phase;
        for index in 0..self.objectives.len() {
            let (previous, rest) = self.objectives.split_at_mut(index);
            let Some(objective) = rest.first_mut() else {
                continue;
            };
            if running && objective.phase() == phase {
                objective.handle_failed(&mut self.data, ctx, previous);
            }
            objective.deactivate();
        }

        let handle = self.data.handle;
        for kind in self.data.positions.keys() {
            ctx.emit(ObjectiveEffect::HideMarker { quest: handle, kind: *kind });
        }
        self.data.positions.clear();
        self.data.position = None;
        self.data.pending_ticket = None;
        self.data.unresolved = false;
        self.data.failure_requested = false;
        log::info!("quest {} failed", self.data.name);
    }

    /// Hands in a finished quest.
    pub(crate) fn turn_in(&mut self) -> bool {
        if self.data.state != QuestState::ReadyForTurnIn {
            return false;
        }
        self.data.state = QuestState::Completed;
        self.release_hooks();
        log::info!("quest {} turned in", self.data.name);
        true
    }

    /// Re-registers the current phase after loading from persistence.
    pub(crate) fn restore_hooks(&mut self, ctx: &mut ObjectiveContext<'_>) {
        if self.data.state != QuestState::InProgress {
            return;
        }
        self.activate_phase(ctx, true);
        self.settle(ctx);
    }

    pub(crate) fn release_hooks(&mut self) {
        for objective in &mut self.objectives {
            objective.deactivate();
        }
    }

    /// Persisted form of the quest.
    #[must_use]
    pub fn record(&self) -> QuestRecord {
        QuestRecord {
            handle: self.data.handle,
            name: self.data.name.clone(),
            code: self.data.code,
            state: self.data.state,
            current_phase: self.data.current_phase,
            position: self.data.position,
            positions: self.data.positions().collect(),
            giver: self.data.giver,
            faction: self.data.faction,
            objectives: self.objectives.iter().map(Objective::record).collect(),
        }
    }

    pub(crate) fn from_record(record: QuestRecord) -> Self {
        let mut quest = Self {
            data: QuestData {
                handle: record.handle,
                name: record.name,
                code: record.code,
                state: record.state,
                current_phase: record.current_phase,
                position: record.position,
                positions: record.positions.into_iter().collect(),
                giver: record.giver,
                faction: record.faction,
                pending_ticket: None,
                unresolved: false,
                failure_requested: false,
            },
            objectives: record
                .objectives
                .into_iter()
                .map(Objective::from_record)
                .collect(),
        };
        quest.assign_handle(record.handle);
        quest
    }

    fn activate_phase(&mut self, ctx: &mut ObjectiveContext<'_>, restored: bool) {
        let phase = self.data.current_phase;
        for index in 0..self.objectives.len() {
            let (previous, rest) = self.objectives.split_at_mut(index);
            let Some(objective) = rest.first_mut() else {
                continue;
            };
            if objective.phase() == phase {
                objective.activate(&mut self.data, ctx, previous, restored);
            }
        }
    }

    fn settle(&mut self, ctx: &mut ObjectiveContext<'_>) {
        if !self.data.failure_requested {
            self.check_for_completion(ctx);
        }
        if self.data.failure_requested {
            self.fail(ctx);
        }
    }
}

/// Persisted fields of a quest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestRecord {
    /// Journal handle.
    pub handle: QuestHandle,
    /// Name of the quest definition.
    pub name: String,
    /// Correlation code.
    pub code: QuestCode,
    /// Lifecycle state.
    pub state: QuestState,
    /// Phase being worked on.
    pub current_phase: u8,
    /// Position the quest points at.
    pub position: Option<Vec3>,
    /// Position tags in tag order.
    pub positions: Vec<(PositionKind, Vec3)>,
    /// NPC that offered the quest.
    pub giver: Option<EntityId>,
    /// Faction of the quest giver.
    pub faction: Faction,
    /// Persisted objectives in definition order.
    pub objectives: Vec<ObjectiveRecord>,
}
