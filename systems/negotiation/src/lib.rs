#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Position negotiation between a requesting client and the authoritative host.
//!
//! The host answers every [`PositionRequest`] with exactly one
//! [`PositionResponse`], found or not. The client matches responses back to
//! its quests: a response carrying a [`RequestTicket`] only ever applies to
//! the quest holding that ticket, while untagged responses fall back to the
//! first running quest with the same code that has no unread target yet.
//! Responses nobody claims are dropped.

use questline_core::{
    EntityId, PositionKind, PositionRequest, PositionResponse, QuestCode, QuestHandle,
    RequestTicket, Vec2, Vec3,
};
use questline_system_objectives::{Journal, Quest, QuestData};
use questline_system_position::{PositionQuery, PositionResolver};
use questline_world::{PoiDirectory, Terrain};
use rand::Rng;

/// Host-side answering service for position requests.
#[derive(Clone, Debug, Default)]
pub struct PositionService {
    resolver: PositionResolver,
}

impl PositionService {
    /// Creates a service resolving with the provided resolver.
    #[must_use]
    pub const fn new(resolver: PositionResolver) -> Self {
        Self { resolver }
    }

    /// Resolver used to answer requests.
    #[must_use]
    pub const fn resolver(&self) -> &PositionResolver {
        &self.resolver
    }

    /// Answers a client request. Requests are never forced: a failed search
    /// is reported as a response without a position.
    pub fn handle_request<W, R>(
        &self,
        world: &W,
        rng: &mut R,
        sender: EntityId,
        request: &PositionRequest,
        exclusions: &[Vec2],
    ) -> PositionResponse
    where
        W: Terrain + PoiDirectory + ?Sized,
        R: Rng + ?Sized,
    {
        let query = PositionQuery::new(
            request.position,
            request.min_distance,
            request.max_distance,
            request.target,
        )
        .with_tier(request.tier)
        .with_requester(sender)
        .with_exclusions(exclusions.to_vec());
        let resolution = self.resolver.resolve(world, rng, &query);
        log::debug!(
            "answering quest {} for player {}: {:?}",
            request.code.get(),
            sender.get(),
            resolution.position
        );
        PositionResponse {
            code: request.code,
            ticket: request.ticket,
            position: resolution.position,
            update_npc: request.update_npc,
            updates: resolution.updates,
        }
    }

    /// Resolves the first target of a quest offered by a giver, synchronously
    /// and with force, so the first objective starts out active.
    ///
    /// Returns `false` when the quest has no first-phase target to place.
    pub fn setup_offered_quest<W, R>(
        &self,
        world: &W,
        rng: &mut R,
        quest: &mut Quest,
        giver_position: Vec3,
        exclusions: &[Vec2],
    ) -> bool
    where
        W: Terrain + PoiDirectory + ?Sized,
        R: Rng + ?Sized,
    {
        let Some(config) = quest.first_reach_config().cloned() else {
            return false;
        };
        if !config.target.creates_position() {
            return false;
        }

        let anchor = config
            .anchor
            .position_kind()
            .and_then(|kind| quest.data().position_data(kind))
            .unwrap_or(giver_position);
        let query = PositionQuery::new(
            anchor,
            config.min_distance,
            config.max_distance,
            config.target,
        )
        .with_tier(config.tier)
        .with_exclusions(exclusions.to_vec())
        .with_force(true);
        let resolution = self.resolver.resolve(world, rng, &query);
        let Some(position) = resolution.position else {
            log::warn!(
                "offered quest {} has no {:?} target",
                quest.data().name(),
                config.target
            );
            return false;
        };

        let data = quest.data_mut();
        data.set_position(position);
        for update in &resolution.updates {
            let _ = data.set_position_data(update.kind, update.value.as_vec3());
        }
        log::debug!("offered quest {} placed at {position}", data.name());
        true
    }
}

/// Why a response was not applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// No running quest holds the ticket.
    UnknownTicket(RequestTicket),
    /// No running quest with the code is waiting for a target.
    NoWaitingQuest(QuestCode),
}

/// Outcome of matching a response against a journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// The response was stored on the quest.
    Applied {
        /// Quest that received the response.
        quest: QuestHandle,
    },
    /// The response matched nothing and was discarded.
    Dropped {
        /// Why nothing matched.
        reason: DropReason,
    },
}

/// Matches a host response to the journal's waiting quest and stores it.
///
/// Applying a response clears the quest's pending ticket, so delivering the
/// same response twice leaves the journal untouched the second time.
pub fn reconcile(journal: &mut Journal, response: &PositionResponse) -> Reconciliation {
    let candidate = match response.ticket {
        Some(ticket) => journal.quests_mut().iter_mut().find(|quest| {
            quest.state().accepts_responses()
                && quest.data().code() == response.code
                && quest.data().pending_ticket() == Some(ticket)
        }),
        None => journal.quests_mut().iter_mut().find(|quest| {
            quest.state().accepts_responses()
                && quest.data().code() == response.code
                && quest
                    .data()
                    .position_data(PositionKind::NewTarget)
                    .is_none()
        }),
    };

    let Some(quest) = candidate else {
        let reason = match response.ticket {
            Some(ticket) => DropReason::UnknownTicket(ticket),
            None => DropReason::NoWaitingQuest(response.code),
        };
        log::debug!(
            "dropped response for quest code {}: {reason:?}",
            response.code.get()
        );
        return Reconciliation::Dropped { reason };
    };

    apply_response(quest.data_mut(), response);
    Reconciliation::Applied {
        quest: quest.handle(),
    }
}

fn apply_response(data: &mut QuestData, response: &PositionResponse) {
    data.set_pending_ticket(None);
    let Some(position) = response.position else {
        log::info!("host found no target for quest {}", data.name());
        data.mark_unresolved();
        return;
    };
    let _ = data.set_position_data(PositionKind::NewTarget, position);
    if response.update_npc {
        let _ = data.set_position_data(PositionKind::QuestGiver, position);
    }
    for update in &response.updates {
        let _ = data.set_position_data(update.kind, update.value.as_vec3());
    }
}
