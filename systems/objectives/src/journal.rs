//! Client-side owner of quests.

use std::{collections::BTreeMap, time::Duration};

use questline_core::{EntityId, Faction, QuestHandle, RequestTicket, Vec2};
use serde::{Deserialize, Serialize};

use crate::{
    context::{ObjectiveContext, ObjectiveEffect, ObjectiveEnv},
    quest::{Quest, QuestRecord},
};

/// Allocator of journal-unique request tickets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounter {
    next: u32,
}

impl TicketCounter {
    /// Returns a fresh ticket.
    pub fn allocate(&mut self) -> RequestTicket {
        let ticket = RequestTicket::new(self.next);
        self.next = self.next.wrapping_add(1);
        ticket
    }
}

/// Trader footprints visited per faction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TraderLedger {
    visited: BTreeMap<Faction, Vec<Vec2>>,
}

impl TraderLedger {
    /// Records a visited trader origin. Duplicates are ignored.
    pub fn record(&mut self, faction: Faction, origin: Vec2) {
        let visited = self.visited.entry(faction).or_default();
        if !visited.contains(&origin) {
            log::debug!("faction {} trader at {origin} visited", faction.get());
            visited.push(origin);
        }
    }

    /// Trader origins visited for the faction, in visiting order.
    #[must_use]
    pub fn visited(&self, faction: Faction) -> &[Vec2] {
        self.visited.get(&faction).map_or(&[], Vec::as_slice)
    }
}

/// Quests of one player.
#[derive(Debug)]
pub struct Journal {
    owner: EntityId,
    quests: Vec<Quest>,
    next_handle: u32,
    tickets: TicketCounter,
    traders: TraderLedger,
}

impl Journal {
    /// Creates an empty journal for the player.
    #[must_use]
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            quests: Vec::new(),
            next_handle: 0,
            tickets: TicketCounter::default(),
            traders: TraderLedger::default(),
        }
    }

    /// Player owning the journal.
    #[must_use]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Adds a quest, assigning it a fresh handle.
    pub fn add(&mut self, mut quest: Quest) -> QuestHandle {
        self.next_handle += 1;
        let handle = QuestHandle::new(self.next_handle);
        quest.assign_handle(handle);
        log::debug!("quest {} added as {}", quest.data().name(), handle.get());
        self.quests.push(quest);
        handle
    }

    /// Quests in the order they were added.
    #[must_use]
    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    /// Mutable quests in the order they were added.
    pub fn quests_mut(&mut self) -> &mut [Quest] {
        &mut self.quests
    }

    /// Looks a quest up by handle.
    #[must_use]
    pub fn quest(&self, handle: QuestHandle) -> Option<&Quest> {
        self.quests.iter().find(|quest| quest.handle() == handle)
    }

    /// Visited traders.
    #[must_use]
    pub fn traders(&self) -> &TraderLedger {
        &self.traders
    }

    /// Starts a quest. Returns `false` for unknown or already started quests.
    pub fn start(
        &mut self,
        handle: QuestHandle,
        env: ObjectiveEnv<'_>,
        effects: &mut Vec<ObjectiveEffect>,
    ) -> bool {
        let mut ctx = ObjectiveContext::new(env, effects, &mut self.tickets, &mut self.traders);
        self.quests
            .iter_mut()
            .find(|quest| quest.handle() == handle)
            .map_or(false, |quest| quest.start(&mut ctx))
    }

    /// Updates every running quest.
    pub fn update(
        &mut self,
        dt: Duration,
        env: ObjectiveEnv<'_>,
        effects: &mut Vec<ObjectiveEffect>,
    ) {
        let seconds = dt.as_secs_f32();
        let mut ctx = ObjectiveContext::new(env, effects, &mut self.tickets, &mut self.traders);
        for quest in &mut self.quests {
            quest.update(seconds, &mut ctx);
        }
    }

    /// Fails a quest. Returns `false` for unknown quests.
    pub fn fail(
        &mut self,
        handle: QuestHandle,
        env: ObjectiveEnv<'_>,
        effects: &mut Vec<ObjectiveEffect>,
    ) -> bool {
        let mut ctx = ObjectiveContext::new(env, effects, &mut self.tickets, &mut self.traders);
        let Some(quest) = self.quests.iter_mut().find(|quest| quest.handle() == handle) else {
            return false;
        };
        quest.fail(&mut ctx);
        true
    }

    /// Hands in a quest that is ready for turn-in.
    pub fn turn_in(&mut self, handle: QuestHandle) -> bool {
        self.quests
            .iter_mut()
            .find(|quest| quest.handle() == handle)
            .map_or(false, Quest::turn_in)
    }

    /// Removes a quest. A running quest is failed first so that its
    /// coordinators stop, then every subscription it held is dropped.
    pub fn abandon(
        &mut self,
        handle: QuestHandle,
        env: ObjectiveEnv<'_>,
        effects: &mut Vec<ObjectiveEffect>,
    ) -> Option<Quest> {
        let index = self.quests.iter().position(|quest| quest.handle() == handle)?;
        let mut quest = self.quests.remove(index);
        let mut ctx = ObjectiveContext::new(env, effects, &mut self.tickets, &mut self.traders);
        quest.fail(&mut ctx);
        quest.release_hooks();
        log::info!("quest {} abandoned", quest.data().name());
        Some(quest)
    }

    /// Persisted form of the journal.
    #[must_use]
    pub fn snapshot(&self) -> JournalSnapshot {
        JournalSnapshot {
            owner: self.owner,
            next_handle: self.next_handle,
            tickets: self.tickets,
            traders: self.traders.clone(),
            quests: self.quests.iter().map(Quest::record).collect(),
        }
    }

    /// Rebuilds a journal and re-activates the running phases.
    ///
    /// Requests that were in flight when the snapshot was taken are sent again.
    pub fn restore(
        snapshot: JournalSnapshot,
        env: ObjectiveEnv<'_>,
        effects: &mut Vec<ObjectiveEffect>,
    ) -> Self {
        let mut journal = Self {
            owner: snapshot.owner,
            quests: snapshot
                .quests
                .into_iter()
                .map(Quest::from_record)
                .collect(),
            next_handle: snapshot.next_handle,
            tickets: snapshot.tickets,
            traders: snapshot.traders,
        };
        let mut ctx =
            ObjectiveContext::new(env, effects, &mut journal.tickets, &mut journal.traders);
        for quest in &mut journal.quests {
            quest.restore_hooks(&mut ctx);
        }
        log::info!(
            "journal of player {} restored with {} quests",
            journal.owner.get(),
            journal.quests.len()
        );
        journal
    }
}

/// Serializable journal state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalSnapshot {
    /// Player owning the journal.
    pub owner: EntityId,
    /// Last handle that was assigned.
    pub next_handle: u32,
    /// Ticket allocator.
    pub tickets: TicketCounter,
    /// Visited traders.
    pub traders: TraderLedger,
    /// Persisted quests.
    pub quests: Vec<QuestRecord>,
}
