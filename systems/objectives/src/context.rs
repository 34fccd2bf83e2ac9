//! What objectives may see and do while they update.

use questline_core::{EntityId, Faction, Message, PositionKind, QuestHandle, RequestTicket, Vec2, Vec3};
use questline_system_events::EventBus;
use questline_world::EntityObserver;

use crate::journal::{TicketCounter, TraderLedger};

/// Side effect requested by an objective and carried out by the session.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectiveEffect {
    /// Sends a message to the host.
    Send(Message),
    /// Shows a navigation marker for a quest position.
    ShowMarker {
        /// Quest owning the marker.
        quest: QuestHandle,
        /// Position tag the marker tracks.
        kind: PositionKind,
        /// Marker location.
        position: Vec3,
        /// Optional display label.
        label: Option<String>,
    },
    /// Removes a navigation marker.
    HideMarker {
        /// Quest owning the marker.
        quest: QuestHandle,
        /// Position tag the marker tracked.
        kind: PositionKind,
    },
    /// Starts a looping warning sound.
    PlayWarning {
        /// Quest raising the warning.
        quest: QuestHandle,
        /// Sound to play.
        sound: String,
    },
    /// Stops a warning sound.
    StopWarning {
        /// Quest that raised the warning.
        quest: QuestHandle,
        /// Sound to stop.
        sound: String,
    },
    /// Asks the host to kill an entity.
    KillEntity(EntityId),
    /// Locks or unlocks a container entity.
    SetContainerLocked {
        /// Container entity.
        entity: EntityId,
        /// New lock state.
        locked: bool,
    },
}

/// Read-only inputs shared by every objective of one journal update.
#[derive(Clone, Copy)]
pub struct ObjectiveEnv<'a> {
    /// Player owning the journal.
    pub player: EntityId,
    /// View of the live entities.
    pub world: &'a dyn EntityObserver,
    /// Session event bus.
    pub bus: &'a EventBus,
    /// Length of an in-game day in seconds.
    pub day_length_secs: f32,
}

/// Mutable update context handed down to every objective.
pub struct ObjectiveContext<'a> {
    env: ObjectiveEnv<'a>,
    effects: &'a mut Vec<ObjectiveEffect>,
    tickets: &'a mut TicketCounter,
    traders: &'a mut TraderLedger,
}

impl<'a> ObjectiveContext<'a> {
    /// Creates a context that records effects into `effects`.
    pub fn new(
        env: ObjectiveEnv<'a>,
        effects: &'a mut Vec<ObjectiveEffect>,
        tickets: &'a mut TicketCounter,
        traders: &'a mut TraderLedger,
    ) -> Self {
        Self {
            env,
            effects,
            tickets,
            traders,
        }
    }

    /// Player owning the journal.
    #[must_use]
    pub fn player(&self) -> EntityId {
        self.env.player
    }

    /// View of the live entities.
    #[must_use]
    pub fn world(&self) -> &'a dyn EntityObserver {
        self.env.world
    }

    /// Session event bus.
    #[must_use]
    pub fn bus(&self) -> &'a EventBus {
        self.env.bus
    }

    /// Length of an in-game day in seconds.
    #[must_use]
    pub fn day_length_secs(&self) -> f32 {
        self.env.day_length_secs
    }

    /// Position of the owning player while it is alive.
    #[must_use]
    pub fn player_position(&self) -> Option<Vec3> {
        self.env
            .world
            .observe(self.env.player)
            .filter(|observation| observation.alive)
            .map(|observation| observation.position)
    }

    /// Queues a side effect.
    pub fn emit(&mut self, effect: ObjectiveEffect) {
        self.effects.push(effect);
    }

    /// Allocates a journal-unique request ticket.
    pub fn next_ticket(&mut self) -> RequestTicket {
        self.tickets.allocate()
    }

    /// Records a visited trader for the faction.
    pub fn record_trader(&mut self, faction: Faction, origin: Vec2) {
        self.traders.record(faction, origin);
    }
}
