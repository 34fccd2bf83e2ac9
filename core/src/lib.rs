#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Questline coordination engine.
//!
//! This crate defines the vocabulary that connects the host and client halves
//! of a quest. Client-side objectives describe what they need through
//! [`Message`] values, the host answers with further messages, and the
//! authoritative world broadcasts [`WorldEvent`] values about the transient
//! entities it spawns. Every system in the workspace speaks in these types so
//! the individual pieces can be tested against each other deterministically.

pub mod codec;
pub mod spawner;

use std::collections::BTreeSet;

pub use glam::{IVec3, Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use spawner::{ConfigError, RageTuning, SpawnerConfig, TargetingTuning, Window};

/// Tag searched for when resolving trader targets.
pub const TRADER_TAG: &str = "trader";

/// Unique identifier assigned to every entity by the authoritative world.
///
/// Players are entities as well, so the same identifier space is used for the
/// owners of quests and for the transient entities spawned on their behalf.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(i32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.0
    }
}

/// Identifier of an entity class known to the host (enemy type, crate type).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityClassId(u32);

impl EntityClassId {
    /// Creates a new entity class identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the class identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Correlation code shared by every quest instance of the same definition.
///
/// The code is not unique across concurrently active quests, which is why
/// responses optionally carry a [`RequestTicket`] as well.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct QuestCode(i32);

impl QuestCode {
    /// Creates a new quest correlation code.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the code.
    #[must_use]
    pub const fn get(&self) -> i32 {
        self.0
    }
}

/// Journal-unique handle addressing one quest instance on its owning peer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct QuestHandle(u32);

impl QuestHandle {
    /// Creates a new quest handle.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Correlation id attached to a position request and echoed by the host.
///
/// Tickets are allocated by the requesting journal. A response carrying a
/// ticket can only ever be applied to the quest that issued it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RequestTicket(u32);

impl RequestTicket {
    /// Creates a new request ticket.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the ticket.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Faction that owns a trader or quest giver.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Faction(u8);

impl Faction {
    /// Creates a new faction identifier.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the faction.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Difficulty tier used to filter point-of-interest candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tier(u8);

impl Tier {
    /// Tier value accepting candidates of every difficulty.
    pub const ANY: Self = Self(u8::MAX);

    /// Creates a new tier filter.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Reports whether the tier accepts candidates of every difficulty.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        self.0 == u8::MAX
    }

    /// Reports whether a candidate with the provided difficulty passes the filter.
    #[must_use]
    pub const fn accepts(&self, difficulty: u8) -> bool {
        self.is_any() || self.0 == difficulty
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::ANY
    }
}

/// Error raised when a wire tag does not name a known variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TagError {
    /// The byte does not correspond to any position kind.
    #[error("unknown position kind tag {0}")]
    PositionKind(u8),
    /// The byte does not correspond to any target kind.
    #[error("unknown target kind tag {0}")]
    TargetKind(u8),
}

/// Closed set of position tags a quest may carry in its position data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum PositionKind {
    /// Location of the NPC that offered the quest.
    QuestGiver = 0,
    /// Location currently tracked by the quest marker.
    Location = 1,
    /// Origin corner of the targeted point-of-interest footprint.
    PoiPosition = 2,
    /// Size of the targeted point-of-interest footprint.
    PoiSize = 3,
    /// Location of the trader associated with the quest.
    TraderPosition = 9,
    /// Last observed position of an air-drop mover.
    PlanePosition = 51,
    /// Last observed position of an air-drop payload.
    CratePosition = 52,
    /// Location the quest was started from.
    StartLocation = 254,
    /// Fresh target handed over by the host, consumed by the waiting objective.
    NewTarget = 255,
}

impl PositionKind {
    /// Every position kind in wire-tag order.
    pub const ALL: [Self; 9] = [
        Self::QuestGiver,
        Self::Location,
        Self::PoiPosition,
        Self::PoiSize,
        Self::TraderPosition,
        Self::PlanePosition,
        Self::CratePosition,
        Self::StartLocation,
        Self::NewTarget,
    ];

    /// Wire tag of the position kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl From<PositionKind> for u8 {
    fn from(kind: PositionKind) -> Self {
        kind.tag()
    }
}

impl TryFrom<u8> for PositionKind {
    type Error = TagError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == value)
            .ok_or(TagError::PositionKind(value))
    }
}

/// Strategy used by the host to pick a target location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum TargetKind {
    /// Random point of interest drawn from a tier-filtered candidate list.
    Poi = 0,
    /// Reuses a position the quest already carries.
    Reuse = 1,
    /// Random flat terrain outside any point of interest.
    FlatArea = 2,
    /// Closest trader other than the one currently occupied.
    Trader = 3,
    /// Closest trader not yet visited for the quest's faction.
    TraderNext = 4,
    /// Closest trader, including the one currently occupied.
    TraderClosest = 5,
}

impl TargetKind {
    /// Every target kind in wire-tag order.
    pub const ALL: [Self; 6] = [
        Self::Poi,
        Self::Reuse,
        Self::FlatArea,
        Self::Trader,
        Self::TraderNext,
        Self::TraderClosest,
    ];

    /// Wire tag of the target kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Reports whether the target resolves to a trader.
    #[must_use]
    pub const fn is_trader(self) -> bool {
        matches!(self, Self::Trader | Self::TraderNext | Self::TraderClosest)
    }

    /// Reports whether objectives with this target must ask the host for a position.
    #[must_use]
    pub const fn creates_position(self) -> bool {
        !matches!(self, Self::Reuse)
    }
}

impl From<TargetKind> for u8 {
    fn from(kind: TargetKind) -> Self {
        kind.tag()
    }
}

impl TryFrom<u8> for TargetKind {
    type Error = TagError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == value)
            .ok_or(TagError::TargetKind(value))
    }
}

/// Reference point from which a target position is searched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor {
    /// The position currently assigned to the quest.
    QuestPosition,
    /// The NPC that offered the quest.
    #[default]
    QuestGiver,
    /// Where the quest was started.
    QuestStart,
    /// The trader tracked in the quest's position data.
    TraderPosition,
    /// The player owning the quest.
    Player,
}

impl Anchor {
    /// Position kind consulted for anchors backed by quest position data.
    #[must_use]
    pub const fn position_kind(self) -> Option<PositionKind> {
        match self {
            Self::QuestGiver => Some(PositionKind::QuestGiver),
            Self::QuestStart => Some(PositionKind::StartLocation),
            Self::TraderPosition => Some(PositionKind::TraderPosition),
            Self::QuestPosition | Self::Player => None,
        }
    }
}

/// User-facing state of a single objective.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveState {
    /// The objective's phase has not been reached.
    #[default]
    NotStarted,
    /// The objective is being worked on.
    InProgress,
    /// The objective is satisfied but close to being lost.
    Warning,
    /// The objective is satisfied.
    Complete,
    /// The objective was lost for good.
    Failed,
}

/// Lifecycle state of a quest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestState {
    /// The quest was offered but not accepted yet.
    #[default]
    NotStarted,
    /// The quest is running.
    InProgress,
    /// Every phase is satisfied and the quest awaits hand-in.
    ReadyForTurnIn,
    /// The quest was handed in.
    Completed,
    /// The quest failed.
    Failed,
}

impl QuestState {
    /// Reports whether the quest may still receive position responses.
    #[must_use]
    pub const fn accepts_responses(self) -> bool {
        matches!(self, Self::InProgress | Self::ReadyForTurnIn)
    }
}

/// Role an entity plays in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRole {
    /// A connected player.
    Player,
    /// A hostile entity spawned for a horde.
    Enemy,
    /// A vehicle crossing the sky on a fixed heading.
    Mover,
    /// A container delivered by a mover that falls to the ground.
    Payload,
}

/// Reason an entity left the world without being killed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalReason {
    /// The entity despawned naturally.
    Despawned,
    /// The chunk holding the entity was unloaded.
    Unloaded,
    /// The entity left the playable area.
    OutOfBounds,
}

/// Entity lifecycle notifications published by the authoritative world.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldEvent {
    /// An entity died.
    EntityKilled {
        /// Entity that died.
        deceased: EntityId,
        /// Entity credited with the kill, if any.
        killer: Option<EntityId>,
    },
    /// An entity entered the world.
    EntitySpawned {
        /// Entity that was spawned.
        entity: EntityId,
        /// Class of the spawned entity.
        class: EntityClassId,
        /// Role the entity plays in the world.
        role: EntityRole,
        /// Player on whose behalf the entity was spawned.
        spawned_by: Option<EntityId>,
    },
    /// An entity left the world without dying.
    EntityRemoved {
        /// Entity that was removed.
        entity: EntityId,
        /// Why the entity was removed.
        reason: RemovalReason,
    },
}

impl WorldEvent {
    /// Kind discriminant of the event, used for subscription filtering.
    #[must_use]
    pub const fn kind(&self) -> WorldEventKind {
        match self {
            Self::EntityKilled { .. } => WorldEventKind::Killed,
            Self::EntitySpawned { .. } => WorldEventKind::Spawned,
            Self::EntityRemoved { .. } => WorldEventKind::Removed,
        }
    }
}

/// Discriminant of [`WorldEvent`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorldEventKind {
    /// Matches [`WorldEvent::EntityKilled`].
    Killed,
    /// Matches [`WorldEvent::EntitySpawned`].
    Spawned,
    /// Matches [`WorldEvent::EntityRemoved`].
    Removed,
}

/// Side-channel update of a position tag carried by a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Tag being updated.
    pub kind: PositionKind,
    /// Integer world coordinates stored under the tag.
    pub value: IVec3,
}

impl PositionUpdate {
    /// Creates a new side-channel update.
    #[must_use]
    pub const fn new(kind: PositionKind, value: IVec3) -> Self {
        Self { kind, value }
    }
}

/// Client request asking the host to resolve a target position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    /// Correlation code of the requesting quest.
    pub code: QuestCode,
    /// Optional unique correlation id issued by the requesting journal.
    pub ticket: Option<RequestTicket>,
    /// Minimum distance between anchor and target.
    pub min_distance: f32,
    /// Maximum distance between anchor and target.
    pub max_distance: f32,
    /// Anchor the search starts from.
    pub position: Vec3,
    /// Strategy used to pick the target.
    pub target: TargetKind,
    /// Faction of the quest, used for trader exclusion lists.
    pub faction: Faction,
    /// Whether the quest giver should move to the resolved target.
    pub update_npc: bool,
    /// Difficulty tier for point-of-interest searches.
    pub tier: Tier,
}

/// Host answer to a [`PositionRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionResponse {
    /// Correlation code copied from the request.
    pub code: QuestCode,
    /// Ticket copied from the request.
    pub ticket: Option<RequestTicket>,
    /// Resolved target, or `None` when the host found no valid location.
    pub position: Option<Vec3>,
    /// Whether the quest giver should move to the resolved target.
    pub update_npc: bool,
    /// Additional position tags to store alongside the target.
    pub updates: Vec<PositionUpdate>,
}

/// Every message exchanged between client and host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Client asks the host to resolve a position.
    PositionRequest(PositionRequest),
    /// Host answers a position request.
    PositionResponse(PositionResponse),
    /// Client asks the host to start a horde spawner.
    StartSpawnerTask {
        /// Player requesting the spawner. The host overwrites it with the sender.
        player: EntityId,
        /// Spawner configuration.
        config: SpawnerConfig,
    },
    /// Client asks the host to stop its horde spawner.
    StopSpawnerTask {
        /// Player whose spawner should stop.
        player: EntityId,
    },
    /// Client asks the host to fly in an air drop.
    StartAirDropTask {
        /// Player requesting the air drop. The host overwrites it with the sender.
        player: EntityId,
        /// Class of the payload entity to deliver.
        payload_class: EntityClassId,
        /// Column the payload should land in.
        position: Vec3,
    },
}

impl Message {
    /// Reports whether the host is responsible for processing the message.
    #[must_use]
    pub const fn is_host_bound(&self) -> bool {
        !matches!(self, Self::PositionResponse(_))
    }
}

/// Set of transient entities owned by a single coordinator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackedEntitySet {
    entities: BTreeSet<EntityId>,
}

impl TrackedEntitySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an entity. Returns `false` when it was tracked already.
    pub fn insert(&mut self, entity: EntityId) -> bool {
        self.entities.insert(entity)
    }

    /// Stops tracking an entity. Returns `false` when it was not tracked.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        self.entities.remove(&entity)
    }

    /// Reports whether the entity is tracked.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains(&entity)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Reports whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates tracked entities in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    /// Drops every entity for which `alive` returns `false` and returns them.
    pub fn prune(&mut self, mut alive: impl FnMut(EntityId) -> bool) -> Vec<EntityId> {
        let mut dropped = Vec::new();
        self.entities.retain(|entity| {
            let keep = alive(*entity);
            if !keep {
                dropped.push(*entity);
            }
            keep
        });
        dropped
    }

    /// Picks a tracked entity uniformly at random.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<EntityId> {
        if self.entities.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.entities.len());
        self.entities.iter().nth(index).copied()
    }

    /// Removes and returns every tracked entity.
    pub fn drain(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.entities).into_iter().collect()
    }
}

/// Computes the horizontal (xz-plane) distance between two positions.
#[must_use]
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x, a.z).distance(Vec2::new(b.x, b.z))
}

/// Converts a world position into integer block coordinates.
#[must_use]
pub fn to_block(position: Vec3) -> IVec3 {
    position.floor().as_ivec3()
}
