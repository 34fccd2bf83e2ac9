#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for Questline.
//!
//! The coordination systems never own terrain, points of interest or live
//! entities. They consume them through the collaborator traits declared here:
//! [`Terrain`], [`PoiDirectory`], [`EntityObserver`] and [`EntityHost`].
//! [`SimWorld`] is the in-memory implementation used by the session adapter
//! and by every integration test. Mutations that do not originate from a
//! coordinator are submitted with [`apply`], mirroring how a game loop would
//! feed player movement and combat results into the simulation.

pub mod seed;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use questline_core::{
    horizontal_distance, EntityClassId, EntityId, EntityRole, IVec3, RemovalReason, Tier, Vec2,
    Vec3, WorldEvent,
};
use serde::{Deserialize, Serialize};

const DEFAULT_HALF_EXTENT: f32 = 2_048.0;
const DEFAULT_GROUND_HEIGHT: f32 = 70.0;
const DEFAULT_LOAD_RADIUS: f32 = 48.0;
const DEFAULT_PAYLOAD_FALL_SPEED: f32 = 6.0;
const DEFAULT_DAY_LENGTH_SECS: f32 = 3_600.0;
const LEVEL_TOLERANCE: f32 = 1.0;

/// Height and surface queries answered by the host terrain.
pub trait Terrain {
    /// Height of the topmost solid block at the column.
    fn height_at(&self, x: f32, z: f32) -> f32;

    /// Reports whether the position lies within the playable area.
    fn is_in_bounds(&self, position: Vec3) -> bool;

    /// Moves the position onto the nearest point of the playable area.
    fn clamp_to_bounds(&self, position: Vec3) -> Vec3;

    /// Reports whether the column contains water at its surface.
    fn has_water_at(&self, x: f32, z: f32) -> bool;

    /// Reports whether the terrain around the column is level within `radius` blocks.
    fn is_level_nearby(&self, x: f32, z: f32, radius: i32) -> bool;

    /// Reports whether the position lies inside a point-of-interest footprint grown by `margin`.
    fn is_within_poi(&self, position: Vec3, margin: f32) -> bool;

    /// Reports whether the chunk holding the position is loaded.
    fn is_chunk_loaded(&self, position: Vec3) -> bool;
}

/// Biome restriction applied to point-of-interest candidates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiomeFilter {
    /// Every biome is accepted.
    #[default]
    Any,
    /// Only the listed biomes are accepted.
    Only(Vec<String>),
    /// Every biome except the listed ones is accepted.
    Except(Vec<String>),
}

impl BiomeFilter {
    /// Reports whether the biome passes the filter.
    #[must_use]
    pub fn accepts(&self, biome: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(allowed) => allowed.iter().any(|name| name == biome),
            Self::Except(denied) => !denied.iter().any(|name| name == biome),
        }
    }
}

/// Pre-placed structure that quests may target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
    /// Unique name of the structure.
    pub name: String,
    /// Lowest corner of the footprint.
    pub origin: IVec3,
    /// Extent of the footprint along each axis.
    pub size: IVec3,
    /// Quest tags attached to the structure.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Difficulty tier of the structure.
    #[serde(default)]
    pub difficulty: u8,
    /// Biome the structure was placed in.
    #[serde(default)]
    pub biome: String,
}

impl PoiRecord {
    /// Horizontal center of the footprint.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        let x = self.origin.x as f32 + self.size.x as f32 / 2.0;
        let z = self.origin.z as f32 + self.size.z as f32 / 2.0;
        Vec2::new(x.trunc(), z.trunc())
    }

    /// Horizontal origin corner of the footprint.
    #[must_use]
    pub fn origin_xz(&self) -> Vec2 {
        Vec2::new(self.origin.x as f32, self.origin.z as f32)
    }

    /// Reports whether the structure carries the tag. An empty tag matches everything.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        tag.is_empty() || self.tags.iter().any(|candidate| candidate == tag)
    }

    /// Reports whether the column lies inside the footprint grown by `margin`.
    #[must_use]
    pub fn footprint_contains(&self, x: f32, z: f32, margin: f32) -> bool {
        let min_x = self.origin.x as f32 - margin;
        let min_z = self.origin.z as f32 - margin;
        let max_x = (self.origin.x + self.size.x) as f32 + margin;
        let max_z = (self.origin.z + self.size.z) as f32 + margin;
        x >= min_x && x <= max_x && z >= min_z && z <= max_z
    }
}

/// Directory of points of interest known to the host.
pub trait PoiDirectory {
    /// Candidates of the provided tier, in directory order.
    fn pois_by_tier(&self, tier: Tier) -> Vec<&PoiRecord>;

    /// Closest structure carrying `tag` relative to `origin`.
    ///
    /// When `ignore_current` is set, a structure whose footprint contains
    /// `origin` is skipped. Structures whose origin corner appears in
    /// `exclude` are skipped as well.
    fn closest_with_tag(
        &self,
        tag: &str,
        origin: Vec2,
        ignore_current: bool,
        exclude: &[Vec2],
        biome: &BiomeFilter,
    ) -> Option<&PoiRecord>;

    /// Reports whether the structure is locked out for the requester.
    fn is_locked_out(&self, requester: Option<EntityId>, poi: &PoiRecord) -> bool;
}

/// Snapshot of a single entity as seen by observers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityObservation {
    /// Class of the entity.
    pub class: EntityClassId,
    /// Role of the entity.
    pub role: EntityRole,
    /// Current position.
    pub position: Vec3,
    /// Whether the entity is alive.
    pub alive: bool,
    /// Whether the entity rests on solid ground.
    pub on_ground: bool,
    /// Player the entity was spawned for.
    pub spawned_by: Option<EntityId>,
}

/// Read-only access to live entities.
pub trait EntityObserver {
    /// Observes the entity, returning `None` when it does not exist.
    fn observe(&self, entity: EntityId) -> Option<EntityObservation>;

    /// Reports whether the entity exists and is alive.
    fn is_alive(&self, entity: EntityId) -> bool {
        self.observe(entity)
            .map_or(false, |observation| observation.alive)
    }

    /// Current position of the entity, if it exists.
    fn position_of(&self, entity: EntityId) -> Option<Vec3> {
        self.observe(entity).map(|observation| observation.position)
    }
}

/// Entity class drawn from a spawn group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnChoice {
    /// Class to spawn.
    pub class: EntityClassId,
    /// Whether the class flies.
    pub airborne: bool,
}

/// Description of an entity the host should create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnOrder {
    /// Class to spawn.
    pub class: EntityClassId,
    /// Role of the new entity.
    pub role: EntityRole,
    /// Spawn position.
    pub position: Vec3,
    /// Heading in degrees around the vertical axis.
    pub yaw_degrees: f32,
    /// Initial velocity in units per second.
    pub velocity: Vec3,
    /// Player the entity belongs to.
    pub spawned_by: Option<EntityId>,
}

/// Handle of a chunk observer keeping a column loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkObserverId(u32);

impl ChunkObserverId {
    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Mutating capabilities the host exposes to coordinators.
///
/// Targeting and rage are opaque behaviors: coordinators decide when to
/// invoke them but never how they play out.
pub trait EntityHost: EntityObserver + Terrain {
    /// Creates an entity, returning its identifier.
    fn spawn(&mut self, order: SpawnOrder) -> Option<EntityId>;

    /// Kills an entity without crediting anyone.
    fn kill(&mut self, entity: EntityId);

    /// Entity the provided entity is currently attacking.
    fn attack_target(&self, entity: EntityId) -> Option<EntityId>;

    /// Points the entity at a target for the provided duration.
    fn set_attack_target(&mut self, entity: EntityId, target: EntityId, duration: Duration);

    /// Reports whether the entity is raging.
    fn is_raging(&self, entity: EntityId) -> bool;

    /// Enrages the entity with the provided speed multiplier and duration.
    fn start_rage(&mut self, entity: EntityId, speed: f32, duration: Duration);

    /// Game stage of the player, used to pick spawn group entries.
    fn game_stage(&self, player: EntityId) -> u32;

    /// Picks a class from the named group using a roll in `[0, 1)`.
    fn pick_from_group(&self, group: &str, game_stage: u32, roll: f32) -> Option<SpawnChoice>;

    /// Keeps the chunk holding `position` loaded until the observer is removed.
    fn add_chunk_observer(&mut self, position: Vec3) -> ChunkObserverId;

    /// Releases a chunk observer.
    fn remove_chunk_observer(&mut self, observer: ChunkObserverId);
}

/// Axis-aligned horizontal rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Lowest corner.
    pub min: Vec2,
    /// Highest corner.
    pub max: Vec2,
}

impl Rect {
    /// Creates a rectangle from two corners.
    #[must_use]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Reports whether the column lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.y && z <= self.max.y
    }

    fn intersects_square(&self, x: f32, z: f32, radius: f32) -> bool {
        x + radius >= self.min.x
            && x - radius <= self.max.x
            && z + radius >= self.min.y
            && z - radius <= self.max.y
    }
}

/// Terrain feature overriding the flat default ground.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TerrainFeature {
    /// Surface water covering the rectangle.
    Water(Rect),
    /// Broken terrain that is never level.
    Rough(Rect),
    /// Raised ground at a fixed height.
    Plateau {
        /// Area covered by the plateau.
        area: Rect,
        /// Surface height of the plateau.
        height: f32,
    },
}

/// Weighted entry of a spawn group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnGroupEntry {
    /// Class spawned by the entry.
    pub class: EntityClassId,
    /// Relative weight of the entry.
    pub weight: f32,
    /// Lowest game stage at which the entry is eligible.
    #[serde(default)]
    pub min_game_stage: u32,
}

/// Named collection of weighted entity classes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnGroup {
    /// Weighted entries.
    pub entries: Vec<SpawnGroupEntry>,
    /// Whether every class of the group flies.
    #[serde(default)]
    pub airborne: bool,
}

impl SpawnGroup {
    fn pick(&self, game_stage: u32, roll: f32) -> Option<EntityClassId> {
        let eligible: Vec<&SpawnGroupEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.min_game_stage <= game_stage && entry.weight > 0.0)
            .collect();
        let total: f32 = eligible.iter().map(|entry| entry.weight).sum();
        if total <= 0.0 {
            return None;
        }

        let mut remaining = roll.clamp(0.0, 1.0) * total;
        for entry in &eligible {
            if remaining < entry.weight {
                return Some(entry.class);
            }
            remaining -= entry.weight;
        }
        eligible.last().map(|entry| entry.class)
    }
}

/// Tunable parameters of the simulated world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Half the side length of the square playable area centered on the origin.
    pub half_extent: f32,
    /// Height of the default flat ground.
    pub ground_height: f32,
    /// Horizontal radius around players and observers in which chunks are loaded.
    pub load_radius: f32,
    /// Speed at which payloads descend, in units per second.
    pub payload_fall_speed: f32,
    /// Length of an in-game day in seconds.
    pub day_length_secs: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            half_extent: DEFAULT_HALF_EXTENT,
            ground_height: DEFAULT_GROUND_HEIGHT,
            load_radius: DEFAULT_LOAD_RADIUS,
            payload_fall_speed: DEFAULT_PAYLOAD_FALL_SPEED,
            day_length_secs: DEFAULT_DAY_LENGTH_SECS,
        }
    }
}

/// Commands that express world mutations driven by the game loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorldCommand {
    /// Advances the simulation clock.
    Tick {
        /// Simulated time that elapsed.
        dt: Duration,
    },
    /// Teleports an entity.
    MoveEntity {
        /// Entity to move.
        entity: EntityId,
        /// Destination.
        position: Vec3,
    },
    /// Kills an entity, optionally crediting a killer.
    KillEntity {
        /// Entity to kill.
        entity: EntityId,
        /// Entity credited with the kill.
        killer: Option<EntityId>,
    },
    /// Removes an entity without killing it.
    RemoveEntity {
        /// Entity to remove.
        entity: EntityId,
        /// Why the entity leaves.
        reason: RemovalReason,
    },
}

#[derive(Clone, Debug)]
struct SimEntity {
    class: EntityClassId,
    role: EntityRole,
    position: Vec3,
    velocity: Vec3,
    alive: bool,
    on_ground: bool,
    spawned_by: Option<EntityId>,
    game_stage: u32,
    attack: Option<(EntityId, Duration)>,
    rage: Option<(f32, Duration)>,
}

impl SimEntity {
    fn observation(&self) -> EntityObservation {
        EntityObservation {
            class: self.class,
            role: self.role,
            position: self.position,
            alive: self.alive,
            on_ground: self.on_ground,
            spawned_by: self.spawned_by,
        }
    }

    fn advance_timers(&mut self, dt: Duration) {
        if let Some((_, remaining)) = &mut self.attack {
            *remaining = remaining.saturating_sub(dt);
        }
        if self.attack.map_or(false, |(_, remaining)| remaining.is_zero()) {
            self.attack = None;
        }
        if let Some((_, remaining)) = &mut self.rage {
            *remaining = remaining.saturating_sub(dt);
        }
        if self.rage.map_or(false, |(_, remaining)| remaining.is_zero()) {
            self.rage = None;
        }
    }
}

/// Player class reported in observations.
pub const PLAYER_CLASS: EntityClassId = EntityClassId::new(0);

/// In-memory world used by the session adapter and tests.
#[derive(Debug)]
pub struct SimWorld {
    config: WorldConfig,
    features: Vec<TerrainFeature>,
    pois: Vec<PoiRecord>,
    locked_pois: BTreeSet<String>,
    entities: BTreeMap<EntityId, SimEntity>,
    next_entity: i32,
    spawn_groups: BTreeMap<String, SpawnGroup>,
    chunk_observers: BTreeMap<ChunkObserverId, Vec3>,
    next_observer: u32,
    clock: Duration,
    pending_events: Vec<WorldEvent>,
}

impl SimWorld {
    /// Creates a flat, empty world.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            features: Vec::new(),
            pois: Vec::new(),
            locked_pois: BTreeSet::new(),
            entities: BTreeMap::new(),
            next_entity: 1,
            spawn_groups: BTreeMap::new(),
            chunk_observers: BTreeMap::new(),
            next_observer: 1,
            clock: Duration::ZERO,
            pending_events: Vec::new(),
        }
    }

    /// Adds a terrain feature.
    pub fn add_feature(&mut self, feature: TerrainFeature) {
        self.features.push(feature);
    }

    /// Registers a point of interest.
    pub fn add_poi(&mut self, poi: PoiRecord) {
        self.pois.push(poi);
    }

    /// Locks the named point of interest out of quest searches.
    pub fn lock_poi(&mut self, name: &str) {
        let _ = self.locked_pois.insert(name.to_owned());
    }

    /// Registers a spawn group under the provided name.
    pub fn add_spawn_group(&mut self, name: &str, group: SpawnGroup) {
        let _ = self.spawn_groups.insert(name.to_owned(), group);
    }

    /// Adds a player at the provided position.
    pub fn add_player(&mut self, position: Vec3, game_stage: u32) -> EntityId {
        let id = self.allocate_entity();
        let _ = self.entities.insert(
            id,
            SimEntity {
                class: PLAYER_CLASS,
                role: EntityRole::Player,
                position,
                velocity: Vec3::ZERO,
                alive: true,
                on_ground: true,
                spawned_by: None,
                game_stage,
                attack: None,
                rage: None,
            },
        );
        log::debug!("player {} joined at {position}", id.get());
        id
    }

    fn allocate_entity(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity += 1;
        id
    }

    fn feature_height(&self, x: f32, z: f32) -> Option<f32> {
        self.features.iter().rev().find_map(|feature| match feature {
            TerrainFeature::Plateau { area, height } if area.contains(x, z) => Some(*height),
            _ => None,
        })
    }

    fn kill_entity(&mut self, entity: EntityId, killer: Option<EntityId>) {
        let Some(record) = self.entities.get_mut(&entity) else {
            return;
        };
        if !record.alive {
            return;
        }
        record.alive = false;
        record.velocity = Vec3::ZERO;
        self.pending_events.push(WorldEvent::EntityKilled {
            deceased: entity,
            killer,
        });
    }

    fn remove_entity(&mut self, entity: EntityId, reason: RemovalReason) {
        if let Some(record) = self.entities.remove(&entity) {
            if record.alive {
                self.pending_events
                    .push(WorldEvent::EntityRemoved { entity, reason });
            }
        }
    }

    fn advance(&mut self, dt: Duration) {
        self.clock = self.clock.saturating_add(dt);
        let seconds = dt.as_secs_f32();

        let corpses: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entity)| !entity.alive)
            .map(|(id, _)| *id)
            .collect();
        for id in corpses {
            let _ = self.entities.remove(&id);
        }

        let mut escaped = Vec::new();
        let fall_speed = self.config.payload_fall_speed;
        let half_extent = self.config.half_extent;
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            let ground = {
                let Some(entity) = self.entities.get(&id) else {
                    continue;
                };
                self.height_at(entity.position.x, entity.position.z)
            };
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            entity.advance_timers(dt);
            match entity.role {
                EntityRole::Mover => {
                    entity.position += entity.velocity * seconds;
                    if entity.position.x.abs() > half_extent || entity.position.z.abs() > half_extent
                    {
                        escaped.push(id);
                    }
                }
                EntityRole::Payload if !entity.on_ground => {
                    entity.position.y -= fall_speed * seconds;
                    if entity.position.y <= ground {
                        entity.position.y = ground;
                        entity.on_ground = true;
                    }
                }
                _ => {}
            }
        }

        for id in escaped {
            self.remove_entity(id, RemovalReason::OutOfBounds);
        }
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl Terrain for SimWorld {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self.feature_height(x, z)
            .unwrap_or(self.config.ground_height)
    }

    fn is_in_bounds(&self, position: Vec3) -> bool {
        position.x.abs() < self.config.half_extent && position.z.abs() < self.config.half_extent
    }

    fn clamp_to_bounds(&self, position: Vec3) -> Vec3 {
        let limit = self.config.half_extent - 1.0;
        Vec3::new(
            position.x.clamp(-limit, limit),
            position.y,
            position.z.clamp(-limit, limit),
        )
    }

    fn has_water_at(&self, x: f32, z: f32) -> bool {
        self.features
            .iter()
            .any(|feature| matches!(feature, TerrainFeature::Water(area) if area.contains(x, z)))
    }

    fn is_level_nearby(&self, x: f32, z: f32, radius: i32) -> bool {
        let reach = radius as f32;
        let rough = self.features.iter().any(|feature| {
            matches!(feature, TerrainFeature::Rough(area) if area.intersects_square(x, z, reach))
        });
        if rough {
            return false;
        }

        let samples = [
            (x, z),
            (x - reach, z - reach),
            (x + reach, z - reach),
            (x - reach, z + reach),
            (x + reach, z + reach),
        ];
        let heights: Vec<f32> = samples
            .iter()
            .map(|(sample_x, sample_z)| self.height_at(*sample_x, *sample_z))
            .collect();
        let lowest = heights.iter().copied().fold(f32::INFINITY, f32::min);
        let highest = heights.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        highest - lowest <= LEVEL_TOLERANCE
    }

    fn is_within_poi(&self, position: Vec3, margin: f32) -> bool {
        self.pois
            .iter()
            .any(|poi| poi.footprint_contains(position.x, position.z, margin))
    }

    fn is_chunk_loaded(&self, position: Vec3) -> bool {
        let radius = self.config.load_radius;
        let near_player = self.entities.values().any(|entity| {
            entity.role == EntityRole::Player
                && entity.alive
                && horizontal_distance(entity.position, position) <= radius
        });
        near_player
            || self
                .chunk_observers
                .values()
                .any(|observer| horizontal_distance(*observer, position) <= radius)
    }
}

impl PoiDirectory for SimWorld {
    fn pois_by_tier(&self, tier: Tier) -> Vec<&PoiRecord> {
        self.pois
            .iter()
            .filter(|poi| tier.accepts(poi.difficulty))
            .collect()
    }

    fn closest_with_tag(
        &self,
        tag: &str,
        origin: Vec2,
        ignore_current: bool,
        exclude: &[Vec2],
        biome: &BiomeFilter,
    ) -> Option<&PoiRecord> {
        self.pois
            .iter()
            .filter(|poi| poi.has_tag(tag) && biome.accepts(&poi.biome))
            .filter(|poi| !(ignore_current && poi.footprint_contains(origin.x, origin.y, 0.0)))
            .filter(|poi| {
                let corner = poi.origin_xz();
                !exclude.iter().any(|excluded| *excluded == corner)
            })
            .min_by(|a, b| {
                let da = a.center().distance_squared(origin);
                let db = b.center().distance_squared(origin);
                da.total_cmp(&db)
            })
    }

    fn is_locked_out(&self, _requester: Option<EntityId>, poi: &PoiRecord) -> bool {
        self.locked_pois.contains(&poi.name)
    }
}

impl EntityObserver for SimWorld {
    fn observe(&self, entity: EntityId) -> Option<EntityObservation> {
        self.entities.get(&entity).map(SimEntity::observation)
    }
}

impl EntityHost for SimWorld {
    fn spawn(&mut self, order: SpawnOrder) -> Option<EntityId> {
        if !self.is_in_bounds(order.position) {
            log::warn!("rejected spawn outside bounds at {}", order.position);
            return None;
        }

        let id = self.allocate_entity();
        let ground = self.height_at(order.position.x, order.position.z);
        let on_ground = match order.role {
            EntityRole::Mover => false,
            EntityRole::Payload => order.position.y <= ground,
            EntityRole::Enemy | EntityRole::Player => true,
        };
        let _ = self.entities.insert(
            id,
            SimEntity {
                class: order.class,
                role: order.role,
                position: order.position,
                velocity: order.velocity,
                alive: true,
                on_ground,
                spawned_by: order.spawned_by,
                game_stage: 0,
                attack: None,
                rage: None,
            },
        );
        self.pending_events.push(WorldEvent::EntitySpawned {
            entity: id,
            class: order.class,
            role: order.role,
            spawned_by: order.spawned_by,
        });
        Some(id)
    }

    fn kill(&mut self, entity: EntityId) {
        self.kill_entity(entity, None);
    }

    fn attack_target(&self, entity: EntityId) -> Option<EntityId> {
        self.entities
            .get(&entity)
            .and_then(|record| record.attack.map(|(target, _)| target))
    }

    fn set_attack_target(&mut self, entity: EntityId, target: EntityId, duration: Duration) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.attack = Some((target, duration));
        }
    }

    fn is_raging(&self, entity: EntityId) -> bool {
        self.entities
            .get(&entity)
            .map_or(false, |record| record.rage.is_some())
    }

    fn start_rage(&mut self, entity: EntityId, speed: f32, duration: Duration) {
        if let Some(record) = self.entities.get_mut(&entity) {
            record.rage = Some((speed, duration));
        }
    }

    fn game_stage(&self, player: EntityId) -> u32 {
        self.entities
            .get(&player)
            .map_or(0, |record| record.game_stage)
    }

    fn pick_from_group(&self, group: &str, game_stage: u32, roll: f32) -> Option<SpawnChoice> {
        let definition = self.spawn_groups.get(group)?;
        definition
            .pick(game_stage, roll)
            .map(|class| SpawnChoice {
                class,
                airborne: definition.airborne,
            })
    }

    fn add_chunk_observer(&mut self, position: Vec3) -> ChunkObserverId {
        let id = ChunkObserverId(self.next_observer);
        self.next_observer += 1;
        let _ = self.chunk_observers.insert(id, position);
        id
    }

    fn remove_chunk_observer(&mut self, observer: ChunkObserverId) {
        let _ = self.chunk_observers.remove(&observer);
    }
}

/// Applies the command to the world, then flushes every pending event into `out_events`.
pub fn apply(world: &mut SimWorld, command: WorldCommand, out_events: &mut Vec<WorldEvent>) {
    match command {
        WorldCommand::Tick { dt } => world.advance(dt),
        WorldCommand::MoveEntity { entity, position } => {
            if let Some(record) = world.entities.get_mut(&entity) {
                record.position = position;
            }
        }
        WorldCommand::KillEntity { entity, killer } => world.kill_entity(entity, killer),
        WorldCommand::RemoveEntity { entity, reason } => world.remove_entity(entity, reason),
    }
    flush_events(world, out_events);
}

/// Moves every event produced by host capabilities into `out_events`.
pub fn flush_events(world: &mut SimWorld, out_events: &mut Vec<WorldEvent>) {
    out_events.append(&mut world.pending_events);
}

/// Read-only queries over the simulated world.
pub mod query {
    use std::time::Duration;

    use super::{EntityRole, SimWorld, WorldConfig};
    use questline_core::EntityId;

    /// Configuration the world was created with.
    #[must_use]
    pub fn config(world: &SimWorld) -> &WorldConfig {
        &world.config
    }

    /// Total simulated time.
    #[must_use]
    pub fn clock(world: &SimWorld) -> Duration {
        world.clock
    }

    /// Living entities with the provided role, in identifier order.
    #[must_use]
    pub fn living_with_role(world: &SimWorld, role: EntityRole) -> Vec<EntityId> {
        world
            .entities
            .iter()
            .filter(|(_, entity)| entity.alive && entity.role == role)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of chunk observers currently registered.
    #[must_use]
    pub fn chunk_observer_count(world: &SimWorld) -> usize {
        world.chunk_observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(name: &str, origin: IVec3, tags: &[&str]) -> PoiRecord {
        PoiRecord {
            name: name.to_owned(),
            origin,
            size: IVec3::new(20, 10, 20),
            tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
            difficulty: 1,
            biome: "forest".to_owned(),
        }
    }

    #[test]
    fn plateau_overrides_ground_height() {
        let mut world = SimWorld::default();
        world.add_feature(TerrainFeature::Plateau {
            area: Rect::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0)),
            height: 90.0,
        });
        assert_eq!(world.height_at(5.0, 5.0), 90.0);
        assert_eq!(world.height_at(50.0, 5.0), DEFAULT_GROUND_HEIGHT);
        assert!(!world.is_level_nearby(9.0, 5.0, 8), "plateau edge is a cliff");
        assert!(world.is_level_nearby(100.0, 100.0, 8));
    }

    #[test]
    fn closest_trader_skips_current_and_excluded() {
        let mut world = SimWorld::default();
        world.add_poi(poi("home", IVec3::new(-10, 70, -10), &["trader"]));
        world.add_poi(poi("near", IVec3::new(100, 70, 0), &["trader"]));
        world.add_poi(poi("far", IVec3::new(400, 70, 0), &["trader"]));

        let origin = Vec2::ZERO;
        let any = BiomeFilter::Any;
        let closest = world.closest_with_tag("trader", origin, false, &[], &any);
        assert_eq!(closest.map(|p| p.name.as_str()), Some("home"));

        let other = world.closest_with_tag("trader", origin, true, &[], &any);
        assert_eq!(other.map(|p| p.name.as_str()), Some("near"));

        let exclude = [Vec2::new(100.0, 0.0)];
        let next = world.closest_with_tag("trader", origin, true, &exclude, &any);
        assert_eq!(next.map(|p| p.name.as_str()), Some("far"));
    }

    #[test]
    fn payload_falls_until_it_lands() {
        let mut world = SimWorld::default();
        let crate_id = world
            .spawn(SpawnOrder {
                class: EntityClassId::new(9),
                role: EntityRole::Payload,
                position: Vec3::new(0.0, 82.0, 0.0),
                yaw_degrees: 0.0,
                velocity: Vec3::ZERO,
                spawned_by: None,
            })
            .expect("spawn inside bounds");

        let mut events = Vec::new();
        apply(
            &mut world,
            WorldCommand::Tick {
                dt: Duration::from_secs(1),
            },
            &mut events,
        );
        assert!(!world.observe(crate_id).expect("crate").on_ground);

        apply(
            &mut world,
            WorldCommand::Tick {
                dt: Duration::from_secs(2),
            },
            &mut events,
        );
        let observed = world.observe(crate_id).expect("crate");
        assert!(observed.on_ground);
        assert_eq!(observed.position.y, DEFAULT_GROUND_HEIGHT);
        assert!(matches!(events[0], WorldEvent::EntitySpawned { .. }));
    }

    #[test]
    fn credited_kill_is_reported_once() {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 10);
        let mut events = Vec::new();
        apply(
            &mut world,
            WorldCommand::KillEntity {
                entity: player,
                killer: None,
            },
            &mut events,
        );
        apply(
            &mut world,
            WorldCommand::KillEntity {
                entity: player,
                killer: None,
            },
            &mut events,
        );
        assert_eq!(events.len(), 1);
        assert!(!world.is_alive(player));
    }

    #[test]
    fn weighted_group_pick_honors_game_stage() {
        let group = SpawnGroup {
            entries: vec![
                SpawnGroupEntry {
                    class: EntityClassId::new(1),
                    weight: 1.0,
                    min_game_stage: 0,
                },
                SpawnGroupEntry {
                    class: EntityClassId::new(2),
                    weight: 3.0,
                    min_game_stage: 50,
                },
            ],
            airborne: false,
        };
        assert_eq!(group.pick(10, 0.99), Some(EntityClassId::new(1)));
        assert_eq!(group.pick(60, 0.1), Some(EntityClassId::new(1)));
        assert_eq!(group.pick(60, 0.5), Some(EntityClassId::new(2)));
    }

    #[test]
    fn observers_keep_remote_chunks_loaded() {
        let mut world = SimWorld::default();
        let remote = Vec3::new(900.0, 70.0, 900.0);
        assert!(!world.is_chunk_loaded(remote));
        let observer = world.add_chunk_observer(remote);
        assert!(world.is_chunk_loaded(remote));
        world.remove_chunk_observer(observer);
        assert!(!world.is_chunk_loaded(remote));
    }
}
