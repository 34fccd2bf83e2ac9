#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host-side search for valid quest target positions.
//!
//! [`PositionResolver`] turns an anchor and a distance band into a concrete
//! world location using one of the [`TargetKind`] strategies. Every search is
//! bounded: flat terrain gives up after a fixed number of samples and point of
//! interest searches after a fixed number of widening passes. Exhaustion is
//! reported as [`Resolution::position`] being `None` and never as an error, so
//! the caller decides whether to fall back or fail the objective.
//!
//! The resolver owns no randomness. Callers pass a random stream, which makes
//! every search reproducible for a fixed stream and world.

use std::f32::consts::TAU;

use questline_core::{
    to_block, EntityId, PositionKind, PositionUpdate, TargetKind, Tier, Vec2, Vec3, TRADER_TAG,
};
use questline_world::{BiomeFilter, PoiDirectory, PoiRecord, Terrain};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bounds applied to every search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Flat-area samples validated before giving up.
    pub flat_attempts: u32,
    /// Widening passes of a point-of-interest search.
    pub poi_passes: u32,
    /// Random candidate draws per point-of-interest pass.
    pub poi_draws_per_pass: u32,
    /// Draws allowed to find an in-bounds sample for a single flat-area attempt.
    pub bounds_draws: u32,
    /// Radius over which flat land must be level.
    pub level_radius: i32,
    /// Margin kept between flat land and any point-of-interest footprint.
    pub poi_margin: f32,
    /// Exclusive lower bound of acceptable ground height.
    pub min_height: f32,
    /// Exclusive upper bound of acceptable ground height.
    pub max_height: f32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            flat_attempts: 75,
            poi_passes: 3,
            poi_draws_per_pass: 175,
            bounds_draws: 10_000,
            level_radius: 8,
            poi_margin: 15.0,
            min_height: 0.0,
            max_height: 256.0,
        }
    }
}

/// Tag and biome restrictions applied to point-of-interest candidates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiFilter {
    /// Tag candidates must carry. Empty accepts every candidate.
    pub tag: String,
    /// Biome restriction.
    pub biome: BiomeFilter,
}

/// Parameters of a single search.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionQuery {
    /// Point the search is centered on.
    pub anchor: Vec3,
    /// Minimum horizontal distance from the anchor.
    pub min_distance: f32,
    /// Maximum horizontal distance from the anchor.
    pub max_distance: f32,
    /// Search strategy.
    pub target: TargetKind,
    /// Origin corners of points of interest that must not be returned.
    pub exclude: Vec<Vec2>,
    /// Difficulty tier of point-of-interest candidates.
    pub tier: Tier,
    /// Tag and biome restrictions.
    pub filter: PoiFilter,
    /// Player on whose behalf the search runs, used for lockout checks.
    pub requester: Option<EntityId>,
    /// Whether an exhausted flat-area search returns its last sample.
    pub force: bool,
}

impl PositionQuery {
    /// Creates a query without exclusions, filters or force.
    #[must_use]
    pub fn new(anchor: Vec3, min_distance: f32, max_distance: f32, target: TargetKind) -> Self {
        Self {
            anchor,
            min_distance,
            max_distance,
            target,
            exclude: Vec::new(),
            tier: Tier::ANY,
            filter: PoiFilter::default(),
            requester: None,
            force: false,
        }
    }

    /// Returns the query with the force flag replaced.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Returns the query with the exclusion list replaced.
    #[must_use]
    pub fn with_exclusions(mut self, exclude: Vec<Vec2>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Returns the query with the tier replaced.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Returns the query with the candidate filter replaced.
    #[must_use]
    pub fn with_filter(mut self, filter: PoiFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Returns the query with the requester replaced.
    #[must_use]
    pub fn with_requester(mut self, requester: EntityId) -> Self {
        self.requester = Some(requester);
        self
    }
}

/// Outcome of a search.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// Resolved position, or `None` when nothing valid was found.
    pub position: Option<Vec3>,
    /// Additional position tags describing the selected structure.
    pub updates: Vec<PositionUpdate>,
    /// Samples or candidate draws consumed by the search.
    pub attempts: u32,
}

impl Resolution {
    fn found(position: Vec3, attempts: u32) -> Self {
        Self {
            position: Some(position),
            updates: Vec::new(),
            attempts,
        }
    }

    fn not_found(attempts: u32) -> Self {
        Self {
            position: None,
            updates: Vec::new(),
            attempts,
        }
    }

    /// Reports whether the search produced a position.
    #[must_use]
    pub fn is_found(&self) -> bool {
        self.position.is_some()
    }
}

/// Bounded search for target positions.
#[derive(Clone, Debug, Default)]
pub struct PositionResolver {
    limits: SearchLimits,
}

impl PositionResolver {
    /// Creates a resolver using the provided bounds.
    #[must_use]
    pub const fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }

    /// Bounds applied by the resolver.
    #[must_use]
    pub const fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    /// Resolves the query with the strategy named by its target kind.
    pub fn resolve<W, R>(&self, world: &W, rng: &mut R, query: &PositionQuery) -> Resolution
    where
        W: Terrain + PoiDirectory + ?Sized,
        R: Rng + ?Sized,
    {
        let resolution = match query.target {
            TargetKind::FlatArea => self.find_flat_area(world, rng, query),
            TargetKind::Poi => self.find_poi(world, rng, query),
            TargetKind::Trader | TargetKind::TraderNext | TargetKind::TraderClosest => {
                self.find_trader(world, query)
            }
            TargetKind::Reuse => Resolution::found(query.anchor, 0),
        };

        if resolution.is_found() {
            log::debug!(
                "resolved {:?} target after {} attempts",
                query.target,
                resolution.attempts
            );
        } else {
            log::warn!(
                "no {:?} target within {}..{} of {} after {} attempts",
                query.target,
                query.min_distance,
                query.max_distance,
                query.anchor,
                resolution.attempts
            );
        }
        resolution
    }

    /// Samples random columns at a fixed distance until one is flat land outside any structure.
    pub fn find_flat_area<W, R>(&self, world: &W, rng: &mut R, query: &PositionQuery) -> Resolution
    where
        W: Terrain + ?Sized,
        R: Rng + ?Sized,
    {
        let distance = sample_distance(rng, query.min_distance, query.max_distance);
        let mut last_sample = None;
        let mut attempts = 0;

        for attempt in 1..=self.limits.flat_attempts {
            attempts = attempt;
            let Some(candidate) = self.random_point(world, rng, query.anchor, distance) else {
                continue;
            };
            if self.is_flat_land_outside_poi(world, candidate) {
                return Resolution::found(candidate, attempts);
            }
            last_sample = Some(candidate);
        }

        match last_sample {
            Some(sample) if query.force => Resolution::found(sample, attempts),
            _ => Resolution::not_found(attempts),
        }
    }

    /// Draws random points of interest until one lies in the distance band, widening the band between passes.
    pub fn find_poi<W, R>(&self, world: &W, rng: &mut R, query: &PositionQuery) -> Resolution
    where
        W: Terrain + PoiDirectory + ?Sized,
        R: Rng + ?Sized,
    {
        let candidates = world.pois_by_tier(query.tier);
        if candidates.is_empty() {
            return Resolution::not_found(0);
        }

        let origin = Vec2::new(query.anchor.x, query.anchor.z);
        let mut band = SquaredBand::new(query.min_distance, query.max_distance);
        let mut attempts = 0;

        for pass in 0..self.limits.poi_passes {
            for _ in 0..self.limits.poi_draws_per_pass {
                attempts += 1;
                let candidate = candidates[rng.gen_range(0..candidates.len())];
                if self.accepts_poi(world, query, origin, &band, candidate) {
                    return structure_resolution(world, candidate, attempts);
                }
            }
            band = band.widened();
            log::debug!("widening point-of-interest search after pass {}", pass + 1);
        }

        Resolution::not_found(attempts)
    }

    /// Looks up the closest trader allowed by the target kind.
    pub fn find_trader<W>(&self, world: &W, query: &PositionQuery) -> Resolution
    where
        W: Terrain + PoiDirectory + ?Sized,
    {
        let origin = Vec2::new(query.anchor.x, query.anchor.z);
        let ignore_current = query.target != TargetKind::TraderClosest;
        let exclude: &[Vec2] = if query.target == TargetKind::TraderNext {
            &query.exclude
        } else {
            &[]
        };

        match world.closest_with_tag(TRADER_TAG, origin, ignore_current, exclude, &query.filter.biome)
        {
            Some(trader) => structure_resolution(world, trader, 1),
            None => Resolution::not_found(1),
        }
    }

    /// Reports whether the position passes every flat-land check.
    pub fn is_flat_land_outside_poi<W>(&self, world: &W, position: Vec3) -> bool
    where
        W: Terrain + ?Sized,
    {
        position.y > self.limits.min_height
            && position.y < self.limits.max_height
            && world.is_in_bounds(position)
            && !world.has_water_at(position.x, position.z)
            && world.is_level_nearby(position.x, position.z, self.limits.level_radius)
            && !world.is_within_poi(position, self.limits.poi_margin)
    }

    fn random_point<W, R>(&self, world: &W, rng: &mut R, anchor: Vec3, distance: f32) -> Option<Vec3>
    where
        W: Terrain + ?Sized,
        R: Rng + ?Sized,
    {
        for _ in 0..self.limits.bounds_draws {
            let angle = rng.gen_range(0.0..TAU);
            let x = anchor.x + angle.cos() * distance;
            let z = anchor.z + angle.sin() * distance;
            let candidate = Vec3::new(x, world.height_at(x, z), z);
            if world.is_in_bounds(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn accepts_poi<W>(
        &self,
        world: &W,
        query: &PositionQuery,
        origin: Vec2,
        band: &SquaredBand,
        candidate: &PoiRecord,
    ) -> bool
    where
        W: PoiDirectory + ?Sized,
    {
        if !candidate.has_tag(&query.filter.tag) || !query.tier.accepts(candidate.difficulty) {
            return false;
        }
        let corner = candidate.origin_xz();
        if query.exclude.iter().any(|excluded| *excluded == corner) {
            return false;
        }
        if world.is_locked_out(query.requester, candidate) {
            return false;
        }
        band.contains(candidate.center().distance_squared(origin))
            && query.filter.biome.accepts(&candidate.biome)
    }
}

/// Open interval of squared distances.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SquaredBand {
    min: f32,
    max: f32,
}

impl SquaredBand {
    fn new(min_distance: f32, max_distance: f32) -> Self {
        Self {
            min: min_distance * min_distance,
            max: max_distance * max_distance,
        }
    }

    fn contains(&self, squared_distance: f32) -> bool {
        squared_distance > self.min && squared_distance < self.max
    }

    fn widened(self) -> Self {
        Self {
            min: self.min / 2.0,
            max: self.max * 2.0,
        }
    }
}

fn sample_distance<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    rng.gen_range(min..=max)
}

fn structure_resolution<W>(world: &W, structure: &PoiRecord, attempts: u32) -> Resolution
where
    W: Terrain + ?Sized,
{
    let center = structure.center();
    let height = world.height_at(center.x, center.y).trunc();
    let mut resolution = Resolution::found(Vec3::new(center.x, height, center.y), attempts);
    resolution.updates = vec![
        PositionUpdate::new(PositionKind::PoiPosition, structure.origin),
        PositionUpdate::new(PositionKind::PoiSize, structure.size),
    ];
    resolution
}

/// Converts a resolved position into the block coordinates carried by side-channel updates.
#[must_use]
pub fn block_update(kind: PositionKind, position: Vec3) -> PositionUpdate {
    PositionUpdate::new(kind, to_block(position))
}
