use questline_core::{
    horizontal_distance, IVec3, PositionKind, PositionUpdate, TargetKind, Tier, Vec2, Vec3,
};
use questline_system_position::{PoiFilter, PositionQuery, PositionResolver};
use questline_world::{PoiRecord, Rect, SimWorld, Terrain, TerrainFeature};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn structure(name: &str, center_x: i32, center_z: i32, tags: &[&str]) -> PoiRecord {
    PoiRecord {
        name: name.to_owned(),
        origin: IVec3::new(center_x - 10, 70, center_z - 10),
        size: IVec3::new(20, 12, 20),
        tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
        difficulty: 2,
        biome: "pine_forest".to_owned(),
    }
}

fn flooded_world() -> SimWorld {
    let mut world = SimWorld::default();
    world.add_feature(TerrainFeature::Water(Rect::new(
        Vec2::new(-500.0, -500.0),
        Vec2::new(500.0, 500.0),
    )));
    world
}

#[test]
fn flat_area_lands_within_distance_band() {
    let world = SimWorld::default();
    let resolver = PositionResolver::default();
    let anchor = Vec3::new(0.0, 70.0, 0.0);
    let query = PositionQuery::new(anchor, 40.0, 60.0, TargetKind::FlatArea);

    for seed in 0..32 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let resolution = resolver.resolve(&world, &mut rng, &query);
        let position = resolution.position.expect("flat world always has room");
        let distance = horizontal_distance(anchor, position);
        assert!(
            (40.0 - 1e-3..=60.0 + 1e-3).contains(&distance),
            "distance {distance} outside band for seed {seed}"
        );
        assert!(resolution.attempts <= 75);
        assert!(resolver.is_flat_land_outside_poi(&world, position));
        assert_eq!(position.y, world.height_at(position.x, position.z));
    }
}

#[test]
fn flat_area_gives_up_after_exactly_seventy_five_attempts() {
    let world = flooded_world();
    let resolver = PositionResolver::default();
    let query = PositionQuery::new(Vec3::new(0.0, 70.0, 0.0), 40.0, 60.0, TargetKind::FlatArea);
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    let resolution = resolver.resolve(&world, &mut rng, &query);
    assert_eq!(resolution.position, None);
    assert_eq!(resolution.attempts, 75);
}

#[test]
fn forced_flat_area_returns_last_sample() {
    let world = flooded_world();
    let resolver = PositionResolver::default();
    let anchor = Vec3::new(0.0, 70.0, 0.0);
    let query = PositionQuery::new(anchor, 40.0, 60.0, TargetKind::FlatArea).with_force(true);
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    let resolution = resolver.resolve(&world, &mut rng, &query);
    let position = resolution.position.expect("forced searches always answer");
    assert_eq!(resolution.attempts, 75);
    assert!(world.has_water_at(position.x, position.z));
    assert!(horizontal_distance(anchor, position) >= 40.0 - 1e-3);
}

#[test]
fn flat_area_avoids_structure_margins() {
    let mut world = SimWorld::default();
    for (index, (x, z)) in [(50, 0), (0, 50), (-50, 0), (0, -50)].into_iter().enumerate() {
        world.add_poi(structure(&format!("ring_{index}"), x, z, &[]));
    }
    let resolver = PositionResolver::default();
    let query = PositionQuery::new(Vec3::new(0.0, 70.0, 0.0), 40.0, 60.0, TargetKind::FlatArea);

    for seed in 0..16 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        if let Some(position) = resolver.resolve(&world, &mut rng, &query).position {
            assert!(!world_has_structure_near(&world, position));
        }
    }
}

fn world_has_structure_near(world: &SimWorld, position: Vec3) -> bool {
    world.is_within_poi(position, 15.0)
}

#[test]
fn same_stream_same_answer() {
    let world = SimWorld::default();
    let resolver = PositionResolver::default();
    let query = PositionQuery::new(Vec3::new(10.0, 70.0, -5.0), 40.0, 60.0, TargetKind::FlatArea);

    let first = resolver.resolve(&world, &mut ChaCha8Rng::seed_from_u64(99), &query);
    let second = resolver.resolve(&world, &mut ChaCha8Rng::seed_from_u64(99), &query);
    assert_eq!(first, second);
}

#[test]
fn poi_search_widens_band_between_passes() {
    let mut world = SimWorld::default();
    world.add_poi(structure("farmhouse", 100, 0, &[]));
    let resolver = PositionResolver::default();
    let query = PositionQuery::new(Vec3::new(0.0, 70.0, 0.0), 40.0, 60.0, TargetKind::Poi);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let resolution = resolver.resolve(&world, &mut rng, &query);
    assert_eq!(resolution.position, Some(Vec3::new(100.0, 70.0, 0.0)));
    assert_eq!(
        resolution.attempts,
        2 * 175 + 1,
        "only the third, widest band reaches a candidate 100 units away"
    );
    assert_eq!(
        resolution.updates,
        vec![
            PositionUpdate::new(PositionKind::PoiPosition, IVec3::new(90, 70, -10)),
            PositionUpdate::new(PositionKind::PoiSize, IVec3::new(20, 12, 20)),
        ]
    );
}

#[test]
fn poi_search_exhausts_three_passes() {
    let mut world = SimWorld::default();
    world.add_poi(structure("too_far", 500, 0, &[]));
    let resolver = PositionResolver::default();
    let query = PositionQuery::new(Vec3::new(0.0, 70.0, 0.0), 40.0, 60.0, TargetKind::Poi);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let resolution = resolver.resolve(&world, &mut rng, &query);
    assert_eq!(resolution.position, None);
    assert_eq!(resolution.attempts, 3 * 175);
}

#[test]
fn poi_search_respects_band_filters_and_lockouts() {
    let mut world = SimWorld::default();
    world.add_poi(structure("too_close", 10, 0, &["fetch"]));
    world.add_poi(structure("locked", 0, 50, &["fetch"]));
    world.add_poi(structure("wrong_tag", -50, 0, &["clear"]));
    world.add_poi(structure("excluded", 0, -50, &["fetch"]));
    world.add_poi(structure("target", 35, 35, &["fetch"]));
    world.lock_poi("locked");

    let resolver = PositionResolver::default();
    let anchor = Vec3::new(0.0, 70.0, 0.0);
    let query = PositionQuery::new(anchor, 40.0, 60.0, TargetKind::Poi)
        .with_filter(PoiFilter {
            tag: "fetch".to_owned(),
            ..PoiFilter::default()
        })
        .with_exclusions(vec![Vec2::new(-10.0, -60.0)]);

    for seed in 0..16 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let resolution = resolver.resolve(&world, &mut rng, &query);
        let position = resolution.position.expect("one candidate qualifies");
        assert_eq!(position, Vec3::new(35.0, 70.0, 35.0));
        let squared = Vec2::new(position.x, position.z).length_squared();
        assert!(squared > 40.0 * 40.0 && squared < 60.0 * 60.0);
    }
}

#[test]
fn poi_search_honors_tier() {
    let mut world = SimWorld::default();
    world.add_poi(structure("tier_two", 50, 0, &[]));
    let resolver = PositionResolver::default();
    let query =
        PositionQuery::new(Vec3::new(0.0, 70.0, 0.0), 40.0, 60.0, TargetKind::Poi).with_tier(Tier::new(4));
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    assert!(!resolver.resolve(&world, &mut rng, &query).is_found());
}

#[test]
fn trader_kinds_differ_in_current_and_visited_handling() {
    let mut world = SimWorld::default();
    world.add_poi(structure("current", 0, 0, &["trader"]));
    world.add_poi(structure("visited", 200, 0, &["trader"]));
    world.add_poi(structure("unvisited", 400, 0, &["trader"]));
    let resolver = PositionResolver::default();
    let anchor = Vec3::new(0.0, 70.0, 0.0);
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let closest = resolver.resolve(
        &world,
        &mut rng,
        &PositionQuery::new(anchor, 0.0, 0.0, TargetKind::TraderClosest),
    );
    assert_eq!(closest.position, Some(Vec3::new(0.0, 70.0, 0.0)));

    let other = resolver.resolve(
        &world,
        &mut rng,
        &PositionQuery::new(anchor, 0.0, 0.0, TargetKind::Trader)
            .with_exclusions(vec![Vec2::new(190.0, -10.0)]),
    );
    assert_eq!(
        other.position,
        Some(Vec3::new(200.0, 70.0, 0.0)),
        "plain trader lookups ignore the exclusion list"
    );

    let next = resolver.resolve(
        &world,
        &mut rng,
        &PositionQuery::new(anchor, 0.0, 0.0, TargetKind::TraderNext)
            .with_exclusions(vec![Vec2::new(190.0, -10.0)]),
    );
    assert_eq!(next.position, Some(Vec3::new(400.0, 70.0, 0.0)));
    assert_eq!(next.updates.len(), 2);
}

#[test]
fn missing_trader_is_not_found() {
    let world = SimWorld::default();
    let resolver = PositionResolver::default();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let resolution = resolver.resolve(
        &world,
        &mut rng,
        &PositionQuery::new(Vec3::ZERO, 0.0, 0.0, TargetKind::Trader),
    );
    assert!(!resolution.is_found());
    assert!(resolution.updates.is_empty());
}
