use std::time::Duration;

use questline_core::{
    EntityClassId, EntityId, EntityRole, Faction, Message, ObjectiveState, PositionKind,
    QuestCode, QuestHandle, QuestState, SpawnerConfig, TargetKind, Vec2, Vec3,
};
use questline_system_events::EventBus;
use questline_system_objectives::{
    AirDrop, AirDropConfig, AirDropWait, CountDown, CountDownConfig, CountdownLength, Journal,
    JournalSnapshot, KillCount, Objective, ObjectiveEffect, ObjectiveEnv, ObjectiveKind, Quest,
    QuestData, ReachPoint, ReachPointConfig, StayNear, StayNearConfig, TargetProgress,
    AIR_SUPPLY_CRATE,
};
use questline_world::{apply, flush_events, EntityHost, SimWorld, SpawnOrder, WorldCommand};

const DAY: f32 = 3600.0;

struct Harness {
    world: SimWorld,
    bus: EventBus,
    journal: Journal,
    player: EntityId,
    effects: Vec<ObjectiveEffect>,
}

impl Harness {
    fn new() -> Self {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        Self {
            world,
            bus: EventBus::new(),
            journal: Journal::new(player),
            player,
            effects: Vec::new(),
        }
    }

    fn start(&mut self, quest: Quest) -> QuestHandle {
        let handle = self.journal.add(quest);
        let env = ObjectiveEnv {
            player: self.player,
            world: &self.world,
            bus: &self.bus,
            day_length_secs: DAY,
        };
        assert!(self.journal.start(handle, env, &mut self.effects));
        handle
    }

    fn tick(&mut self, seconds: f32) {
        let env = ObjectiveEnv {
            player: self.player,
            world: &self.world,
            bus: &self.bus,
            day_length_secs: DAY,
        };
        self.journal
            .update(Duration::from_secs_f32(seconds), env, &mut self.effects);
    }

    fn fail(&mut self, handle: QuestHandle) {
        let env = ObjectiveEnv {
            player: self.player,
            world: &self.world,
            bus: &self.bus,
            day_length_secs: DAY,
        };
        assert!(self.journal.fail(handle, env, &mut self.effects));
    }

    fn command(&mut self, command: WorldCommand) {
        let mut events = Vec::new();
        apply(&mut self.world, command, &mut events);
        self.bus.publish_all(&events);
    }

    fn move_player(&mut self, position: Vec3) {
        self.command(WorldCommand::MoveEntity {
            entity: self.player,
            position,
        });
    }

    fn spawn(&mut self, class: EntityClassId, role: EntityRole, position: Vec3) -> EntityId {
        let entity = self
            .world
            .spawn(SpawnOrder {
                class,
                role,
                position,
                yaw_degrees: 0.0,
                velocity: Vec3::ZERO,
                spawned_by: Some(self.player),
            })
            .expect("spawn inside the world");
        let mut events = Vec::new();
        flush_events(&mut self.world, &mut events);
        self.bus.publish_all(&events);
        entity
    }

    fn kill(&mut self, entity: EntityId, killer: Option<EntityId>) {
        self.command(WorldCommand::KillEntity { entity, killer });
    }

    fn take_effects(&mut self) -> Vec<ObjectiveEffect> {
        std::mem::take(&mut self.effects)
    }

    fn quest(&self, handle: QuestHandle) -> &Quest {
        self.journal.quest(handle).expect("quest is in the journal")
    }

    fn data_mut(&mut self, handle: QuestHandle) -> &mut QuestData {
        self.journal
            .quests_mut()
            .iter_mut()
            .find(|quest| quest.handle() == handle)
            .expect("quest is in the journal")
            .data_mut()
    }
}

fn sent(effects: &[ObjectiveEffect]) -> Vec<&Message> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            ObjectiveEffect::Send(message) => Some(message),
            _ => None,
        })
        .collect()
}

fn reach_quest(config: ReachPointConfig) -> Quest {
    Quest::new("fetch", QuestCode::new(7), Faction::new(1))
        .with_giver(EntityId::new(99), Vec3::new(5.0, 70.0, 5.0))
        .with_objective(Objective::new("goto", 1, ReachPoint::new(config)))
}

fn countdown(seconds: f32, fail_when_zero: bool) -> CountDown {
    CountDown::new(CountDownConfig {
        length: CountdownLength::Seconds(seconds),
        fail_when_zero,
        ..CountDownConfig::default()
    })
}

fn horde_config(needed: u32) -> SpawnerConfig {
    let mut config = SpawnerConfig {
        needed_kills: needed,
        ..SpawnerConfig::default()
    };
    config.add_spawn_groups("zombies");
    config
}

fn progress(harness: &Harness, handle: QuestHandle, index: usize) -> Option<TargetProgress> {
    harness.quest(handle).objectives()[index].target_progress()
}

#[test]
fn reach_point_negotiates_target_then_completes() {
    let mut harness = Harness::new();
    let handle = harness.start(reach_quest(ReachPointConfig::default()));
    harness.tick(0.1);

    let effects = harness.take_effects();
    let messages = sent(&effects);
    let [Message::PositionRequest(request)] = messages[..] else {
        panic!("expected exactly one position request, got {effects:?}");
    };
    assert_eq!(request.code, QuestCode::new(7));
    assert_eq!(request.target, TargetKind::FlatArea);
    assert_eq!(request.position, Vec3::new(5.0, 70.0, 5.0), "anchored at the giver");
    assert!(request.ticket.is_some());
    assert_eq!(
        harness.quest(handle).data().pending_ticket(),
        request.ticket
    );
    assert_eq!(
        progress(&harness, handle, 0),
        Some(TargetProgress::WaitingForHostAnswer)
    );

    harness.tick(0.1);
    assert!(sent(&harness.take_effects()).is_empty(), "no duplicate request");

    let target = Vec3::new(50.0, 70.0, 0.0);
    let _ = harness
        .data_mut(handle)
        .set_position_data(PositionKind::NewTarget, target);
    harness.tick(0.1);
    assert_eq!(progress(&harness, handle, 0), Some(TargetProgress::Active));
    assert_eq!(harness.quest(handle).data().position(), Some(target));
    assert_eq!(
        harness
            .quest(handle)
            .data()
            .position_data(PositionKind::Location),
        Some(target)
    );
    assert!(harness.take_effects().iter().any(|effect| matches!(
        effect,
        ObjectiveEffect::ShowMarker { kind: PositionKind::Location, position, .. } if *position == target
    )));

    harness.move_player(Vec3::new(45.0, 70.0, 0.0));
    harness.tick(1.0);
    assert_eq!(progress(&harness, handle, 0), Some(TargetProgress::Reached));
    assert_eq!(harness.quest(handle).state(), QuestState::ReadyForTurnIn);

    assert!(harness.journal.turn_in(handle));
    assert_eq!(harness.quest(handle).state(), QuestState::Completed);
    assert!(!harness.journal.turn_in(handle));
}

#[test]
fn first_phase_uses_existing_quest_position() {
    let mut harness = Harness::new();
    let mut quest = reach_quest(ReachPointConfig::default());
    quest.data_mut().set_position(Vec3::new(0.0, 70.0, 80.0));
    let handle = harness.start(quest);
    harness.tick(0.1);

    assert!(sent(&harness.take_effects()).is_empty());
    assert_eq!(progress(&harness, handle, 0), Some(TargetProgress::Active));
}

#[test]
fn unresolved_answer_fails_the_quest() {
    let mut harness = Harness::new();
    let handle = harness.start(reach_quest(ReachPointConfig::default()));
    harness.tick(0.1);
    let _ = harness.take_effects();

    harness.data_mut(handle).mark_unresolved();
    harness.tick(0.1);

    let quest = harness.quest(handle);
    assert_eq!(quest.state(), QuestState::Failed);
    assert_eq!(quest.objectives()[0].state(), ObjectiveState::Failed);
    assert_eq!(quest.data().positions().count(), 0, "position data is dropped");
    assert!(harness
        .take_effects()
        .iter()
        .any(|effect| matches!(effect, ObjectiveEffect::HideMarker { .. })));
}

#[test]
fn reuse_without_any_position_fails() {
    let mut harness = Harness::new();
    let handle = harness.start(reach_quest(ReachPointConfig {
        target: TargetKind::Reuse,
        ..ReachPointConfig::default()
    }));
    harness.tick(0.1);
    assert_eq!(harness.quest(handle).state(), QuestState::Failed);
    assert!(sent(&harness.take_effects()).is_empty(), "reuse never asks the host");
}

#[test]
fn revocable_reach_loses_completion_when_leaving() {
    let mut harness = Harness::new();
    let mut quest = reach_quest(ReachPointConfig {
        only_reach_once: false,
        ..ReachPointConfig::default()
    })
    .with_objective(Objective::new("hold", 1, countdown(100.0, false)));
    quest.data_mut().set_position(Vec3::new(30.0, 70.0, 0.0));
    let handle = harness.start(quest);

    harness.move_player(Vec3::new(28.0, 70.0, 0.0));
    harness.tick(0.1);
    let objective = &harness.quest(handle).objectives()[0];
    assert!(objective.is_complete());
    assert_eq!(objective.target_progress(), Some(TargetProgress::Reached));

    harness.move_player(Vec3::new(0.0, 70.0, 0.0));
    harness.tick(1.0);
    let objective = &harness.quest(handle).objectives()[0];
    assert!(!objective.is_complete());
    assert_eq!(objective.state(), ObjectiveState::InProgress);
    assert_eq!(objective.target_progress(), Some(TargetProgress::Active));
    assert_eq!(harness.quest(handle).state(), QuestState::InProgress);
}

#[test]
fn stay_near_warns_then_fails_after_leaving() {
    let mut harness = Harness::new();
    let mut quest = Quest::new("guard", QuestCode::new(3), Faction::new(0))
        .with_objective(Objective::new(
            "stay",
            1,
            StayNear::new(StayNearConfig {
                warning_sound: Some("alarm".to_owned()),
                ..StayNearConfig::default()
            }),
        ))
        .with_objective(Objective::new("hold", 1, countdown(60.0, false)));
    quest.data_mut().set_position(Vec3::new(0.0, 70.0, 0.0));
    let handle = harness.start(quest);

    harness.move_player(Vec3::new(10.0, 70.0, 0.0));
    harness.tick(0.5);
    assert_eq!(
        harness.quest(handle).objectives()[0].state(),
        ObjectiveState::Complete
    );

    harness.move_player(Vec3::new(40.0, 70.0, 0.0));
    harness.tick(0.5);
    assert_eq!(
        harness.quest(handle).objectives()[0].state(),
        ObjectiveState::Warning
    );
    assert!(harness.take_effects().iter().any(|effect| matches!(
        effect,
        ObjectiveEffect::PlayWarning { sound, .. } if sound == "alarm"
    )));

    harness.move_player(Vec3::new(0.0, 70.0, 60.0));
    harness.tick(0.5);
    assert_eq!(harness.quest(handle).state(), QuestState::Failed);
    assert!(harness
        .take_effects()
        .iter()
        .any(|effect| matches!(effect, ObjectiveEffect::StopWarning { .. })));
}

#[test]
fn stay_near_does_not_fail_before_first_arrival() {
    let mut harness = Harness::new();
    let mut quest = Quest::new("guard", QuestCode::new(3), Faction::new(0))
        .with_objective(Objective::new("stay", 1, StayNear::new(StayNearConfig::default())))
        .with_objective(Objective::new("hold", 1, countdown(60.0, false)));
    quest.data_mut().set_position(Vec3::new(0.0, 70.0, 200.0));
    let handle = harness.start(quest);

    harness.tick(0.5);
    assert_eq!(harness.quest(handle).state(), QuestState::InProgress);
}

#[test]
fn deadline_countdown_fails_the_quest() {
    let mut harness = Harness::new();
    let mut quest = reach_quest(ReachPointConfig::default())
        .with_objective(Objective::new("deadline", 1, countdown(2.0, true)));
    quest.data_mut().set_position(Vec3::new(0.0, 70.0, 300.0));
    let handle = harness.start(quest);

    harness.tick(1.0);
    let deadline = &harness.quest(handle).objectives()[1];
    assert!(deadline.is_complete(), "deadline counts as complete while time is left");
    assert_eq!(harness.quest(handle).state(), QuestState::InProgress);

    harness.tick(1.5);
    let quest = harness.quest(handle);
    assert_eq!(quest.state(), QuestState::Failed);
    assert!(quest.objectives()[1].is_failed());
    assert!(
        !quest.objectives()[1].is_complete(),
        "failure overrides completion"
    );
}

#[test]
fn optional_countdown_is_complete_only_while_running() {
    let mut harness = Harness::new();
    let quest = Quest::new("timed", QuestCode::new(4), Faction::new(0))
        .with_objective(Objective::new("bonus", 1, countdown(1.0, false)).with_optional(true))
        .with_objective(Objective::new("wait", 1, countdown(5.0, false)));
    let handle = harness.start(quest);

    harness.tick(0.5);
    assert!(harness.quest(handle).objectives()[0].is_complete());
    assert!(!harness.quest(handle).objectives()[1].is_complete());

    harness.tick(1.0);
    assert!(!harness.quest(handle).objectives()[0].is_complete());
    assert!(!harness.quest(handle).objectives()[0].is_failed());

    harness.tick(4.0);
    assert_eq!(harness.quest(handle).state(), QuestState::ReadyForTurnIn);
}

#[test]
fn day_countdown_uses_world_day_length() {
    let mut harness = Harness::new();
    let quest = Quest::new("daily", QuestCode::new(5), Faction::new(0)).with_objective(
        Objective::new(
            "day",
            1,
            CountDown::new(CountDownConfig {
                length: CountdownLength::Day,
                ..CountDownConfig::default()
            }),
        ),
    );
    let handle = harness.start(quest);
    let ObjectiveKind::CountDown(timer) = harness.quest(handle).objectives()[0].kind() else {
        panic!("countdown expected");
    };
    assert_eq!(timer.remaining(), Some(DAY));
}

#[test]
fn kill_count_counts_only_the_players_kills() {
    let mut harness = Harness::new();
    let quest = Quest::new("cull", QuestCode::new(11), Faction::new(0))
        .with_objective(Objective::new("kill", 1, KillCount::new(horde_config(2))));
    let handle = harness.start(quest);

    let effects = harness.take_effects();
    let messages = sent(&effects);
    let [Message::StartSpawnerTask { player, config }] = messages[..] else {
        panic!("expected a spawner task, got {effects:?}");
    };
    assert_eq!(*player, harness.player);
    assert_eq!(config.needed_kills, 2);
    assert_eq!(config.target, None);
    assert_eq!(harness.bus.subscriber_count(), 1);

    let zombie = EntityClassId::new(7);
    let first = harness.spawn(zombie, EntityRole::Enemy, Vec3::new(20.0, 70.0, 0.0));
    let second = harness.spawn(zombie, EntityRole::Enemy, Vec3::new(-20.0, 70.0, 0.0));
    let third = harness.spawn(zombie, EntityRole::Enemy, Vec3::new(0.0, 70.0, 20.0));
    harness.tick(0.1);

    let player = harness.player;
    harness.kill(first, Some(player));
    harness.kill(second, Some(EntityId::new(500)));
    harness.tick(0.1);
    let ObjectiveKind::KillCount(kill) = harness.quest(handle).objectives()[0].kind() else {
        panic!("kill objective expected");
    };
    assert_eq!(kill.kills(), 1);
    assert_eq!(kill.tracked().len(), 1);

    harness.kill(third, Some(player));
    harness.tick(0.1);
    assert_eq!(harness.quest(handle).state(), QuestState::ReadyForTurnIn);
    assert_eq!(
        harness.bus.subscriber_count(),
        0,
        "finished phase releases its subscription"
    );
}

#[test]
fn invalid_horde_config_fails_at_activation() {
    let mut harness = Harness::new();
    let quest = Quest::new("cull", QuestCode::new(11), Faction::new(0)).with_objective(
        Objective::new("kill", 1, KillCount::new(SpawnerConfig::default())),
    );
    let handle = harness.start(quest);

    assert_eq!(harness.quest(handle).state(), QuestState::Failed);
    assert!(sent(&harness.take_effects()).is_empty());
    assert_eq!(harness.bus.subscriber_count(), 0);
}

#[test]
fn failing_a_horde_quest_stops_the_spawner() {
    let mut harness = Harness::new();
    let quest = Quest::new("cull", QuestCode::new(11), Faction::new(0))
        .with_objective(Objective::new("kill", 1, KillCount::new(horde_config(3))));
    let handle = harness.start(quest);
    let _ = harness.take_effects();

    harness.fail(handle);
    let effects = harness.take_effects();
    assert!(matches!(
        sent(&effects)[..],
        [Message::StopSpawnerTask { player }] if *player == harness.player
    ));
    assert_eq!(harness.bus.subscriber_count(), 0);
}

#[test]
fn player_death_fails_a_running_horde() {
    let mut harness = Harness::new();
    let quest = Quest::new("cull", QuestCode::new(11), Faction::new(0))
        .with_objective(Objective::new("kill", 1, KillCount::new(horde_config(3))));
    let handle = harness.start(quest);
    harness.tick(0.1);
    let _ = harness.take_effects();

    let player = harness.player;
    harness.kill(player, None);
    harness.tick(0.1);

    let quest = harness.quest(handle);
    assert_eq!(quest.state(), QuestState::Failed);
    assert_eq!(quest.objectives()[0].state(), ObjectiveState::Failed);
    assert!(sent(&harness.take_effects())
        .iter()
        .any(|message| matches!(message, Message::StopSpawnerTask { .. })));
}

#[test]
fn abandoning_drops_quest_and_subscriptions() {
    let mut harness = Harness::new();
    let quest = Quest::new("cull", QuestCode::new(11), Faction::new(0))
        .with_objective(Objective::new("kill", 1, KillCount::new(horde_config(3))));
    let handle = harness.start(quest);
    assert_eq!(harness.bus.subscriber_count(), 1);

    let env = ObjectiveEnv {
        player: harness.player,
        world: &harness.world,
        bus: &harness.bus,
        day_length_secs: DAY,
    };
    let removed = harness
        .journal
        .abandon(handle, env, &mut harness.effects)
        .expect("quest was present");
    assert_eq!(removed.state(), QuestState::Failed);
    assert!(harness.journal.quest(handle).is_none());
    assert_eq!(harness.bus.subscriber_count(), 0);
}

#[test]
fn cloned_quests_do_not_share_subscriptions() {
    let mut harness = Harness::new();
    let quest = Quest::new("cull", QuestCode::new(11), Faction::new(0))
        .with_objective(Objective::new("kill", 1, KillCount::new(horde_config(3))));
    let handle = harness.start(quest);

    let copy = harness.quest(handle).clone();
    assert!(harness.quest(handle).objectives()[0].is_subscribed());
    assert!(!copy.objectives()[0].is_subscribed());
    assert_eq!(harness.bus.subscriber_count(), 1);
}

#[test]
fn snapshot_restore_resumes_hordes_and_resends_requests() {
    let mut harness = Harness::new();
    let horde = harness.start(
        Quest::new("cull", QuestCode::new(11), Faction::new(0))
            .with_objective(Objective::new("kill", 1, KillCount::new(horde_config(3)))),
    );
    let pending = harness.start(reach_quest(ReachPointConfig::default()));
    let zombie = harness.spawn(
        EntityClassId::new(7),
        EntityRole::Enemy,
        Vec3::new(15.0, 70.0, 0.0),
    );
    let survivor = harness.spawn(
        EntityClassId::new(7),
        EntityRole::Enemy,
        Vec3::new(-15.0, 70.0, 0.0),
    );
    harness.tick(0.1);
    let player = harness.player;
    harness.kill(zombie, Some(player));
    harness.tick(0.1);
    let _ = harness.take_effects();

    let encoded = serde_json::to_string(&harness.journal.snapshot()).expect("snapshot encodes");
    let snapshot: JournalSnapshot = serde_json::from_str(&encoded).expect("snapshot decodes");
    assert_eq!(
        serde_json::to_string(&snapshot).expect("snapshot encodes"),
        encoded
    );

    let bus = EventBus::new();
    let mut effects = Vec::new();
    let env = ObjectiveEnv {
        player,
        world: &harness.world,
        bus: &bus,
        day_length_secs: DAY,
    };
    let mut restored = Journal::restore(snapshot, env, &mut effects);

    assert!(sent(&effects).iter().any(|message| matches!(
        message,
        Message::StartSpawnerTask { config, .. } if config.needed_kills == 2
    )));
    assert_eq!(bus.subscriber_count(), 1);
    let waiting = restored.quest(pending).expect("restored");
    assert_eq!(
        waiting.objectives()[0].target_progress(),
        Some(TargetProgress::NotStarted)
    );

    effects.clear();
    restored.update(Duration::from_millis(100), env, &mut effects);
    assert!(sent(&effects)
        .iter()
        .any(|message| matches!(message, Message::PositionRequest(request) if request.code == QuestCode::new(7))));
    assert_eq!(restored.quest(horde).map(Quest::state), Some(QuestState::InProgress));

    let mut events = Vec::new();
    apply(
        &mut harness.world,
        WorldCommand::KillEntity {
            entity: survivor,
            killer: Some(player),
        },
        &mut events,
    );
    bus.publish_all(&events);
    let env = ObjectiveEnv {
        player,
        world: &harness.world,
        bus: &bus,
        day_length_secs: DAY,
    };
    restored.update(Duration::from_millis(100), env, &mut effects);
    let quest = restored.quest(horde).expect("restored");
    let ObjectiveKind::KillCount(kill) = quest.objectives()[0].kind() else {
        panic!("kill objective expected");
    };
    assert_eq!(kill.kills(), 2, "horde member spawned before the snapshot counts");
    assert!(kill.tracked().is_empty());
}

#[test]
fn reaching_a_trader_records_it_for_the_faction() {
    let mut harness = Harness::new();
    let handle = harness.start(reach_quest(ReachPointConfig {
        target: TargetKind::TraderNext,
        update_npc: true,
        ..ReachPointConfig::default()
    }));
    harness.tick(0.1);

    let data = harness.data_mut(handle);
    let _ = data.set_position_data(PositionKind::NewTarget, Vec3::new(100.0, 70.0, 0.0));
    let _ = data.set_position_data(PositionKind::PoiPosition, Vec3::new(90.0, 70.0, -10.0));
    harness.tick(0.1);
    harness.move_player(Vec3::new(100.0, 70.0, 2.0));
    harness.tick(1.0);

    assert_eq!(
        harness.journal.traders().visited(Faction::new(1)),
        &[Vec2::new(90.0, -10.0)]
    );
    assert!(harness.journal.traders().visited(Faction::new(2)).is_empty());
}

#[test]
fn air_drop_delivers_then_waits_for_landing() {
    let mut harness = Harness::new();
    let mut quest = Quest::new("supply", QuestCode::new(21), Faction::new(0))
        .with_objective(Objective::new(
            "drop",
            1,
            AirDrop::new(AirDropConfig {
                wait_for_ground: false,
                ..AirDropConfig::default()
            }),
        ))
        .with_objective(Objective::new("land", 2, AirDropWait));
    let drop_point = Vec3::new(20.0, 70.0, 0.0);
    quest.data_mut().set_position(drop_point);
    let handle = harness.start(quest);

    harness.tick(1.0);
    let effects = harness.take_effects();
    assert!(matches!(
        sent(&effects)[..],
        [Message::StartAirDropTask { payload_class, position, .. }]
            if *payload_class == AIR_SUPPLY_CRATE && *position == drop_point
    ));

    let plane = harness.spawn(EntityClassId::new(9), EntityRole::Mover, Vec3::new(20.0, 240.0, -300.0));
    let payload = harness.spawn(AIR_SUPPLY_CRATE, EntityRole::Payload, Vec3::new(20.0, 200.0, 0.0));
    harness.tick(1.0);

    let quest = harness.quest(handle);
    assert_eq!(quest.objectives()[0].air_drop_crate(), Some(payload));
    assert!(quest.objectives()[0].is_complete());
    assert_eq!(quest.data().current_phase(), 2);
    let ObjectiveKind::AirDrop(drop) = quest.objectives()[0].kind() else {
        panic!("air drop expected");
    };
    assert_eq!(drop.plane(), Some(plane));
    let effects = harness.take_effects();
    assert!(effects.contains(&ObjectiveEffect::SetContainerLocked {
        entity: payload,
        locked: true
    }));
    assert!(effects.contains(&ObjectiveEffect::SetContainerLocked {
        entity: payload,
        locked: false
    }));

    harness.tick(0.1);
    assert_eq!(harness.quest(handle).state(), QuestState::InProgress);
    assert!(harness
        .quest(handle)
        .data()
        .position_data(PositionKind::CratePosition)
        .is_some());

    harness.command(WorldCommand::Tick {
        dt: Duration::from_secs(60),
    });
    harness.tick(0.1);
    assert_eq!(harness.quest(handle).state(), QuestState::ReadyForTurnIn);
}

#[test]
fn destroyed_crate_fails_the_drop() {
    let mut harness = Harness::new();
    let mut quest = Quest::new("supply", QuestCode::new(21), Faction::new(0))
        .with_objective(Objective::new("drop", 1, AirDrop::new(AirDropConfig::default())));
    quest.data_mut().set_position(Vec3::new(200.0, 70.0, 0.0));
    let handle = harness.start(quest);
    harness.tick(1.0);

    let payload = harness.spawn(AIR_SUPPLY_CRATE, EntityRole::Payload, Vec3::new(200.0, 180.0, 0.0));
    harness.tick(1.0);
    assert_eq!(
        harness.quest(handle).objectives()[0].air_drop_crate(),
        Some(payload)
    );
    assert_eq!(harness.quest(handle).state(), QuestState::InProgress);

    harness.kill(payload, None);
    harness.tick(1.0);
    assert_eq!(harness.quest(handle).state(), QuestState::Failed);
}

#[test]
fn player_death_fails_a_called_in_drop() {
    let mut harness = Harness::new();
    let mut quest = Quest::new("supply", QuestCode::new(21), Faction::new(0))
        .with_objective(Objective::new("drop", 1, AirDrop::new(AirDropConfig::default())));
    quest.data_mut().set_position(Vec3::new(60.0, 70.0, 0.0));
    let handle = harness.start(quest);
    harness.tick(1.0);
    assert!(sent(&harness.take_effects())
        .iter()
        .any(|message| matches!(message, Message::StartAirDropTask { .. })));

    let player = harness.player;
    harness.kill(player, None);
    harness.tick(1.0);

    let quest = harness.quest(handle);
    assert_eq!(quest.state(), QuestState::Failed);
    assert_eq!(quest.objectives()[0].state(), ObjectiveState::Failed);
}

#[test]
fn drop_waits_for_player_when_starting_at_position() {
    let mut harness = Harness::new();
    let mut quest = Quest::new("supply", QuestCode::new(21), Faction::new(0)).with_objective(
        Objective::new(
            "drop",
            1,
            AirDrop::new(AirDropConfig {
                start_at_pos: true,
                ..AirDropConfig::default()
            }),
        ),
    );
    quest.data_mut().set_position(Vec3::new(100.0, 70.0, 0.0));
    let _ = harness.start(quest);

    harness.tick(1.0);
    assert!(sent(&harness.take_effects()).is_empty());

    harness.move_player(Vec3::new(95.0, 70.0, 0.0));
    harness.tick(1.0);
    assert!(sent(&harness.take_effects())
        .iter()
        .any(|message| matches!(message, Message::StartAirDropTask { .. })));
}
