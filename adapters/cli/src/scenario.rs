//! Scripted players driving a session through a single quest.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use questline_core::{
    EntityId, EntityRole, Faction, QuestCode, QuestHandle, QuestState, SpawnerConfig, Vec3,
};
use questline_session::{Session, SessionConfig, Traffic};
use questline_system_objectives::{
    AirDrop, AirDropConfig, KillCount, Objective, Quest, ReachPoint, ReachPointConfig,
};
use questline_world::{query, EntityObserver, WorldCommand};
use serde::Deserialize;

const PLAYER_START: Vec3 = Vec3::new(0.0, 70.0, 0.0);
const PLAYER_GAME_STAGE: u32 = 10;
const GIVER: EntityId = EntityId::new(10_000);
const GIVER_OFFSET: Vec3 = Vec3::new(4.0, 0.0, 4.0);
const WALK_SPEED: f32 = 6.0;
const SHOT_INTERVAL_SECS: f32 = 1.5;

/// Settings read from a scenario file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ScenarioFile {
    /// Session the scenario runs in.
    pub(crate) session: SessionConfig,
    /// Horde fought by the horde scenario.
    pub(crate) horde: Option<SpawnerConfig>,
}

impl ScenarioFile {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let file: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        file.session
            .validate()
            .with_context(|| format!("invalid session in {}", path.display()))?;
        Ok(file)
    }
}

/// Quest played by the scripted player.
#[derive(Clone, Debug)]
pub(crate) enum Scenario {
    /// Walk up to a host-selected flat area.
    Reach,
    /// Shoot the horde until enough kills are credited.
    Horde(SpawnerConfig),
    /// Walk to the drop zone and wait for the crate to land.
    AirDrop,
}

impl Scenario {
    /// Horde scenario needing `kills` kills, drawn from the default groups
    /// unless the file configures its own horde.
    pub(crate) fn horde(configured: Option<SpawnerConfig>, kills: Option<u32>) -> Self {
        let mut config = configured.unwrap_or_else(|| {
            let mut config = SpawnerConfig::default();
            config.add_spawn_groups("zombies");
            config
        });
        if let Some(kills) = kills {
            config.needed_kills = kills;
        }
        Self::Horde(config)
    }

    fn quest(&self) -> Quest {
        match self {
            Self::Reach => Quest::new("scout the area", QuestCode::new(1), Faction::new(1))
                .with_giver(GIVER, PLAYER_START + GIVER_OFFSET)
                .with_objective(Objective::new(
                    "goto",
                    1,
                    ReachPoint::new(ReachPointConfig::default()),
                )),
            Self::Horde(config) => Quest::new("clear the horde", QuestCode::new(2), Faction::new(1))
                .with_objective(Objective::new("kill", 1, KillCount::new(config.clone()))),
            Self::AirDrop => Quest::new("supply run", QuestCode::new(3), Faction::new(0))
                .with_objective(Objective::new(
                    "drop",
                    1,
                    AirDrop::new(AirDropConfig::default()),
                )),
        }
    }
}

/// Summary of a finished run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Report {
    pub(crate) player: EntityId,
    pub(crate) handle: QuestHandle,
    pub(crate) ticks: u32,
    pub(crate) state: QuestState,
    pub(crate) shots: u32,
    pub(crate) sent: Traffic,
    pub(crate) answered: Traffic,
}

/// Plays `scenario` until the quest leaves the running state or `max_ticks` pass.
pub(crate) fn run(session: &mut Session, scenario: &Scenario, max_ticks: u32) -> Result<Report> {
    let player = session.add_player(PLAYER_START, PLAYER_GAME_STAGE);
    let handle = session
        .accept_quest(player, scenario.quest())
        .context("scenario quest did not start")?;
    let tick_secs = session.config().tick().as_secs_f32();
    let mut since_shot = 0.0;
    let mut shots = 0;

    let mut ticks = 0;
    let state = loop {
        let state = quest_state(session, player, handle)?;
        if state != QuestState::InProgress || ticks >= max_ticks {
            break state;
        }
        session.tick();
        ticks += 1;

        match scenario {
            Scenario::Reach | Scenario::AirDrop => walk_to_target(session, player, handle, tick_secs),
            Scenario::Horde(_) => {
                since_shot += tick_secs;
                if since_shot >= SHOT_INTERVAL_SECS && shoot_nearest(session, player) {
                    since_shot = 0.0;
                    shots += 1;
                }
            }
        }
    };
    if state == QuestState::InProgress {
        log::warn!("quest still running after {ticks} ticks");
    }

    let (sent, answered) = session.traffic();
    Ok(Report {
        player,
        handle,
        ticks,
        state,
        shots,
        sent,
        answered,
    })
}

fn quest_state(session: &Session, player: EntityId, handle: QuestHandle) -> Result<QuestState> {
    match session.quest(player, handle) {
        Some(quest) => Ok(quest.state()),
        None => bail!("quest {} vanished from the journal", handle.get()),
    }
}

fn walk_to_target(session: &mut Session, player: EntityId, handle: QuestHandle, dt: f32) {
    let Some(target) = session
        .quest(player, handle)
        .and_then(|quest| quest.data().position())
    else {
        return;
    };
    let Some(position) = session.world().position_of(player) else {
        return;
    };
    let offset = target - position;
    let stride = WALK_SPEED * dt;
    let next = if offset.length() <= stride {
        target
    } else {
        position + offset.normalize() * stride
    };
    session.command(WorldCommand::MoveEntity {
        entity: player,
        position: next,
    });
}

fn shoot_nearest(session: &mut Session, player: EntityId) -> bool {
    let Some(position) = session.world().position_of(player) else {
        return false;
    };
    let nearest = query::living_with_role(session.world(), EntityRole::Enemy)
        .into_iter()
        .filter_map(|enemy| {
            session
                .world()
                .position_of(enemy)
                .map(|at| (enemy, at.distance_squared(position)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(enemy, _)| enemy);
    let Some(enemy) = nearest else {
        return false;
    };
    log::debug!("player {} shoots {}", player.get(), enemy.get());
    session.command(WorldCommand::KillEntity {
        entity: enemy,
        killer: Some(player),
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_players_finish_every_scenario() {
        for scenario in [
            Scenario::Reach,
            Scenario::horde(None, Some(3)),
            Scenario::AirDrop,
        ] {
            let mut session = Session::new(SessionConfig::default());
            let report = run(&mut session, &scenario, 3_000).expect("scenario runs");
            assert_eq!(
                report.state,
                QuestState::ReadyForTurnIn,
                "{scenario:?} after {} ticks",
                report.ticks
            );
        }
    }

    #[test]
    fn horde_override_replaces_needed_kills() {
        let Scenario::Horde(config) = Scenario::horde(None, Some(9)) else {
            panic!("horde scenario expected");
        };
        assert_eq!(config.needed_kills, 9);
        assert_eq!(config.spawn_groups, vec!["zombies".to_owned()]);
    }

    #[test]
    fn scenario_file_nests_session_and_horde() {
        let file: ScenarioFile = toml::from_str(
            r#"
            [session]
            seed = 9

            [horde]
            needed_kills = 2
            spawn_groups = ["zombies"]
            "#,
        )
        .expect("valid scenario");
        assert_eq!(file.session.seed, 9);
        assert_eq!(file.horde.map(|horde| horde.needed_kills), Some(2));
    }
}
