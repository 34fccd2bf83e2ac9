#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! In-process session wiring quest journals to the authoritative host.
//!
//! A [`Session`] plays both peers. Each player has a client side (their
//! [`Journal`] plus the markers, warnings and locks its effects produce) and
//! the host side owns the world, the position service and the world event
//! coordinators. The peers only talk through encoded messages, so a request
//! sent during one tick is answered at the start of the next.
//!
//! Every tick runs the same order:
//!
//! 1. the host handles the messages clients sent,
//! 2. clients reconcile the responses the host sent back,
//! 3. events of game-loop commands are published,
//! 4. horde spawners and air drops are polled,
//! 5. the world advances and its events are published,
//! 6. journals update and their effects are carried out.

mod config;
mod link;

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use questline_core::{EntityClassId, EntityId, Message, PositionKind, QuestHandle, Vec3, WorldEvent};
use questline_system_air_drop::AirDropSequencer;
use questline_system_coordinator::{CoordinatorSet, Outcome};
use questline_system_events::EventBus;
use questline_system_negotiation::{reconcile, PositionService, Reconciliation};
use questline_system_objectives::{Journal, JournalSnapshot, ObjectiveEffect, ObjectiveEnv, Quest};
use questline_system_position::PositionResolver;
use questline_system_spawning::HordeSpawner;
use questline_world::{apply, seed, EntityHost, EntityObserver, SimWorld, WorldCommand};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

pub use config::SessionConfig;
pub use link::Traffic;

use link::Link;

/// Errors raised by player-facing session operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The player never joined the session or is dead.
    #[error("player {} is not part of the session", .0.get())]
    UnknownPlayer(EntityId),
    /// The quest could not be started.
    #[error("quest {} could not be started", .0.get())]
    QuestNotStarted(QuestHandle),
    /// The quest is not in the journal.
    #[error("quest {} is not in the journal", .0.get())]
    UnknownQuest(QuestHandle),
}

/// Client-side state of one player.
#[derive(Debug)]
struct Client {
    journal: Journal,
    markers: BTreeMap<(QuestHandle, PositionKind), Vec3>,
    warnings: BTreeSet<(QuestHandle, String)>,
}

impl Client {
    fn new(journal: Journal) -> Self {
        Self {
            journal,
            markers: BTreeMap::new(),
            warnings: BTreeSet::new(),
        }
    }
}

/// Host and clients of one game, advanced in lockstep.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    world: SimWorld,
    bus: EventBus,
    clients: BTreeMap<EntityId, Client>,
    service: PositionService,
    search_rng: ChaCha8Rng,
    spawners: CoordinatorSet<HordeSpawner>,
    air_drops: CoordinatorSet<AirDropSequencer>,
    instances: u64,
    to_host: Link,
    to_clients: Link,
    events: Vec<WorldEvent>,
    locked: BTreeSet<EntityId>,
    finished: Vec<(EntityId, Outcome)>,
}

impl Session {
    /// Builds the world described by `config`.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let mut world = SimWorld::new(config.world);
        for feature in &config.features {
            world.add_feature(*feature);
        }
        for poi in &config.pois {
            world.add_poi(poi.clone());
        }
        for name in &config.locked_pois {
            world.lock_poi(name);
        }
        for (name, group) in &config.spawn_groups {
            world.add_spawn_group(name, group.clone());
        }
        log::info!(
            "session seeded with {} ({} structures, {} spawn groups)",
            config.seed,
            config.pois.len(),
            config.spawn_groups.len()
        );

        Self {
            service: PositionService::new(PositionResolver::new(config.search)),
            search_rng: seed::stream(config.seed, seed::POSITION_STREAM),
            config,
            world,
            bus: EventBus::new(),
            clients: BTreeMap::new(),
            spawners: CoordinatorSet::new(),
            air_drops: CoordinatorSet::new(),
            instances: 0,
            to_host: Link::default(),
            to_clients: Link::default(),
            events: Vec::new(),
            locked: BTreeSet::new(),
            finished: Vec::new(),
        }
    }

    /// Settings the session was built with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Authoritative world.
    #[must_use]
    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    /// Spawns a player with an empty journal.
    pub fn add_player(&mut self, position: Vec3, game_stage: u32) -> EntityId {
        let player = self.world.add_player(position, game_stage);
        let _ = self.clients.insert(player, Client::new(Journal::new(player)));
        log::info!("player {} joined at {position}", player.get());
        player
    }

    /// Journal of `player`.
    #[must_use]
    pub fn journal(&self, player: EntityId) -> Option<&Journal> {
        self.clients.get(&player).map(|client| &client.journal)
    }

    /// Quest `handle` of `player`.
    #[must_use]
    pub fn quest(&self, player: EntityId, handle: QuestHandle) -> Option<&Quest> {
        self.journal(player)?.quest(handle)
    }

    /// Navigation markers currently shown to `player`.
    #[must_use]
    pub fn markers(&self, player: EntityId) -> Vec<(QuestHandle, PositionKind, Vec3)> {
        self.clients.get(&player).map_or_else(Vec::new, |client| {
            client
                .markers
                .iter()
                .map(|(&(quest, kind), &position)| (quest, kind, position))
                .collect()
        })
    }

    /// Warning sounds currently playing for `player`.
    #[must_use]
    pub fn warnings(&self, player: EntityId) -> Vec<(QuestHandle, String)> {
        self.clients.get(&player).map_or_else(Vec::new, |client| {
            client.warnings.iter().cloned().collect()
        })
    }

    /// Whether the container entity is locked.
    #[must_use]
    pub fn is_locked(&self, entity: EntityId) -> bool {
        self.locked.contains(&entity)
    }

    /// Running horde spawners.
    #[must_use]
    pub fn spawners(&self) -> &CoordinatorSet<HordeSpawner> {
        &self.spawners
    }

    /// Running air drops.
    #[must_use]
    pub fn air_drops(&self) -> &CoordinatorSet<AirDropSequencer> {
        &self.air_drops
    }

    /// Coordinators that finished since the last call, with their outcome.
    pub fn take_finished(&mut self) -> Vec<(EntityId, Outcome)> {
        std::mem::take(&mut self.finished)
    }

    /// Traffic sent by clients and by the host.
    #[must_use]
    pub fn traffic(&self) -> (Traffic, Traffic) {
        (self.to_host.traffic(), self.to_clients.traffic())
    }

    /// Adds a quest to the journal of `player` and starts it.
    pub fn accept_quest(&mut self, player: EntityId, quest: Quest) -> Result<QuestHandle, SessionError> {
        let day_length = self.config.world.day_length_secs;
        let Some(client) = self.clients.get_mut(&player) else {
            return Err(SessionError::UnknownPlayer(player));
        };
        let name = quest.data().name().to_owned();
        let handle = client.journal.add(quest);
        let mut effects = Vec::new();
        let started = client.journal.start(
            handle,
            env(player, &self.world, &self.bus, day_length),
            &mut effects,
        );
        self.carry_out(player, effects);
        if !started {
            return Err(SessionError::QuestNotStarted(handle));
        }
        log::info!("player {} accepted quest {name}", player.get());
        Ok(handle)
    }

    /// Places the first target of a quest offered by a giver standing at
    /// `giver_position`, then accepts it.
    pub fn offer_quest(
        &mut self,
        player: EntityId,
        mut quest: Quest,
        giver_position: Vec3,
    ) -> Result<QuestHandle, SessionError> {
        let Some(client) = self.clients.get(&player) else {
            return Err(SessionError::UnknownPlayer(player));
        };
        let exclusions = client
            .journal
            .traders()
            .visited(quest.data().faction())
            .to_vec();
        if !self.service.setup_offered_quest(
            &self.world,
            &mut self.search_rng,
            &mut quest,
            giver_position,
            &exclusions,
        ) {
            log::debug!(
                "quest {} negotiates its first target after acceptance",
                quest.data().name()
            );
        }
        self.accept_quest(player, quest)
    }

    /// Fails a running quest.
    pub fn fail_quest(&mut self, player: EntityId, handle: QuestHandle) -> Result<(), SessionError> {
        let day_length = self.config.world.day_length_secs;
        let Some(client) = self.clients.get_mut(&player) else {
            return Err(SessionError::UnknownPlayer(player));
        };
        let mut effects = Vec::new();
        let failed = client.journal.fail(
            handle,
            env(player, &self.world, &self.bus, day_length),
            &mut effects,
        );
        self.carry_out(player, effects);
        if failed {
            Ok(())
        } else {
            Err(SessionError::UnknownQuest(handle))
        }
    }

    /// Removes a quest from the journal, stopping whatever it started.
    pub fn abandon_quest(&mut self, player: EntityId, handle: QuestHandle) -> Result<Quest, SessionError> {
        let day_length = self.config.world.day_length_secs;
        let Some(client) = self.clients.get_mut(&player) else {
            return Err(SessionError::UnknownPlayer(player));
        };
        let mut effects = Vec::new();
        let abandoned = client.journal.abandon(
            handle,
            env(player, &self.world, &self.bus, day_length),
            &mut effects,
        );
        client.markers.retain(|(quest, _), _| *quest != handle);
        client.warnings.retain(|(quest, _)| *quest != handle);
        self.carry_out(player, effects);
        abandoned.ok_or(SessionError::UnknownQuest(handle))
    }

    /// Hands in a quest that is ready for turn-in.
    pub fn turn_in(&mut self, player: EntityId, handle: QuestHandle) -> bool {
        self.clients
            .get_mut(&player)
            .map_or(false, |client| client.journal.turn_in(handle))
    }

    /// Persisted journal of `player`.
    #[must_use]
    pub fn snapshot(&self, player: EntityId) -> Option<JournalSnapshot> {
        self.journal(player).map(Journal::snapshot)
    }

    /// Replaces the journal of the snapshot owner with the restored one.
    pub fn restore(&mut self, snapshot: JournalSnapshot) -> Result<(), SessionError> {
        let player = snapshot.owner;
        if !self.world.is_alive(player) {
            return Err(SessionError::UnknownPlayer(player));
        }
        let mut effects = Vec::new();
        let journal = Journal::restore(
            snapshot,
            env(player, &self.world, &self.bus, self.config.world.day_length_secs),
            &mut effects,
        );
        let _ = self.clients.insert(player, Client::new(journal));
        self.carry_out(player, effects);
        Ok(())
    }

    /// Feeds a game-loop mutation into the world. Its events are published
    /// during the next tick.
    pub fn command(&mut self, command: WorldCommand) {
        apply(&mut self.world, command, &mut self.events);
    }

    /// Advances the session by one configured tick.
    pub fn tick(&mut self) {
        self.tick_for(self.config.tick());
    }

    /// Advances the session by `dt`.
    pub fn tick_for(&mut self, dt: Duration) {
        self.deliver_to_host();
        self.deliver_to_clients();
        self.publish_pending();

        let finished_spawners = self.spawners.poll_all(dt, &mut self.world);
        let finished_drops = self.air_drops.poll_all(dt, &mut self.world);
        self.finished.extend(finished_spawners);
        self.finished.extend(finished_drops);

        apply(&mut self.world, WorldCommand::Tick { dt }, &mut self.events);
        self.publish_pending();

        self.update_journals(dt);
    }

    fn publish_pending(&mut self) {
        self.bus.publish_all(&self.events);
        self.events.clear();
    }

    /// Shuts every coordinator down, killing what they spawned.
    pub fn reset(&mut self) {
        self.spawners.reset(&mut self.world);
        self.air_drops.reset(&mut self.world);
        log::info!("session coordinators reset");
    }

    fn deliver_to_host(&mut self) {
        for (sender, message) in self.to_host.receive() {
            match message {
                Message::PositionRequest(request) => {
                    let exclusions = self
                        .clients
                        .get(&sender)
                        .map(|client| client.journal.traders().visited(request.faction).to_vec())
                        .unwrap_or_default();
                    let response = self.service.handle_request(
                        &self.world,
                        &mut self.search_rng,
                        sender,
                        &request,
                        &exclusions,
                    );
                    self.to_clients
                        .send(sender, &Message::PositionResponse(response));
                }
                Message::StartSpawnerTask { player, config } => {
                    if player != sender {
                        log::warn!(
                            "player {} asked for a horde on behalf of {}",
                            sender.get(),
                            player.get()
                        );
                    }
                    let rng = self.next_stream(seed::SPAWNER_STREAM);
                    let spawner = HordeSpawner::new(sender, config, &self.bus, rng);
                    if self.spawners.start(spawner, &mut self.world).is_err() {
                        self.finished.push((sender, Outcome::Rejected));
                    }
                }
                Message::StopSpawnerTask { .. } => {
                    let _ = self.spawners.stop(sender, &mut self.world);
                }
                Message::StartAirDropTask {
                    payload_class,
                    position,
                    ..
                } => self.start_air_drop(sender, payload_class, position),
                Message::PositionResponse(_) => {
                    log::warn!("host ignores a response sent by player {}", sender.get());
                }
            }
        }
    }

    fn start_air_drop(&mut self, player: EntityId, payload_class: EntityClassId, position: Vec3) {
        let rng = self.next_stream(seed::AIR_DROP_STREAM);
        let sequencer =
            AirDropSequencer::new(player, payload_class, position, self.config.air_drop, rng);
        if self.air_drops.start(sequencer, &mut self.world).is_err() {
            self.finished.push((player, Outcome::Rejected));
        }
    }

    fn next_stream(&mut self, label: &str) -> ChaCha8Rng {
        self.instances += 1;
        seed::instance_stream(self.config.seed, label, self.instances)
    }

    fn deliver_to_clients(&mut self) {
        for (player, message) in self.to_clients.receive() {
            let Some(client) = self.clients.get_mut(&player) else {
                log::debug!("player {} left before its answer arrived", player.get());
                continue;
            };
            match message {
                Message::PositionResponse(response) => {
                    if let Reconciliation::Applied { quest } =
                        reconcile(&mut client.journal, &response)
                    {
                        log::debug!("player {} placed quest {}", player.get(), quest.get());
                    }
                }
                other => {
                    log::warn!("player {} ignores host-bound message {other:?}", player.get());
                }
            }
        }
    }

    fn update_journals(&mut self, dt: Duration) {
        let day_length = self.config.world.day_length_secs;
        let mut produced = Vec::new();
        for (player, client) in &mut self.clients {
            let mut effects = Vec::new();
            client.journal.update(
                dt,
                env(*player, &self.world, &self.bus, day_length),
                &mut effects,
            );
            if !effects.is_empty() {
                produced.push((*player, effects));
            }
        }
        for (player, effects) in produced {
            self.carry_out(player, effects);
        }
    }

    fn carry_out(&mut self, player: EntityId, effects: Vec<ObjectiveEffect>) {
        for effect in effects {
            match effect {
                ObjectiveEffect::Send(message) => {
                    if message.is_host_bound() {
                        self.to_host.send(player, &message);
                    } else {
                        log::warn!("player {} tried to send {message:?}", player.get());
                    }
                }
                ObjectiveEffect::KillEntity(entity) => self.world.kill(entity),
                ObjectiveEffect::SetContainerLocked { entity, locked } => {
                    let _ = if locked {
                        self.locked.insert(entity)
                    } else {
                        self.locked.remove(&entity)
                    };
                }
                ObjectiveEffect::ShowMarker {
                    quest,
                    kind,
                    position,
                    label,
                } => {
                    if let Some(client) = self.clients.get_mut(&player) {
                        log::debug!(
                            "marker {kind:?} of quest {} at {position} {}",
                            quest.get(),
                            label.as_deref().unwrap_or_default()
                        );
                        let _ = client.markers.insert((quest, kind), position);
                    }
                }
                ObjectiveEffect::HideMarker { quest, kind } => {
                    if let Some(client) = self.clients.get_mut(&player) {
                        let _ = client.markers.remove(&(quest, kind));
                    }
                }
                ObjectiveEffect::PlayWarning { quest, sound } => {
                    if let Some(client) = self.clients.get_mut(&player) {
                        log::info!("player {} hears {sound}", player.get());
                        let _ = client.warnings.insert((quest, sound));
                    }
                }
                ObjectiveEffect::StopWarning { quest, sound } => {
                    if let Some(client) = self.clients.get_mut(&player) {
                        let _ = client.warnings.remove(&(quest, sound));
                    }
                }
            }
        }
    }
}

fn env<'a>(player: EntityId, world: &'a SimWorld, bus: &'a EventBus, day_length_secs: f32) -> ObjectiveEnv<'a> {
    ObjectiveEnv {
        player,
        world,
        bus,
        day_length_secs,
    }
}
