#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host-side lifecycle shared by every world event coordinator.
//!
//! A coordinator is a long-running task owned by one player: it is polled on
//! every host tick until it reports [`Poll::Done`], and it can be aborted or
//! shut down from outside at any time. [`CoordinatorSet`] keeps at most one
//! coordinator of a kind per player.

use std::{collections::BTreeMap, time::Duration};

use questline_core::{ConfigError, EntityId};
use questline_world::EntityHost;

/// Why a coordinator finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The task reached its goal.
    Completed,
    /// The owning player disappeared or died.
    PlayerLost,
    /// The task was aborted from outside.
    Aborted,
    /// The task never started because its configuration was unusable.
    Rejected,
}

/// Result of polling a coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Poll {
    /// The coordinator needs further polls.
    Pending,
    /// The coordinator finished and can be dropped.
    Done(Outcome),
}

impl Poll {
    /// Reports whether the coordinator finished.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

/// What happens to entities a coordinator still tracks when it shuts down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposal {
    /// Leave tracked entities in the world.
    Release,
    /// Kill every tracked entity.
    KillTracked,
}

/// Long-running host task owned by a single player.
pub trait Coordinator {
    /// Player the coordinator works for.
    fn owner(&self) -> EntityId;

    /// Rejects configurations that could never run.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Advances the task by `dt`.
    fn poll(&mut self, dt: Duration, host: &mut dyn EntityHost) -> Poll;

    /// Requests the task to stop. The next poll reports [`Outcome::Aborted`].
    fn abort(&mut self);

    /// Releases every host resource the task holds.
    fn shutdown(&mut self, host: &mut dyn EntityHost, disposal: Disposal);
}

/// Coordinators of one kind, keyed by their owner.
#[derive(Debug)]
pub struct CoordinatorSet<C> {
    running: BTreeMap<EntityId, C>,
}

impl<C> Default for CoordinatorSet<C> {
    fn default() -> Self {
        Self {
            running: BTreeMap::new(),
        }
    }
}

impl<C: Coordinator> CoordinatorSet<C> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a coordinator, shutting down the one its owner already runs.
    ///
    /// An invalid coordinator is rejected and the running one is kept.
    pub fn start(&mut self, coordinator: C, host: &mut dyn EntityHost) -> Result<(), ConfigError> {
        let owner = coordinator.owner();
        if let Err(error) = coordinator.validate() {
            log::warn!("rejected coordinator for player {}: {error}", owner.get());
            return Err(error);
        }
        if let Some(mut previous) = self.running.insert(owner, coordinator) {
            log::debug!("replacing coordinator of player {}", owner.get());
            previous.shutdown(host, Disposal::Release);
        }
        log::info!("started coordinator for player {}", owner.get());
        Ok(())
    }

    /// Stops the coordinator of `player`, leaving its entities alive.
    pub fn stop(&mut self, player: EntityId, host: &mut dyn EntityHost) -> bool {
        let Some(mut coordinator) = self.running.remove(&player) else {
            return false;
        };
        coordinator.shutdown(host, Disposal::Release);
        log::info!("stopped coordinator of player {}", player.get());
        true
    }

    /// Aborts the coordinator of `player`. It is dropped on the next poll.
    pub fn abort(&mut self, player: EntityId) -> bool {
        self.running
            .get_mut(&player)
            .map(Coordinator::abort)
            .is_some()
    }

    /// Polls every coordinator in owner order and drops the finished ones.
    pub fn poll_all(&mut self, dt: Duration, host: &mut dyn EntityHost) -> Vec<(EntityId, Outcome)> {
        let mut finished = Vec::new();
        for (owner, coordinator) in &mut self.running {
            if let Poll::Done(outcome) = coordinator.poll(dt, host) {
                finished.push((*owner, outcome));
            }
        }
        for (owner, outcome) in &finished {
            if let Some(mut coordinator) = self.running.remove(owner) {
                coordinator.shutdown(host, Disposal::Release);
            }
            log::info!("coordinator of player {} finished: {outcome:?}", owner.get());
        }
        finished
    }

    /// Shuts every coordinator down and kills what they tracked.
    pub fn reset(&mut self, host: &mut dyn EntityHost) {
        for (_, mut coordinator) in std::mem::take(&mut self.running) {
            coordinator.shutdown(host, Disposal::KillTracked);
        }
    }

    /// Coordinator run by `player`.
    #[must_use]
    pub fn get(&self, player: EntityId) -> Option<&C> {
        self.running.get(&player)
    }

    /// Whether `player` runs a coordinator.
    #[must_use]
    pub fn contains(&self, player: EntityId) -> bool {
        self.running.contains_key(&player)
    }

    /// Number of running coordinators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Whether no coordinator runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core::{EntityClassId, EntityRole, Vec3};
    use questline_world::{EntityObserver, SimWorld, SpawnOrder};

    #[derive(Debug)]
    struct Stub {
        owner: EntityId,
        polls_left: u32,
        tracked: Vec<EntityId>,
        aborted: bool,
        valid: bool,
    }

    impl Stub {
        fn new(owner: EntityId, polls_left: u32) -> Self {
            Self {
                owner,
                polls_left,
                tracked: Vec::new(),
                aborted: false,
                valid: true,
            }
        }
    }

    impl Coordinator for Stub {
        fn owner(&self) -> EntityId {
            self.owner
        }

        fn validate(&self) -> Result<(), ConfigError> {
            if self.valid {
                Ok(())
            } else {
                Err(ConfigError::ZeroNeededKills)
            }
        }

        fn poll(&mut self, _dt: Duration, host: &mut dyn EntityHost) -> Poll {
            if self.aborted {
                return Poll::Done(Outcome::Aborted);
            }
            if !host.is_alive(self.owner) {
                return Poll::Done(Outcome::PlayerLost);
            }
            if self.polls_left == 0 {
                return Poll::Done(Outcome::Completed);
            }
            self.polls_left -= 1;
            Poll::Pending
        }

        fn abort(&mut self) {
            self.aborted = true;
        }

        fn shutdown(&mut self, host: &mut dyn EntityHost, disposal: Disposal) {
            if disposal == Disposal::KillTracked {
                for entity in self.tracked.drain(..) {
                    host.kill(entity);
                }
            }
        }
    }

    fn enemy(world: &mut SimWorld, owner: EntityId) -> EntityId {
        world
            .spawn(SpawnOrder {
                class: EntityClassId::new(4),
                role: EntityRole::Enemy,
                position: Vec3::new(10.0, 70.0, 0.0),
                yaw_degrees: 0.0,
                velocity: Vec3::ZERO,
                spawned_by: Some(owner),
            })
            .expect("spawn inside bounds")
    }

    #[test]
    fn finished_coordinators_are_dropped() {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        let mut set = CoordinatorSet::new();
        set.start(Stub::new(player, 1), &mut world).expect("valid");

        let dt = Duration::from_millis(250);
        assert!(set.poll_all(dt, &mut world).is_empty());
        assert_eq!(
            set.poll_all(dt, &mut world),
            vec![(player, Outcome::Completed)]
        );
        assert!(set.is_empty());
    }

    #[test]
    fn restarting_replaces_the_running_coordinator() {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        let mut set = CoordinatorSet::new();
        set.start(Stub::new(player, 5), &mut world).expect("valid");
        set.start(Stub::new(player, 9), &mut world).expect("valid");
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(player).map(|stub| stub.polls_left), Some(9));
    }

    #[test]
    fn invalid_coordinator_keeps_the_previous_one() {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        let mut set = CoordinatorSet::new();
        set.start(Stub::new(player, 5), &mut world).expect("valid");

        let mut broken = Stub::new(player, 1);
        broken.valid = false;
        assert_eq!(
            set.start(broken, &mut world),
            Err(ConfigError::ZeroNeededKills)
        );
        assert_eq!(set.get(player).map(|stub| stub.polls_left), Some(5));
    }

    #[test]
    fn abort_is_reported_on_next_poll() {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        let mut set = CoordinatorSet::new();
        set.start(Stub::new(player, 5), &mut world).expect("valid");
        assert!(set.abort(player));
        assert!(!set.abort(EntityId::new(404)));
        assert_eq!(
            set.poll_all(Duration::ZERO, &mut world),
            vec![(player, Outcome::Aborted)]
        );
    }

    #[test]
    fn reset_kills_tracked_entities() {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        let minion = enemy(&mut world, player);
        let mut stub = Stub::new(player, 5);
        stub.tracked.push(minion);

        let mut set = CoordinatorSet::new();
        set.start(stub, &mut world).expect("valid");
        assert!(!set.stop(EntityId::new(404), &mut world));
        set.reset(&mut world);
        assert!(set.is_empty());
        assert!(!world.is_alive(minion));
    }

    #[test]
    fn stop_releases_tracked_entities() {
        let mut world = SimWorld::default();
        let player = world.add_player(Vec3::new(0.0, 70.0, 0.0), 1);
        let minion = enemy(&mut world, player);
        let mut stub = Stub::new(player, 5);
        stub.tracked.push(minion);

        let mut set = CoordinatorSet::new();
        set.start(stub, &mut world).expect("valid");
        assert!(set.stop(player, &mut world));
        assert!(world.is_alive(minion));
    }
}
