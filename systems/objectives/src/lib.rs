#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Client-side objective state machines.
//!
//! A [`Journal`] owns the quests of one player. Each [`Quest`] is a list of
//! phased [`Objective`] values sharing one [`QuestData`] record. Only the
//! objectives of the current phase update; each of them sees the objectives
//! defined before it, which is how follow-up objectives find the crate of an
//! earlier air drop.
//!
//! Objectives never talk to the host directly. Everything they want done
//! (position requests, coordinator tasks, markers, sounds) is queued as an
//! [`ObjectiveEffect`] for the session to carry out. Lifecycle events reach
//! them through scoped [`questline_system_events::Subscription`] guards that
//! are drained before the objective's own update runs.

pub mod air_drop;
pub mod context;
pub mod countdown;
pub mod journal;
pub mod kill;
pub mod objective;
pub mod progress;
pub mod quest;
pub mod reach;
pub mod stay;

pub use air_drop::{AirDrop, AirDropAlive, AirDropConfig, AirDropWait, AIR_SUPPLY_CRATE};
pub use context::{ObjectiveContext, ObjectiveEffect, ObjectiveEnv};
pub use countdown::{CountDown, CountDownConfig, CountdownLength};
pub use journal::{Journal, JournalSnapshot, TicketCounter, TraderLedger};
pub use kill::KillCount;
pub use objective::{Objective, ObjectiveKind, ObjectiveRecord};
pub use progress::{Completion, TargetProgress};
pub use quest::{Quest, QuestData, QuestRecord};
pub use reach::{ReachPoint, ReachPointConfig};
pub use stay::{StayNear, StayNearConfig};
