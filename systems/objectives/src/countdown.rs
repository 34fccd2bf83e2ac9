//! Timers that complete or fail a phase.

use serde::{Deserialize, Serialize};

use crate::objective::Step;

/// How long a countdown runs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CountdownLength {
    /// A fixed number of seconds.
    Seconds(f32),
    /// One in-game day.
    Day,
}

impl Default for CountdownLength {
    fn default() -> Self {
        Self::Seconds(60.0)
    }
}

/// Tuning of a countdown objective.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountDownConfig {
    /// Initial length.
    pub length: CountdownLength,
    /// Fail the objective when the timer runs out.
    pub fail_when_zero: bool,
    /// Seconds between completion checks.
    pub tick_interval: f32,
}

impl Default for CountDownConfig {
    fn default() -> Self {
        Self {
            length: CountdownLength::default(),
            fail_when_zero: false,
            tick_interval: 0.25,
        }
    }
}

/// Timer objective.
///
/// With `fail_when_zero` the countdown is a deadline: it counts as complete
/// while time is left and fails once it runs out. Otherwise a required
/// countdown completes when it runs out, and an optional one is complete
/// only while time is left.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountDown {
    config: CountDownConfig,
    remaining: Option<f32>,
    #[serde(skip)]
    since_tick: f32,
}

impl CountDown {
    /// Creates a countdown objective.
    #[must_use]
    pub fn new(config: CountDownConfig) -> Self {
        Self {
            config,
            remaining: None,
            since_tick: 0.0,
        }
    }

    /// Seconds left, once the countdown started.
    #[must_use]
    pub fn remaining(&self) -> Option<f32> {
        self.remaining
    }

    pub(crate) fn activate(&mut self, step: &mut Step<'_, '_>) {
        if self.remaining.is_none() {
            let seconds = match self.config.length {
                CountdownLength::Seconds(seconds) => seconds,
                CountdownLength::Day => step.ctx.day_length_secs(),
            };
            self.remaining = Some(seconds.max(0.0));
        }
        self.refresh(step);
    }

    pub(crate) fn update(&mut self, dt: f32, step: &mut Step<'_, '_>) {
        if let Some(remaining) = &mut self.remaining {
            *remaining = (*remaining - dt).max(0.0);
        }
        self.since_tick += dt;
        if self.since_tick < self.config.tick_interval {
            return;
        }
        self.since_tick = 0.0;
        self.refresh(step);
    }

    fn refresh(&self, step: &mut Step<'_, '_>) {
        let remaining = self.remaining.unwrap_or(0.0);
        if self.config.fail_when_zero {
            if remaining <= 0.0 {
                log::info!("time ran out for quest {}", step.quest.name());
                step.status.fail();
            } else {
                step.status.complete();
            }
        } else if step.optional {
            if remaining > 0.0 {
                step.status.complete();
            } else {
                step.status.revoke();
            }
        } else if remaining <= 0.0 {
            step.status.complete();
        }
    }
}
