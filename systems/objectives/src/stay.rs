//! Staying close to the quest position.

use questline_core::horizontal_distance;
use serde::{Deserialize, Serialize};

use crate::{context::ObjectiveEffect, objective::Step};

/// Tuning of a stay-near objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StayNearConfig {
    /// Radius around the quest position the player must stay within.
    pub radius: f32,
    /// Fraction of the radius beyond which the objective warns.
    pub warning_ratio: f32,
    /// Sound looped while the warning is active.
    pub warning_sound: Option<String>,
}

impl Default for StayNearConfig {
    fn default() -> Self {
        Self {
            radius: 50.0,
            warning_ratio: 0.75,
            warning_sound: None,
        }
    }
}

/// Objective satisfied while the player stays close to the quest position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StayNear {
    config: StayNearConfig,
    reached_once: bool,
    #[serde(skip)]
    warning_playing: bool,
    #[serde(skip)]
    factor: Option<f32>,
}

impl StayNear {
    /// Creates a stay-near objective.
    #[must_use]
    pub fn new(config: StayNearConfig) -> Self {
        Self {
            config,
            reached_once: false,
            warning_playing: false,
            factor: None,
        }
    }

    /// Distance to the quest position relative to the radius, from the last update.
    #[must_use]
    pub fn factor(&self) -> Option<f32> {
        self.factor
    }

    /// Whether the player has been inside the radius at least once.
    #[must_use]
    pub fn reached_once(&self) -> bool {
        self.reached_once
    }

    pub(crate) fn activate(&mut self, step: &mut Step<'_, '_>) {
        step.status.complete();
    }

    pub(crate) fn update(&mut self, step: &mut Step<'_, '_>) {
        let (Some(center), Some(player)) = (step.quest.position(), step.ctx.player_position())
        else {
            return;
        };
        let factor = horizontal_distance(player, center) / self.config.radius.max(f32::EPSILON);
        self.factor = Some(factor);

        if factor > 1.0 {
            if self.reached_once {
                log::info!("player left the area of quest {}", step.quest.name());
                self.stop_warning(step);
                step.status.fail();
            }
            return;
        }

        self.reached_once = true;
        if factor > self.config.warning_ratio {
            step.status.warn();
            self.start_warning(step);
        } else {
            step.status.complete();
            self.stop_warning(step);
        }
    }

    pub(crate) fn handle_failed(&mut self, step: &mut Step<'_, '_>) {
        self.stop_warning(step);
    }

    fn start_warning(&mut self, step: &mut Step<'_, '_>) {
        if self.warning_playing {
            return;
        }
        self.warning_playing = true;
        if let Some(sound) = &self.config.warning_sound {
            step.ctx.emit(ObjectiveEffect::PlayWarning {
                quest: step.quest.handle(),
                sound: sound.clone(),
            });
        }
    }

    fn stop_warning(&mut self, step: &mut Step<'_, '_>) {
        if !self.warning_playing {
            return;
        }
        self.warning_playing = false;
        if let Some(sound) = &self.config.warning_sound {
            step.ctx.emit(ObjectiveEffect::StopWarning {
                quest: step.quest.handle(),
                sound: sound.clone(),
            });
        }
    }
}
