//! Hysteresis pump controller
//!
//! In AUTO mode the pump turns on only for an irrigate decision whose
//! probability exceeds the ON threshold and turns off only when the
//! probability drops below the OFF threshold. Between the two thresholds
//! the pump keeps its current state. In MANUAL mode model output is
//! ignored and only explicit toggles move the pump.

use crate::error::{EngineError, Result};
use crate::models::IrrigationClass;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Auto,
    Manual,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Auto => write!(f, "auto"),
            ControlMode::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpState {
    On,
    Off,
}

impl PumpState {
    pub fn is_on(&self) -> bool {
        matches!(self, PumpState::On)
    }

    fn flipped(self) -> Self {
        match self {
            PumpState::On => PumpState::Off,
            PumpState::Off => PumpState::On,
        }
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpState::On => write!(f, "on"),
            PumpState::Off => write!(f, "off"),
        }
    }
}

/// Mode and pump state; starts in AUTO with the pump off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub mode: ControlMode,
    pub pump: PumpState,
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self {
            mode: ControlMode::Auto,
            pump: PumpState::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    Auto,
    Manual,
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionReason::Auto => write!(f, "auto"),
            TransitionReason::Manual => write!(f, "manual"),
        }
    }
}

/// A change of pump state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: PumpState,
    pub to: PumpState,
    pub reason: TransitionReason,
}

/// ON/OFF probability thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    pub on_threshold: f64,
    pub off_threshold: f64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            on_threshold: 0.7,
            off_threshold: 0.3,
        }
    }
}

impl HysteresisConfig {
    /// Requires `0 <= off <= on <= 1`
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.off_threshold
            && self.off_threshold <= self.on_threshold
            && self.on_threshold <= 1.0;
        if !ordered {
            return Err(EngineError::InvalidConfig(format!(
                "hysteresis thresholds must satisfy 0 <= off <= on <= 1, got off={} on={}",
                self.off_threshold, self.on_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ActuatorController {
    config: HysteresisConfig,
    state: ActuatorState,
}

impl ActuatorController {
    pub fn new(config: HysteresisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ActuatorState::default(),
        })
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }

    /// Apply one cycle's decision. Returns the transition if the pump moved.
    pub fn step(&mut self, class: IrrigationClass, probability: f64) -> Option<Transition> {
        if self.state.mode == ControlMode::Manual {
            return None;
        }

        let target = if class == IrrigationClass::Irrigate && probability > self.config.on_threshold
        {
            PumpState::On
        } else if probability < self.config.off_threshold {
            PumpState::Off
        } else {
            self.state.pump
        };

        self.apply(target, TransitionReason::Auto)
    }

    /// Change the mode; the pump keeps its state
    pub fn set_mode(&mut self, mode: ControlMode) -> bool {
        let changed = self.state.mode != mode;
        self.state.mode = mode;
        changed
    }

    /// Flip the pump in MANUAL mode
    pub fn toggle(&mut self) -> Result<Transition> {
        if self.state.mode != ControlMode::Manual {
            return Err(EngineError::ManualControlDisabled);
        }
        let target = self.state.pump.flipped();
        let transition = Transition {
            from: self.state.pump,
            to: target,
            reason: TransitionReason::Manual,
        };
        self.state.pump = target;
        Ok(transition)
    }

    fn apply(&mut self, target: PumpState, reason: TransitionReason) -> Option<Transition> {
        if target == self.state.pump {
            return None;
        }
        let transition = Transition {
            from: self.state.pump,
            to: target,
            reason,
        };
        self.state.pump = target;
        Some(transition)
    }
}

impl Default for ActuatorController {
    fn default() -> Self {
        Self {
            config: HysteresisConfig::default(),
            state: ActuatorState::default(),
        }
    }
}
