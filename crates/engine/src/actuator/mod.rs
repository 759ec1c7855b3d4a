//! Pump control

mod controller;

pub use controller::{
    ActuatorController, ActuatorState, ControlMode, HysteresisConfig, PumpState, Transition,
    TransitionReason,
};
