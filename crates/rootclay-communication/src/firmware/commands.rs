//! Manual printer commands
//!
//! The handful of one-shot commands a console offers next to the stream:
//! homing, jogging, ram extrusion and live overrides.

use std::fmt;

/// Lowest override percentage accepted by the firmware
pub const MIN_OVERRIDE_PERCENT: u16 = 10;
/// Highest override percentage accepted by the firmware
pub const MAX_OVERRIDE_PERCENT: u16 = 1000;

/// A manual command, rendered as G-code through `Display`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrinterCommand {
    /// Home all axes (`G28`)
    Home,
    /// Disable steppers (`M84`)
    MotorsOff,
    /// Rapid Z move by the given distance in mm (`G0 Z..`)
    JogZ(f64),
    /// Push clay by `distance` mm at `feed` mm/min; negative retracts
    Extrude {
        /// Extruder distance in mm.
        distance: f64,
        /// Feed rate in mm/min.
        feed: f64,
    },
    /// Feed rate override in percent (`M220 S..`)
    SpeedOverride(u16),
    /// Flow override in percent (`M221 S..`)
    FlowOverride(u16),
    /// Stop the ram (`M5`)
    RamStop,
    /// Select a tool (`T..`)
    SelectTool(u8),
}

impl PrinterCommand {
    /// Clamp an override percentage to what the firmware accepts
    pub fn clamp_percent(percent: u16) -> u16 {
        percent.clamp(MIN_OVERRIDE_PERCENT, MAX_OVERRIDE_PERCENT)
    }
}

impl fmt::Display for PrinterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrinterCommand::Home => write!(f, "G28"),
            PrinterCommand::MotorsOff => write!(f, "M84"),
            PrinterCommand::JogZ(step) => write!(f, "G0 Z{}", step),
            PrinterCommand::Extrude { distance, feed } => {
                write!(f, "G1 E{} F{}", distance, feed)
            }
            PrinterCommand::SpeedOverride(percent) => {
                write!(f, "M220 S{}", Self::clamp_percent(*percent))
            }
            PrinterCommand::FlowOverride(percent) => {
                write!(f, "M221 S{}", Self::clamp_percent(*percent))
            }
            PrinterCommand::RamStop => write!(f, "M5"),
            PrinterCommand::SelectTool(tool) => write!(f, "T{}", tool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(PrinterCommand::Home.to_string(), "G28");
        assert_eq!(PrinterCommand::MotorsOff.to_string(), "M84");
        assert_eq!(PrinterCommand::JogZ(-0.5).to_string(), "G0 Z-0.5");
        assert_eq!(
            PrinterCommand::Extrude {
                distance: -10.0,
                feed: 300.0
            }
            .to_string(),
            "G1 E-10 F300"
        );
        assert_eq!(PrinterCommand::RamStop.to_string(), "M5");
        assert_eq!(PrinterCommand::SelectTool(0).to_string(), "T0");
    }

    #[test]
    fn test_overrides_are_clamped() {
        assert_eq!(PrinterCommand::SpeedOverride(5).to_string(), "M220 S10");
        assert_eq!(PrinterCommand::SpeedOverride(150).to_string(), "M220 S150");
        assert_eq!(PrinterCommand::FlowOverride(5000).to_string(), "M221 S1000");
    }
}
