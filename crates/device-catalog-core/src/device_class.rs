//! Device class tables
//!
//! Indigo device classes are plain tags here. Everything that depends on the
//! class (catalog file, capability flags, command schema) is a static lookup.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix shared by every capability flag on an Indigo device
pub const CAPABILITY_PREFIX: &str = "supports";

/// Catalog file used when nothing else matches
pub const FALLBACK_FILE: &str = "custom.json";

/// Coarse Indigo device category.
///
/// Variant order follows the catalog names alphabetically, so sorted
/// collections keyed by `DeviceClass` iterate the same way the catalog does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceClass {
    Device,
    DimmerDevice,
    MultiIODevice,
    RelayDevice,
    SensorDevice,
    SpeedControlDevice,
    SprinklerDevice,
    ThermostatDevice,
}

/// A command a class accepts, with human-readable parameter descriptions
#[derive(Debug, Clone, Copy)]
pub struct CommandDef {
    pub name: &'static str,
    pub parameters: &'static [(&'static str, &'static str)],
}

/// Serialized form of a class command inside a class document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
}

const fn cmd(name: &'static str) -> CommandDef {
    CommandDef {
        name,
        parameters: &[],
    }
}

const fn cmd_with(
    name: &'static str,
    parameters: &'static [(&'static str, &'static str)],
) -> CommandDef {
    CommandDef { name, parameters }
}

const TURN_ON: CommandDef = cmd("indigo.device.turnOn");
const TURN_OFF: CommandDef = cmd("indigo.device.turnOff");
const TOGGLE: CommandDef = cmd("indigo.device.toggle");
const STATUS_REQUEST: CommandDef = cmd("indigo.device.statusRequest");

const RELAY_COMMANDS: &[CommandDef] = &[TURN_ON, TURN_OFF, TOGGLE, STATUS_REQUEST];

const DIMMER_COMMANDS: &[CommandDef] = &[
    TURN_ON,
    TURN_OFF,
    TOGGLE,
    cmd_with(
        "indigo.dimmer.setBrightness",
        &[("value", "integer (0-100)")],
    ),
    STATUS_REQUEST,
];

const SENSOR_COMMANDS: &[CommandDef] = &[STATUS_REQUEST];

const THERMOSTAT_COMMANDS: &[CommandDef] = &[
    cmd_with("indigo.thermostat.setHeatSetpoint", &[("value", "number")]),
    cmd_with("indigo.thermostat.setCoolSetpoint", &[("value", "number")]),
    cmd_with(
        "indigo.thermostat.setHvacMode",
        &[("value", "enum:off,heat,cool,auto,program")],
    ),
    cmd_with("indigo.thermostat.setFanMode", &[("value", "enum:auto,on")]),
    TURN_ON,
    TURN_OFF,
    STATUS_REQUEST,
];

const SPEED_CONTROL_COMMANDS: &[CommandDef] = &[
    cmd_with(
        "indigo.speedcontrol.setSpeedLevel",
        &[("value", "integer (0-100)")],
    ),
    cmd_with("indigo.speedcontrol.setSpeedIndex", &[("value", "integer")]),
    TURN_ON,
    TURN_OFF,
    STATUS_REQUEST,
];

const SPRINKLER_COMMANDS: &[CommandDef] = &[
    cmd_with("indigo.sprinkler.run", &[("schedule", "list of durations")]),
    cmd("indigo.sprinkler.stop"),
    cmd("indigo.sprinkler.pause"),
    cmd("indigo.sprinkler.resume"),
    cmd("indigo.sprinkler.previousZone"),
    cmd("indigo.sprinkler.nextZone"),
    STATUS_REQUEST,
];

impl DeviceClass {
    pub const ALL: [DeviceClass; 8] = [
        DeviceClass::Device,
        DeviceClass::DimmerDevice,
        DeviceClass::MultiIODevice,
        DeviceClass::RelayDevice,
        DeviceClass::SensorDevice,
        DeviceClass::SpeedControlDevice,
        DeviceClass::SprinklerDevice,
        DeviceClass::ThermostatDevice,
    ];

    /// Resolve a native class name (`DimmerDevice` or `indigo.DimmerDevice`).
    /// Unrecognized names fall back to the generic `Device` class.
    pub fn resolve(name: &str) -> Self {
        let short = name.trim().trim_start_matches("indigo.");
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.short_name() == short)
            .unwrap_or(DeviceClass::Device)
    }

    fn short_name(self) -> &'static str {
        match self {
            DeviceClass::Device => "Device",
            DeviceClass::DimmerDevice => "DimmerDevice",
            DeviceClass::MultiIODevice => "MultiIODevice",
            DeviceClass::RelayDevice => "RelayDevice",
            DeviceClass::SensorDevice => "SensorDevice",
            DeviceClass::SpeedControlDevice => "SpeedControlDevice",
            DeviceClass::SprinklerDevice => "SprinklerDevice",
            DeviceClass::ThermostatDevice => "ThermostatDevice",
        }
    }

    /// Name used for `baseClass` in the catalog, e.g. `indigo.RelayDevice`
    pub fn catalog_name(self) -> &'static str {
        match self {
            DeviceClass::Device => "indigo.Device",
            DeviceClass::DimmerDevice => "indigo.DimmerDevice",
            DeviceClass::MultiIODevice => "indigo.MultiIODevice",
            DeviceClass::RelayDevice => "indigo.RelayDevice",
            DeviceClass::SensorDevice => "indigo.SensorDevice",
            DeviceClass::SpeedControlDevice => "indigo.SpeedControlDevice",
            DeviceClass::SprinklerDevice => "indigo.SprinklerDevice",
            DeviceClass::ThermostatDevice => "indigo.ThermostatDevice",
        }
    }

    /// Catalog file under `by-class/`. Generic classes share `custom.json`.
    pub fn file_name(self) -> &'static str {
        match self {
            DeviceClass::DimmerDevice => "dimmer.json",
            DeviceClass::RelayDevice => "relay.json",
            DeviceClass::SensorDevice => "sensor.json",
            DeviceClass::SpeedControlDevice => "speed-control.json",
            DeviceClass::SprinklerDevice => "sprinkler.json",
            DeviceClass::ThermostatDevice => "thermostat.json",
            DeviceClass::Device | DeviceClass::MultiIODevice => FALLBACK_FILE,
        }
    }

    pub fn capabilities(self) -> &'static [&'static str] {
        match self {
            DeviceClass::RelayDevice => &[
                "supportsOnState",
                "supportsStatusRequest",
                "supportsAllLightsOnOff",
                "supportsAllOff",
            ],
            DeviceClass::DimmerDevice => &[
                "supportsOnState",
                "supportsStatusRequest",
                "supportsAllLightsOnOff",
                "supportsAllOff",
                "supportsColor",
                "supportsRGB",
                "supportsRGBandWhiteSimultaneously",
                "supportsWhite",
                "supportsWhiteTemperature",
                "supportsTwoWhiteLevels",
                "supportsTwoWhiteLevelsSimultaneously",
            ],
            DeviceClass::SensorDevice => &[
                "supportsOnState",
                "supportsSensorValue",
                "supportsStatusRequest",
            ],
            DeviceClass::ThermostatDevice => &[
                "supportsHeatSetpoint",
                "supportsCoolSetpoint",
                "supportsHvacOperationMode",
                "supportsHvacFanMode",
                "supportsStatusRequest",
            ],
            DeviceClass::SpeedControlDevice => &["supportsOnState", "supportsStatusRequest"],
            DeviceClass::SprinklerDevice => &["supportsStatusRequest"],
            DeviceClass::Device => &[
                "supportsOnState",
                "supportsStatusRequest",
                "supportsAllLightsOnOff",
            ],
            DeviceClass::MultiIODevice => &["supportsOnState", "supportsStatusRequest"],
        }
    }

    pub fn commands(self) -> &'static [CommandDef] {
        match self {
            DeviceClass::RelayDevice => RELAY_COMMANDS,
            DeviceClass::DimmerDevice => DIMMER_COMMANDS,
            DeviceClass::SensorDevice => SENSOR_COMMANDS,
            DeviceClass::ThermostatDevice => THERMOSTAT_COMMANDS,
            DeviceClass::SpeedControlDevice => SPEED_CONTROL_COMMANDS,
            DeviceClass::SprinklerDevice => SPRINKLER_COMMANDS,
            DeviceClass::Device | DeviceClass::MultiIODevice => &[],
        }
    }

    /// `classCommands` value for a new class document, `None` for classes
    /// without a command schema
    pub fn command_specs(self) -> Option<BTreeMap<String, CommandSpec>> {
        let commands = self.commands();
        if commands.is_empty() {
            return None;
        }

        let specs = commands
            .iter()
            .map(|def| {
                let parameters = if def.parameters.is_empty() {
                    None
                } else {
                    Some(
                        def.parameters
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect(),
                    )
                };
                (def.name.to_string(), CommandSpec { parameters })
            })
            .collect();

        Some(specs)
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_name())
    }
}
