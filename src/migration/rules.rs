use crate::models::category::Category;
use crate::schema::version::{SchemaVersion, VersionRange};

/// How a rule reshapes the value it moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Move the value unchanged.
    Rename,
    /// Move a scalar one level down (`location.declination` -> `location.declination.value`).
    NestScalar,
    /// Split a comma separated string into a list in place.
    SplitList,
    /// Drop `_s`/`_d`/`_i`/`_b`/`_l` suffixes from every key.
    StripTypeSuffixes,
}

#[derive(Debug, Clone, Copy)]
pub struct MigrationRule {
    pub name: &'static str,
    /// Categories the rule applies to; empty means all.
    pub categories: &'static [Category],
    pub old_path: &'static str,
    pub new_path: &'static str,
    pub transform: Transform,
    pub range: VersionRange,
}

impl MigrationRule {
    pub fn applies_to(&self, category: Category, version: &SchemaVersion) -> bool {
        self.range.contains(version)
            && (self.categories.is_empty() || self.categories.contains(&category))
    }
}

const V0_1: SchemaVersion = SchemaVersion::new(0, 1, 0);
const V0_2: SchemaVersion = SchemaVersion::new(0, 2, 0);
const V0_3: SchemaVersion = SchemaVersion::new(0, 3, 0);

const SUFFIXED: VersionRange = VersionRange::new(V0_1, V0_2);
const PRE_TIME_PERIOD: VersionRange = VersionRange::new(V0_1, V0_3);

const fn rename(
    name: &'static str,
    categories: &'static [Category],
    old_path: &'static str,
    new_path: &'static str,
    range: VersionRange,
) -> MigrationRule {
    MigrationRule {
        name,
        categories,
        old_path,
        new_path,
        transform: Transform::Rename,
        range,
    }
}

const STATION: &[Category] = &[Category::Station];
const DATA_LOGGER: &[Category] = &[Category::DataLogger];
const STATION_RUN: &[Category] = &[Category::Station, Category::Run];
const SURVEY: &[Category] = &[Category::Survey];
const ACQUIRED: &[Category] = &[Category::Survey, Category::Station, Category::Run];

/// Changelog renames in application order. Later rules see the paths
/// produced by earlier ones.
pub const STANDARD_RULES: &[MigrationRule] = &[
    rename("sta_code", STATION, "sta_code_s", "archive_id_s", SUFFIXED),
    rename("power_source", DATA_LOGGER, "power_source.type_s", "battery.type_s", SUFFIXED),
    rename("power_source", DATA_LOGGER, "power_source.id_s", "battery.id_s", SUFFIXED),
    rename(
        "power_source",
        DATA_LOGGER,
        "power_source.start_voltage_d",
        "battery.start_voltage_d",
        SUFFIXED,
    ),
    rename(
        "power_source",
        DATA_LOGGER,
        "power_source.end_voltage_d",
        "battery.end_voltage_d",
        SUFFIXED,
    ),
    rename(
        "battery_voltage",
        DATA_LOGGER,
        "battery.start_voltage_d",
        "battery.voltage.start_d",
        SUFFIXED,
    ),
    rename(
        "battery_voltage",
        DATA_LOGGER,
        "battery.end_voltage_d",
        "battery.voltage.end_d",
        SUFFIXED,
    ),
    MigrationRule {
        name: "type_suffixes",
        categories: &[],
        old_path: "",
        new_path: "",
        transform: Transform::StripTypeSuffixes,
        range: SUFFIXED,
    },
    rename("time_period", STATION_RUN, "start", "time_period.start", PRE_TIME_PERIOD),
    rename("time_period", STATION_RUN, "end", "time_period.end", PRE_TIME_PERIOD),
    rename(
        "time_period",
        SURVEY,
        "start_date",
        "time_period.start_date",
        PRE_TIME_PERIOD,
    ),
    rename(
        "time_period",
        SURVEY,
        "end_date",
        "time_period.end_date",
        PRE_TIME_PERIOD,
    ),
    MigrationRule {
        name: "channels_recorded",
        categories: STATION_RUN,
        old_path: "channels_recorded",
        new_path: "channels_recorded",
        transform: Transform::SplitList,
        range: PRE_TIME_PERIOD,
    },
    MigrationRule {
        name: "declination",
        categories: STATION,
        old_path: "location.declination",
        new_path: "location.declination.value",
        transform: Transform::NestScalar,
        range: PRE_TIME_PERIOD,
    },
    rename(
        "acquired_by",
        ACQUIRED,
        "acquired_by.contact.email",
        "acquired_by.email",
        PRE_TIME_PERIOD,
    ),
];

/// Keys that only appear in the pre-`time_period` layout.
pub const LEGACY_LAYOUT_KEYS: &[&str] = &[
    "start",
    "end",
    "start_date",
    "end_date",
    "location.declination",
    "acquired_by.contact.email",
];
