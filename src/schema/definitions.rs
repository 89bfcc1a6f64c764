//! Standards tables and the way they compose into category schemas.
//!
//! Each fragment is a small CSV table (`attribute,type,required,units,style`
//! plus optional `allowed_values` and `default`). Categories are assembled by
//! mounting fragments under a prefix, so a change to e.g. the `person` table
//! reaches every `acquired_by.*` and `provenance.submitter.*` namespace.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::Value;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::models::category::Category;
use crate::models::descriptor::{AttributeDescriptor, Style};
use crate::models::value::ValueType;
use crate::utils::constants::{
    ALLOWED_VALUES_SEPARATOR, STANDARDS_OPTIONAL_COLUMNS, STANDARDS_REQUIRED_COLUMNS,
};
use crate::utils::naming::normalize_attribute_name;

pub const FRAGMENTS: &[(&str, &str)] = &[
    ("auxiliary", include_str!("standards/auxiliary.csv")),
    ("battery", include_str!("standards/battery.csv")),
    ("channel", include_str!("standards/channel.csv")),
    ("channel_filter", include_str!("standards/channel_filter.csv")),
    ("citation", include_str!("standards/citation.csv")),
    ("data_logger", include_str!("standards/data_logger.csv")),
    ("data_quality", include_str!("standards/data_quality.csv")),
    ("declination", include_str!("standards/declination.csv")),
    ("diagnostic", include_str!("standards/diagnostic.csv")),
    ("electric", include_str!("standards/electric.csv")),
    ("electrode", include_str!("standards/electrode.csv")),
    ("filter", include_str!("standards/filter.csv")),
    ("instrument", include_str!("standards/instrument.csv")),
    ("location", include_str!("standards/location.csv")),
    ("magnetic", include_str!("standards/magnetic.csv")),
    ("person", include_str!("standards/person.csv")),
    ("provenance", include_str!("standards/provenance.csv")),
    ("run", include_str!("standards/run.csv")),
    ("software", include_str!("standards/software.csv")),
    ("station", include_str!("standards/station.csv")),
    ("survey", include_str!("standards/survey.csv")),
    ("time_period", include_str!("standards/time_period.csv")),
    ("timing_system", include_str!("standards/timing_system.csv")),
];

/// A fragment mounted under a dotted prefix (empty prefix = category root).
#[derive(Debug, Clone, Copy)]
pub struct Part {
    pub fragment: &'static str,
    pub prefix: &'static str,
}

const fn part(fragment: &'static str, prefix: &'static str) -> Part {
    Part { fragment, prefix }
}

#[derive(Debug, Clone, Copy)]
pub struct Composition {
    pub category: Category,
    pub parts: &'static [Part],
    /// Paths that are required in this category even if optional in the fragment.
    pub required: &'static [&'static str],
}

pub const COMPOSITIONS: &[Composition] = &[
    Composition {
        category: Category::Survey,
        parts: &[
            part("survey", ""),
            part("person", "acquired_by"),
            part("citation", "citation_dataset"),
            part("citation", "citation_journal"),
        ],
        required: &["id"],
    },
    Composition {
        category: Category::Station,
        parts: &[
            part("station", ""),
            part("location", "location"),
            part("declination", "location.declination"),
            part("time_period", "time_period"),
            part("person", "acquired_by"),
            part("provenance", "provenance"),
            part("software", "provenance.software"),
            part("person", "provenance.submitter"),
        ],
        required: &["archive_id", "location.latitude", "location.longitude"],
    },
    Composition {
        category: Category::Run,
        parts: &[
            part("run", ""),
            part("time_period", "time_period"),
            part("person", "acquired_by"),
            part("provenance", "provenance"),
        ],
        required: &["id", "sample_rate"],
    },
    Composition {
        category: Category::DataLogger,
        parts: &[
            part("instrument", ""),
            part("data_logger", ""),
            part("timing_system", "timing_system"),
            part("software", "firmware"),
            part("battery", "battery"),
        ],
        required: &[],
    },
    Composition {
        category: Category::Electric,
        parts: &[
            part("channel", ""),
            part("electric", ""),
            part("time_period", "time_period"),
            part("data_quality", "data_quality"),
            part("channel_filter", "filter"),
            part("diagnostic", "contact_resistance"),
            part("diagnostic", "ac"),
            part("diagnostic", "dc"),
            part("electrode", "positive"),
            part("location", "positive"),
            part("electrode", "negative"),
            part("location", "negative"),
        ],
        required: &["component"],
    },
    Composition {
        category: Category::Magnetic,
        parts: &[
            part("channel", ""),
            part("magnetic", ""),
            part("time_period", "time_period"),
            part("data_quality", "data_quality"),
            part("channel_filter", "filter"),
            part("location", "location"),
            part("instrument", "sensor"),
            part("diagnostic", "h_field_min"),
            part("diagnostic", "h_field_max"),
        ],
        required: &["component"],
    },
    Composition {
        category: Category::Auxiliary,
        parts: &[
            part("channel", ""),
            part("auxiliary", ""),
            part("time_period", "time_period"),
            part("data_quality", "data_quality"),
            part("channel_filter", "filter"),
            part("location", "location"),
        ],
        required: &["component"],
    },
    Composition {
        category: Category::Filter,
        parts: &[part("filter", "")],
        required: &["name", "type"],
    },
];

pub fn fragment_source(name: &str) -> Option<&'static str> {
    FRAGMENTS
        .iter()
        .find(|(fragment, _)| *fragment == name)
        .map(|(_, source)| *source)
}

/// Expand a composition into its ordered descriptor list.
pub fn compose(composition: &Composition) -> Result<Vec<AttributeDescriptor>> {
    let mut descriptors = Vec::new();

    for part in composition.parts {
        let source = fragment_source(part.fragment).ok_or_else(|| {
            MetadataError::InvalidFormat(format!(
                "Unknown standards fragment '{}' for {}",
                part.fragment, composition.category
            ))
        })?;
        let fragment = parse_standards_csv(source)?;
        descriptors.extend(fragment.iter().map(|d| d.prefixed(part.prefix)));
    }

    for path in composition.required {
        match descriptors.iter_mut().find(|d| d.name == *path) {
            Some(descriptor) => {
                descriptor.required = true;
                descriptor.default = None;
            }
            None => {
                return Err(MetadataError::InvalidFormat(format!(
                    "Required attribute '{}' is not part of {}",
                    path, composition.category
                )))
            }
        }
    }

    debug!(
        "Composed {} schema with {} attributes",
        composition.category,
        descriptors.len()
    );
    Ok(descriptors)
}

/// Parse one standards table.
///
/// # Examples
/// ```
/// use mth5_metadata::schema::definitions::parse_standards_csv;
///
/// let table = "attribute,type,required,units,style\nsampleRate,float,true,Hz,number\n";
/// let descriptors = parse_standards_csv(table).unwrap();
/// assert_eq!(descriptors[0].name, "sample_rate");
/// assert!(descriptors[0].required);
/// ```
pub fn parse_standards_csv(source: &str) -> Result<Vec<AttributeDescriptor>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(source.as_bytes());

    let header = reader.headers()?.clone();
    let columns = validate_header(&header)?;

    let mut descriptors = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        descriptors.push(parse_row(&record, &columns)?);
    }

    Ok(descriptors)
}

struct Columns {
    attribute: usize,
    value_type: usize,
    required: usize,
    units: usize,
    style: usize,
    allowed_values: Option<usize>,
    default: Option<usize>,
}

fn validate_header(header: &StringRecord) -> Result<Columns> {
    let names: Vec<String> = header.iter().map(|h| h.to_lowercase()).collect();
    let position = |name: &str| names.iter().position(|h| h == name);

    for name in &names {
        if !STANDARDS_REQUIRED_COLUMNS.contains(&name.as_str())
            && !STANDARDS_OPTIONAL_COLUMNS.contains(&name.as_str())
        {
            return Err(MetadataError::InvalidFormat(format!(
                "Unknown standards column '{}'",
                name
            )));
        }
    }

    let require = |name: &str| {
        position(name).ok_or_else(|| {
            MetadataError::InvalidFormat(format!(
                "Standards header must include {}",
                STANDARDS_REQUIRED_COLUMNS.join(", ")
            ))
        })
    };

    Ok(Columns {
        attribute: require("attribute")?,
        value_type: require("type")?,
        required: require("required")?,
        units: require("units")?,
        style: require("style")?,
        allowed_values: position("allowed_values"),
        default: position("default"),
    })
}

fn parse_row(record: &StringRecord, columns: &Columns) -> Result<AttributeDescriptor> {
    let field = |index: usize| record.get(index).unwrap_or("");

    let name = normalize_attribute_name(field(columns.attribute))?;

    let value_type = ValueType::parse(field(columns.value_type)).ok_or_else(|| {
        MetadataError::InvalidFormat(format!(
            "'type' for '{}' must be one of [str | float | int | bool | list | timestamp], not '{}'",
            name,
            field(columns.value_type)
        ))
    })?;

    let required = match field(columns.required).to_lowercase().as_str() {
        "true" => true,
        "false" => false,
        other => {
            return Err(MetadataError::InvalidFormat(format!(
                "'required' for '{}' must be true or false, not '{}'",
                name, other
            )))
        }
    };

    let units = match field(columns.units).to_lowercase().as_str() {
        "" | "none" | "empty" => None,
        other => Some(other.to_string()),
    };

    let style = Style::parse(field(columns.style)).ok_or_else(|| {
        MetadataError::InvalidFormat(format!(
            "Unknown style '{}' for '{}'",
            field(columns.style),
            name
        ))
    })?;

    let mut descriptor = AttributeDescriptor::new(name, value_type)
        .required(required)
        .with_style(style);
    descriptor.units = units;

    if let Some(index) = columns.allowed_values {
        let allowed: Vec<String> = field(index)
            .split(ALLOWED_VALUES_SEPARATOR)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if !allowed.is_empty() {
            descriptor = descriptor.with_allowed_values(allowed);
        }
    }

    if let Some(index) = columns.default {
        let raw = field(index);
        if !raw.is_empty() {
            let default = value_type
                .coerce(&Value::String(raw.to_string()))
                .ok_or_else(|| {
                    MetadataError::InvalidFormat(format!(
                        "Default '{}' for '{}' is not a {}",
                        raw, descriptor.name, value_type
                    ))
                })?;
            descriptor = descriptor.with_default(default);
        }
    }

    descriptor.check_consistency()?;
    Ok(descriptor)
}
