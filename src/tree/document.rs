use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{MetadataError, Result};
use crate::models::category::Category;
use crate::models::container::MetadataContainer;
use crate::schema::registry::SchemaRegistry;
use crate::tree::archive::MetadataTree;
use crate::tree::node::{Node, NodeKind};

/// Serialized form of a whole archive tree.
///
/// ```json
/// {
///   "survey": {"id": "CONUS"},
///   "stations": [{
///     "metadata": {"archive_id": "MT001", ...},
///     "runs": [{
///       "metadata": {"id": "MT001a", ...},
///       "data_logger": {...},
///       "channels": [{"category": "electric", "metadata": {"component": "Ex"}}]
///     }]
///   }],
///   "filters": [{"name": "lowpass", "type": "zpk"}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey: Option<Value>,
    #[serde(default)]
    pub stations: Vec<StationDocument>,
    #[serde(default)]
    pub filters: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDocument {
    pub metadata: Value,
    #[serde(default)]
    pub runs: Vec<RunDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDocument {
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_logger: Option<Value>,
    #[serde(default)]
    pub channels: Vec<ChannelDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDocument {
    pub category: Category,
    pub metadata: Value,
}

impl ArchiveDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of containers the document describes.
    pub fn container_count(&self) -> usize {
        let runs: usize = self
            .stations
            .iter()
            .flat_map(|s| &s.runs)
            .map(|r| 1 + r.channels.len() + usize::from(r.data_logger.is_some()))
            .sum();
        usize::from(self.survey.is_some()) + self.stations.len() + runs + self.filters.len()
    }

    /// Build a validated tree, migrating each container as it is read.
    pub fn into_tree(self, registry: Arc<SchemaRegistry>) -> Result<MetadataTree> {
        let mut tree = MetadataTree::new(Arc::clone(&registry));
        let build = |category: Category, mapping: &Value| {
            MetadataContainer::from_mapping(category, Arc::clone(&registry), mapping)
        };

        if let Some(survey) = &self.survey {
            tree.set_survey(build(Category::Survey, survey)?)?;
        }

        for filter in &self.filters {
            let container = build(Category::Filter, filter)?;
            let name = identifier_of(&container)?;
            tree.add_child("", &name, container)?;
        }

        for station in &self.stations {
            let container = build(Category::Station, &station.metadata)?;
            let archive_id = identifier_of(&container)?;
            let station_path = tree.add_child("", &archive_id, container)?;

            for run in &station.runs {
                let container = build(Category::Run, &run.metadata)?;
                let run_id = identifier_of(&container)?;
                let run_path = tree.add_child(&station_path, &run_id, container)?;

                if let Some(logger) = &run.data_logger {
                    tree.set_data_logger(&run_path, build(Category::DataLogger, logger)?)?;
                }

                for channel in &run.channels {
                    if !channel.category.is_channel() {
                        return Err(MetadataError::InvalidFormat(format!(
                            "'{}' is not a channel category",
                            channel.category
                        )));
                    }
                    let container = build(channel.category, &channel.metadata)?;
                    let component = identifier_of(&container)?;
                    tree.add_child(&run_path, &component, container)?;
                }
            }
        }

        Ok(tree)
    }

    pub fn from_tree(tree: &MetadataTree) -> Result<Self> {
        let survey = if tree.survey().is_empty() {
            None
        } else {
            Some(tree.survey().to_mapping()?)
        };

        let stations = tree
            .stations()
            .map(|station| {
                Ok(StationDocument {
                    metadata: station.metadata().to_mapping()?,
                    runs: station
                        .children_of(NodeKind::Run)
                        .map(run_document)
                        .collect::<Result<Vec<_>>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let filters = tree
            .filters()
            .map(|filter| filter.metadata().to_mapping())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            survey,
            stations,
            filters,
        })
    }
}

fn run_document(run: &Node) -> Result<RunDocument> {
    Ok(RunDocument {
        metadata: run.metadata().to_mapping()?,
        data_logger: run
            .data_logger()
            .map(MetadataContainer::to_mapping)
            .transpose()?,
        channels: run
            .children_of(NodeKind::Channel)
            .map(|channel| {
                Ok(ChannelDocument {
                    category: channel.metadata().category(),
                    metadata: channel.metadata().to_mapping()?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    })
}

fn identifier_of(container: &MetadataContainer) -> Result<String> {
    container.identifier().ok_or_else(|| {
        MetadataError::InvalidFormat(format!(
            "{} metadata has no '{}'",
            container.category(),
            container.category().identifier_field()
        ))
    })
}
