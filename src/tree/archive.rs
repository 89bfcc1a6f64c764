use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{MetadataError, Result};
use crate::models::category::Category;
use crate::models::container::MetadataContainer;
use crate::models::summary::{SummaryLevel, SummaryRow};
use crate::models::value::MetadataValue;
use crate::schema::registry::SchemaRegistry;
use crate::tree::node::{Node, NodeKind};
use crate::utils::constants::TREE_SEPARATOR;

/// Survey-rooted hierarchy of metadata containers.
///
/// Nodes are addressed by structural paths such as
/// `station/MT001/run/MT001a/channel/Ex` or `filter/lowpass`; `""` is the
/// survey itself.
#[derive(Debug, Clone)]
pub struct MetadataTree {
    registry: Arc<SchemaRegistry>,
    root: Node,
}

impl MetadataTree {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let survey = MetadataContainer::new(Category::Survey, Arc::clone(&registry));
        Self {
            registry,
            root: Node::new(NodeKind::Survey, String::new(), String::new(), survey),
        }
    }

    pub fn standard() -> Result<Self> {
        Ok(Self::new(SchemaRegistry::shared()?))
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn survey(&self) -> &MetadataContainer {
        &self.root.container
    }

    /// Replace the survey metadata. The old survey container is detached.
    pub fn set_survey(&mut self, mut container: MetadataContainer) -> Result<()> {
        expect_category(&container, &[Category::Survey])?;
        container.validate()?;
        container.mark_attached()?;

        let mut previous = std::mem::replace(&mut self.root.container, container);
        previous.mark_detached();
        info!(
            "Survey metadata set ({})",
            self.root.container.identifier().unwrap_or_default()
        );
        Ok(())
    }

    /// Validate `container`, name it `child_id` and attach it under `parent_path`.
    ///
    /// The child's identifier field is filled from `child_id` when missing and
    /// must match it otherwise. Returns the new node's path.
    pub fn add_child(
        &mut self,
        parent_path: &str,
        child_id: &str,
        mut container: MetadataContainer,
    ) -> Result<String> {
        check_child_id(child_id)?;
        let kind = NodeKind::for_category(container.category())?;

        let parent = self.find(parent_path)?;
        if !parent.kind.can_hold(kind) {
            return Err(MetadataError::InvalidState(format!(
                "A {} cannot be added under a {}",
                kind, parent.kind
            )));
        }
        if parent.child(kind, child_id).is_some() {
            return Err(MetadataError::Duplicate {
                kind: kind.to_string(),
                id: child_id.to_string(),
                parent: display_path(&parent.path),
            });
        }
        let path = join_path(&parent.path, kind, child_id);

        fill_identifier(&mut container, child_id)?;
        container.validate()?;
        container.mark_attached()?;

        let parent = self.find_mut(parent_path)?;
        parent
            .children
            .push(Node::new(kind, child_id.to_string(), path.clone(), container));

        info!("Added {} '{}'", kind, path);
        Ok(path)
    }

    /// Remove the child named `child_id` and its whole subtree.
    ///
    /// Under the survey a station and a filter may share a name; use
    /// [`remove`](Self::remove) with the full path in that case.
    pub fn remove_child(&mut self, parent_path: &str, child_id: &str) -> Result<Node> {
        let parent = self.find(parent_path)?;
        let matches: Vec<NodeKind> = parent
            .children
            .iter()
            .filter(|child| child.id == child_id)
            .map(|child| child.kind)
            .collect();

        match matches.as_slice() {
            [] => Err(MetadataError::NotFound {
                path: format!("{}{}", prefix(&parent.path), child_id),
            }),
            [kind] => {
                let path = join_path(&parent.path, *kind, child_id);
                self.remove(&path)
            }
            _ => Err(MetadataError::InvalidState(format!(
                "'{}' names more than one child of '{}'",
                child_id,
                display_path(&parent.path)
            ))),
        }
    }

    /// Remove the node at `path` with everything below it.
    pub fn remove(&mut self, path: &str) -> Result<Node> {
        let segments = parse_path(path)?;
        let ((kind, id), parents) = segments.split_last().ok_or_else(|| {
            MetadataError::InvalidState("The survey root cannot be removed".to_string())
        })?;

        let mut parent = &mut self.root;
        for (parent_kind, parent_id) in parents {
            parent = parent
                .child_mut(*parent_kind, parent_id)
                .ok_or_else(|| MetadataError::NotFound {
                    path: path.to_string(),
                })?;
        }

        let position = parent
            .children
            .iter()
            .position(|child| child.kind == *kind && child.id == *id)
            .ok_or_else(|| MetadataError::NotFound {
                path: path.to_string(),
            })?;

        let mut removed = parent.children.remove(position);
        removed.detach_all();
        info!(
            "Removed {} '{}' ({} nodes)",
            removed.kind,
            removed.path,
            removed.subtree_size()
        );
        Ok(removed)
    }

    pub fn find(&self, path: &str) -> Result<&Node> {
        let mut node = &self.root;
        for (kind, id) in parse_path(path)? {
            node = node.child(kind, id).ok_or_else(|| MetadataError::NotFound {
                path: path.to_string(),
            })?;
        }
        Ok(node)
    }

    fn find_mut(&mut self, path: &str) -> Result<&mut Node> {
        let mut node = &mut self.root;
        for (kind, id) in parse_path(path)? {
            node = node.child_mut(kind, id).ok_or_else(|| MetadataError::NotFound {
                path: path.to_string(),
            })?;
        }
        Ok(node)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_ok()
    }

    /// Children of the node at `path`, in insertion order.
    pub fn list_children(&self, path: &str) -> Result<&[Node]> {
        Ok(self.find(path)?.children())
    }

    /// Set one field on an attached container.
    ///
    /// The identifier field cannot be changed this way since it names the node.
    pub fn set_field(
        &mut self,
        path: &str,
        field: &str,
        value: impl Into<MetadataValue>,
    ) -> Result<()> {
        let node = self.find_mut(path)?;
        let value = value.into();

        if node.kind != NodeKind::Survey
            && field == node.container.category().identifier_field()
            && value.to_string() != node.id
        {
            return Err(MetadataError::IdentifierMismatch {
                field: field.to_string(),
                expected: node.id.clone(),
                found: value.to_string(),
            });
        }

        node.container.set(field, value)?;
        debug!("Set '{}' on '{}'", field, display_path(path));
        Ok(())
    }

    /// Attach data logger metadata to a run, replacing any previous one.
    pub fn set_data_logger(&mut self, run_path: &str, mut container: MetadataContainer) -> Result<()> {
        expect_category(&container, &[Category::DataLogger])?;
        let run = self.find_mut(run_path)?;
        if run.kind != NodeKind::Run {
            return Err(MetadataError::InvalidState(format!(
                "Data loggers belong to runs, '{}' is a {}",
                display_path(run_path),
                run.kind
            )));
        }

        container.validate()?;
        container.mark_attached()?;
        if let Some(mut previous) = run.data_logger.replace(container) {
            previous.mark_detached();
        }
        info!("Data logger set on '{}'", run_path);
        Ok(())
    }

    /// Next run name for a station: its archive id plus the next letter.
    pub fn next_run_id(&self, station_path: &str) -> Result<String> {
        let station = self.find(station_path)?;
        if station.kind != NodeKind::Station {
            return Err(MetadataError::InvalidState(format!(
                "'{}' is not a station",
                display_path(station_path)
            )));
        }

        let last = station
            .children_of(NodeKind::Run)
            .filter_map(|run| run.id.strip_prefix(station.id.as_str()))
            .filter_map(|suffix| {
                let mut chars = suffix.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_lowercase() => Some(c),
                    _ => None,
                }
            })
            .max();

        let next = match last {
            None => 'a',
            Some('z') => {
                return Err(MetadataError::InvalidState(format!(
                    "Station '{}' has run out of run letters",
                    station.id
                )))
            }
            Some(c) => (c as u8 + 1) as char,
        };
        Ok(format!("{}{}", station.id, next))
    }

    pub fn stations(&self) -> impl Iterator<Item = &Node> {
        self.root.children_of(NodeKind::Station)
    }

    pub fn filters(&self) -> impl Iterator<Item = &Node> {
        self.root.children_of(NodeKind::Filter)
    }

    /// Filter names in registration order; the position is the filter index.
    pub fn filter_index(&self) -> Vec<&str> {
        self.filters().map(Node::id).collect()
    }

    pub fn filter_by_index(&self, index: usize) -> Option<&Node> {
        self.filters().nth(index)
    }

    pub fn node_count(&self) -> usize {
        self.root.subtree_size()
    }

    pub fn station_summary(&self) -> Vec<SummaryRow> {
        self.stations().map(station_row).collect()
    }

    pub fn run_summary(&self) -> Vec<SummaryRow> {
        self.stations()
            .flat_map(|station| station.children_of(NodeKind::Run))
            .map(run_row)
            .collect()
    }

    pub fn channel_summary(&self) -> Vec<SummaryRow> {
        self.stations()
            .flat_map(|station| station.children_of(NodeKind::Run))
            .flat_map(|run| run.children_of(NodeKind::Channel))
            .map(channel_row)
            .collect()
    }

    /// Station, run and channel rows in that order.
    pub fn summary(&self) -> Vec<SummaryRow> {
        let mut rows = self.station_summary();
        rows.extend(self.run_summary());
        rows.extend(self.channel_summary());
        rows
    }
}

fn expect_category(container: &MetadataContainer, allowed: &[Category]) -> Result<()> {
    if allowed.contains(&container.category()) {
        Ok(())
    } else {
        Err(MetadataError::InvalidState(format!(
            "Expected {} metadata, got {}",
            allowed
                .iter()
                .map(Category::as_str)
                .collect::<Vec<_>>()
                .join(" or "),
            container.category()
        )))
    }
}

fn check_child_id(child_id: &str) -> Result<()> {
    if child_id.trim().is_empty() || child_id.contains(TREE_SEPARATOR) {
        return Err(MetadataError::InvalidFormat(format!(
            "Invalid child id '{}'",
            child_id
        )));
    }
    Ok(())
}

fn fill_identifier(container: &mut MetadataContainer, child_id: &str) -> Result<()> {
    let field = container.category().identifier_field();
    match container.identifier() {
        None => container.set(field, child_id),
        Some(existing) if existing == child_id => Ok(()),
        Some(existing) => Err(MetadataError::IdentifierMismatch {
            field: field.to_string(),
            expected: child_id.to_string(),
            found: existing,
        }),
    }
}

/// Split `station/MT001/run/MT001a` into `(kind, id)` pairs.
fn parse_path(path: &str) -> Result<Vec<(NodeKind, &str)>> {
    let trimmed = path.trim_matches(TREE_SEPARATOR);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = trimmed.split(TREE_SEPARATOR).collect();
    if segments.len() % 2 != 0 {
        return Err(MetadataError::InvalidFormat(format!(
            "Tree path '{}' must alternate kind and id",
            path
        )));
    }

    segments
        .chunks(2)
        .map(|pair| {
            let kind = NodeKind::from_segment(pair[0]).ok_or_else(|| {
                MetadataError::InvalidFormat(format!(
                    "Unknown segment '{}' in tree path '{}'",
                    pair[0], path
                ))
            })?;
            Ok((kind, pair[1]))
        })
        .collect()
}

fn prefix(parent_path: &str) -> String {
    if parent_path.is_empty() {
        String::new()
    } else {
        format!("{}{}", parent_path, TREE_SEPARATOR)
    }
}

fn join_path(parent_path: &str, kind: NodeKind, id: &str) -> String {
    format!("{}{}{}{}", prefix(parent_path), kind, TREE_SEPARATOR, id)
}

fn display_path(path: &str) -> String {
    if path.trim_matches(TREE_SEPARATOR).is_empty() {
        "survey".to_string()
    } else {
        path.to_string()
    }
}

fn period(container: &MetadataContainer) -> (Option<String>, Option<String>) {
    (
        container.get_string("time_period.start"),
        container.get_string("time_period.end"),
    )
}

fn recorded_or_children(node: &Node, child_kind: NodeKind) -> Vec<String> {
    match node.container.value("channels_recorded").and_then(MetadataValue::as_list) {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => {
            let mut components: Vec<String> = Vec::new();
            let descendants = node.children_of(child_kind).flat_map(|child| {
                if child_kind == NodeKind::Channel {
                    vec![child.id.clone()]
                } else {
                    recorded_or_children(child, NodeKind::Channel)
                }
            });
            for component in descendants {
                if !components.contains(&component) {
                    components.push(component);
                }
            }
            components
        }
    }
}

fn station_row(station: &Node) -> SummaryRow {
    let metadata = &station.container;
    let (start, end) = period(metadata);
    SummaryRow::new(SummaryLevel::Station, station.path.clone(), station.id.clone())
        .with_period(start, end)
        .with_components(&recorded_or_children(station, NodeKind::Run))
        .with_measurement_type(metadata.get_string("data_type"))
        .with_location(
            metadata.get_f64("location.latitude"),
            metadata.get_f64("location.longitude"),
            metadata.get_f64("location.elevation"),
        )
}

fn run_row(run: &Node) -> SummaryRow {
    let metadata = &run.container;
    let (start, end) = period(metadata);
    SummaryRow::new(SummaryLevel::Run, run.path.clone(), run.id.clone())
        .with_period(start, end)
        .with_components(&recorded_or_children(run, NodeKind::Channel))
        .with_measurement_type(metadata.get_string("data_type"))
        .with_sample_rate(metadata.get_f64("sample_rate"))
}

fn channel_row(channel: &Node) -> SummaryRow {
    let metadata = &channel.container;
    let (start, end) = period(metadata);
    let measurement_type = metadata
        .get_string("type")
        .unwrap_or_else(|| metadata.category().to_string());
    SummaryRow::new(SummaryLevel::Channel, channel.path.clone(), channel.id.clone())
        .with_period(start, end)
        .with_components(&[channel.id.clone()])
        .with_measurement_type(Some(measurement_type))
        .with_sample_rate(metadata.get_f64("sample_rate"))
        .with_units(metadata.get_string("units"))
}
