use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

use crate::models::container::MetadataContainer;
use crate::models::value::MetadataValue;
use crate::tree::{MetadataTree, Node, NodeKind};

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub total_nodes: usize,
    pub stations: usize,
    pub runs: usize,
    pub channels: usize,
    pub filters: usize,
    pub non_standard_fields: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn display_summary(&self) -> String {
        let mut summary = format!(
            "{} stations, {} runs, {} channels, {} filters ({} nodes), {} non-standard fields, {} issues",
            self.stations,
            self.runs,
            self.channels,
            self.filters,
            self.total_nodes,
            self.non_standard_fields,
            self.issues.len()
        );
        for issue in &self.issues {
            summary.push_str(&format!("\n  {}", issue));
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityIssue {
    pub path: String,
    pub kind: IssueKind,
    pub details: String,
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "survey" } else { &self.path };
        write!(f, "[{}] {}: {}", self.kind, path, self.details)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    DanglingFilter,
    InvertedTimePeriod,
    OutsideParentPeriod,
    ChannelsRecordedMismatch,
    SampleRateMismatch,
    NonStandardField,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::DanglingFilter => "dangling filter",
            IssueKind::InvertedTimePeriod => "inverted time period",
            IssueKind::OutsideParentPeriod => "outside parent period",
            IssueKind::ChannelsRecordedMismatch => "channels recorded mismatch",
            IssueKind::SampleRateMismatch => "sample rate mismatch",
            IssueKind::NonStandardField => "non-standard field",
        };
        f.write_str(name)
    }
}

/// Cross-container consistency checks over a whole tree.
pub struct IntegrityChecker {
    strict_mode: bool,
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Strict mode also reports every non-standard field as an issue.
    pub fn with_strict_mode(strict_mode: bool) -> Self {
        Self { strict_mode }
    }

    pub fn check_integrity(&self, tree: &MetadataTree) -> IntegrityReport {
        let mut report = IntegrityReport {
            total_nodes: tree.node_count(),
            filters: tree.filters().count(),
            ..Default::default()
        };
        let filters: HashSet<&str> = tree.filter_index().into_iter().collect();

        self.check_container(tree.root(), &mut report);
        check_period(tree.root(), "time_period.start_date", "time_period.end_date", &mut report);

        for filter in tree.filters() {
            self.check_container(filter, &mut report);
        }

        for station in tree.stations() {
            report.stations += 1;
            self.check_container(station, &mut report);
            check_period(station, "time_period.start", "time_period.end", &mut report);

            for run in station.children_of(NodeKind::Run) {
                report.runs += 1;
                self.check_container(run, &mut report);
                check_period(run, "time_period.start", "time_period.end", &mut report);
                check_within(station, run, &mut report);
                check_channels_recorded(run, &mut report);

                for channel in run.children_of(NodeKind::Channel) {
                    report.channels += 1;
                    self.check_container(channel, &mut report);
                    check_period(channel, "time_period.start", "time_period.end", &mut report);
                    check_within(run, channel, &mut report);
                    check_sample_rate(run, channel, &mut report);
                    check_filters(channel, &filters, &mut report);
                }
            }
        }

        report
    }

    fn check_container(&self, node: &Node, report: &mut IntegrityReport) {
        let containers = std::iter::once(node.metadata()).chain(node.data_logger());
        for container in containers {
            report.non_standard_fields += container.non_standard_fields().len();
            if self.strict_mode {
                for path in container.non_standard_fields() {
                    report.issues.push(IntegrityIssue {
                        path: node.path().to_string(),
                        kind: IssueKind::NonStandardField,
                        details: format!("{} field '{}'", container.category(), path),
                    });
                }
            }
        }
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp(container: &MetadataContainer, path: &str) -> Option<DateTime<Utc>> {
    container
        .value(path)
        .and_then(MetadataValue::as_timestamp)
        .copied()
}

fn check_period(node: &Node, start: &str, end: &str, report: &mut IntegrityReport) {
    let metadata = node.metadata();
    if let (Some(s), Some(e)) = (timestamp(metadata, start), timestamp(metadata, end)) {
        if s > e {
            report.issues.push(IntegrityIssue {
                path: node.path().to_string(),
                kind: IssueKind::InvertedTimePeriod,
                details: format!("start {} is after end {}", s.to_rfc3339(), e.to_rfc3339()),
            });
        }
    }
}

fn check_within(parent: &Node, child: &Node, report: &mut IntegrityReport) {
    let bounds = |node: &Node| {
        (
            timestamp(node.metadata(), "time_period.start"),
            timestamp(node.metadata(), "time_period.end"),
        )
    };
    let (parent_start, parent_end) = bounds(parent);
    let (child_start, child_end) = bounds(child);

    let early = matches!((parent_start, child_start), (Some(p), Some(c)) if c < p);
    let late = matches!((parent_end, child_end), (Some(p), Some(c)) if c > p);
    if early || late {
        report.issues.push(IntegrityIssue {
            path: child.path().to_string(),
            kind: IssueKind::OutsideParentPeriod,
            details: format!("{} extends beyond its {}", child.kind(), parent.kind()),
        });
    }
}

fn check_channels_recorded(run: &Node, report: &mut IntegrityReport) {
    let recorded = match run
        .metadata()
        .value("channels_recorded")
        .and_then(MetadataValue::as_list)
    {
        Some(list) => list,
        None => return,
    };

    let present: Vec<&str> = run.children_of(NodeKind::Channel).map(Node::id).collect();
    let missing: Vec<&str> = recorded
        .iter()
        .map(String::as_str)
        .filter(|c| !present.contains(c))
        .collect();
    let unlisted: Vec<&str> = present
        .iter()
        .copied()
        .filter(|c| !recorded.iter().any(|r| r == c))
        .collect();

    if !missing.is_empty() || !unlisted.is_empty() {
        report.issues.push(IntegrityIssue {
            path: run.path().to_string(),
            kind: IssueKind::ChannelsRecordedMismatch,
            details: format!(
                "listed without a channel: [{}]; channels not listed: [{}]",
                missing.join(", "),
                unlisted.join(", ")
            ),
        });
    }
}

fn check_sample_rate(run: &Node, channel: &Node, report: &mut IntegrityReport) {
    let rate = |node: &Node| node.metadata().value("sample_rate").and_then(MetadataValue::as_f64);
    if let (Some(run_rate), Some(channel_rate)) = (rate(run), rate(channel)) {
        if (run_rate - channel_rate).abs() > f64::EPSILON * run_rate.abs().max(1.0) {
            report.issues.push(IntegrityIssue {
                path: channel.path().to_string(),
                kind: IssueKind::SampleRateMismatch,
                details: format!("channel samples at {}, run at {}", channel_rate, run_rate),
            });
        }
    }
}

fn check_filters(channel: &Node, filters: &HashSet<&str>, report: &mut IntegrityReport) {
    let names = match channel
        .metadata()
        .value("filter.name")
        .and_then(MetadataValue::as_list)
    {
        Some(names) => names,
        None => return,
    };

    for name in names.iter().filter(|n| !filters.contains(n.as_str())) {
        report.issues.push(IntegrityIssue {
            path: channel.path().to_string(),
            kind: IssueKind::DanglingFilter,
            details: format!("filter '{}' is not registered", name),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ArchiveDocument;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn tree(channel_extra: serde_json::Value) -> MetadataTree {
        let mut channel = json!({"component": "Ex", "sample_rate": 256.0});
        if let (Some(target), Some(extra)) = (channel.as_object_mut(), channel_extra.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }

        let doc: ArchiveDocument = serde_json::from_value(json!({
            "filters": [{"name": "lowpass", "type": "zpk"}],
            "stations": [{
                "metadata": {
                    "archive_id": "MT001",
                    "location": {"latitude": 40.0, "longitude": -116.0},
                    "time_period": {"start": "2020-01-01T00:00:00", "end": "2020-02-01T00:00:00"}
                },
                "runs": [{
                    "metadata": {
                        "id": "MT001a",
                        "sample_rate": 256.0,
                        "channels_recorded": ["Ex"],
                        "time_period": {"start": "2020-01-02T00:00:00", "end": "2020-01-05T00:00:00"}
                    },
                    "channels": [{"category": "electric", "metadata": channel}]
                }]
            }]
        }))
        .unwrap();
        doc.into_tree(SchemaRegistry::shared().unwrap()).unwrap()
    }

    #[test]
    fn test_clean_tree() {
        let report = IntegrityChecker::new().check_integrity(&tree(json!({"filter": {"name": ["lowpass"]}})));
        assert!(report.is_clean(), "{}", report.display_summary());
        assert_eq!(report.channels, 1);
        assert_eq!(report.filters, 1);
    }

    #[test]
    fn test_detects_problems() {
        let report = IntegrityChecker::new().check_integrity(&tree(json!({
            "filter": {"name": ["lowpass", "missing"]},
            "sample_rate": 128.0,
            "time_period": {"start": "2020-03-01T00:00:00", "end": "2020-02-01T00:00:00"}
        })));

        assert_eq!(report.count(IssueKind::DanglingFilter), 1);
        assert_eq!(report.count(IssueKind::SampleRateMismatch), 1);
        assert_eq!(report.count(IssueKind::InvertedTimePeriod), 1);
        assert_eq!(report.count(IssueKind::OutsideParentPeriod), 1);
    }

    #[test]
    fn test_strict_mode_reports_non_standard_fields() {
        let tree = tree(json!({"vendor_note": "spare electrode"}));
        assert!(IntegrityChecker::new().check_integrity(&tree).is_clean());

        let strict = IntegrityChecker::with_strict_mode(true).check_integrity(&tree);
        assert_eq!(strict.count(IssueKind::NonStandardField), 1);
        assert_eq!(strict.non_standard_fields, 1);
    }
}
