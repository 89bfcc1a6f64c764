use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::args::{Cli, Commands};
use crate::error::{MetadataError, Result};
use crate::migration::Migrator;
use crate::models::category::Category;
use crate::processors::{BatchValidator, IntegrityChecker};
use crate::readers::{collect_inputs, read_path, ConcurrentReader, JsonReader};
use crate::schema::{SchemaRegistry, SchemaVersion};
use crate::settings::Settings;
use crate::tree::MetadataTree;
use crate::utils::coordinates::decimal_to_dms;
use crate::utils::filename::{generate_default_summary_filename, migrated_filename};
use crate::utils::flatten::expand;
use crate::utils::progress::ProgressReporter;
use crate::writers::{ParquetWriter, StandardsWriter};

pub async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(&path.display().to_string())?,
        None => Settings::load()?,
    };
    let registry = SchemaRegistry::shared()?;

    match cli.command {
        Commands::Validate {
            inputs,
            category,
            strict,
            max_workers,
        } => {
            let category = parse_category(category.as_deref())?;
            let workers = max_workers.unwrap_or(settings.workers);
            let strict = strict || settings.strict;

            let files = collect_inputs(&inputs)?;
            println!("Validating {} input files with {} workers...", files.len(), workers);

            let reading = ProgressReporter::spinner("Reading metadata files...");
            let records = ConcurrentReader::new(workers)
                .with_default_category(category)
                .read_all(files)
                .await?;
            reading.finish_with_message(&format!("Read {} records", records.len()));

            let progress = ProgressReporter::new(records.len() as u64, "records", "Validating metadata...");
            let report = BatchValidator::new(registry, workers)
                .with_strict(strict)
                .validate_all(&records, Some(&progress))?;

            println!("\n{}", report.display_summary());

            if report.is_clean() {
                println!("✅ All metadata passed validation");
            } else {
                return Err(MetadataError::InvalidState(format!(
                    "{} of {} records failed validation",
                    report.invalid,
                    report.outcomes.len()
                )));
            }
        }

        Commands::Migrate {
            inputs,
            category,
            output_dir,
            target_version,
            dry_run,
        } => {
            let category = parse_category(category.as_deref())?;
            let target: SchemaVersion = match target_version {
                Some(version) => version.parse()?,
                None => settings.schema_version()?,
            };
            let migrator = Migrator::new().with_target(target);

            if let Some(dir) = &output_dir {
                fs::create_dir_all(dir)?;
            }

            let files = collect_inputs(&inputs)?;
            println!("Migrating {} input files to schema {}...", files.len(), target);

            let mut changed = 0;
            for file in &files {
                let records = read_path(file, category)?;
                let mut documents = Vec::with_capacity(records.len());

                for record in &records {
                    let (mapping, source) = migrator.migrate_detected(record.category, &record.mapping)?;
                    if source != target {
                        changed += 1;
                        info!("{}: {} {} -> {}", record.source, record.category, source, target);
                    }
                    let mut wrapped = Map::new();
                    wrapped.insert(record.category.to_string(), expand(&mapping)?);
                    documents.push(Value::Object(wrapped));
                }

                let output = output_path(file, output_dir.as_deref(), &target);
                if dry_run {
                    println!("{} -> {} ({} records)", file.display(), output.display(), records.len());
                    continue;
                }

                let document = if documents.len() == 1 {
                    documents.remove(0)
                } else {
                    Value::Array(documents)
                };
                fs::write(&output, serde_json::to_string_pretty(&document)?)?;
                println!("Wrote {}", output.display());
            }

            println!("Migration complete: {} records rewritten", changed);
        }

        Commands::Standards {
            output_file,
            category,
        } => {
            let category = parse_category(category.as_deref())?;
            let rows: Vec<_> = registry
                .standards_table()
                .into_iter()
                .filter(|row| category.map_or(true, |c| row.category == c.as_str()))
                .collect();

            match output_file {
                Some(path) => {
                    create_parent_dir(&path)?;
                    StandardsWriter::write_file(&rows, &path)?;
                    println!("Wrote {} attributes to {}", rows.len(), path.display());
                }
                None => StandardsWriter::write_to(&rows, std::io::stdout().lock())?,
            }
        }

        Commands::Summarize {
            input,
            output_file,
            compression,
            level,
        } => {
            let tree = load_tree(&input, registry)?;
            let rows = match level.as_deref() {
                None => tree.summary(),
                Some("station") => tree.station_summary(),
                Some("run") => tree.run_summary(),
                Some("channel") => tree.channel_summary(),
                Some(other) => {
                    return Err(MetadataError::InvalidFormat(format!(
                        "Unknown summary level '{}': expected station, run or channel",
                        other
                    )))
                }
            };

            if rows.is_empty() {
                println!("No containers to summarize");
                return Ok(());
            }

            let output_file = output_file.unwrap_or_else(generate_default_summary_filename);
            create_parent_dir(&output_file)?;

            let writer = ParquetWriter::new()
                .with_compression(compression.as_deref().unwrap_or(&settings.compression))?
                .with_row_group_size(settings.row_group_size);

            println!("Writing {} summary rows to {}...", rows.len(), output_file.display());
            writer.write_summary(&rows, &output_file)?;

            let file_info = writer.get_file_info(&output_file)?;
            println!("\n{}", file_info.summary());
        }

        Commands::Inspect {
            input,
            strict,
            show_metadata,
        } => {
            let tree = load_tree(&input, registry)?;

            println!("Archive: {}", input.display());
            for node in tree.root().walk() {
                let depth = node.path().split('/').filter(|s| !s.is_empty()).count() / 2;
                println!("{}{} {}", "  ".repeat(depth), node.kind(), display_id(node.id()));

                let metadata = node.metadata();
                if let (Some(lat), Some(lon)) = (
                    metadata.get_f64("location.latitude"),
                    metadata.get_f64("location.longitude"),
                ) {
                    println!(
                        "{}  at {}, {}",
                        "  ".repeat(depth),
                        decimal_to_dms(lat),
                        decimal_to_dms(lon)
                    );
                }

                if show_metadata {
                    for (path, value) in node.metadata().iter() {
                        println!("{}  {} = {}", "  ".repeat(depth), path, value);
                    }
                }
            }

            let report = IntegrityChecker::with_strict_mode(strict || settings.strict)
                .check_integrity(&tree);
            println!("\n{}", report.display_summary());

            if report.is_clean() {
                println!("✅ No integrity issues");
            } else {
                println!("⚠️  Found {} integrity issues", report.issues.len());
            }
        }
    }

    Ok(())
}

fn parse_category(category: Option<&str>) -> Result<Option<Category>> {
    category.map(str::parse).transpose()
}

fn load_tree(path: &Path, registry: std::sync::Arc<SchemaRegistry>) -> Result<MetadataTree> {
    let document = JsonReader::new().read_archive(path)?;
    info!(
        "Loading {} containers from {}",
        document.container_count(),
        path.display()
    );
    document.into_tree(registry)
}

fn output_path(input: &Path, output_dir: Option<&Path>, target: &SchemaVersion) -> PathBuf {
    let migrated = migrated_filename(input, &target.to_string());
    match (output_dir, migrated.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => migrated,
    }
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn display_id(id: &str) -> &str {
    if id.is_empty() {
        "(survey)"
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        let target = SchemaVersion::current();
        assert_eq!(
            output_path(Path::new("in/station.json"), None, &target),
            PathBuf::from("in/station.v0.3.0.json")
        );
        assert_eq!(
            output_path(Path::new("in/station.json"), Some(Path::new("out")), &target),
            PathBuf::from("out/station.v0.3.0.json")
        );
    }

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category(None).unwrap(), None);
        assert_eq!(parse_category(Some("run")).unwrap(), Some(Category::Run));
        assert!(parse_category(Some("instrument")).is_err());
    }
}
