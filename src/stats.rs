//! Index status overview.
//!
//! Summarises what is on disk for the passage and question indexes: file
//! sizes, vector counts, embedding model and build time, taken from each
//! store's manifest. Used by `examprep stats` to confirm that an indexing
//! run landed where the services will look for it.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::store::{read_manifest, IndexPaths, Manifest};

/// What is on disk for one index.
#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub name: &'static str,
    pub paths: IndexPaths,
    pub built: bool,
    pub size_bytes: u64,
    pub manifest: Option<Manifest>,
}

pub fn index_status(name: &'static str, paths: &IndexPaths) -> Result<IndexStatus> {
    let size_bytes = [paths.index_path(), paths.payload_path()]
        .iter()
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum();

    Ok(IndexStatus {
        name,
        paths: paths.clone(),
        built: paths.exists(),
        size_bytes,
        manifest: read_manifest(paths)?,
    })
}

/// Run the stats command: inspect both indexes and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let statuses = [
        index_status("passages", &config.passages.paths())?,
        index_status("questions", &config.questions.paths())?,
    ];

    println!("Exam Prep: Index Stats");
    println!("======================");
    println!();
    println!("  Embedding:   {}", config.embedding.provider);

    for s in &statuses {
        println!();
        println!("  {} ({})", s.name, s.paths.dir().display());
        if !s.built {
            println!("    not built");
            continue;
        }
        println!("    Size:      {}", format_bytes(s.size_bytes));
        match &s.manifest {
            Some(m) => {
                println!("    Vectors:   {}", m.count);
                println!("    Model:     {} ({} dims)", m.model, m.dims);
                println!("    Built:     {}", format_relative(m.created_at));
                println!("    Build id:  {}", m.build_id);
            }
            None => println!("    Manifest:  missing (built by an older version?)"),
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a timestamp relative to now (e.g. "3 hours ago").
fn format_relative(at: DateTime<Utc>) -> String {
    let delta = (Utc::now() - at).num_seconds();

    if delta < 0 {
        return format_iso(at);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_iso(at)
    }
}

fn format_iso(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VectorStore;
    use chrono::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_relative() {
        assert_eq!(format_relative(Utc::now()), "just now");
        assert_eq!(format_relative(Utc::now() - Duration::hours(3)), "3 hours ago");
        assert_eq!(format_relative(Utc::now() - Duration::days(1)), "1 day ago");
    }

    #[test]
    fn test_index_status() {
        let tmp = TempDir::new().unwrap();
        let paths = IndexPaths::new(tmp.path(), "index.bin", "texts.json");
        let status = index_status("passages", &paths).unwrap();
        assert!(!status.built);
        assert!(status.manifest.is_none());

        VectorStore::build(2, &[vec![1.0, 0.0]], vec!["x".to_string()])
            .unwrap()
            .persist(&paths, "hash")
            .unwrap();
        let status = index_status("passages", &paths).unwrap();
        assert!(status.built);
        assert!(status.size_bytes > 0);
        assert_eq!(status.manifest.unwrap().count, 1);
    }
}
