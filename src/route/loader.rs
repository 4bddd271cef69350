use crate::error::{FleetError, Result};
use crate::route::{RouteSegment, RouteTopology};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// One inline topology entry: either bare nominal minutes or a full segment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SegmentEntry {
    Minutes(f64),
    Detailed {
        nominal_minutes: f64,
        #[serde(default)]
        next_stop_id: Option<String>,
    },
}

pub fn topology_from_entries(entries: &BTreeMap<String, SegmentEntry>) -> Result<RouteTopology> {
    let mut segments = Vec::with_capacity(entries.len());

    for (stop_id, entry) in entries {
        let (minutes, next) = match entry {
            SegmentEntry::Minutes(m) => (*m, None),
            SegmentEntry::Detailed {
                nominal_minutes,
                next_stop_id,
            } => (*nominal_minutes, next_stop_id.clone()),
        };
        check_minutes(stop_id, minutes)?;

        segments.push(RouteSegment {
            stop_id: stop_id.clone(),
            next_stop_id: next,
            nominal_minutes: minutes,
        });
    }

    Ok(RouteTopology::new(segments))
}

/// Load a `stop_id,next_stop_id,nominal_minutes` table. An empty
/// `next_stop_id` declares a terminal, which must have zero minutes.
pub fn load_topology_csv(path: impl AsRef<Path>) -> Result<RouteTopology> {
    let path = path.as_ref();
    let mut content = String::new();
    File::open(path)?.read_to_string(&mut content)?;

    let topology = parse_topology_csv(&content)?;
    info!(
        path = %path.display(),
        segments = topology.len(),
        "Loaded route topology"
    );
    Ok(topology)
}

fn parse_topology_csv(content: &str) -> Result<RouteTopology> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut segments = Vec::new();

    for result in reader.records() {
        let record = result?;
        let stop_id = record.get(0).unwrap_or("").to_string();
        if stop_id.is_empty() {
            continue;
        }
        let next_stop_id = record
            .get(1)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let raw_minutes = record.get(2).unwrap_or("");
        let minutes: f64 = raw_minutes
            .parse()
            .map_err(|_| FleetError::InvalidTopology {
                stop_id: stop_id.clone(),
                reason: format!("nominal minutes {:?} is not a number", raw_minutes),
            })?;

        check_minutes(&stop_id, minutes)?;
        if next_stop_id.is_none() && minutes != 0.0 {
            return Err(FleetError::InvalidTopology {
                stop_id,
                reason: format!("terminal stop has nominal time {} (expected 0)", minutes),
            });
        }

        segments.push(RouteSegment {
            stop_id,
            next_stop_id,
            nominal_minutes: minutes,
        });
    }

    Ok(RouteTopology::new(segments))
}

fn check_minutes(stop_id: &str, minutes: f64) -> Result<()> {
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(FleetError::InvalidTopology {
            stop_id: stop_id.to_string(),
            reason: format!("nominal minutes must be a non-negative number, got {}", minutes),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_csv_table_with_terminal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stop_id,next_stop_id,nominal_minutes").unwrap();
        writeln!(file, "STOP_A,STOP_B,10").unwrap();
        writeln!(file, "STOP_B, STOP_C ,15").unwrap();
        writeln!(file, "STOP_C,,0").unwrap();

        let topology = load_topology_csv(file.path()).unwrap();
        assert_eq!(topology.len(), 3);
        assert_eq!(
            topology.segment("STOP_B").unwrap().next_stop_id.as_deref(),
            Some("STOP_C")
        );
        assert!(topology.segment("STOP_C").unwrap().is_terminal());
    }

    #[test]
    fn rejects_terminal_with_travel_time() {
        let err = parse_topology_csv("stop_id,next_stop_id,nominal_minutes\nSTOP_Z,,4\n").unwrap_err();
        assert!(matches!(err, FleetError::InvalidTopology { ref stop_id, .. } if stop_id == "STOP_Z"));
    }

    #[test]
    fn rejects_negative_and_garbage_minutes() {
        assert!(parse_topology_csv("stop_id,next_stop_id,nominal_minutes\nA,B,-1\n").is_err());
        assert!(parse_topology_csv("stop_id,next_stop_id,nominal_minutes\nA,B,soon\n").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_topology_csv("/nonexistent/topology.csv").unwrap_err();
        assert!(matches!(err, FleetError::Io(_)));
    }

    #[test]
    fn inline_entries_accept_both_shapes() {
        let yaml = "STOP_A: 10\nSTOP_B:\n  nominal_minutes: 15\n  next_stop_id: STOP_C\n";
        let entries: BTreeMap<String, SegmentEntry> = serde_yaml::from_str(yaml).unwrap();
        let topology = topology_from_entries(&entries).unwrap();

        assert_eq!(topology.segment("STOP_A").unwrap().nominal_minutes, 10.0);
        assert_eq!(topology.segment("STOP_A").unwrap().next_stop_id, None);
        assert_eq!(
            topology.segment("STOP_B").unwrap().next_stop_id.as_deref(),
            Some("STOP_C")
        );
    }
}
