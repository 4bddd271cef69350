use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteSegment {
    pub stop_id: String,
    /// Stop this segment leads to, when the topology declares it.
    pub next_stop_id: Option<String>,
    /// Nominal minutes from `stop_id` to the next stop. Zero for a terminal.
    pub nominal_minutes: f64,
}

impl RouteSegment {
    pub fn is_terminal(&self) -> bool {
        self.nominal_minutes == 0.0
    }

    /// Minutes left on this segment at `progress` (already clamped to [0, 1]).
    pub fn remaining_minutes(&self, progress: f64) -> f64 {
        self.nominal_minutes * (1.0 - progress)
    }
}

/// Static per-route segment table, keyed by the stop a segment starts at.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RouteTopology {
    segments: HashMap<String, RouteSegment>,
}

impl RouteTopology {
    pub fn new(segments: impl IntoIterator<Item = RouteSegment>) -> Self {
        Self {
            segments: segments
                .into_iter()
                .map(|s| (s.stop_id.clone(), s))
                .collect(),
        }
    }

    pub fn segment(&self, stop_id: &str) -> Option<&RouteSegment> {
        self.segments.get(stop_id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn terminals(&self) -> impl Iterator<Item = &RouteSegment> {
        self.segments.values().filter(|s| s.is_terminal())
    }

    /// The reference four-stop line used when no topology is configured.
    pub fn reference() -> Self {
        Self::new([
            segment("STOP_A", Some("STOP_B"), 10.0),
            segment("STOP_B", Some("STOP_C"), 15.0),
            segment("STOP_C", Some("STOP_D"), 8.0),
            segment("STOP_D", None, 0.0),
        ])
    }
}

fn segment(stop_id: &str, next: Option<&str>, minutes: f64) -> RouteSegment {
    RouteSegment {
        stop_id: stop_id.to_string(),
        next_stop_id: next.map(str::to_string),
        nominal_minutes: minutes,
    }
}
