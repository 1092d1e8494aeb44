//! Per-cycle state machine and results.

use std::fmt;

use crate::{Result, SyncError};

/// Phase of one synchronization cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Selecting,
    Transferring,
    Rewriting,
    PushingBack,
    Done,
    Failed,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::Fetching => "fetching",
            CycleState::Selecting => "selecting",
            CycleState::Transferring => "transferring",
            CycleState::Rewriting => "rewriting",
            CycleState::PushingBack => "pushing_back",
            CycleState::Done => "done",
            CycleState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::Done | CycleState::Failed)
    }

    fn can_transition_to(&self, to: CycleState) -> bool {
        match (self, to) {
            (from, CycleState::Failed) => !from.is_terminal(),
            (CycleState::Idle, CycleState::Fetching) => true,
            (CycleState::Fetching, CycleState::Selecting | CycleState::Done) => true,
            (CycleState::Selecting, CycleState::Transferring | CycleState::Done) => true,
            (CycleState::Transferring, CycleState::Rewriting) => true,
            (CycleState::Rewriting, CycleState::PushingBack) => true,
            (CycleState::PushingBack, CycleState::Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Original relative path to external locator, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationMap {
    entries: Vec<(String, String)>,
}

impl MigrationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a migrated file; a repeated path replaces its locator in place.
    pub fn insert(&mut self, path: impl Into<String>, locator: impl Into<String>) {
        let path = path.into();
        let locator = locator.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == path) {
            Some(entry) => entry.1 = locator,
            None => self.entries.push((path, locator)),
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == path)
            .map(|(_, locator)| locator.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(path, locator)| (path.as_str(), locator.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub state: CycleState,
    /// Files that passed the change selector.
    pub selected: usize,
    pub migrations: MigrationMap,
    /// Selected files missing from the working copy.
    pub skipped: usize,
    /// Selected files whose upload failed.
    pub failed: usize,
    /// Version created by the push-back, if one happened.
    pub pushed_version: Option<String>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            state: CycleState::Idle,
            selected: 0,
            migrations: MigrationMap::new(),
            skipped: 0,
            failed: 0,
            pushed_version: None,
        }
    }

    /// True when the cycle found nothing to externalize.
    pub fn is_noop(&self) -> bool {
        self.migrations.is_empty() && self.pushed_version.is_none()
    }
}

/// Tracks the state of one cycle and rejects out-of-order transitions.
#[derive(Debug)]
pub struct SyncCycle {
    report: CycleReport,
}

impl SyncCycle {
    pub fn new() -> Self {
        Self {
            report: CycleReport::new(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.report.state
    }

    pub fn advance(&mut self, to: CycleState) -> Result<()> {
        let from = self.report.state;
        if !from.can_transition_to(to) {
            return Err(SyncError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        tracing::trace!(%from, %to, "Cycle state change");
        self.report.state = to;
        Ok(())
    }

    pub fn fail(&mut self) {
        if !self.report.state.is_terminal() {
            self.report.state = CycleState::Failed;
        }
    }

    pub fn report(&self) -> &CycleReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut CycleReport {
        &mut self.report
    }

    pub fn finish(self) -> CycleReport {
        self.report
    }
}

impl Default for SyncCycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_through_states() {
        let mut cycle = SyncCycle::new();
        for state in [
            CycleState::Fetching,
            CycleState::Selecting,
            CycleState::Transferring,
            CycleState::Rewriting,
            CycleState::PushingBack,
            CycleState::Done,
        ] {
            cycle.advance(state).unwrap();
        }
        assert_eq!(cycle.finish().state, CycleState::Done);
    }

    #[test]
    fn test_short_circuit_to_done() {
        let mut cycle = SyncCycle::new();
        cycle.advance(CycleState::Fetching).unwrap();
        cycle.advance(CycleState::Done).unwrap();
        assert!(cycle.state().is_terminal());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut cycle = SyncCycle::new();
        assert!(matches!(
            cycle.advance(CycleState::Transferring),
            Err(SyncError::InvalidStateTransition { from, to }) if from == "idle" && to == "transferring"
        ));

        cycle.advance(CycleState::Fetching).unwrap();
        cycle.advance(CycleState::Done).unwrap();
        assert!(cycle.advance(CycleState::Failed).is_err());
    }

    #[test]
    fn test_fail_from_any_active_state() {
        let mut cycle = SyncCycle::new();
        cycle.advance(CycleState::Fetching).unwrap();
        cycle.advance(CycleState::Selecting).unwrap();
        cycle.fail();
        assert_eq!(cycle.state(), CycleState::Failed);

        cycle.fail();
        assert_eq!(cycle.state(), CycleState::Failed);
    }

    #[test]
    fn test_migration_map_keeps_insertion_order() {
        let mut map = MigrationMap::new();
        map.insert("b.png", "/dest/b.png");
        map.insert("a.png", "/dest/a.png");
        map.insert("b.png", "/dest2/b.png");

        assert_eq!(map.paths().collect::<Vec<_>>(), vec!["b.png", "a.png"]);
        assert_eq!(map.get("b.png"), Some("/dest2/b.png"));
        assert_eq!(map.len(), 2);
    }
}
