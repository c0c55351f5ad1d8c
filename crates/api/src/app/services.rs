//! Service wiring shared by every handler.

use stockroom_infra::{Catalog, Ledger, LedgerStore, ReportSettings, Reporting};

use crate::config::MovementListSettings;

/// Catalog, ledger and reporting over one store.
#[derive(Debug, Clone)]
pub struct AppServices<S> {
    pub catalog: Catalog<S>,
    pub ledger: Ledger<S>,
    pub reporting: Reporting<S>,
    pub movement_limits: MovementListSettings,
}

impl<S> AppServices<S>
where
    S: LedgerStore + Clone,
{
    pub fn new(store: S, report: ReportSettings, movement_limits: MovementListSettings) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            reporting: Reporting::new(store, report),
            movement_limits,
        }
    }

    /// Clamp a requested page size to the configured bounds.
    pub fn movement_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.movement_limits.default_limit)
            .clamp(1, self.movement_limits.max_limit.max(1))
    }
}
