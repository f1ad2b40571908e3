//! Interactive monitoring session.
//!
//! A session owns the district registry, the imagery and baseline sources,
//! the map display and the report channel. Checks may run concurrently from
//! several threads; only the most recently started one gets to publish.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use forestwatch_core::{DateWindow, SceneSource};
use parking_lot::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::baseline::TreeCoverSource;
use crate::config::AnalysisConfig;
use crate::display::{MapDisplay, deforestation_layers};
use crate::error::{MonitorError, Result};
use crate::pipeline::{AnalysisOutcome, run_analysis};
use crate::registry::{District, DistrictRegistry};
use crate::report::{ReportEntry, ReportSender};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Parse a day count: surrounding whitespace is ignored, anything but a
/// non-negative integer is rejected.
pub fn parse_days(text: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .map_err(|_| MonitorError::InvalidDays(text.to_string()))
}

/// Report lines for a finished check
pub fn summary_lines(outcome: &AnalysisOutcome) -> Vec<String> {
    let mut lines = vec![format!("Deforestation Area (kha): {}", outcome.area.kilohectares())];
    if outcome.has_deforestation() {
        let coords = serde_json::to_string(&outcome.features.ring_coordinates())
            .unwrap_or_else(|_| "[]".to_string());
        lines.push(format!("Coordinates of Deforested Areas: {coords}"));
    } else {
        lines.push("No deforested areas detected.".to_string());
    }
    lines
}

pub struct MonitorSession {
    registry: DistrictRegistry,
    source: Box<dyn SceneSource>,
    baseline: Box<dyn TreeCoverSource>,
    config: AnalysisConfig,
    display: Mutex<MapDisplay>,
    latest_ticket: AtomicU64,
    report: ReportSender,
    clock: Clock,
}

impl MonitorSession {
    pub fn new(
        registry: DistrictRegistry,
        source: Box<dyn SceneSource>,
        baseline: Box<dyn TreeCoverSource>,
        config: AnalysisConfig,
        report: ReportSender,
    ) -> Self {
        Self {
            registry,
            source,
            baseline,
            config,
            display: Mutex::new(MapDisplay::new()),
            latest_ticket: AtomicU64::new(0),
            report,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the wall clock used to end the analysis window
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn registry(&self) -> &DistrictRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Lock the map display for reading or rendering
    pub fn display(&self) -> MutexGuard<'_, MapDisplay> {
        self.display.lock()
    }

    /// Run a deforestation check for `district` over the last `days` days.
    ///
    /// Every outcome, including input errors, is sent to the report
    /// channel. Returns `Ok(None)` when a newer check started while this one
    /// was running; its result is then discarded.
    pub fn check_deforestation(&self, district: Option<&str>, days: &str) -> Result<Option<AnalysisOutcome>> {
        let (district, days) = match self.validate_request(district, days) {
            Ok(request) => request,
            Err(err) => {
                self.send(ReportEntry::error(err.to_string()));
                return Err(err);
            }
        };
        // Rejected input never supersedes a running check
        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let window = DateWindow::lookback((self.clock)(), days);
        info!(ticket, district = %district.name, days, "deforestation check started");

        let result = run_analysis(
            district,
            window,
            self.source.as_ref(),
            self.baseline.as_ref(),
            &self.config,
        );

        // Publishing happens under the display lock so that the ticket
        // comparison and the layer swap are one step.
        let mut display = self.display.lock();
        if self.latest_ticket.load(Ordering::SeqCst) != ticket {
            warn!(ticket, district = %district.name, "discarding stale result");
            return Ok(None);
        }

        match result {
            Ok(outcome) => {
                for line in summary_lines(&outcome) {
                    self.send(ReportEntry::info(line));
                }
                display.replace_all(deforestation_layers(&outcome, &district.boundary));
                info!(ticket, kha = outcome.area.kilohectares(), "deforestation check published");
                Ok(Some(outcome))
            }
            Err(err) => {
                self.send(ReportEntry::error(err.to_string()));
                Err(err)
            }
        }
    }

    fn validate_request(&self, district: Option<&str>, days: &str) -> Result<(&District, u32)> {
        let name = district.ok_or(MonitorError::MissingDistrict)?;
        let district = self.registry.lookup(name)?;
        let days = parse_days(days)?;
        Ok((district, days))
    }

    fn send(&self, entry: ReportEntry) {
        // A dropped receiver only means nobody is listening
        let _ = self.report.send(entry);
    }
}
