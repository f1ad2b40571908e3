//! # ForestWatch Monitor
//!
//! District-level deforestation checks: the analysis pipeline, the district
//! registry, configuration, and an interactive session that publishes
//! results to a report channel and a headless map display.
//!
//! ```no_run
//! use forestwatch_monitor::{
//!     AnalysisConfig, DistrictRegistry, MonitorSession, UniformBaseline, report_channel,
//! };
//! use forestwatch_cloud::{StacCatalog, StacSceneSource};
//!
//! let config = AnalysisConfig::default();
//! let source = StacSceneSource::new(StacCatalog::PlanetaryComputer, (&config.catalog).into()).unwrap();
//! let (tx, rx) = report_channel();
//! let session = MonitorSession::new(
//!     DistrictRegistry::builtin(),
//!     Box::new(source),
//!     Box::new(UniformBaseline::new(60.0)),
//!     config,
//!     tx,
//! );
//! let _ = session.check_deforestation(Some("Kurnool District"), "30");
//! for entry in rx.try_iter() {
//!     println!("{entry}");
//! }
//! ```

pub mod baseline;
pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod session;

pub use baseline::{RasterBaseline, TreeCoverSource, UniformBaseline};
pub use catalog::{CatalogEntry, LocalCatalog};
pub use config::{AnalysisConfig, CatalogConfig};
pub use display::{BOUNDARY_LAYER, DEFORESTATION_LAYER, FOREST_MASK_LAYER, Layer, LayerData, MapDisplay};
pub use error::{MonitorError, Result};
pub use pipeline::{AnalysisOutcome, run_analysis};
pub use registry::{District, DistrictRegistry};
pub use report::{ReportEntry, ReportLevel, ReportReceiver, ReportSender, report_channel};
pub use session::{MonitorSession, parse_days, summary_lines};
