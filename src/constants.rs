//! Shared naming and numeric constants.

/// Extension of serialized scan artifacts under the read directory.
pub const SCAN_EXTENSION: &str = "bin";

/// Extension of persisted per-scan feature records.
pub const RECORD_EXTENSION: &str = "json";

/// Sub-directory of a features directory holding per-scan manifests.
pub const MANIFEST_DIR: &str = "manifests";

/// Catalog file prefix; the full name is `roiNames_<label>.csv`.
pub const CATALOG_PREFIX: &str = "roiNames_";

/// Log directory prefix for the scan phase; suffixed with the ROI type label.
pub const SCAN_LOG_DIR_PREFIX: &str = "batchLog_";

/// Log directory for the table phase.
pub const TABLE_LOG_DIR: &str = "batchLog_tables";

/// Per-slot log file prefix; the full name is `log_file_<slot>.log`.
pub const SLOT_LOG_PREFIX: &str = "log_file_";

/// Feature-space key used when no filter is applied.
pub const ORIGINAL_SPACE: &str = "original";

/// Table name prefix.
pub const TABLE_PREFIX: &str = "radiomics__";

/// Separator between group key and feature name in flattened table columns.
pub const COLUMN_SEPARATOR: &str = "__";

/// Volume of the local-intensity sphere, in mm^3 (1 cm^3).
pub const PEAK_SPHERE_VOLUME_MM3: f64 = 1000.0;

/// Collewet outlier rule width, in standard deviations.
pub const OUTLIER_SIGMAS: f64 = 3.0;

/// Upper bound on grey levels produced by discretization.
pub const MAX_GREY_LEVELS: usize = 65_536;
