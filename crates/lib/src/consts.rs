//! Shared constants.

pub const APP_NAME: &str = "modforge";

/// Default project manifest file name.
pub const MANIFEST_FILENAME: &str = "modforge.toml";

/// Default allow-list file name, relative to the project root.
pub const ALLOWLIST_FILENAME: &str = "checksums.json";

/// Block size used when streaming artifacts through a digest.
pub const DIGEST_BLOCK_SIZE: usize = 8192;

/// Fixed timestamp for archive entries and child processes.
///
/// 315532800 = January 1, 1980 00:00:00 UTC (ZIP epoch).
pub const SOURCE_DATE_EPOCH: u64 = 315_532_800;

/// Permission bits for directories inside release archives.
pub const ARCHIVE_DIR_MODE: u32 = 0o775;

/// Permission bits for regular files inside release archives.
pub const ARCHIVE_FILE_MODE: u32 = 0o664;

/// Permission bits for files matching the executable patterns.
pub const ARCHIVE_EXEC_MODE: u32 = 0o775;

/// Marker in an archive file name that routes it to the source staging folder.
pub const SOURCE_ARCHIVE_MARKER: &str = "_src.";

/// Suffix appended to the version for non-release builds.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";
