use crate::resolve::DuplicatePolicy;
use crate::retrieve::StructureExportPolicy;
use crate::types::{Priority, AE};
use serde::{de, Deserialize, Deserializer};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

const DEFAULTS: &str = include_str!("defaults.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub archive: ArchiveConfig,
	pub local: LocalConfig,
	pub storage: StorageConfig,
	pub worklist: WorklistConfig,
	pub planning: PlanningConfig,
	pub dimse: DimseConfig,
	pub policy: PolicyConfig,
}

impl AppConfig {
	/// Loads the configuration from the embedded defaults, an optional `config.toml` in the
	/// working directory and `CT_COLLECTOR__*` environment variables (in that order).
	pub fn new() -> Result<Self, config::ConfigError> {
		use config::Config;
		let s = Config::builder()
			.add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
			.add_source(config::File::with_name("config.toml").required(false))
			.add_source(
				config::Environment::with_prefix("CT_COLLECTOR")
					.prefix_separator("__")
					.separator("__"),
			)
			.build()?;

		s.try_deserialize()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	// Also configurable via RUST_LOG
	#[serde(deserialize_with = "deserialize_level")]
	pub level: LevelFilter,
	/// Sentry DSN. Error tracking is disabled when absent.
	pub sentry: Option<String>,
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
	D: Deserializer<'de>,
{
	let level = String::deserialize(deserializer)?;
	level.parse().map_err(|_| {
		de::Error::invalid_value(
			de::Unexpected::Str(&level),
			&"one of off, error, warn, info, debug, trace",
		)
	})
}

/// The remote archive queried by C-FIND and asked to C-MOVE.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
	pub aet: AE,
	pub host: IpAddr,
	pub port: u16,
}

/// This node, both as calling AE and as C-MOVE destination.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
	pub aet: AE,
	pub interface: IpAddr,
	pub port: u16,
	/// Only accept uncompressed transfer syntaxes on the store SCP.
	#[serde(default)]
	pub uncompressed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
	/// Export root. Patient folders are created below it.
	pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorklistConfig {
	pub path: PathBuf,
	/// Maximum number of rows to process. Absent or negative means all rows.
	pub limit: Option<i64>,
}

impl WorklistConfig {
	pub fn row_limit(&self) -> Option<usize> {
		self.limit.and_then(|limit| usize::try_from(limit).ok())
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanningConfig {
	/// Directory containing one `<patientId>.json` export per patient.
	pub snapshots: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DimseConfig {
	/// Timeout for association setup, C-ECHO, C-FIND and C-MOVE requests in milliseconds.
	/// C-MOVE responses are awaited without a timeout.
	pub timeout: u64,
	/// Priority of C-FIND and C-MOVE requests.
	#[serde(default)]
	pub priority: Priority,
}

impl DimseConfig {
	pub const fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout)
	}
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PolicyConfig {
	pub duplicates: DuplicatePolicy,
	pub structures: StructureExportPolicy,
}

#[cfg(test)]
mod tests {
	use super::*;
	use config::{Config, File, FileFormat};

	fn load(overrides: &str) -> AppConfig {
		Config::builder()
			.add_source(File::from_str(DEFAULTS, FileFormat::Toml))
			.add_source(File::from_str(overrides, FileFormat::Toml))
			.build()
			.unwrap()
			.try_deserialize()
			.unwrap()
	}

	#[test]
	fn defaults_deserialize() {
		let config = load("");
		assert_eq!(config.archive.port, 51402);
		assert_eq!(config.local.aet, "CT-COLLECTOR");
		assert_eq!(config.worklist.row_limit(), Some(1));
		assert_eq!(config.dimse.timeout(), Duration::from_secs(600));
		assert_eq!(config.policy.duplicates, DuplicatePolicy::First);
		assert_eq!(config.policy.structures, StructureExportPolicy::First);
		assert!(config.telemetry.sentry.is_none());
		assert_eq!(config.telemetry.level, LevelFilter::INFO);
		assert_eq!(config.dimse.priority, Priority::Medium);
	}

	#[test]
	fn invalid_log_level_is_rejected() {
		let result = Config::builder()
			.add_source(File::from_str(DEFAULTS, FileFormat::Toml))
			.add_source(File::from_str("[telemetry]\nlevel = \"verbose\"\n", FileFormat::Toml))
			.build()
			.unwrap()
			.try_deserialize::<AppConfig>();
		assert!(result.is_err());
	}

	#[test]
	fn priority_is_overridable() {
		let config = load("[dimse]\ntimeout = 1000\npriority = \"high\"\n");
		assert_eq!(config.dimse.priority, Priority::High);
	}

	#[test]
	fn negative_limit_means_all_rows() {
		let config = load("[worklist]\npath = \"list.csv\"\nlimit = -1\n");
		assert_eq!(config.worklist.row_limit(), None);
	}

	#[test]
	fn policies_are_overridable() {
		let config = load("[policy]\nduplicates = \"last\"\nstructures = \"all\"\n");
		assert_eq!(config.policy.duplicates, DuplicatePolicy::Last);
		assert_eq!(config.policy.structures, StructureExportPolicy::All);
	}
}
