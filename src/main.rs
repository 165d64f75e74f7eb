pub(crate) mod backend;
pub(crate) mod config;
pub(crate) mod planning;
pub(crate) mod resolve;
pub(crate) mod retrieve;
pub(crate) mod types;
pub(crate) mod worklist;

use crate::backend::dimse::association::manager::AssociationManager;
use crate::backend::dimse::cmove::MoveMediator;
use crate::backend::dimse::StoreServiceClassProvider;
use crate::config::AppConfig;
use crate::planning::snapshot::SnapshotDirectory;
use crate::resolve::{PatientPhaseRecord, Resolver};
use crate::retrieve::archive::{ArchiveClient, DimseArchive};
use crate::retrieve::{BatchSummary, RetrievalOrchestrator};
use crate::worklist::read_worklist;
use anyhow::Context;
use std::net::SocketAddr;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Below the storage root. Receives instances no C-MOVE route claims.
const UNROUTED_DIR: &str = "unrouted";

fn init_logger(level: LevelFilter) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_file(false)
				.with_line_number(false)
				.with_target(false),
		)
		.with(
			EnvFilter::builder()
				.with_default_directive(level.into())
				.from_env_lossy(),
		)
		.with(sentry::integrations::tracing::layer())
		.init();
}

fn init_sentry(config: &AppConfig) -> sentry::ClientInitGuard {
	let guard = sentry::init((
		// An empty string will disable Sentry
		config.telemetry.sentry.as_deref().unwrap_or_default(),
		sentry::ClientOptions {
			release: sentry::release_name!(),
			traces_sample_rate: 1.0,
			..Default::default()
		},
	));

	if let Some(dsn) = &config.telemetry.sentry {
		info!(dsn, "Enabled Sentry for tracing and error tracking");
	}

	guard
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let config = AppConfig::new()?;
	init_logger(config.telemetry.level);

	// Sentry must be initialized before the Tokio runtime, so #[tokio::main] is not an option.
	// See https://docs.sentry.io/platforms/rust/#async-main-function
	let _sentry = init_sentry(&config);

	let result = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()?
		.block_on(run(config));

	if let Err(error) = &result {
		error!("Batch aborted: {error:#}");
	}
	result.map_err(Into::into)
}

/// Resolves the phases of every worklist entry in the planning system.
/// Entries that cannot be opened are logged and skipped.
fn resolve_worklist(config: &AppConfig) -> anyhow::Result<Vec<PatientPhaseRecord>> {
	let entries = read_worklist(&config.worklist.path, config.worklist.row_limit())
		.with_context(|| format!("Failed to load worklist {}", config.worklist.path.display()))?;
	info!(rows = entries.len(), "Loaded worklist");

	let planning = SnapshotDirectory::new(&config.planning.snapshots);
	let resolver = Resolver::new(config.policy.duplicates);

	let mut records = Vec::with_capacity(entries.len());
	for entry in &entries {
		let span = info_span!("patient", patient_id = entry.patient_id, course = entry.course_id);
		let _enter = span.enter();

		match planning::open_case(&planning, entry) {
			Ok(Some(case)) => {
				let record = resolver.resolve_case(&case);
				info!("Resolved phases\n{}", record.describe());
				records.push(record);
			}
			Ok(None) => warn!("Patient is unknown to the planning system"),
			Err(err) => warn!(plan = entry.plan_id, "Skipping worklist entry: {err}"),
		}
	}
	Ok(records)
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
	let records = resolve_worklist(&config)?;

	let mediator = MoveMediator::new(config.storage.root.join(UNROUTED_DIR));
	let storescp = StoreServiceClassProvider::new(
		mediator.clone(),
		config.local.clone(),
		config.dimse.timeout(),
	);
	let listener = storescp
		.bind()
		.await
		.context("Failed to bind Store Service Class Provider")?;
	tokio::spawn(storescp.serve(listener));

	let manager = AssociationManager {
		address: SocketAddr::from((config.archive.host, config.archive.port)),
		calling_aet: config.local.aet.clone(),
		called_aet: config.archive.aet.clone(),
	};
	let orchestrator = RetrievalOrchestrator::new(
		DimseArchive::new(
			manager,
			mediator,
			config.dimse.priority,
			config.dimse.timeout(),
		),
		&config.storage.root,
		config.local.aet.clone(),
		config.policy.structures,
	);

	match orchestrator.archive().verify().await {
		Ok(true) => info!(aet = config.archive.aet, "Archive is reachable"),
		Ok(false) => warn!(aet = config.archive.aet, "Archive rejected the C-ECHO"),
		Err(err) => warn!(aet = config.archive.aet, "Archive is not reachable: {err}"),
	}

	let mut summary = BatchSummary::default();
	for record in &records {
		let result = orchestrator.export(record).await;
		if let Err(err) = &result {
			error!(
				patient_id = record.patient_id,
				course = record.course_id,
				"Export aborted: {err}"
			);
		}
		summary.add(&result);
	}
	summary.log();

	Ok(())
}
