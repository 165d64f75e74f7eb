//! Retrieves the resolved phases of a patient from the archive into
//! `<root>/<patientId>_<course>/<phase>/` and writes the `GTV.txt` manifest.

pub mod archive;

use crate::backend::dimse::cmove::{MoveTarget, RetrievalOutcome};
use crate::backend::dimse::MessageIdSequence;
use crate::resolve::{PatientPhaseRecord, PhaseRecord};
use crate::types::{Phase, AE, UI};
use dicom::dictionary_std::uids;
use archive::{ArchiveClient, ArchiveError, RetrieveRequest, SeriesMatch};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// File listing the matched structure ids of a patient.
pub const MANIFEST_FILE_NAME: &str = "GTV.txt";

const STRUCTURE_SET_MODALITY: &str = "RTSTRUCT";

/// Which matched structure sets of a phase are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureExportPolicy {
	/// Only the structure set of the first matched structure.
	#[default]
	First,
	/// Every distinct structure set, in match order.
	All,
}

impl StructureExportPolicy {
	/// The structure set UIDs to retrieve for a phase.
	pub fn select<'a>(self, record: &'a PhaseRecord) -> Vec<&'a str> {
		let mut selected: Vec<&str> = Vec::new();
		for uid in record.structure_set_uids() {
			if !selected.contains(&uid) {
				selected.push(uid);
			}
		}
		if self == Self::First {
			selected.truncate(1);
		}
		selected
	}
}

/// Non-fatal findings of an export. The affected phase or structure set is skipped.
#[derive(Debug, Error)]
pub enum ExportDiagnostic {
	#[error("{phase} was not resolved, nothing to retrieve")]
	PhaseNotResolved { phase: Phase },
	#[error("Failed to create directory {} for {phase}: {source}", .path.display())]
	Directory {
		phase: Phase,
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("Study {study_uid} of {phase} was not found in the archive")]
	StudyNotFound { phase: Phase, study_uid: UI },
	#[error("Series {series_uid} of {phase} was not found in the archive")]
	SeriesNotFound { phase: Phase, series_uid: UI },
	#[error("Structure set {structure_set_uid} of {phase} was not found in the archive")]
	StructureSetNotFound { phase: Phase, structure_set_uid: UI },
	#[error("Query for {phase} failed: {source}")]
	Query { phase: Phase, source: ArchiveError },
	#[error("Retrieval for {phase} failed: {source}")]
	Retrieval { phase: Phase, source: ArchiveError },
	#[error(
		"Retrieval for {phase} is incomplete: status {:#06x}, {} completed, {} failed, {} remaining",
		.outcome.status, .outcome.completed, .outcome.failed, .outcome.remaining
	)]
	Incomplete {
		phase: Phase,
		outcome: RetrievalOutcome,
	},
}

#[derive(Debug, Error)]
pub enum ExportError {
	#[error("Failed to create patient directory {}: {source}", .path.display())]
	PatientDirectory {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("Failed to write manifest {}: {source}", .path.display())]
	Manifest {
		path: PathBuf,
		source: std::io::Error,
	},
}

/// One C-MOVE of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieval {
	pub phase: Phase,
	pub target: MoveTarget,
	pub outcome: RetrievalOutcome,
}

#[derive(Debug)]
pub struct ExportReport {
	pub patient_dir: PathBuf,
	pub retrievals: Vec<Retrieval>,
	pub diagnostics: Vec<ExportDiagnostic>,
}

impl ExportReport {
	fn new(patient_dir: PathBuf) -> Self {
		Self {
			patient_dir,
			retrievals: Vec::new(),
			diagnostics: Vec::new(),
		}
	}

	fn diagnose(&mut self, diagnostic: ExportDiagnostic) {
		warn!("{diagnostic}");
		self.diagnostics.push(diagnostic);
	}

	pub fn completed(&self) -> u32 {
		self.retrievals
			.iter()
			.map(|retrieval| u32::from(retrieval.outcome.completed))
			.sum()
	}

	pub fn failed(&self) -> u32 {
		self.retrievals
			.iter()
			.map(|retrieval| u32::from(retrieval.outcome.failed))
			.sum()
	}
}

/// Totals over all exported patients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
	pub patients: usize,
	pub aborted: usize,
	pub retrievals: usize,
	pub completed: u32,
	pub failed: u32,
	pub diagnostics: usize,
}

impl BatchSummary {
	pub fn add(&mut self, result: &Result<ExportReport, ExportError>) {
		self.patients += 1;
		match result {
			Ok(report) => {
				self.retrievals += report.retrievals.len();
				self.completed += report.completed();
				self.failed += report.failed();
				self.diagnostics += report.diagnostics.len();
			}
			Err(_) => self.aborted += 1,
		}
	}

	pub fn log(&self) {
		info!(
			patients = self.patients,
			aborted = self.aborted,
			retrievals = self.retrievals,
			completed = self.completed,
			failed = self.failed,
			diagnostics = self.diagnostics,
			"Batch finished"
		);
	}
}

/// Exports patients one after another. Moves are issued sequentially.
pub struct RetrievalOrchestrator<C> {
	archive: C,
	root: PathBuf,
	destination: AE,
	structures: StructureExportPolicy,
	message_ids: MessageIdSequence,
}

impl<C: ArchiveClient> RetrievalOrchestrator<C> {
	/// Retrieved instances are pushed to `destination`, the AE of the local store SCP.
	pub fn new(
		archive: C,
		root: impl Into<PathBuf>,
		destination: AE,
		structures: StructureExportPolicy,
	) -> Self {
		Self {
			archive,
			root: root.into(),
			destination,
			structures,
			message_ids: MessageIdSequence::default(),
		}
	}

	pub const fn archive(&self) -> &C {
		&self.archive
	}

	/// `<root>/<patientId>_<course>`
	pub fn patient_dir(&self, record: &PatientPhaseRecord) -> PathBuf {
		self.root
			.join(format!("{}_{}", record.patient_id, record.course_id))
	}

	/// Retrieves both phases of the patient and writes the manifest.
	/// Only filesystem failures of the patient directory abort the export.
	#[instrument(skip_all, fields(patient_id = record.patient_id, course = record.course_id))]
	pub async fn export(&self, record: &PatientPhaseRecord) -> Result<ExportReport, ExportError> {
		let patient_dir = self.patient_dir(record);
		tokio::fs::create_dir_all(&patient_dir)
			.await
			.map_err(|source| ExportError::PatientDirectory {
				path: patient_dir.clone(),
				source,
			})?;

		let mut report = ExportReport::new(patient_dir);
		for phase in Phase::ALL {
			self.export_phase(record, phase, &mut report).await;
		}

		write_manifest(&report.patient_dir, record).await?;
		info!(
			retrievals = report.retrievals.len(),
			completed = report.completed(),
			failed = report.failed(),
			diagnostics = report.diagnostics.len(),
			"Finished export"
		);
		Ok(report)
	}

	async fn export_phase(&self, record: &PatientPhaseRecord, phase: Phase, report: &mut ExportReport) {
		let slot = record.phase(phase);
		let Some(series_uid) = slot.series_uid.as_deref().filter(|_| slot.is_found()) else {
			report.diagnose(ExportDiagnostic::PhaseNotResolved { phase });
			return;
		};

		let directory = report.patient_dir.join(phase.label());
		if let Err(source) = tokio::fs::create_dir_all(&directory).await {
			report.diagnose(ExportDiagnostic::Directory {
				phase,
				path: directory,
				source,
			});
			return;
		}

		let series = match self.locate_series(record, phase, series_uid).await {
			Ok(series) => series,
			Err(diagnostic) => {
				report.diagnose(diagnostic);
				return;
			}
		};

		info!(%phase, series_uid, "Retrieving series");
		let target = MoveTarget::Series {
			study_uid: record.study_uid.clone(),
			series_uid: series_uid.to_owned(),
		};
		self.retrieve(phase, target, &directory, report).await;

		for structure_set_uid in self.structures.select(slot) {
			self.export_structure_set(record, phase, &series, structure_set_uid, &directory, report)
				.await;
		}
	}

	/// Finds the study by patient and the series within it. Returns the study's series.
	async fn locate_series(
		&self,
		record: &PatientPhaseRecord,
		phase: Phase,
		series_uid: &str,
	) -> Result<Vec<SeriesMatch>, ExportDiagnostic> {
		let query_failed = |source| ExportDiagnostic::Query { phase, source };

		let studies = self
			.archive
			.find_studies(&record.patient_id)
			.await
			.map_err(query_failed)?;
		if !studies.iter().any(|study| study.study_uid == record.study_uid) {
			return Err(ExportDiagnostic::StudyNotFound {
				phase,
				study_uid: record.study_uid.clone(),
			});
		}

		let series = self
			.archive
			.find_series(&record.study_uid)
			.await
			.map_err(query_failed)?;
		if !series.iter().any(|series| series.series_uid == series_uid) {
			return Err(ExportDiagnostic::SeriesNotFound {
				phase,
				series_uid: series_uid.to_owned(),
			});
		}
		Ok(series)
	}

	/// Looks for the structure set among the study's RTSTRUCT series and retrieves it.
	async fn export_structure_set(
		&self,
		record: &PatientPhaseRecord,
		phase: Phase,
		series: &[SeriesMatch],
		structure_set_uid: &str,
		directory: &Path,
		report: &mut ExportReport,
	) {
		let candidates = series
			.iter()
			.filter(|series| series.modality.as_deref() == Some(STRUCTURE_SET_MODALITY));

		for candidate in candidates {
			let instances = match self
				.archive
				.find_instances(&record.study_uid, &candidate.series_uid)
				.await
			{
				Ok(instances) => instances,
				Err(source) => {
					report.diagnose(ExportDiagnostic::Query { phase, source });
					continue;
				}
			};

			if instances.iter().any(|instance| {
				instance.sop_instance_uid == structure_set_uid
					&& instance
						.sop_class_uid
						.as_deref()
						.is_none_or(|sop_class_uid| sop_class_uid == uids::RT_STRUCTURE_SET_STORAGE)
			}) {
				info!(%phase, structure_set_uid, "Retrieving structure set");
				let target = MoveTarget::Instance {
					study_uid: record.study_uid.clone(),
					series_uid: candidate.series_uid.clone(),
					sop_instance_uid: structure_set_uid.to_owned(),
				};
				self.retrieve(phase, target, directory, report).await;
				return;
			}
		}

		report.diagnose(ExportDiagnostic::StructureSetNotFound {
			phase,
			structure_set_uid: structure_set_uid.to_owned(),
		});
	}

	async fn retrieve(&self, phase: Phase, target: MoveTarget, directory: &Path, report: &mut ExportReport) {
		let request = RetrieveRequest {
			target: target.clone(),
			destination: self.destination.clone(),
			message_id: self.message_ids.next(),
			output_dir: directory.to_path_buf(),
		};

		match self.archive.retrieve(request).await {
			Ok(outcome) => {
				if !outcome.is_complete() {
					report.diagnose(ExportDiagnostic::Incomplete { phase, outcome });
				}
				report.retrievals.push(Retrieval {
					phase,
					target,
					outcome,
				});
			}
			Err(source) => report.diagnose(ExportDiagnostic::Retrieval { phase, source }),
		}
	}
}

/// Writes one matched structure id per line, `CT_0` first. Written even if empty.
async fn write_manifest(patient_dir: &Path, record: &PatientPhaseRecord) -> Result<(), ExportError> {
	let path = patient_dir.join(MANIFEST_FILE_NAME);
	let content: String = record
		.structure_ids()
		.map(|structure_id| format!("{structure_id}\n"))
		.collect();

	tokio::fs::write(&path, content)
		.await
		.map_err(|source| ExportError::Manifest { path, source })
}

#[cfg(test)]
mod tests {
	use super::archive::{InstanceMatch, StudyMatch};
	use super::*;
	use crate::backend::dimse::cfind::findscu::FindError;
	use crate::resolve::MatchedStructure;
	use std::collections::HashMap;
	use std::sync::Mutex;

	#[derive(Default)]
	struct InMemoryArchive {
		studies: Vec<StudyMatch>,
		series: Vec<SeriesMatch>,
		instances: HashMap<UI, Vec<InstanceMatch>>,
		outcomes: HashMap<UI, RetrievalOutcome>,
		unreachable: bool,
		requests: Mutex<Vec<RetrieveRequest>>,
	}

	impl InMemoryArchive {
		fn with_planning_study() -> Self {
			let series = |uid: &str, modality: &str| SeriesMatch {
				series_uid: uid.to_owned(),
				modality: Some(modality.to_owned()),
			};
			let instance = |uid: &str| InstanceMatch {
				sop_instance_uid: uid.to_owned(),
				sop_class_uid: None,
			};
			Self {
				studies: vec![StudyMatch {
					study_uid: String::from("1.2.3"),
				}],
				series: vec![
					series("1.2.3.10", "CT"),
					series("1.2.3.50", "CT"),
					series("1.2.3.80", "RTSTRUCT"),
					series("1.2.3.90", "RTSTRUCT"),
				],
				instances: HashMap::from([
					(String::from("1.2.3.80"), vec![instance("1.2.3.81")]),
					(String::from("1.2.3.90"), vec![instance("1.2.3.99")]),
				]),
				..Self::default()
			}
		}

		fn unavailable() -> ArchiveError {
			ArchiveError::Find(FindError::Status(0xA700))
		}

		fn requests(&self) -> Vec<RetrieveRequest> {
			self.requests.lock().unwrap().clone()
		}
	}

	impl ArchiveClient for InMemoryArchive {
		async fn verify(&self) -> Result<bool, ArchiveError> {
			Ok(!self.unreachable)
		}

		async fn find_studies(&self, _patient_id: &str) -> Result<Vec<StudyMatch>, ArchiveError> {
			if self.unreachable {
				return Err(Self::unavailable());
			}
			Ok(self.studies.clone())
		}

		async fn find_series(&self, _study_uid: &str) -> Result<Vec<SeriesMatch>, ArchiveError> {
			if self.unreachable {
				return Err(Self::unavailable());
			}
			Ok(self.series.clone())
		}

		async fn find_instances(
			&self,
			_study_uid: &str,
			series_uid: &str,
		) -> Result<Vec<InstanceMatch>, ArchiveError> {
			Ok(self.instances.get(series_uid).cloned().unwrap_or_default())
		}

		async fn retrieve(&self, request: RetrieveRequest) -> Result<RetrievalOutcome, ArchiveError> {
			let uid = match &request.target {
				MoveTarget::Series { series_uid, .. } => series_uid.clone(),
				MoveTarget::Instance {
					sop_instance_uid, ..
				} => sop_instance_uid.clone(),
			};
			// stands in for the store SCP writing into the route
			std::fs::write(request.output_dir.join(format!("{uid}.dcm")), b"").unwrap();
			self.requests.lock().unwrap().push(request);

			Ok(self.outcomes.get(&uid).copied().unwrap_or(RetrievalOutcome {
				completed: 1,
				..RetrievalOutcome::default()
			}))
		}
	}

	fn structure(structure_id: &str, structure_set_uid: &str) -> MatchedStructure {
		MatchedStructure {
			structure_id: structure_id.to_owned(),
			structure_set_id: String::from("UNET"),
			structure_set_uid: structure_set_uid.to_owned(),
		}
	}

	fn record() -> PatientPhaseRecord {
		let mut record =
			PatientPhaseRecord::new(String::from("0000001"), String::from("C1"), String::from("1.2.3"));
		let reference = record.phase_mut(Phase::Reference);
		reference.series_id = Some(String::from("CT_0_1"));
		reference.series_uid = Some(String::from("1.2.3.10"));
		reference.referenced_series_uid = Some(String::from("1.2.3.10"));
		reference.structures = vec![
			structure("UNET1_0", "1.2.3.99"),
			structure("UNET2_0", "1.2.3.99"),
		];
		let breathing = record.phase_mut(Phase::Breathing);
		breathing.series_id = Some(String::from("CT_50_1"));
		breathing.series_uid = Some(String::from("1.2.3.50"));
		record
	}

	fn orchestrator(
		archive: InMemoryArchive,
		root: &Path,
		structures: StructureExportPolicy,
	) -> RetrievalOrchestrator<InMemoryArchive> {
		RetrievalOrchestrator::new(archive, root, String::from("CT-COLLECTOR"), structures)
	}

	#[tokio::test]
	async fn exports_phases_and_structure_set_into_phase_directories() {
		let root = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(
			InMemoryArchive::with_planning_study(),
			root.path(),
			StructureExportPolicy::First,
		);

		let report = orchestrator.export(&record()).await.unwrap();
		assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
		assert_eq!(report.retrievals.len(), 3);
		assert_eq!(report.completed(), 3);

		let patient_dir = root.path().join("0000001_C1");
		assert!(patient_dir.join("CT_0").join("1.2.3.10.dcm").exists());
		assert!(patient_dir.join("CT_0").join("1.2.3.99.dcm").exists());
		assert!(patient_dir.join("CT_50").join("1.2.3.50.dcm").exists());

		let requests = orchestrator.archive().requests();
		let message_ids: Vec<_> = requests.iter().map(|request| request.message_id).collect();
		assert_eq!(message_ids, [1, 2, 3]);
		assert!(requests
			.iter()
			.all(|request| request.destination == "CT-COLLECTOR"));
		assert_eq!(
			requests[1].target,
			MoveTarget::Instance {
				study_uid: String::from("1.2.3"),
				series_uid: String::from("1.2.3.90"),
				sop_instance_uid: String::from("1.2.3.99"),
			}
		);

		let manifest = std::fs::read_to_string(patient_dir.join(MANIFEST_FILE_NAME)).unwrap();
		assert_eq!(manifest, "UNET1_0\nUNET2_0\n");
	}

	#[tokio::test]
	async fn failed_sub_operations_are_diagnosed_and_export_continues() {
		let root = tempfile::tempdir().unwrap();
		let mut archive = InMemoryArchive::with_planning_study();
		archive.outcomes.insert(
			String::from("1.2.3.10"),
			RetrievalOutcome {
				status: 0xB000,
				completed: 8,
				failed: 2,
				..RetrievalOutcome::default()
			},
		);
		let orchestrator = orchestrator(archive, root.path(), StructureExportPolicy::First);

		let report = orchestrator.export(&record()).await.unwrap();
		assert_eq!(report.diagnostics.len(), 1);
		assert!(matches!(
			report.diagnostics[0],
			ExportDiagnostic::Incomplete {
				phase: Phase::Reference,
				..
			}
		));
		assert_eq!(report.retrievals.len(), 3);
		assert_eq!(report.failed(), 2);
		assert!(root
			.path()
			.join("0000001_C1/CT_50/1.2.3.50.dcm")
			.exists());
	}

	#[tokio::test]
	async fn warning_only_retrieval_is_not_diagnosed() {
		let root = tempfile::tempdir().unwrap();
		let mut archive = InMemoryArchive::with_planning_study();
		archive.outcomes.insert(
			String::from("1.2.3.10"),
			RetrievalOutcome {
				status: 0xB000,
				completed: 10,
				warning: 3,
				..RetrievalOutcome::default()
			},
		);
		let orchestrator = orchestrator(archive, root.path(), StructureExportPolicy::First);

		let report = orchestrator.export(&record()).await.unwrap();
		assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
		assert_eq!(report.retrievals.len(), 3);
		assert_eq!(report.failed(), 0);
	}

	#[tokio::test]
	async fn missing_phase_is_skipped_and_empty_manifest_written() {
		let root = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(
			InMemoryArchive::with_planning_study(),
			root.path(),
			StructureExportPolicy::First,
		);
		let mut record = record();
		*record.phase_mut(Phase::Reference) = PhaseRecord::default();

		let report = orchestrator.export(&record).await.unwrap();
		assert!(matches!(
			report.diagnostics.as_slice(),
			[ExportDiagnostic::PhaseNotResolved {
				phase: Phase::Reference
			}]
		));
		assert_eq!(report.retrievals.len(), 1);
		assert!(!root.path().join("0000001_C1/CT_0").exists());

		let manifest = std::fs::read_to_string(root.path().join("0000001_C1/GTV.txt")).unwrap();
		assert!(manifest.is_empty());
	}

	#[tokio::test]
	async fn query_failure_skips_phase_but_writes_manifest() {
		let root = tempfile::tempdir().unwrap();
		let archive = InMemoryArchive {
			unreachable: true,
			..InMemoryArchive::with_planning_study()
		};
		let orchestrator = orchestrator(archive, root.path(), StructureExportPolicy::First);

		let report = orchestrator.export(&record()).await.unwrap();
		assert!(report.retrievals.is_empty());
		assert_eq!(report.diagnostics.len(), 2);
		assert!(report
			.diagnostics
			.iter()
			.all(|diagnostic| matches!(diagnostic, ExportDiagnostic::Query { .. })));

		let manifest = std::fs::read_to_string(root.path().join("0000001_C1/GTV.txt")).unwrap();
		assert_eq!(manifest, "UNET1_0\nUNET2_0\n");
	}

	#[tokio::test]
	async fn unknown_series_and_structure_set_are_diagnosed() {
		let root = tempfile::tempdir().unwrap();
		let mut archive = InMemoryArchive::with_planning_study();
		archive.series.retain(|series| series.series_uid != "1.2.3.50");
		archive.instances.remove("1.2.3.90");
		let orchestrator = orchestrator(archive, root.path(), StructureExportPolicy::First);

		let report = orchestrator.export(&record()).await.unwrap();
		assert_eq!(report.retrievals.len(), 1);
		assert!(report.diagnostics.iter().any(|diagnostic| matches!(
			diagnostic,
			ExportDiagnostic::StructureSetNotFound { phase: Phase::Reference, structure_set_uid }
				if structure_set_uid == "1.2.3.99"
		)));
		assert!(report.diagnostics.iter().any(|diagnostic| matches!(
			diagnostic,
			ExportDiagnostic::SeriesNotFound { phase: Phase::Breathing, .. }
		)));
	}

	#[tokio::test]
	async fn missing_study_is_diagnosed() {
		let root = tempfile::tempdir().unwrap();
		let archive = InMemoryArchive {
			studies: Vec::new(),
			..InMemoryArchive::with_planning_study()
		};
		let orchestrator = orchestrator(archive, root.path(), StructureExportPolicy::First);

		let report = orchestrator.export(&record()).await.unwrap();
		assert!(report.retrievals.is_empty());
		assert!(report
			.diagnostics
			.iter()
			.all(|diagnostic| matches!(diagnostic, ExportDiagnostic::StudyNotFound { .. })));
	}

	#[tokio::test]
	async fn all_policy_exports_every_structure_set() {
		let root = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(
			InMemoryArchive::with_planning_study(),
			root.path(),
			StructureExportPolicy::All,
		);
		let mut record = record();
		record
			.phase_mut(Phase::Reference)
			.structures
			.push(structure("UNET3_0", "1.2.3.81"));

		let report = orchestrator.export(&record).await.unwrap();
		assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
		assert_eq!(report.retrievals.len(), 4);
		assert!(root.path().join("0000001_C1/CT_0/1.2.3.81.dcm").exists());
	}

	#[tokio::test]
	async fn batch_summary_adds_up_reports() {
		let root = tempfile::tempdir().unwrap();
		let orchestrator = orchestrator(
			InMemoryArchive::with_planning_study(),
			root.path(),
			StructureExportPolicy::First,
		);

		let mut summary = BatchSummary::default();
		summary.add(&orchestrator.export(&record()).await);
		summary.add(&Err(ExportError::Manifest {
			path: root.path().join(MANIFEST_FILE_NAME),
			source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
		}));

		assert_eq!(
			summary,
			BatchSummary {
				patients: 2,
				aborted: 1,
				retrievals: 3,
				completed: 3,
				failed: 0,
				diagnostics: 0,
			}
		);
	}

	#[test]
	fn structure_export_policy_selects_distinct_uids() {
		let mut record = record().phase(Phase::Reference).clone();
		record.structures.push(structure("UNET3_0", "1.2.3.81"));

		assert_eq!(StructureExportPolicy::First.select(&record), ["1.2.3.99"]);
		assert_eq!(
			StructureExportPolicy::All.select(&record),
			["1.2.3.99", "1.2.3.81"]
		);
		assert!(StructureExportPolicy::All
			.select(&PhaseRecord::default())
			.is_empty());
	}
}
