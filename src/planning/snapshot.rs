use super::{PatientSnapshot, PlanningError, PlanningSystem};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Planning system backed by a directory of JSON exports named `<patientId>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotDirectory {
	root: PathBuf,
}

impl SnapshotDirectory {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

impl PlanningSystem for SnapshotDirectory {
	fn open_patient(&self, patient_id: &str) -> Result<Option<PatientSnapshot>, PlanningError> {
		let path = self.root.join(format!("{patient_id}.json"));
		let content = match std::fs::read(&path) {
			Ok(content) => content,
			Err(err) if err.kind() == ErrorKind::NotFound => {
				debug!(path = %path.display(), "No export for patient");
				return Ok(None);
			}
			Err(err) => return Err(err.into()),
		};

		Ok(Some(serde_json::from_slice(&content)?))
	}
}
