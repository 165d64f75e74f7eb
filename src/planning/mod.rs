//! The planning-system side of a case: patients, courses, plans, the planning study with
//! its series, and the patient's structure sets.
//!
//! The data is read from per-patient exports of the treatment planning system, see
//! [`snapshot::SnapshotDirectory`].

pub mod snapshot;

use crate::types::UI;
use crate::worklist::WorklistEntry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query interface of a treatment planning system.
pub trait PlanningSystem {
	/// Opens a patient by id. `Ok(None)` if the planning system does not know the patient.
	fn open_patient(&self, patient_id: &str) -> Result<Option<PatientSnapshot>, PlanningError>;
}

#[derive(Debug, Error)]
pub enum PlanningError {
	#[error("No {kind} with id '{id}'")]
	NotFound { kind: &'static str, id: String },
	#[error("{count} {kind}s share the id '{id}'")]
	Ambiguous {
		kind: &'static str,
		id: String,
		count: usize,
	},
	#[error("Images of series '{series_id}' cannot be enumerated")]
	ImagesUnavailable { series_id: String },
	#[error("Failed to read patient export: {0}")]
	Io(#[from] std::io::Error),
	#[error("Malformed patient export: {0}")]
	Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSnapshot {
	pub id: String,
	#[serde(default)]
	pub courses: Vec<CourseSnapshot>,
	#[serde(default)]
	pub studies: Vec<StudySnapshot>,
	#[serde(default)]
	pub structure_sets: Vec<StructureSetSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSnapshot {
	pub id: String,
	#[serde(default)]
	pub plans: Vec<PlanSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSnapshot {
	pub id: String,
	/// The study of the plan's planning image.
	pub study_uid: UI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySnapshot {
	pub uid: UI,
	#[serde(default)]
	pub series: Vec<SeriesSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSnapshot {
	pub id: String,
	pub uid: UI,
	/// `None` if the planning system failed to list the images of this series.
	#[serde(default)]
	pub images: Option<Vec<ImageSnapshot>>,
}

impl SeriesSnapshot {
	pub fn images(&self) -> Result<&[ImageSnapshot], PlanningError> {
		self.images
			.as_deref()
			.ok_or_else(|| PlanningError::ImagesUnavailable {
				series_id: self.id.clone(),
			})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSnapshot {
	pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSetSnapshot {
	pub id: String,
	pub uid: UI,
	/// UID of the series the structure set's image belongs to.
	#[serde(default)]
	pub referenced_series_uid: Option<UI>,
	#[serde(default)]
	pub structures: Vec<StructureSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureSnapshot {
	pub id: String,
}

fn single<'a, T>(
	items: impl IntoIterator<Item = &'a T>,
	matches: impl Fn(&T) -> bool,
	kind: &'static str,
	id: &str,
) -> Result<&'a T, PlanningError> {
	let found: Vec<&T> = items.into_iter().filter(|item| matches(item)).collect();
	match found.as_slice() {
		[] => Err(PlanningError::NotFound {
			kind,
			id: id.to_owned(),
		}),
		[item] => Ok(*item),
		_ => Err(PlanningError::Ambiguous {
			kind,
			id: id.to_owned(),
			count: found.len(),
		}),
	}
}

impl PatientSnapshot {
	/// Returns the course with exactly this id.
	pub fn course(&self, id: &str) -> Result<&CourseSnapshot, PlanningError> {
		single(&self.courses, |course: &CourseSnapshot| course.id == id, "course", id)
	}

	pub fn study(&self, uid: &str) -> Result<&StudySnapshot, PlanningError> {
		single(&self.studies, |study: &StudySnapshot| study.uid == uid, "study", uid)
	}
}

impl CourseSnapshot {
	/// Returns the plan with exactly this id.
	pub fn plan(&self, id: &str) -> Result<&PlanSnapshot, PlanningError> {
		single(&self.plans, |plan: &PlanSnapshot| plan.id == id, "plan", id)
	}
}

/// A patient opened for one worklist row, with course and plan already selected.
#[derive(Debug, Clone)]
pub struct PlanCase {
	pub patient: PatientSnapshot,
	pub course_id: String,
	pub study_uid: UI,
}

impl PlanCase {
	/// All series of the plan's study.
	pub fn series(&self) -> &[SeriesSnapshot] {
		self.patient
			.study(&self.study_uid)
			.map(|study| study.series.as_slice())
			.unwrap_or_default()
	}

	/// All structure sets of the patient, not only those of the plan.
	pub fn structure_sets(&self) -> &[StructureSetSnapshot] {
		&self.patient.structure_sets
	}
}

/// Opens the patient of a worklist entry and selects its course and plan.
/// Returns `Ok(None)` if the patient is unknown to the planning system.
pub fn open_case(
	system: &impl PlanningSystem,
	entry: &WorklistEntry,
) -> Result<Option<PlanCase>, PlanningError> {
	let Some(patient) = system.open_patient(&entry.patient_id)? else {
		return Ok(None);
	};

	let course = patient.course(&entry.course_id)?;
	let plan = course.plan(&entry.plan_id)?;
	let study_uid = patient.study(&plan.study_uid)?.uid.clone();
	let course_id = course.id.clone();

	Ok(Some(PlanCase {
		patient,
		course_id,
		study_uid,
	}))
}
