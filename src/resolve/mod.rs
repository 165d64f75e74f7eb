//! Locates the `CT_0` and `CT_50` series of a patient and the structure sets contoured on them.

pub mod matcher;

use crate::planning::{PlanCase, SeriesSnapshot, StructureSetSnapshot};
use crate::types::{Phase, UI};
use matcher::{classify_series, classify_structure};
use serde::Deserialize;
use std::fmt::Write;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Decides which series keeps a phase when several different series match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
	/// The first matching series is kept.
	#[default]
	First,
	/// Every further match replaces the previous one.
	Last,
}

/// A structure whose label and referenced series match a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedStructure {
	pub structure_id: String,
	pub structure_set_id: String,
	pub structure_set_uid: UI,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseRecord {
	pub series_id: Option<String>,
	/// `None` if the phase was not found for the patient.
	pub series_uid: Option<UI>,
	/// The series referenced by the matched structure sets.
	pub referenced_series_uid: Option<UI>,
	/// Matched structures in discovery order.
	pub structures: Vec<MatchedStructure>,
}

impl PhaseRecord {
	pub fn is_found(&self) -> bool {
		self.series_uid.as_deref().is_some_and(|uid| !uid.trim().is_empty())
	}

	pub fn structure_ids(&self) -> impl Iterator<Item = &str> {
		self.structures.iter().map(|s| s.structure_id.as_str())
	}

	pub fn structure_set_uids(&self) -> impl Iterator<Item = &str> {
		self.structures.iter().map(|s| s.structure_set_uid.as_str())
	}
}

/// Non-fatal findings of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveDiagnostic {
	#[error("Several series match {phase}: kept {kept}, other {other}")]
	DuplicatePhaseSeries { phase: Phase, kept: UI, other: UI },
	#[error("Images of series '{series_id}' cannot be enumerated")]
	ImagesUnavailable { series_id: String },
	#[error("Only {found} was found, {missing} is missing. Structures are not matched")]
	MissingPhase { found: Phase, missing: Phase },
	#[error("Neither CT_0 nor CT_50 was found")]
	NoPhases,
}

/// The resolved phases of one patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientPhaseRecord {
	pub patient_id: String,
	pub course_id: String,
	pub study_uid: UI,
	phases: [PhaseRecord; 2],
	pub diagnostics: Vec<ResolveDiagnostic>,
}

impl PatientPhaseRecord {
	pub fn new(patient_id: String, course_id: String, study_uid: UI) -> Self {
		Self {
			patient_id,
			course_id,
			study_uid,
			phases: Default::default(),
			diagnostics: Vec::new(),
		}
	}

	pub const fn phase(&self, phase: Phase) -> &PhaseRecord {
		&self.phases[phase as usize]
	}

	pub fn phase_mut(&mut self, phase: Phase) -> &mut PhaseRecord {
		&mut self.phases[phase as usize]
	}

	/// All matched structure ids, `CT_0` first.
	pub fn structure_ids(&self) -> impl Iterator<Item = &str> {
		self.phases.iter().flat_map(PhaseRecord::structure_ids)
	}

	/// Multi-line description of the record for the resolution report.
	pub fn describe(&self) -> String {
		let mut out = String::new();
		let _ = writeln!(
			out,
			"Patient {} (course {}, study {})",
			self.patient_id, self.course_id, self.study_uid
		);
		for phase in Phase::ALL {
			let record = self.phase(phase);
			let _ = writeln!(
				out,
				"  {phase}: series {} ({}), ref {}",
				record.series_id.as_deref().unwrap_or("-"),
				record.series_uid.as_deref().unwrap_or("-"),
				record.referenced_series_uid.as_deref().unwrap_or("-"),
			);
			if record.structures.is_empty() {
				let _ = writeln!(out, "    UNET structures: none");
			}
			for structure in &record.structures {
				let _ = writeln!(
					out,
					"    {} in {} ({})",
					structure.structure_id,
					structure.structure_set_id,
					structure.structure_set_uid
				);
			}
		}
		out
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
	duplicates: DuplicatePolicy,
}

impl Resolver {
	pub const fn new(duplicates: DuplicatePolicy) -> Self {
		Self { duplicates }
	}

	/// Resolves the phases of an opened planning case.
	pub fn resolve_case(&self, case: &PlanCase) -> PatientPhaseRecord {
		self.resolve(
			PatientPhaseRecord::new(
				case.patient.id.clone(),
				case.course_id.clone(),
				case.study_uid.clone(),
			),
			case.series(),
			case.structure_sets(),
		)
	}

	/// Fills `record` from the patient's series and structure sets.
	/// Never fails: missing or unreadable data leaves the affected phase empty.
	pub fn resolve(
		&self,
		mut record: PatientPhaseRecord,
		series: &[SeriesSnapshot],
		structure_sets: &[StructureSetSnapshot],
	) -> PatientPhaseRecord {
		let mut bound: [Option<&SeriesSnapshot>; 2] = [None, None];

		for candidate in series {
			let images = match candidate.images() {
				Ok(images) => images,
				Err(err) => {
					debug!(patient_id = record.patient_id, "Skipping series: {err}");
					record.diagnostics.push(ResolveDiagnostic::ImagesUnavailable {
						series_id: candidate.id.clone(),
					});
					continue;
				}
			};

			for image in images {
				let Some(phase) = classify_series(&image.id) else {
					continue;
				};
				let slot = &mut bound[phase as usize];
				match *slot {
					None => *slot = Some(candidate),
					Some(current) if current.uid == candidate.uid => {}
					Some(current) => {
						let diagnostic = match self.duplicates {
							DuplicatePolicy::First => ResolveDiagnostic::DuplicatePhaseSeries {
								phase,
								kept: current.uid.clone(),
								other: candidate.uid.clone(),
							},
							DuplicatePolicy::Last => {
								let other = current.uid.clone();
								*slot = Some(candidate);
								ResolveDiagnostic::DuplicatePhaseSeries {
									phase,
									kept: candidate.uid.clone(),
									other,
								}
							}
						};
						warn!(patient_id = record.patient_id, "{diagnostic}");
						record.diagnostics.push(diagnostic);
					}
				}
			}
		}

		for phase in Phase::ALL {
			if let Some(series) = bound[phase as usize] {
				let slot = record.phase_mut(phase);
				slot.series_id = Some(series.id.clone());
				slot.series_uid = Some(series.uid.clone());
			}
		}

		match bound {
			[Some(_), Some(_)] => Self::match_structures(&mut record, structure_sets),
			[Some(_), None] | [None, Some(_)] => {
				let (found, missing) = if bound[Phase::Reference as usize].is_some() {
					(Phase::Reference, Phase::Breathing)
				} else {
					(Phase::Breathing, Phase::Reference)
				};
				let diagnostic = ResolveDiagnostic::MissingPhase { found, missing };
				warn!(patient_id = record.patient_id, "{diagnostic}");
				record.diagnostics.push(diagnostic);
			}
			[None, None] => {
				info!(patient_id = record.patient_id, "{}", ResolveDiagnostic::NoPhases);
				record.diagnostics.push(ResolveDiagnostic::NoPhases);
			}
		}

		record
	}

	fn match_structures(record: &mut PatientPhaseRecord, structure_sets: &[StructureSetSnapshot]) {
		for set in structure_sets {
			let Some(referenced) = set.referenced_series_uid.as_deref() else {
				continue;
			};

			for structure in &set.structures {
				let Some(phase) = classify_structure(&structure.id) else {
					continue;
				};
				let slot = record.phase_mut(phase);
				if slot.series_uid.as_deref() != Some(referenced) {
					continue;
				}

				slot.structures.push(MatchedStructure {
					structure_id: structure.id.clone(),
					structure_set_id: set.id.clone(),
					structure_set_uid: set.uid.clone(),
				});
				slot.referenced_series_uid = Some(referenced.to_owned());
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::planning::fixtures::{series, structure_set};

	fn record() -> PatientPhaseRecord {
		PatientPhaseRecord::new(
			String::from("0000001"),
			String::from("C1"),
			String::from("1.2.3"),
		)
	}

	fn structure_set_ids(phase: &PhaseRecord) -> Vec<&str> {
		phase
			.structures
			.iter()
			.map(|structure| structure.structure_set_id.as_str())
			.collect()
	}

	fn assert_aligned(record: &PatientPhaseRecord) {
		for phase in Phase::ALL {
			let phase = record.phase(phase);
			let ids = phase.structure_ids().count();
			assert_eq!(ids, phase.structure_set_uids().count());
		}
	}

	#[test]
	fn resolves_both_phases_and_their_structures() {
		let series = [
			series("CT_0", "1.10", &["CT_0_1"]),
			series("CT_50", "1.50", &["CT_50_1"]),
		];
		let sets = [structure_set("AUTO", "1.99", Some("1.10"), &["UNET1_0", "UNET2_0"])];

		let record = Resolver::default().resolve(record(), &series, &sets);

		let reference = record.phase(Phase::Reference);
		assert_eq!(reference.series_uid.as_deref(), Some("1.10"));
		assert_eq!(reference.series_id.as_deref(), Some("CT_0"));
		assert_eq!(reference.referenced_series_uid.as_deref(), Some("1.10"));
		assert_eq!(reference.structure_ids().collect::<Vec<_>>(), ["UNET1_0", "UNET2_0"]);
		assert_eq!(structure_set_ids(reference), ["AUTO", "AUTO"]);
		assert_eq!(reference.structure_set_uids().collect::<Vec<_>>(), ["1.99", "1.99"]);

		let breathing = record.phase(Phase::Breathing);
		assert_eq!(breathing.series_uid.as_deref(), Some("1.50"));
		assert!(breathing.structures.is_empty());
		assert!(breathing.referenced_series_uid.is_none());

		assert!(record.diagnostics.is_empty());
		assert_aligned(&record);
	}

	#[test]
	fn structures_require_matching_referenced_series() {
		let series = [
			series("CT_0", "1.10", &["CT_0"]),
			series("CT_50", "1.50", &["CT_50"]),
		];
		let sets = [
			// contoured on CT_50, but labelled for CT_0
			structure_set("A", "1.90", Some("1.50"), &["UNET1_0", "UNET1_50"]),
			structure_set("B", "1.91", None, &["UNET2_0"]),
			structure_set("C", "1.92", Some("1.10"), &["UNET3_0", "UNET3_0x", "GTV"]),
		];

		let record = Resolver::default().resolve(record(), &series, &sets);

		let reference = record.phase(Phase::Reference);
		assert_eq!(reference.structure_ids().collect::<Vec<_>>(), ["UNET3_0"]);
		assert_eq!(reference.structure_set_uids().collect::<Vec<_>>(), ["1.92"]);

		let breathing = record.phase(Phase::Breathing);
		assert_eq!(breathing.structure_ids().collect::<Vec<_>>(), ["UNET1_50"]);
		assert_eq!(structure_set_ids(breathing), ["A"]);
		assert_eq!(breathing.referenced_series_uid.as_deref(), Some("1.50"));
		assert_aligned(&record);
	}

	#[test]
	fn single_phase_skips_structure_matching() {
		let series = [series("CT_0", "1.10", &["CT0_1"])];
		let sets = [structure_set("A", "1.90", Some("1.10"), &["UNET1_0"])];

		let record = Resolver::default().resolve(record(), &series, &sets);

		assert_eq!(record.phase(Phase::Reference).series_uid.as_deref(), Some("1.10"));
		assert!(record.phase(Phase::Reference).structures.is_empty());
		assert!(!record.phase(Phase::Breathing).is_found());
		assert_eq!(
			record.diagnostics,
			[ResolveDiagnostic::MissingPhase {
				found: Phase::Reference,
				missing: Phase::Breathing
			}]
		);
	}

	#[test]
	fn empty_input_yields_empty_slots() {
		let record = Resolver::default().resolve(record(), &[], &[]);
		for phase in Phase::ALL {
			assert_eq!(record.phase(phase), &PhaseRecord::default());
		}
		assert_eq!(record.diagnostics, [ResolveDiagnostic::NoPhases]);
		assert_eq!(record.structure_ids().count(), 0);
	}

	#[test]
	fn unreadable_series_are_skipped() {
		let mut broken = series("RTSTRUCT", "1.5", &[]);
		broken.images = None;
		let series = [
			broken,
			series("CT_0", "1.10", &["CT_0"]),
			series("CT_50", "1.50", &["CT_50"]),
		];

		let record = Resolver::default().resolve(record(), &series, &[]);

		assert!(record.phase(Phase::Reference).is_found());
		assert!(record.phase(Phase::Breathing).is_found());
		assert_eq!(
			record.diagnostics,
			[ResolveDiagnostic::ImagesUnavailable {
				series_id: String::from("RTSTRUCT")
			}]
		);
	}

	#[test]
	fn only_unreadable_series_yields_empty_slots() {
		let mut broken = series("X", "1.5", &[]);
		broken.images = None;
		let record = Resolver::default().resolve(record(), &[broken], &[]);
		assert!(!record.phase(Phase::Reference).is_found());
		assert!(!record.phase(Phase::Breathing).is_found());
	}

	#[test]
	fn duplicate_policy_decides_binding() {
		let series = [
			series("CT_0 A", "1.10", &["CT_0_1"]),
			series("CT_0 B", "1.11", &["CT_0_2"]),
			series("CT_50", "1.50", &["CT_50_1", "CT_50_2"]),
		];

		let first = Resolver::new(DuplicatePolicy::First).resolve(record(), &series, &[]);
		assert_eq!(first.phase(Phase::Reference).series_uid.as_deref(), Some("1.10"));
		assert_eq!(
			first.diagnostics,
			[ResolveDiagnostic::DuplicatePhaseSeries {
				phase: Phase::Reference,
				kept: String::from("1.10"),
				other: String::from("1.11"),
			}]
		);

		let last = Resolver::new(DuplicatePolicy::Last).resolve(record(), &series, &[]);
		assert_eq!(last.phase(Phase::Reference).series_uid.as_deref(), Some("1.11"));
		assert_eq!(last.phase(Phase::Reference).series_id.as_deref(), Some("CT_0 B"));
		assert_eq!(
			last.diagnostics,
			[ResolveDiagnostic::DuplicatePhaseSeries {
				phase: Phase::Reference,
				kept: String::from("1.11"),
				other: String::from("1.10"),
			}]
		);
	}

	#[test]
	fn resolution_is_idempotent() {
		let series = [
			series("CT_0", "1.10", &["CT_0_1"]),
			series("CT_0 copy", "1.11", &["CT_0_2"]),
			series("CT_50", "1.50", &["CT_50_1"]),
		];
		let sets = [
			structure_set("A", "1.90", Some("1.10"), &["UNET1_0"]),
			structure_set("B", "1.91", Some("1.50"), &["UNET1_50", "UNET2_50"]),
		];
		let resolver = Resolver::default();

		let once = resolver.resolve(record(), &series, &sets);
		let twice = resolver.resolve(record(), &series, &sets);
		assert_eq!(once, twice);
		assert_eq!(
			once.structure_ids().collect::<Vec<_>>(),
			["UNET1_0", "UNET1_50", "UNET2_50"]
		);
	}

	#[test]
	fn repeated_structure_sets_keep_reference() {
		let series = [
			series("CT_0", "1.10", &["CT_0"]),
			series("CT_50", "1.50", &["CT_50"]),
		];
		let sets = [
			structure_set("A", "1.90", Some("1.10"), &["UNET1_0"]),
			structure_set("B", "1.91", Some("1.10"), &["UNET2_0"]),
		];

		let record = Resolver::default().resolve(record(), &series, &sets);
		let reference = record.phase(Phase::Reference);
		assert_eq!(reference.referenced_series_uid.as_deref(), Some("1.10"));
		assert_eq!(reference.structure_set_uids().collect::<Vec<_>>(), ["1.90", "1.91"]);
	}

	#[test]
	fn describe_lists_phases() {
		let series = [
			series("CT_0", "1.10", &["CT_0"]),
			series("CT_50", "1.50", &["CT_50"]),
		];
		let sets = [structure_set("A", "1.90", Some("1.10"), &["UNET1_0"])];
		let text = Resolver::default().resolve(record(), &series, &sets).describe();
		assert!(text.contains("CT_0: series CT_0 (1.10), ref 1.10"));
		assert!(text.contains("UNET1_0 in A (1.90)"));
		assert!(text.contains("CT_50: series CT_50 (1.50), ref -"));
	}
}
