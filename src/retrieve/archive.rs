//! The remote archive as seen by the retrieval: verification, queries down to instance level
//! and retrieval of series or single instances into a directory.

use crate::backend::dimse::association::manager::{AssociationManager, PresentationParameter};
use crate::backend::dimse::association::AssociationError;
use crate::backend::dimse::cecho::EchoError;
use crate::backend::dimse::cfind::findscu::{
	FindError, FindServiceClassUser, FindServiceClassUserOptions,
};
use crate::backend::dimse::cmove::movescu::{MoveError, MoveServiceClassUser};
use crate::backend::dimse::cmove::{
	CompositeMoveRequest, MoveMediator, MoveTarget, RetrievalOutcome,
};
use crate::backend::dimse::{read_str, EchoServiceClassUser, MessageIdSequence};
use crate::types::{Priority, QueryRetrieveLevel, AE, UI, US};
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::InMemDicomObject;
use futures::TryStreamExt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyMatch {
	pub study_uid: UI,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMatch {
	pub series_uid: UI,
	pub modality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMatch {
	pub sop_instance_uid: UI,
	pub sop_class_uid: Option<UI>,
}

/// A C-MOVE toward `destination`, with the pushed instances written to `output_dir`.
#[derive(Debug, Clone)]
pub struct RetrieveRequest {
	pub target: MoveTarget,
	pub destination: AE,
	pub message_id: US,
	pub output_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("Association failed: {0}")]
	Association(#[from] AssociationError),
	#[error("Verification failed: {0}")]
	Echo(#[from] EchoError),
	#[error("Query failed: {0}")]
	Find(#[from] FindError),
	#[error("Retrieval failed: {0}")]
	Move(#[from] MoveError),
}

pub trait ArchiveClient {
	/// Whether the archive answers a C-ECHO with success.
	async fn verify(&self) -> Result<bool, ArchiveError>;

	async fn find_studies(&self, patient_id: &str) -> Result<Vec<StudyMatch>, ArchiveError>;

	async fn find_series(&self, study_uid: &str) -> Result<Vec<SeriesMatch>, ArchiveError>;

	async fn find_instances(
		&self,
		study_uid: &str,
		series_uid: &str,
	) -> Result<Vec<InstanceMatch>, ArchiveError>;

	/// Moves the target and returns once the archive reported the final counts.
	async fn retrieve(&self, request: RetrieveRequest) -> Result<RetrievalOutcome, ArchiveError>;
}

fn query(level: QueryRetrieveLevel, keys: &[(dicom::core::Tag, VR, &str)]) -> InMemDicomObject {
	let mut identifier = InMemDicomObject::from_element_iter([DataElement::new(
		tags::QUERY_RETRIEVE_LEVEL,
		VR::CS,
		PrimitiveValue::from(level),
	)]);
	for (tag, vr, value) in keys {
		if value.is_empty() {
			identifier.put(DataElement::new(*tag, *vr, PrimitiveValue::Empty));
		} else {
			identifier.put_str(*tag, *vr, *value);
		}
	}
	identifier
}

/// Studies of a patient.
pub fn study_query(patient_id: &str) -> InMemDicomObject {
	query(
		QueryRetrieveLevel::Study,
		&[
			(tags::PATIENT_ID, VR::LO, patient_id),
			(tags::STUDY_INSTANCE_UID, VR::UI, ""),
		],
	)
}

/// Series of a study with their modality.
pub fn series_query(study_uid: &str) -> InMemDicomObject {
	query(
		QueryRetrieveLevel::Series,
		&[
			(tags::STUDY_INSTANCE_UID, VR::UI, study_uid),
			(tags::SERIES_INSTANCE_UID, VR::UI, ""),
			(tags::MODALITY, VR::CS, ""),
		],
	)
}

/// Instances of a series.
pub fn instance_query(study_uid: &str, series_uid: &str) -> InMemDicomObject {
	query(
		QueryRetrieveLevel::Image,
		&[
			(tags::STUDY_INSTANCE_UID, VR::UI, study_uid),
			(tags::SERIES_INSTANCE_UID, VR::UI, series_uid),
			(tags::SOP_INSTANCE_UID, VR::UI, ""),
			(tags::SOP_CLASS_UID, VR::UI, ""),
		],
	)
}

/// Reads the unique key of a query match. Matches without it are skipped.
fn unique_key(identifier: &InMemDicomObject, tag: dicom::core::Tag) -> Option<UI> {
	let value = read_str(identifier, tag);
	if value.is_none() {
		warn!("Skipping query match without {tag}");
	}
	value
}

/// Talks to the archive over DIMSE. Every operation uses an association of its own.
pub struct DimseArchive {
	manager: AssociationManager,
	find_scu: FindServiceClassUser,
	move_scu: MoveServiceClassUser,
	message_ids: MessageIdSequence,
	priority: Priority,
	timeout: Duration,
}

impl DimseArchive {
	pub fn new(
		manager: AssociationManager,
		mediator: MoveMediator,
		priority: Priority,
		timeout: Duration,
	) -> Self {
		Self {
			find_scu: FindServiceClassUser::new(manager.clone(), timeout),
			move_scu: MoveServiceClassUser::new(manager.clone(), mediator, timeout),
			manager,
			message_ids: MessageIdSequence::default(),
			priority,
			timeout,
		}
	}

	async fn find(&self, identifier: InMemDicomObject) -> Result<Vec<InMemDicomObject>, ArchiveError> {
		let options = FindServiceClassUserOptions {
			identifier,
			message_id: self.message_ids.next(),
			priority: self.priority,
		};
		let matches: Vec<InMemDicomObject> = self.find_scu.invoke(options).try_collect().await?;
		Ok(matches)
	}
}

impl ArchiveClient for DimseArchive {
	#[instrument(skip_all, name = "ECHO")]
	async fn verify(&self) -> Result<bool, ArchiveError> {
		let association = self
			.manager
			.create(PresentationParameter::implicit(uids::VERIFICATION))
			.await?;
		let reachable = EchoServiceClassUser::new(&association)
			.echo(self.message_ids.next(), self.timeout)
			.await?;
		Ok(reachable)
	}

	#[instrument(skip(self))]
	async fn find_studies(&self, patient_id: &str) -> Result<Vec<StudyMatch>, ArchiveError> {
		let matches = self.find(study_query(patient_id)).await?;
		Ok(matches
			.iter()
			.filter_map(|identifier| unique_key(identifier, tags::STUDY_INSTANCE_UID))
			.map(|study_uid| StudyMatch { study_uid })
			.collect())
	}

	#[instrument(skip(self))]
	async fn find_series(&self, study_uid: &str) -> Result<Vec<SeriesMatch>, ArchiveError> {
		let matches = self.find(series_query(study_uid)).await?;
		Ok(matches
			.iter()
			.filter_map(|identifier| {
				Some(SeriesMatch {
					series_uid: unique_key(identifier, tags::SERIES_INSTANCE_UID)?,
					modality: read_str(identifier, tags::MODALITY),
				})
			})
			.collect())
	}

	#[instrument(skip(self))]
	async fn find_instances(
		&self,
		study_uid: &str,
		series_uid: &str,
	) -> Result<Vec<InstanceMatch>, ArchiveError> {
		let matches = self.find(instance_query(study_uid, series_uid)).await?;
		Ok(matches
			.iter()
			.filter_map(|identifier| {
				Some(InstanceMatch {
					sop_instance_uid: unique_key(identifier, tags::SOP_INSTANCE_UID)?,
					sop_class_uid: read_str(identifier, tags::SOP_CLASS_UID),
				})
			})
			.collect())
	}

	#[instrument(skip_all, fields(message_id = request.message_id, level = %request.target.level()))]
	async fn retrieve(&self, request: RetrieveRequest) -> Result<RetrievalOutcome, ArchiveError> {
		let move_request = CompositeMoveRequest::new(request.message_id, request.destination)
			.priority(self.priority)
			.identifier(request.target.identifier());
		let outcome = self
			.move_scu
			.invoke(move_request, &request.output_dir)
			.await?;
		Ok(outcome)
	}
}
