use crate::backend::dimse::{DicomMessage, ReadError, StatusType, DATA_SET_EXISTS};
use crate::types::{Priority, QueryRetrieveLevel, AE, UI, US};
use dicom::core::{DataElement, VR};
use dicom::dicom_value;
use dicom::dictionary_std::{tags, uids};
use dicom::object::InMemDicomObject;

mod mediator;
pub mod movescu;
pub use mediator::*;

// Magic numbers defined by the DICOM specification.
pub const COMMAND_FIELD_COMPOSITE_MOVE_REQUEST: US = 0x0021;
pub const COMMAND_FIELD_COMPOSITE_MOVE_RESPONSE: US = 0x8021;

/// What a C-MOVE transfers: a whole series or one instance of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
	Series {
		study_uid: UI,
		series_uid: UI,
	},
	Instance {
		study_uid: UI,
		series_uid: UI,
		sop_instance_uid: UI,
	},
}

impl MoveTarget {
	pub const fn level(&self) -> QueryRetrieveLevel {
		match self {
			Self::Series { .. } => QueryRetrieveLevel::Series,
			Self::Instance { .. } => QueryRetrieveLevel::Image,
		}
	}

	/// The unique keys down to the retrieve level.
	pub fn identifier(&self) -> InMemDicomObject {
		let (study_uid, series_uid) = match self {
			Self::Series {
				study_uid,
				series_uid,
			}
			| Self::Instance {
				study_uid,
				series_uid,
				..
			} => (study_uid, series_uid),
		};

		let mut identifier = InMemDicomObject::from_element_iter([
			DataElement::new(tags::QUERY_RETRIEVE_LEVEL, VR::CS, dicom_value!(Str, self.level().to_string())),
			DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, dicom_value!(Str, study_uid.as_str())),
			DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, dicom_value!(Str, series_uid.as_str())),
		]);
		if let Self::Instance { sop_instance_uid, .. } = self {
			identifier.put_str(tags::SOP_INSTANCE_UID, VR::UI, sop_instance_uid.as_str());
		}
		identifier
	}
}

/// C-MOVE-RQ
pub struct CompositeMoveRequest {
	pub identifier: InMemDicomObject,
	pub message_id: US,
	pub priority: US,
	pub destination: AE,
}

impl CompositeMoveRequest {
	pub fn new(message_id: US, destination: AE) -> Self {
		Self {
			identifier: InMemDicomObject::new_empty(),
			priority: Priority::Medium as US,
			message_id,
			destination,
		}
	}

	pub fn identifier(mut self, identifier: InMemDicomObject) -> Self {
		self.identifier = identifier;
		self
	}

	pub fn priority(mut self, priority: Priority) -> Self {
		self.priority = priority as US;
		self
	}
}

impl From<CompositeMoveRequest> for DicomMessage {
	#[rustfmt::skip]
	fn from(request: CompositeMoveRequest) -> Self {
		let command = InMemDicomObject::command_from_element_iter([
			DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, dicom_value!(Str, uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE)),
			DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [COMMAND_FIELD_COMPOSITE_MOVE_REQUEST])),
			DataElement::new(tags::MESSAGE_ID, VR::US, dicom_value!(U16, [request.message_id])),
			DataElement::new(tags::PRIORITY, VR::US, dicom_value!(U16, [request.priority])),
			DataElement::new(tags::MOVE_DESTINATION, VR::AE, dicom_value!(Str, request.destination)),
			DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [DATA_SET_EXISTS])),
		]);

		Self {
			command,
			data: Some(request.identifier),
			presentation_context_id: None,
		}
	}
}

/// C-MOVE-RSP
/// <https://dicom.nema.org/medical/dicom/current/output/chtml/part07/chapter_9.html#table_9.3-4>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeMoveResponse {
	pub status: US,
	pub remaining: Option<US>,
	pub completed: Option<US>,
	pub failed: Option<US>,
	pub warning: Option<US>,
}

impl TryFrom<DicomMessage> for CompositeMoveResponse {
	type Error = ReadError;

	fn try_from(message: DicomMessage) -> Result<Self, Self::Error> {
		if message.command_int(tags::COMMAND_FIELD) != Some(COMMAND_FIELD_COMPOSITE_MOVE_RESPONSE) {
			return Err(ReadError::MissingAttribute(tags::COMMAND_FIELD));
		}

		Ok(Self {
			status: message.status()?,
			remaining: message.command_int(tags::NUMBER_OF_REMAINING_SUBOPERATIONS),
			completed: message.command_int(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS),
			failed: message.command_int(tags::NUMBER_OF_FAILED_SUBOPERATIONS),
			warning: message.command_int(tags::NUMBER_OF_WARNING_SUBOPERATIONS),
		})
	}
}

/// Sub-operation counts reported by the final C-MOVE-RSP.
/// Counts the archive omitted are reported as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrievalOutcome {
	pub status: US,
	pub completed: US,
	pub failed: US,
	pub warning: US,
	pub remaining: US,
}

impl RetrievalOutcome {
	/// Whether every sub-operation was carried out. Warnings do not count against it,
	/// a failure status does even when the archive omitted the counts.
	pub fn is_complete(&self) -> bool {
		let finished = matches!(
			StatusType::try_from(self.status),
			Ok(StatusType::Success | StatusType::Warning)
		);
		finished && self.failed == 0 && self.remaining == 0
	}
}

impl From<CompositeMoveResponse> for RetrievalOutcome {
	fn from(response: CompositeMoveResponse) -> Self {
		Self {
			status: response.status,
			completed: response.completed.unwrap_or_default(),
			failed: response.failed.unwrap_or_default(),
			warning: response.warning.unwrap_or_default(),
			remaining: response.remaining.unwrap_or_default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::dimse::{read_str, DATA_SET_MISSING};

	#[test]
	fn instance_identifier_contains_all_unique_keys() {
		let target = MoveTarget::Instance {
			study_uid: String::from("1.2.3"),
			series_uid: String::from("1.2.3.7"),
			sop_instance_uid: String::from("1.2.3.7.1"),
		};
		let identifier = target.identifier();

		assert_eq!(
			read_str(&identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(),
			Some("IMAGE")
		);
		assert_eq!(
			read_str(&identifier, tags::SERIES_INSTANCE_UID).as_deref(),
			Some("1.2.3.7")
		);
		assert_eq!(
			read_str(&identifier, tags::SOP_INSTANCE_UID).as_deref(),
			Some("1.2.3.7.1")
		);
	}

	#[test]
	fn series_identifier_has_no_instance_key() {
		let target = MoveTarget::Series {
			study_uid: String::from("1.2.3"),
			series_uid: String::from("1.2.3.10"),
		};
		let identifier = target.identifier();

		assert_eq!(
			read_str(&identifier, tags::QUERY_RETRIEVE_LEVEL).as_deref(),
			Some("SERIES")
		);
		assert!(identifier.get(tags::SOP_INSTANCE_UID).is_none());
	}

	#[test]
	fn response_counts_become_outcome() {
		let message = DicomMessage {
			command: InMemDicomObject::command_from_element_iter([
				DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [COMMAND_FIELD_COMPOSITE_MOVE_RESPONSE])),
				DataElement::new(tags::STATUS, VR::US, dicom_value!(U16, [0xB000])),
				DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [DATA_SET_MISSING])),
				DataElement::new(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS, VR::US, dicom_value!(U16, [98])),
				DataElement::new(tags::NUMBER_OF_FAILED_SUBOPERATIONS, VR::US, dicom_value!(U16, [2])),
			]),
			data: None,
			presentation_context_id: None,
		};

		let outcome = RetrievalOutcome::from(CompositeMoveResponse::try_from(message).unwrap());
		assert_eq!(
			outcome,
			RetrievalOutcome {
				status: 0xB000,
				completed: 98,
				failed: 2,
				warning: 0,
				remaining: 0,
			}
		);
		assert!(!outcome.is_complete());
	}

	#[test]
	fn warnings_alone_leave_outcome_complete() {
		let outcome = RetrievalOutcome {
			status: 0xB000,
			completed: 10,
			warning: 3,
			..RetrievalOutcome::default()
		};
		assert!(outcome.is_complete());
	}

	#[test]
	fn failure_status_without_counts_is_incomplete() {
		let outcome = RetrievalOutcome {
			status: 0xA702,
			..RetrievalOutcome::default()
		};
		assert!(!outcome.is_complete());
	}
}
