pub mod storescp;

use crate::backend::dimse::{DicomMessage, ReadError, DATA_SET_MISSING};
use crate::types::{AE, UI, US};
use dicom::core::{DataElement, VR};
use dicom::dicom_value;
use dicom::dictionary_std::{tags, uids};
use dicom::object::InMemDicomObject;

// Magic numbers defined by the DICOM specification.
pub const COMMAND_FIELD_COMPOSITE_STORE_REQUEST: US = 0x0001;
pub const COMMAND_FIELD_COMPOSITE_STORE_RESPONSE: US = 0x8001;

pub const STATUS_SUCCESS: US = 0x0000;
/// Refused: SOP Class not supported
pub const STATUS_SOP_CLASS_NOT_SUPPORTED: US = 0x0122;
/// Refused: Out of Resources
pub const STATUS_OUT_OF_RESOURCES: US = 0xA700;

/// Storage SOP classes of the radiotherapy workflow.
/// Presentation contexts for anything else are rejected.
pub const ACCEPTED_SOP_CLASSES: &[&str] = &[
	uids::CT_IMAGE_STORAGE,
	uids::ENHANCED_CT_IMAGE_STORAGE,
	uids::MR_IMAGE_STORAGE,
	uids::ENHANCED_MR_IMAGE_STORAGE,
	uids::POSITRON_EMISSION_TOMOGRAPHY_IMAGE_STORAGE,
	uids::ENHANCED_PET_IMAGE_STORAGE,
	uids::RT_STRUCTURE_SET_STORAGE,
	uids::RT_PLAN_STORAGE,
	uids::RT_ION_PLAN_STORAGE,
	uids::RT_DOSE_STORAGE,
	uids::RT_IMAGE_STORAGE,
	uids::RT_BEAMS_TREATMENT_RECORD_STORAGE,
	uids::RT_ION_BEAMS_TREATMENT_RECORD_STORAGE,
	uids::RT_BRACHY_TREATMENT_RECORD_STORAGE,
	uids::RT_TREATMENT_SUMMARY_RECORD_STORAGE,
	uids::SPATIAL_REGISTRATION_STORAGE,
	uids::DEFORMABLE_SPATIAL_REGISTRATION_STORAGE,
	uids::SEGMENTATION_STORAGE,
];

pub fn is_accepted_sop_class(sop_class_uid: &str) -> bool {
	ACCEPTED_SOP_CLASSES.contains(&sop_class_uid)
}

/// C-STORE-RQ
#[derive(Debug)]
pub struct CompositeStoreRequest {
	pub affected_sop_class_uid: UI,
	pub affected_sop_instance_uid: UI,
	pub move_originator_aet: Option<AE>,
	pub move_originator_message_id: Option<US>,
	pub message_id: US,
	pub data_set: Option<InMemDicomObject>,
}

impl TryFrom<DicomMessage> for CompositeStoreRequest {
	type Error = ReadError;

	fn try_from(message: DicomMessage) -> Result<Self, Self::Error> {
		if message.command_int(tags::COMMAND_FIELD) != Some(COMMAND_FIELD_COMPOSITE_STORE_REQUEST) {
			return Err(ReadError::MissingAttribute(tags::COMMAND_FIELD));
		}

		Ok(Self {
			affected_sop_class_uid: message
				.command_str(tags::AFFECTED_SOP_CLASS_UID)
				.ok_or(ReadError::MissingAttribute(tags::AFFECTED_SOP_CLASS_UID))?,
			affected_sop_instance_uid: message
				.command_str(tags::AFFECTED_SOP_INSTANCE_UID)
				.ok_or(ReadError::MissingAttribute(tags::AFFECTED_SOP_INSTANCE_UID))?,
			move_originator_aet: message.command_str(tags::MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE),
			move_originator_message_id: message.command_int(tags::MOVE_ORIGINATOR_MESSAGE_ID),
			message_id: message.command_int(tags::MESSAGE_ID).unwrap_or(0),
			data_set: message.data,
		})
	}
}

/// C-STORE-RSP
pub struct CompositeStoreResponse {
	pub message_id: US,
	pub sop_class_uid: UI,
	pub sop_instance_uid: UI,
	pub status: US,
}

impl From<CompositeStoreResponse> for DicomMessage {
	#[rustfmt::skip]
	fn from(response: CompositeStoreResponse) -> Self {
		let command = InMemDicomObject::command_from_element_iter([
			DataElement::new(tags::AFFECTED_SOP_CLASS_UID, VR::UI, dicom_value!(Str, response.sop_class_uid)),
			DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [COMMAND_FIELD_COMPOSITE_STORE_RESPONSE])),
			DataElement::new(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, dicom_value!(U16, [response.message_id])),
			DataElement::new(tags::COMMAND_DATA_SET_TYPE, VR::US, dicom_value!(U16, [DATA_SET_MISSING])),
			DataElement::new(tags::STATUS, VR::US, dicom_value!(U16, [response.status])),
			DataElement::new(tags::AFFECTED_SOP_INSTANCE_UID, VR::UI, dicom_value!(Str, response.sop_instance_uid)),
		]);

		Self {
			command,
			data: None,
			presentation_context_id: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn radiotherapy_classes_are_accepted() {
		assert!(is_accepted_sop_class(uids::CT_IMAGE_STORAGE));
		assert!(is_accepted_sop_class(uids::RT_STRUCTURE_SET_STORAGE));
		assert!(is_accepted_sop_class(uids::RT_DOSE_STORAGE));
		assert!(!is_accepted_sop_class(uids::SECONDARY_CAPTURE_IMAGE_STORAGE));
		assert!(!is_accepted_sop_class(uids::VERIFICATION));
	}
}
