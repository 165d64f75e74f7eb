use crate::backend::dimse::association::manager::{AssociationManager, PresentationParameter};
use crate::backend::dimse::association::{Association, AssociationError};
use crate::backend::dimse::cfind::{CompositeFindRequest, CompositeFindResponse};
use crate::backend::dimse::{
	DicomMessageReader, DicomMessageWriter, ReadError, StatusType, WriteError,
};
use crate::types::{Priority, UI, US};
use async_stream::try_stream;
use dicom::dictionary_std::uids;
use dicom::object::InMemDicomObject;
use futures::Stream;
use std::time::Duration;
use thiserror::Error;
use tracing::{trace, warn};

/// Queries the archive with the Study Root Query/Retrieve Information Model.
pub struct FindServiceClassUser {
	manager: AssociationManager,
	timeout: Duration,
}

pub struct FindServiceClassUserOptions {
	pub identifier: InMemDicomObject,
	pub message_id: US,
	pub priority: Priority,
}

impl From<FindServiceClassUserOptions> for CompositeFindRequest {
	fn from(options: FindServiceClassUserOptions) -> Self {
		Self {
			identifier: options.identifier,
			message_id: options.message_id,
			priority: options.priority as US,
			affected_sop_class_uid: UI::from(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND),
		}
	}
}

impl FindServiceClassUser {
	pub const fn new(manager: AssociationManager, timeout: Duration) -> Self {
		Self { manager, timeout }
	}

	/// Runs the query on a new association.
	pub fn invoke(
		&self,
		options: FindServiceClassUserOptions,
	) -> impl Stream<Item = Result<InMemDicomObject, FindError>> + '_ {
		try_stream! {
			let association = self
				.manager
				.create(PresentationParameter::implicit(
					uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND,
				))
				.await?;

			for await result in find_on(&association, options, self.timeout) {
				yield result?;
			}
		}
	}
}

/// Sends a C-FIND-RQ on an established association and yields every matching identifier
/// until the archive reports a final status.
pub fn find_on<A: Association>(
	association: &A,
	options: FindServiceClassUserOptions,
	timeout: Duration,
) -> impl Stream<Item = Result<InMemDicomObject, FindError>> + '_ {
	try_stream! {
		let request = CompositeFindRequest::from(options);
		association.write_message(request, None, timeout).await?;
		trace!("Sent C-FIND-RQ");

		loop {
			let response = association.read_message(timeout).await?;
			let response = CompositeFindResponse::try_from(response)?;
			trace!("Received C-FIND-RSP");

			if !is_pending(response.status)? {
				break;
			}
			if let Some(data) = response.data {
				yield data;
			}
		}
	}
}

/// Whether more responses follow. Failure and cancel statuses are errors.
fn is_pending(status: US) -> Result<bool, FindError> {
	match StatusType::try_from(status).unwrap_or(StatusType::Failure) {
		StatusType::Pending => Ok(true),
		StatusType::Success => Ok(false),
		StatusType::Warning => {
			warn!(status, "C-FIND completed with warnings");
			Ok(false)
		}
		StatusType::Failure | StatusType::Cancel => Err(FindError::Status(status)),
	}
}

#[derive(Debug, Error)]
pub enum FindError {
	#[error(transparent)]
	Read(#[from] ReadError),
	#[error(transparent)]
	Write(#[from] WriteError),
	#[error(transparent)]
	Association(#[from] AssociationError),
	#[error("C-FIND failed with status {0:#06x}")]
	Status(US),
}
