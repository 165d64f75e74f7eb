use crate::backend::dimse::association::manager::{AssociationManager, PresentationParameter};
use crate::backend::dimse::association::{Association, AssociationError};
use crate::backend::dimse::cmove::{
	CompositeMoveRequest, CompositeMoveResponse, MoveMediator, RetrievalOutcome, TaskKey,
};
use crate::backend::dimse::{
	DicomMessageReader, DicomMessageWriter, ReadError, StatusType, WriteError,
};
use crate::types::AE;
use dicom::dictionary_std::uids;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

pub struct MoveServiceClassUser {
	manager: AssociationManager,
	mediator: MoveMediator,
	timeout: Duration,
}

impl MoveServiceClassUser {
	pub const fn new(manager: AssociationManager, mediator: MoveMediator, timeout: Duration) -> Self {
		Self {
			manager,
			mediator,
			timeout,
		}
	}

	/// Runs the C-MOVE on a new association, with the pushed instances written to `output_dir`.
	#[instrument(skip_all, name = "MOVE-SCU", fields(message_id = request.message_id))]
	pub async fn invoke(
		&self,
		request: CompositeMoveRequest,
		output_dir: &Path,
	) -> Result<RetrievalOutcome, MoveError> {
		let association = self
			.manager
			.create(PresentationParameter::implicit(
				uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE,
			))
			.await?;

		move_into(
			&association,
			&self.mediator,
			self.manager.calling_aet.clone(),
			request,
			output_dir,
			self.timeout,
		)
		.await
	}
}

/// Runs [`move_on`] while the instances pushed for this move are routed to `output_dir`.
/// The route is removed once the move returned.
pub async fn move_into<A: Association>(
	association: &A,
	mediator: &MoveMediator,
	originator: AE,
	request: CompositeMoveRequest,
	output_dir: &Path,
	timeout: Duration,
) -> Result<RetrievalOutcome, MoveError> {
	// The archive names the requesting AE as move originator in every C-STORE-RQ.
	let key = TaskKey::new(originator, Some(request.message_id));
	let _route = mediator.register(key, output_dir);
	move_on(association, request, timeout).await
}

/// Sends a C-MOVE-RQ on an established association and waits for the final C-MOVE-RSP.
///
/// A final response with failed sub-operations is still an outcome. Only a cancelled
/// operation and transport problems are errors.
///
/// `timeout` bounds the request only. Responses are awaited for as long as the archive
/// keeps the association open.
pub async fn move_on<A: Association>(
	association: &A,
	request: CompositeMoveRequest,
	timeout: Duration,
) -> Result<RetrievalOutcome, MoveError> {
	association.write_message(request, None, timeout).await?;
	trace!("Sent C-MOVE-RQ");

	loop {
		let response = association.read_message(Duration::MAX).await?;
		let response = CompositeMoveResponse::try_from(response)?;
		trace!("Received C-MOVE-RSP");

		let status_type = StatusType::try_from(response.status).unwrap_or(StatusType::Failure);
		match status_type {
			StatusType::Pending => {
				debug!(
					remaining = response.remaining,
					completed = response.completed,
					failed = response.failed,
					"C-MOVE is pending"
				);
			}
			StatusType::Cancel => return Err(MoveError::Cancelled),
			StatusType::Success => {
				let outcome = RetrievalOutcome::from(response);
				info!(completed = outcome.completed, "C-MOVE completed successfully");
				return Ok(outcome);
			}
			StatusType::Warning | StatusType::Failure => {
				let outcome = RetrievalOutcome::from(response);
				warn!(
					status = outcome.status,
					completed = outcome.completed,
					failed = outcome.failed,
					warning = outcome.warning,
					"C-MOVE finished with {status_type:?} status"
				);
				return Ok(outcome);
			}
		}
	}
}

#[derive(Debug, Error)]
pub enum MoveError {
	#[error(transparent)]
	Read(#[from] ReadError),
	#[error(transparent)]
	Write(#[from] WriteError),
	#[error(transparent)]
	Association(#[from] AssociationError),
	#[error("C-MOVE operation was canceled")]
	Cancelled,
}
