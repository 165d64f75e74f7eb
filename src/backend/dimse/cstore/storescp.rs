use crate::backend::dimse::association::server::{ServerAssociation, ServerAssociationOptions};
use crate::backend::dimse::association::Association;
use crate::backend::dimse::cmove::{MoveMediator, TaskKey};
use crate::backend::dimse::cstore::{
	is_accepted_sop_class, CompositeStoreRequest, CompositeStoreResponse, ACCEPTED_SOP_CLASSES,
	STATUS_OUT_OF_RESOURCES, STATUS_SOP_CLASS_NOT_SUPPORTED, STATUS_SUCCESS,
};
use crate::backend::dimse::{DicomMessage, DicomMessageReader, DicomMessageWriter, ReadError};
use crate::config::LocalConfig;
use anyhow::Context;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom::ul::Pdu;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

/// Receives the instances pushed by the archive during a C-MOVE and writes them into the
/// directory of the C-MOVE's route.
#[derive(Clone)]
pub struct StoreServiceClassProvider {
	inner: Arc<InnerStoreServiceClassProvider>,
}

struct InnerStoreServiceClassProvider {
	mediator: MoveMediator,
	config: LocalConfig,
	timeout: Duration,
}

impl StoreServiceClassProvider {
	pub fn new(mediator: MoveMediator, config: LocalConfig, timeout: Duration) -> Self {
		Self {
			inner: Arc::new(InnerStoreServiceClassProvider {
				mediator,
				config,
				timeout,
			}),
		}
	}

	/// Binds the listener. A failure here is fatal for the batch.
	pub async fn bind(&self) -> std::io::Result<TcpListener> {
		let address = SocketAddr::from((self.inner.config.interface, self.inner.config.port));
		let listener = TcpListener::bind(&address).await?;
		info!(
			aet = self.inner.config.aet,
			"Started Store Service Class Provider on {address}"
		);
		Ok(listener)
	}

	/// Accepts connections until the task is dropped. Each association is served on a task
	/// of its own.
	pub async fn serve(self, listener: TcpListener) {
		loop {
			match listener.accept().await {
				Ok((stream, peer)) => {
					let span = info_span!(
						"STORE-SCP",
						aet = &self.inner.config.aet,
						peer = peer.to_string()
					);
					debug!("Accepted incoming connection from {peer}");
					let inner = Arc::clone(&self.inner);
					tokio::spawn(async move {
						if let Err(err) = Self::process(stream, inner).instrument(span).await {
							error!("{err:#}");
						}
					});
				}
				Err(err) => error!("Failed to accept incoming connection: {err}"),
			}
		}
	}

	async fn process(
		stream: TcpStream,
		inner: Arc<InnerStoreServiceClassProvider>,
	) -> anyhow::Result<()> {
		let tcp_stream = stream.into_std()?;
		// dicom-ul performs blocking reads and writes on its own thread.
		tcp_stream.set_nonblocking(false)?;

		let options = ServerAssociationOptions {
			aet: inner.config.aet.clone(),
			tcp_stream,
			uncompressed: inner.config.uncompressed,
			abstract_syntaxes: ACCEPTED_SOP_CLASSES
				.iter()
				.map(|uid| String::from(*uid))
				.collect(),
		};
		let association = ServerAssociation::new(options).await?;
		debug!(
			backend_uuid = association.uuid().to_string(),
			"Serving association"
		);

		loop {
			// Duration::MAX to indefinitely wait for incoming messages
			let message = match association.read_message(Duration::MAX).await {
				Ok(message) => message,
				Err(ReadError::UnexpectedPdu(pdu)) if matches!(*pdu, Pdu::ReleaseRQ) => {
					debug!("Peer released the association");
					if let Err(err) = association.send(Pdu::ReleaseRP, inner.timeout).await {
						debug!("Failed to confirm release: {err}");
					}
					return Ok(());
				}
				Err(ReadError::UnexpectedPdu(pdu)) if matches!(*pdu, Pdu::AbortRQ { .. }) => {
					debug!("Peer aborted the association");
					return Ok(());
				}
				Err(err) => return Err(err.into()),
			};

			handle(&association, message, &inner.mediator, inner.timeout).await?;
		}
	}
}

/// Answers one C-STORE-RQ. The response is written after the instance has been persisted.
#[instrument(skip_all)]
pub(crate) async fn handle<A: Association>(
	association: &A,
	message: DicomMessage,
	mediator: &MoveMediator,
	timeout: Duration,
) -> anyhow::Result<()> {
	let presentation_context_id = message.presentation_context_id;
	let transfer_syntax = association
		.presentation_contexts()
		.iter()
		.find(|pctx| Some(pctx.id) == presentation_context_id)
		.or_else(|| association.presentation_contexts().first())
		.map(|pctx| pctx.transfer_syntax.clone())
		.context("No presentation context available")?;

	let mut request =
		CompositeStoreRequest::try_from(message).context("Only C-STORE-RQ is supported")?;

	let status = if is_accepted_sop_class(&request.affected_sop_class_uid) {
		let key = TaskKey::new(
			request.move_originator_aet.clone().unwrap_or_default(),
			request.move_originator_message_id,
		);
		let directory = mediator.resolve(&key);
		match request.data_set.take() {
			Some(data_set) => store(&request, data_set, transfer_syntax, directory).await,
			None => {
				warn!("C-STORE-RQ without data set");
				STATUS_OUT_OF_RESOURCES
			}
		}
	} else {
		warn!(
			sop_class_uid = request.affected_sop_class_uid,
			"Refused instance of unsupported SOP class"
		);
		STATUS_SOP_CLASS_NOT_SUPPORTED
	};

	let response = CompositeStoreResponse {
		message_id: request.message_id,
		sop_class_uid: request.affected_sop_class_uid,
		sop_instance_uid: request.affected_sop_instance_uid,
		status,
	};
	association
		.write_message(response, presentation_context_id, timeout)
		.await?;
	Ok(())
}

async fn store(
	request: &CompositeStoreRequest,
	data_set: InMemDicomObject,
	transfer_syntax: String,
	directory: PathBuf,
) -> u16 {
	let sop_class_uid = request.affected_sop_class_uid.clone();
	let sop_instance_uid = request.affected_sop_instance_uid.clone();

	let result = tokio::task::spawn_blocking(move || {
		persist(
			&directory,
			data_set,
			&sop_class_uid,
			&sop_instance_uid,
			&transfer_syntax,
		)
	})
	.await;

	match result {
		Ok(Ok(path)) => {
			info!(
				sop_instance_uid = request.affected_sop_instance_uid,
				path = %path.display(),
				"Stored instance"
			);
			STATUS_SUCCESS
		}
		Ok(Err(err)) => {
			error!(
				sop_instance_uid = request.affected_sop_instance_uid,
				"Failed to store instance: {err}"
			);
			STATUS_OUT_OF_RESOURCES
		}
		Err(err) => {
			error!("Store task failed: {err}");
			STATUS_OUT_OF_RESOURCES
		}
	}
}

#[derive(Debug, Error)]
pub enum PersistError {
	#[error("SOP Instance UID '{0}' is not usable as file name")]
	InvalidFileName(String),
	#[error("Failed to create directory: {0}")]
	Directory(#[from] std::io::Error),
	#[error("Failed to build file meta group: {0}")]
	Meta(String),
	#[error("Failed to write file: {0}")]
	Write(#[from] dicom::object::WriteError),
}

/// The file an instance is written to: `<directory>/<SOPInstanceUID>.dcm`.
pub fn instance_path(directory: &Path, sop_instance_uid: &str) -> Result<PathBuf, PersistError> {
	if sop_instance_uid.is_empty()
		|| sop_instance_uid.contains(['/', '\\'])
		|| sop_instance_uid.chars().all(|c| c == '.')
	{
		return Err(PersistError::InvalidFileName(sop_instance_uid.to_owned()));
	}
	Ok(directory.join(format!("{sop_instance_uid}.dcm")))
}

/// Writes the data set with a file meta group. Creates the directory if absent.
pub fn persist(
	directory: &Path,
	data_set: InMemDicomObject,
	sop_class_uid: &str,
	sop_instance_uid: &str,
	transfer_syntax: &str,
) -> Result<PathBuf, PersistError> {
	let path = instance_path(directory, sop_instance_uid)?;
	std::fs::create_dir_all(directory)?;

	let meta = FileMetaTableBuilder::new()
		.media_storage_sop_class_uid(sop_class_uid)
		.media_storage_sop_instance_uid(sop_instance_uid)
		.transfer_syntax(transfer_syntax)
		.build()
		.map_err(|err| PersistError::Meta(err.to_string()))?;

	data_set.with_exact_meta(meta).write_to_file(&path)?;
	Ok(path)
}
