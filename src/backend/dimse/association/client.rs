use dicom::ul::pdu::PresentationContextNegotiated;
use dicom::ul::Pdu;
use std::convert::identity;
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;
use tracing::{debug, error};
use uuid::Uuid;

use super::{AskPattern, Association, AssociationError, ChannelError, Command};

/// An association requested by this node.
/// The blocking upper layer protocol runs on a dedicated thread that is driven through a channel.
pub struct ClientAssociation {
	channel: Sender<Command>,
	uuid: Uuid,
	tcp_stream: TcpStream,
	presentation_contexts: Vec<PresentationContextNegotiated>,
}

pub struct ClientAssociationOptions {
	pub calling_aet: String,
	pub called_aet: String,
	pub abstract_syntax: String,
	pub transfer_syntaxes: Vec<String>,
	pub address: SocketAddr,
}

impl ClientAssociation {
	pub async fn new(options: ClientAssociationOptions) -> Result<Self, AssociationError> {
		let uuid = Uuid::new_v4();
		let (tx, mut rx) = tokio::sync::mpsc::channel::<Command>(1);
		let (connect_tx, connect_result) = oneshot::channel::<Result<_, AssociationError>>();

		let address = options.address;
		let thread_name = format!("{}-client", options.calling_aet);
		let options = dicom::ul::ClientAssociationOptions::new()
			.calling_ae_title(options.calling_aet)
			.called_ae_title(options.called_aet)
			.with_presentation_context(options.abstract_syntax, options.transfer_syntaxes);

		let _handle = thread::Builder::new()
			.name(thread_name)
			.spawn(move || {
				let mut association = match options.establish(address) {
					Ok(mut association) => {
						let presentation_contexts = association.presentation_contexts().to_vec();

						let stream = match association.inner_stream().try_clone() {
							Ok(stream) => stream,
							Err(err) => {
								connect_tx
									.send(Err(AssociationError::OsThread(err)))
									.map_err(|_| ())?;
								return Err(());
							}
						};

						connect_tx
							.send(Ok((stream, presentation_contexts)))
							.map_err(|_| ())?;

						association
					}
					Err(e) => {
						error!(backend_uuid = uuid.to_string(), "Failed to connect: {e}");
						connect_tx.send(Err(e.into())).map_err(|_| ())?;
						return Err(());
					}
				};

				while let Some(command) = rx.blocking_recv() {
					let result = match command {
						Command::Send(pdu, reply_to) => {
							let send_result = association
								.send(&pdu)
								.map_err(AssociationError::Association);
							reply_to.send(send_result).map_err(|_| ChannelError::Closed)
						}
						Command::Receive(reply_to) => {
							let receive_result =
								association.receive().map_err(AssociationError::Association);
							reply_to
								.send(receive_result)
								.map_err(|_| ChannelError::Closed)
						}
					};
					if let Some(err) = result.err() {
						error!(
							backend_uuid = uuid.to_string(),
							"Error in ClientAssociation backend: {err}"
						);
						return Err(());
					}
				}

				rx.close();

				if let Err(err) = association.release() {
					debug!(
						backend_uuid = uuid.to_string(),
						"Failed to release ClientAssociation: {err}"
					);
				}

				Ok(())
			})
			.map_err(AssociationError::OsThread)?;

		let (tcp_stream, presentation_contexts) = connect_result
			.await
			.map_err(|_| AssociationError::Channel(ChannelError::Closed))??;

		Ok(Self {
			channel: tx,
			uuid,
			tcp_stream,
			presentation_contexts,
		})
	}

	pub const fn uuid(&self) -> &Uuid {
		&self.uuid
	}
}

impl Association for ClientAssociation {
	async fn receive(&self, timeout: Duration) -> Result<Pdu, AssociationError> {
		self.channel
			.ask(Command::Receive, timeout)
			.await
			.map_err(AssociationError::Channel)
			.and_then(identity)
	}

	async fn send(&self, pdu: Pdu, timeout: Duration) -> Result<(), AssociationError> {
		self.channel
			.ask(|reply_to| Command::Send(pdu, reply_to), timeout)
			.await
			.map_err(AssociationError::Channel)
			.and_then(identity)
	}

	fn close(&mut self) {
		if let Err(err) = self.tcp_stream.shutdown(std::net::Shutdown::Both) {
			debug!(
				backend_uuid = self.uuid.to_string(),
				"Failed to shutdown TcpStream: {err}"
			);
		}
	}

	fn presentation_contexts(&self) -> &[PresentationContextNegotiated] {
		&self.presentation_contexts
	}
}
