use super::{oneshot, AskPattern, Association, AssociationError, ChannelError, Command, Sender};
use dicom::ul::association::Association as _;
use dicom::transfer_syntax::TransferSyntaxRegistry;
use dicom::ul::pdu::Pdu;
use dicom::ul::pdu::PresentationContextNegotiated;
use std::convert::identity;
use std::io::ErrorKind;
use std::{net::TcpStream, thread, time::Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// An association requested by a peer, typically the archive pushing instances.
#[derive(Debug)]
pub struct ServerAssociation {
	channel: Sender<Command>,
	uuid: Uuid,
	presentation_contexts: Vec<PresentationContextNegotiated>,
	tcp_stream: TcpStream,
}

pub struct ServerAssociationOptions {
	pub aet: String,
	pub tcp_stream: TcpStream,
	pub uncompressed: bool,
	/// Abstract syntaxes accepted during negotiation. Others are rejected.
	pub abstract_syntaxes: Vec<String>,
}

/// Transfer syntaxes offered to peers. With `uncompressed`, only those that need no codec.
pub fn accepted_transfer_syntaxes(uncompressed: bool) -> Vec<&'static str> {
	TransferSyntaxRegistry
		.iter()
		.filter(|syntax| {
			if uncompressed {
				syntax.is_codec_free()
			} else {
				!syntax.is_unsupported()
			}
		})
		.map(|syntax| syntax.uid())
		.collect()
}

impl ServerAssociation {
	pub async fn new(options: ServerAssociationOptions) -> Result<Self, AssociationError> {
		let uuid = Uuid::new_v4();
		let mut server_options =
			dicom::ul::ServerAssociationOptions::new().ae_title(options.aet.clone());
		for abstract_syntax in options.abstract_syntaxes {
			server_options = server_options.with_abstract_syntax(abstract_syntax);
		}
		for transfer_syntax in accepted_transfer_syntaxes(options.uncompressed) {
			server_options = server_options.with_transfer_syntax(transfer_syntax);
		}

		let (connect_tx, connect_result) = oneshot::channel::<Result<_, AssociationError>>();
		let (tx, mut rx) = tokio::sync::mpsc::channel::<Command>(1);
		let local_aet = options.aet;
		let tcp_stream = options.tcp_stream;

		let _handle = thread::Builder::new()
			.name(format!("{local_aet}-server"))
			.spawn(move || {
				let span =
					tracing::info_span!("ServerAssociation", backend_uuid = uuid.to_string());
				let _enter = span.enter();

				let mut association = match server_options.establish(tcp_stream) {
					Ok(association) => association,
					Err(err) => {
						warn!("Rejected incoming association: {err}");
						connect_tx.send(Err(err.into())).map_err(|_| ())?;
						return Err(());
					}
				};
				info!(
					calling_aet = association.peer_ae_title(),
					called_aet = local_aet,
					"Established new server association"
				);

				let presentation_contexts = association.presentation_contexts().to_vec();
				match association.inner_stream().try_clone() {
					Ok(stream) => connect_tx
						.send(Ok((stream, presentation_contexts)))
						.map_err(|_| ())?,
					Err(err) => {
						connect_tx
							.send(Err(AssociationError::OsThread(err)))
							.map_err(|_| ())?;
						return Err(());
					}
				}

				while let Some(command) = rx.blocking_recv() {
					let delivered = match command {
						Command::Send(pdu, reply_to) => reply_to
							.send(association.send(&pdu).map_err(AssociationError::Association))
							.is_ok(),
						Command::Receive(reply_to) => reply_to
							.send(association.receive().map_err(AssociationError::Association))
							.is_ok(),
					};
					if !delivered {
						error!("Error in ServerAssociation backend: {}", ChannelError::Closed);
						return Err(());
					}
				}

				rx.close();

				match association.abort() {
					Ok(()) => {}
					// the peer usually closes the connection right after the release
					Err(dicom::ul::association::Error::WireSend { source, .. })
						if source.kind() == ErrorKind::BrokenPipe => {}
					Err(err) => debug!("Failed to abort ServerAssociation: {err}"),
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
			presentation_contexts,
			tcp_stream,
		})
	}

	pub const fn uuid(&self) -> &Uuid {
		&self.uuid
	}
}

impl Association for ServerAssociation {
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

impl Drop for ServerAssociation {
	fn drop(&mut self) {
		self.close();
	}
}
