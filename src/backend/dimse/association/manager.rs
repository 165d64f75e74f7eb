use super::client::{ClientAssociation, ClientAssociationOptions};
use super::AssociationError;
use crate::types::{AE, UI};
use dicom::dictionary_std::uids;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Opens client associations from the local AE to one remote AE.
/// Every DIMSE operation runs on an association of its own.
#[derive(Debug, Clone)]
pub struct AssociationManager {
	pub address: SocketAddr,
	pub calling_aet: AE,
	pub called_aet: AE,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationParameter {
	pub abstract_syntax_uid: UI,
	pub transfer_syntax_uids: Vec<UI>,
}

impl PresentationParameter {
	/// A presentation context proposing only Implicit VR Little Endian,
	/// which every DIMSE peer must support.
	pub fn implicit(abstract_syntax_uid: &str) -> Self {
		Self {
			abstract_syntax_uid: UI::from(abstract_syntax_uid),
			transfer_syntax_uids: vec![UI::from(uids::IMPLICIT_VR_LITTLE_ENDIAN)],
		}
	}
}

impl AssociationManager {
	pub async fn create(
		&self,
		param: PresentationParameter,
	) -> Result<ClientAssociation, AssociationError> {
		let options = ClientAssociationOptions {
			calling_aet: self.calling_aet.clone(),
			called_aet: self.called_aet.clone(),
			abstract_syntax: param.abstract_syntax_uid,
			transfer_syntaxes: param.transfer_syntax_uids,
			address: self.address,
		};

		let association = ClientAssociation::new(options).await;

		match &association {
			Ok(association) => debug!(
				backend_uuid = association.uuid().to_string(),
				called_aet = self.called_aet,
				"Created new client association"
			),
			Err(err) => warn!(
				called_aet = self.called_aet,
				address = %self.address,
				"Failed to create new client association: {err}"
			),
		}

		association
	}
}
