use crate::types::{AE, US};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Identifies the C-MOVE a pushed C-STORE belongs to.
/// Archives that omit the Move Originator Message ID only provide the originator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
	Identified { originator: AE, message_id: US },
	Unidentified { originator: AE },
}

impl TaskKey {
	pub const fn new(originator: AE, message_id: Option<US>) -> Self {
		match message_id {
			None => Self::Unidentified { originator },
			Some(message_id) => Self::Identified {
				originator,
				message_id,
			},
		}
	}

	pub fn originator(&self) -> &str {
		match self {
			Self::Unidentified { originator } | Self::Identified { originator, .. } => originator,
		}
	}
}

/// Routes objects received by the STORE-SCP into the output directory of the C-MOVE that
/// caused them. A route exists while its [`Route`] guard is alive.
#[derive(Debug, Clone)]
pub struct MoveMediator {
	routes: Arc<Mutex<HashMap<TaskKey, PathBuf>>>,
	fallback: PathBuf,
}

/// Keeps a route registered. Dropping it removes the route.
#[must_use = "the route is removed when the guard is dropped"]
#[derive(Debug)]
pub struct Route {
	mediator: MoveMediator,
	key: TaskKey,
}

impl Drop for Route {
	fn drop(&mut self) {
		self.mediator.routes().remove(&self.key);
		debug!(key = ?self.key, "Removed C-MOVE route");
	}
}

impl MoveMediator {
	/// `fallback` receives objects that match no registered route.
	pub fn new(fallback: impl Into<PathBuf>) -> Self {
		Self {
			routes: Arc::default(),
			fallback: fallback.into(),
		}
	}

	fn routes(&self) -> MutexGuard<'_, HashMap<TaskKey, PathBuf>> {
		self.routes.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Registers `directory` as destination for objects pushed on behalf of `key`.
	pub fn register(&self, key: TaskKey, directory: &Path) -> Route {
		debug!(?key, directory = %directory.display(), "Registered C-MOVE route");
		self.routes().insert(key.clone(), directory.to_path_buf());
		Route {
			mediator: self.clone(),
			key,
		}
	}

	/// Finds the destination directory for an object pushed on behalf of `key`.
	///
	/// Without a message id, the route is found by originator if it is the only one for that
	/// originator. Anything else goes to the fallback directory.
	pub fn resolve(&self, key: &TaskKey) -> PathBuf {
		let routes = self.routes();
		if let Some(directory) = routes.get(key) {
			return directory.clone();
		}

		if let TaskKey::Unidentified { originator } = key {
			let mut candidates = routes
				.iter()
				.filter(|(route, _)| route.originator() == originator)
				.map(|(_, directory)| directory);
			if let (Some(directory), None) = (candidates.next(), candidates.next()) {
				return directory.clone();
			}
		}

		warn!(?key, "No C-MOVE route matches, using fallback directory");
		self.fallback.clone()
	}
}
