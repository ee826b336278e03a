//! Error type shared by the engine and its adapters

use std::fmt;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	PermissionDenied,
	Parse,
	ValidationError(String),

	/// Writing or reading the settings blob failed. The in-memory value stays authoritative.
	Persistence(String),
	/// The server public key could not be fetched or is empty
	KeyUnavailable,
	/// The platform refused or failed to create a native subscription
	SubscriptionRejected(String),
	/// The remote registry answered with an error
	Registry(String),
	/// The remote registry could not be reached
	Network(String),
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::Parse => write!(f, "parse error"),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::Persistence(msg) => write!(f, "persistence error: {}", msg),
			Error::KeyUnavailable => write!(f, "server public key unavailable"),
			Error::SubscriptionRejected(msg) => write!(f, "subscription rejected: {}", msg),
			Error::Registry(msg) => write!(f, "registry error: {}", msg),
			Error::Network(msg) => write!(f, "network error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::debug!("json error: {}", err);
		Self::Parse
	}
}


// vim: ts=4
