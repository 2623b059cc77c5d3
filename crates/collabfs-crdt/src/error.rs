//! Error type for the CRDT document boundary.

#[derive(Debug)]
pub enum Error {
	/// A state vector or update could not be decoded.
	Decode(String),
	/// An update was well-formed but could not be integrated.
	Apply(String),
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::Decode(msg) => write!(f, "failed to decode crdt payload: {}", msg),
			Error::Apply(msg) => write!(f, "failed to apply crdt update: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<Error> for collabfs_types::Error {
	fn from(err: Error) -> Self {
		collabfs_types::Error::Crdt(err.to_string())
	}
}

// vim: ts=4
