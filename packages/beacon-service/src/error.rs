pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid argument: {message}")]
	InvalidArgument { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Presence store unavailable: {message}")]
	StoreUnavailable { message: String },
	#[error("Vector index unavailable: {message}")]
	IndexUnavailable { message: String },
	#[error("Embedding failed: {message}")]
	EmbeddingFailure { message: String },
	#[error("Deadline exceeded: {message}")]
	DeadlineExceeded { message: String },
}
impl Error {
	/// True for failures where a retry has a reasonable chance of succeeding.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::StoreUnavailable { .. }
				| Self::IndexUnavailable { .. }
				| Self::EmbeddingFailure { .. }
				| Self::DeadlineExceeded { .. }
		)
	}
}

impl From<beacon_storage::Error> for Error {
	fn from(err: beacon_storage::Error) -> Self {
		match err {
			beacon_storage::Error::Redis(inner) =>
				Self::StoreUnavailable { message: inner.to_string() },
			beacon_storage::Error::SerdeJson(inner) =>
				Self::StoreUnavailable { message: inner.to_string() },
			beacon_storage::Error::Sqlx(inner) =>
				Self::StoreUnavailable { message: inner.to_string() },
			beacon_storage::Error::Qdrant(inner) =>
				Self::IndexUnavailable { message: inner.to_string() },
			beacon_storage::Error::InvalidArgument(message) => Self::InvalidArgument { message },
		}
	}
}

impl From<beacon_providers::Error> for Error {
	fn from(err: beacon_providers::Error) -> Self {
		Self::EmbeddingFailure { message: err.to_string() }
	}
}
