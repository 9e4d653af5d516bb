#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Redis(#[from] redis::RedisError),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Qdrant(Box<qdrant_client::QdrantError>),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
