use crate::entity::EntityId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {message}")]
    Argument { message: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Upload rejected: {message}")]
    Upload { message: String },

    #[error("This operation requires a storage gateway to be bound")]
    GatewayUnbound,

    #[error("Unknown entity {0:?}")]
    UnknownEntity(EntityId),

    #[error(transparent)]
    Gateway(#[from] docstore_gateway::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Error::Argument {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// True when the storage service reported the entity as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Gateway(e) if e.is_not_found())
    }
}
