use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything a store operation can fail with. The HTTP layer maps each
/// variant to a status code; the message is shown to the user verbatim.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// A referenced user, court or game does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// No authenticated identity. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but acting on something that isn't theirs. HTTP 403.
    #[error("{0}")]
    Forbidden(String),

    /// The request is well-formed but the current state refuses it. HTTP 409.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Identity or places provider failure.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("{what} {id} not found"))
    }

    pub fn conflict(&self) -> Option<Conflict> {
        match self {
            Error::Conflict(c) => Some(*c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("this game has already started")]
    GameInPast,
    #[error("game is already full")]
    GameFull,
    #[error("you are already a participant")]
    AlreadyJoined,
    #[error("you are not a participant in this game")]
    NotParticipant,
    #[error("organizers cannot leave their own games")]
    OrganizerCannotLeave,
    #[error("already friends")]
    AlreadyFriends,
    #[error("not friends")]
    NotFriends,
    #[error("username already taken")]
    UsernameTaken,
    #[error("court is already a favorite")]
    AlreadyFavorite,
    #[error("court is not a favorite")]
    NotFavorite,
}
