use serde::Serialize;

use crate::{CourtId, GameId, UserId};

/// A rendered view whose cached copy goes stale when the data behind it
/// changes. Mutations report the keys they affect; whoever caches views
/// drops the matching entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "view", content = "id", rename_all = "snake_case")]
pub enum ViewKey {
    Profile(UserId),
    /// Every user's dashboard.
    Dashboard,
    Game(GameId),
    Court(CourtId),
}

pub trait ViewInvalidator: Send + Sync {
    fn invalidate(&self, keys: &[ViewKey]);
}

/// For callers with nothing cached, e.g. one-shot CLI commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoViews;

impl ViewInvalidator for NoViews {
    fn invalidate(&self, _keys: &[ViewKey]) {}
}
