use serde::{Deserialize, Serialize};
use sqlx::FromRow;

mod error;
pub mod schedule;
mod views;

pub use error::{Conflict, Error, Result};
pub use schedule::{GameDraft, GameSlot, Moment};
pub use views::{NoViews, ViewInvalidator, ViewKey};

pub type UserId = i64;
pub type CourtId = i64;
pub type GameId = i64;

pub const DEFAULT_RATING: f64 = 2.5;
pub const DEFAULT_GAME_STATUS: &str = "scheduled";

// --- Users ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub rating: f64,
    pub games_played: i64,
    pub courts_visited: i64,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The public face of a user as it appears on rosters and search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub rating: f64,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        UserSummary {
            id: u.id,
            name: u.name.clone(),
            username: u.username.clone(),
            avatar_url: u.avatar_url.clone(),
            rating: u.rating,
        }
    }
}

/// A profile as anyone may see it. Contact details and the identity
/// provider's id stay with the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub rating: f64,
    pub games_played: i64,
    pub courts_visited: i64,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        PublicUser {
            id: u.id,
            name: u.name,
            username: u.username,
            avatar_url: u.avatar_url,
            rating: u.rating,
            games_played: u.games_played,
            courts_visited: u.courts_visited,
            bio: u.bio,
            location: u.location,
            created_at: u.created_at,
        }
    }
}

/// Claims handed to us by the identity provider for an authenticated request.
/// They are trusted as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// First + last name when either is present, else the provider's full
    /// name, else the email local part.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join(" ");
        }
        if let Some(name) = self.full_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .unwrap_or("Player")
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

// --- Courts ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub city: String,
    pub state: String,
    pub court_type: String,
    #[sqlx(json)]
    pub amenities: Vec<String>,
    #[sqlx(json)]
    pub images: Vec<String>,
    pub rating: Option<f64>,
    pub place_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourtSummary {
    pub id: CourtId,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub court_type: String,
}

/// Input for find-or-create. Either `id` or `place_id` may point at an
/// existing court; everything else is only used when a new court is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCourt {
    pub id: Option<CourtId>,
    pub place_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub court_type: Option<String>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourtFilter {
    pub city: Option<String>,
    pub court_type: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourtDetail {
    #[serde(flatten)]
    pub court: Court,
    pub upcoming_games: Vec<Game>,
}

// --- Games ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Game {
    pub id: GameId,
    pub court_id: CourtId,
    pub organizer_id: UserId,
    pub date: String,
    pub start_time: String,
    pub game_type: String,
    pub skill_level: String,
    pub players_needed: i64,
    pub notes: Option<String>,
    pub status: String,
    pub participant_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Game {
    pub fn open_spots(&self) -> i64 {
        (self.players_needed - self.participant_count).max(0)
    }

    /// Compares the stored date/time keys against `now` exactly the way the
    /// store's queries do.
    pub fn has_started(&self, now: &Moment) -> bool {
        let (today, time) = (now.date_key(), now.time_key());
        (self.date.as_str(), self.start_time.as_str()) <= (today.as_str(), time.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Participant {
    #[serde(skip)]
    pub game_id: GameId,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: UserSummary,
    pub is_organizer: bool,
    pub joined_at: String,
}

/// A game with its court, organizer and full roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDetail {
    #[serde(flatten)]
    pub game: Game,
    pub court: CourtSummary,
    pub organizer: UserSummary,
    pub participants: Vec<Participant>,
}

impl GameDetail {
    pub fn has_participant(&self, user_id: UserId) -> bool {
        self.participants.iter().any(|p| p.user.id == user_id)
    }

    pub fn participation(&self, user_id: UserId) -> Participation {
        match self.participants.iter().find(|p| p.user.id == user_id) {
            None => Participation::NotParticipant,
            Some(_) if user_id == self.game.organizer_id => Participation::Organizer,
            Some(p) if p.is_organizer => Participation::Organizer,
            Some(_) => Participation::Participant,
        }
    }
}

/// Request body for scheduling a game. Required fields are optional here so
/// that a missing one is reported by name rather than as a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewGame {
    pub court_id: Option<CourtId>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub game_type: Option<String>,
    pub skill_level: Option<String>,
    pub players_needed: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameSort {
    #[default]
    Date,
    Recent,
}

/// Cap applied to `GameSort::Recent` listings and to a user's history.
pub const RECENT_GAMES_CAP: u32 = 10;
/// How many upcoming games a court detail carries.
pub const COURT_UPCOMING_GAMES: i64 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameFilter {
    pub court_id: Option<CourtId>,
    pub game_type: Option<String>,
    /// Comma-separated set, e.g. `beginner,intermediate`.
    pub skill_level: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// Identity-provider subject id of the organizer.
    pub organizer: Option<String>,
    pub has_open_spots: Option<bool>,
    pub upcoming: Option<bool>,
    pub sort: Option<GameSort>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl GameFilter {
    pub fn skill_levels(&self) -> Vec<String> {
        self.skill_level
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn page_request(&self) -> PageRequest {
        match self.sort.unwrap_or_default() {
            GameSort::Recent => PageRequest::new(Some(1), Some(RECENT_GAMES_CAP), RECENT_GAMES_CAP),
            GameSort::Date => PageRequest::new(self.page, self.limit, 100),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGames {
    pub upcoming: Vec<GameDetail>,
    pub history: Vec<GameDetail>,
}

/// Where a user stands with respect to one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participation {
    NotParticipant,
    Participant,
    /// A participant who can never leave.
    Organizer,
}

// --- Paging ---

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>, max_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}
