//! The room aggregate: membership, readiness, blacklist, and the
//! WAITING ↔ IN_GAME state machine.
//!
//! [`Room`] is a plain value. All I/O lives in the service layer, which
//! reads the aggregate from the shared store, calls these methods on a
//! copy, and writes back with a compare-and-swap on [`Room::version`].
//! `players` preserves join order, which makes owner transfer on leave
//! deterministic: the earliest-joined remaining member inherits the room.

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};

use super::ids::{MemberId, RoomId};
use crate::error::GatewayError;

/// Maximum room title length in characters.
pub const MAX_TITLE_LEN: usize = 30;

/// Maximum number of players per room.
pub const MAX_CAPACITY: u32 = 8;

/// Default number of questions generated for a game.
pub const DEFAULT_PROBLEM_COUNT: u32 = 5;

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    /// Lobby phase: members can join, ready up, and change settings.
    Waiting,
    /// A game is running; membership events carry submission flags.
    InGame,
}

/// Top-level quiz category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MainCategory {
    /// Natural sciences.
    Science,
    /// World and regional history.
    History,
    /// Language and literature.
    Language,
    /// Mixed general knowledge.
    General,
}

impl MainCategory {
    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Science => "Science",
            Self::History => "History",
            Self::Language => "Language",
            Self::General => "General knowledge",
        }
    }
}

/// Second-level quiz category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubCategory {
    /// Physics questions.
    Physics,
    /// Chemistry questions.
    Chemistry,
    /// Biology questions.
    Biology,
    /// Pre-modern history.
    AncientHistory,
    /// Modern history.
    ModernHistory,
    /// Vocabulary questions.
    Vocabulary,
    /// Grammar questions.
    Grammar,
    /// No sub-category restriction.
    Mixed,
}

impl SubCategory {
    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Physics => "Physics",
            Self::Chemistry => "Chemistry",
            Self::Biology => "Biology",
            Self::AncientHistory => "Ancient history",
            Self::ModernHistory => "Modern history",
            Self::Vocabulary => "Vocabulary",
            Self::Grammar => "Grammar",
            Self::Mixed => "Mixed",
        }
    }
}

/// Question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Warm-up questions.
    Easy,
    /// Standard questions.
    Normal,
    /// Expert questions.
    Hard,
}

/// Question answer format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    /// One correct choice among lettered options.
    MultipleChoice,
}

/// Validated settings for room creation.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Room title (non-empty, at most [`MAX_TITLE_LEN`] chars).
    pub title: String,
    /// Player capacity (1..=[`MAX_CAPACITY`]).
    pub capacity: u32,
    /// Top-level category.
    pub main_category: MainCategory,
    /// Second-level category.
    pub sub_category: SubCategory,
    /// Question difficulty.
    pub difficulty: Difficulty,
    /// Answer format.
    pub answer_type: AnswerType,
    /// Number of questions per game.
    pub problem_count: u32,
    /// Optional 4-digit numeric password; presence makes the room private.
    pub password: Option<String>,
}

/// Partial update applied to a room by its owner. Each field only
/// overwrites when present.
#[derive(Debug, Clone, Default)]
pub struct RoomUpdate {
    /// New title.
    pub title: Option<String>,
    /// New capacity.
    pub capacity: Option<u32>,
    /// New difficulty.
    pub difficulty: Option<Difficulty>,
    /// New top-level category.
    pub main_category: Option<MainCategory>,
    /// New second-level category.
    pub sub_category: Option<SubCategory>,
    /// New password ("" clears it and makes the room public).
    pub password: Option<String>,
    /// Privacy toggle.
    pub is_private: Option<bool>,
}

/// Outcome of [`Room::leave`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The member departed; if they owned the room, `new_owner` names the
    /// earliest-joined remaining member who inherited it.
    Departed {
        /// New owner, when ownership transferred.
        new_owner: Option<MemberId>,
    },
    /// The last member departed; the room must be deleted.
    Deleted,
}

/// Outcome of [`Room::apply_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// Privacy was requested without a password; the room stayed public.
    /// Must be surfaced to the caller as a warning event.
    pub fell_back_to_public: bool,
}

/// A quiz room aggregate, stored as one versioned JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier.
    pub id: RoomId,
    /// Room title.
    pub title: String,
    /// Current owner; always a member of `players`.
    pub owner_id: MemberId,
    /// Player capacity.
    pub capacity: u32,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Top-level category.
    pub main_category: MainCategory,
    /// Second-level category.
    pub sub_category: SubCategory,
    /// Question difficulty.
    pub difficulty: Difficulty,
    /// Answer format.
    pub answer_type: AnswerType,
    /// Number of questions per game.
    pub problem_count: u32,
    /// Argon2 hash of the room password, when private.
    pub password_hash: Option<String>,
    /// Whether a password is required to join.
    pub is_private: bool,
    /// Members in join order; the first element is never removed without
    /// an ownership decision.
    pub players: Vec<MemberId>,
    /// Members who declared themselves ready; never contains the owner.
    pub ready_players: Vec<MemberId>,
    /// Members barred from joining.
    pub blacklist: Vec<MemberId>,
    /// Store CAS version of the last read; 0 before the first write.
    #[serde(default)]
    pub version: u64,
}

impl Room {
    /// Creates a room in WAITING state with the owner as sole player.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if the title is empty or too
    /// long, the capacity is out of range, or the password is not exactly
    /// four digits.
    pub fn create(id: RoomId, owner_id: MemberId, settings: RoomSettings) -> Result<Self, GatewayError> {
        let title = settings.title.trim().to_string();
        if title.is_empty() {
            return Err(GatewayError::Validation("room title is empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(GatewayError::Validation(format!(
                "room title exceeds {MAX_TITLE_LEN} characters"
            )));
        }
        if settings.capacity < 1 || settings.capacity > MAX_CAPACITY {
            return Err(GatewayError::Validation(format!(
                "capacity must be between 1 and {MAX_CAPACITY}"
            )));
        }
        let password_hash = match settings.password.as_deref() {
            None | Some("") => None,
            Some(password) => Some(hash_password(password)?),
        };

        Ok(Self {
            id,
            title,
            owner_id: owner_id.clone(),
            capacity: settings.capacity,
            status: RoomStatus::Waiting,
            main_category: settings.main_category,
            sub_category: settings.sub_category,
            difficulty: settings.difficulty,
            answer_type: settings.answer_type,
            problem_count: settings.problem_count.max(1),
            is_private: password_hash.is_some(),
            password_hash,
            players: vec![owner_id],
            ready_players: Vec::new(),
            blacklist: Vec::new(),
            version: 0,
        })
    }

    /// Returns `true` if `member` owns the room.
    #[must_use]
    pub fn is_owner(&self, member: &MemberId) -> bool {
        self.owner_id == *member
    }

    /// Returns `true` if the room is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.players.len() as u32 >= self.capacity
    }

    /// Returns `true` if `member` is in the room.
    #[must_use]
    pub fn has_player(&self, member: &MemberId) -> bool {
        self.players.contains(member)
    }

    /// Returns `true` if `member` has declared ready.
    #[must_use]
    pub fn is_ready(&self, member: &MemberId) -> bool {
        self.ready_players.contains(member)
    }

    /// Verifies a join password against the stored hash. Public rooms
    /// accept anything. The Argon2 verification is the constant-time
    /// comparison for private rooms.
    #[must_use]
    pub fn validate_password(&self, input: Option<&str>) -> bool {
        if !self.is_private {
            return true;
        }
        let Some(hash) = self.password_hash.as_deref() else {
            return false;
        };
        let Some(input) = input.filter(|p| !p.is_empty()) else {
            return false;
        };
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(input.as_bytes(), &parsed)
            .is_ok()
    }

    /// Adds `member` to the room.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Blacklisted`] for barred members,
    /// [`GatewayError::RoomFull`] at capacity,
    /// [`GatewayError::WrongPassword`] on a private-room mismatch, and
    /// [`GatewayError::Conflict`] if the member is already present.
    pub fn join(&mut self, member: MemberId, password: Option<&str>) -> Result<(), GatewayError> {
        if self.blacklist.contains(&member) {
            return Err(GatewayError::Blacklisted);
        }
        if self.has_player(&member) {
            return Err(GatewayError::Conflict("already in this room".to_string()));
        }
        if self.is_full() {
            return Err(GatewayError::RoomFull);
        }
        if !self.validate_password(password) {
            return Err(GatewayError::WrongPassword);
        }
        self.players.push(member);
        Ok(())
    }

    /// Removes `member` from the room, transferring ownership or deleting
    /// the room as needed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotMember`] if `member` is not in the room.
    pub fn leave(&mut self, member: &MemberId) -> Result<LeaveOutcome, GatewayError> {
        if !self.has_player(member) {
            return Err(GatewayError::NotMember);
        }
        self.players.retain(|p| p != member);
        self.ready_players.retain(|p| p != member);

        if self.players.is_empty() {
            return Ok(LeaveOutcome::Deleted);
        }

        let mut new_owner = None;
        if self.is_owner(member) {
            // Earliest-joined remaining member inherits the room.
            if let Some(successor) = self.players.first().cloned() {
                self.change_owner(successor.clone());
                new_owner = Some(successor);
            }
        }
        Ok(LeaveOutcome::Departed { new_owner })
    }

    /// Transfers ownership and clears the new owner's ready flag.
    pub fn change_owner(&mut self, new_owner: MemberId) {
        self.ready_players.retain(|p| p != &new_owner);
        self.owner_id = new_owner;
    }

    /// Flips `member`'s ready flag. The owner's readiness is implicit and
    /// this call is a no-op for them.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotMember`] if `member` is not in the room.
    pub fn toggle_ready(&mut self, member: &MemberId) -> Result<bool, GatewayError> {
        if !self.has_player(member) {
            return Err(GatewayError::NotMember);
        }
        if self.is_owner(member) {
            return Ok(false);
        }
        if self.is_ready(member) {
            self.ready_players.retain(|p| p != member);
            Ok(false)
        } else {
            self.ready_players.push(member.clone());
            Ok(true)
        }
    }

    /// Returns `true` when every non-owner player is ready. A room with
    /// only the owner present is vacuously ready.
    #[must_use]
    pub fn all_players_ready(&self) -> bool {
        let non_owner_count = self
            .players
            .iter()
            .filter(|&p| !self.is_owner(p))
            .count();
        non_owner_count == self.ready_players.len()
    }

    /// Starts the game: WAITING → IN_GAME.
    ///
    /// Before the transition, `ready_players` is reconciled against the
    /// current player set; a stale entry means someone left while the
    /// start was in flight, so the call fails instead of silently
    /// starting.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotOwner`] for non-owners,
    /// [`GatewayError::InvalidState`] for an empty room or a room already
    /// in game, [`GatewayError::NotAllReady`] when readiness is
    /// incomplete, and [`GatewayError::PlayerLeftDuringStart`] when the
    /// reconciliation purges a stale ready flag.
    pub fn start_game(&mut self, caller: &MemberId) -> Result<(), GatewayError> {
        if !self.is_owner(caller) {
            return Err(GatewayError::NotOwner);
        }
        if self.status == RoomStatus::InGame {
            return Err(GatewayError::Conflict("game already started".to_string()));
        }
        if self.players.is_empty() {
            return Err(GatewayError::InvalidState("room has no players".to_string()));
        }
        if !self.all_players_ready() {
            return Err(GatewayError::NotAllReady);
        }

        let stale: Vec<MemberId> = self
            .ready_players
            .iter()
            .filter(|&r| !self.players.contains(r))
            .cloned()
            .collect();
        if !stale.is_empty() {
            self.ready_players.retain(|r| !stale.contains(r));
            return Err(GatewayError::PlayerLeftDuringStart);
        }

        self.status = RoomStatus::InGame;
        Ok(())
    }

    /// Ends the game: IN_GAME → WAITING, readiness cleared.
    pub fn end_game(&mut self) {
        self.status = RoomStatus::Waiting;
        self.ready_players.clear();
    }

    /// Adds `target` to the blacklist, removing them from the room if
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotOwner`] if `caller` does not own the
    /// room.
    pub fn add_to_blacklist(
        &mut self,
        caller: &MemberId,
        target: MemberId,
    ) -> Result<(), GatewayError> {
        if !self.is_owner(caller) {
            return Err(GatewayError::NotOwner);
        }
        if !self.blacklist.contains(&target) {
            self.blacklist.push(target.clone());
        }
        self.players.retain(|p| p != &target);
        self.ready_players.retain(|p| p != &target);
        Ok(())
    }

    /// Applies a partial settings update. Only present fields overwrite.
    /// Enabling privacy without a password keeps the room public; the
    /// outcome flags it so the caller can publish a warning.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] on an empty/overlong title,
    /// out-of-range capacity (including below the current player count),
    /// or a malformed password.
    pub fn apply_update(&mut self, update: RoomUpdate) -> Result<UpdateOutcome, GatewayError> {
        if let Some(title) = &update.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(GatewayError::Validation("room title is empty".to_string()));
            }
            if title.chars().count() > MAX_TITLE_LEN {
                return Err(GatewayError::Validation(format!(
                    "room title exceeds {MAX_TITLE_LEN} characters"
                )));
            }
            self.title = title.to_string();
        }
        if let Some(capacity) = update.capacity {
            if capacity < 1 || capacity > MAX_CAPACITY {
                return Err(GatewayError::Validation(format!(
                    "capacity must be between 1 and {MAX_CAPACITY}"
                )));
            }
            if (self.players.len() as u32) > capacity {
                return Err(GatewayError::Validation(
                    "capacity below current player count".to_string(),
                ));
            }
            self.capacity = capacity;
        }
        if let Some(difficulty) = update.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(main_category) = update.main_category {
            self.main_category = main_category;
        }
        if let Some(sub_category) = update.sub_category {
            self.sub_category = sub_category;
        }

        let mut outcome = UpdateOutcome::default();
        match (update.is_private, update.password.as_deref()) {
            (Some(true), Some(password)) if !password.is_empty() => {
                self.password_hash = Some(hash_password(password)?);
                self.is_private = true;
            }
            (Some(true), _) => {
                // Privacy without a password falls back to public.
                self.password_hash = None;
                self.is_private = false;
                outcome.fell_back_to_public = true;
            }
            (Some(false), _) => {
                self.password_hash = None;
                self.is_private = false;
            }
            (None, Some(password)) => {
                if password.is_empty() {
                    self.password_hash = None;
                    self.is_private = false;
                } else {
                    self.password_hash = Some(hash_password(password)?);
                    self.is_private = true;
                }
            }
            (None, None) => {}
        }
        Ok(outcome)
    }
}

/// Hashes a room password with Argon2, validating the 4-digit format
/// first.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] when the password is not exactly
/// four ASCII digits, or [`GatewayError::Internal`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, GatewayError> {
    if password.len() != 4 || !password.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::Validation(
            "room password must be exactly 4 digits".to_string(),
        ));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GatewayError::Internal(format!("password hashing failed: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn settings(password: Option<&str>) -> RoomSettings {
        RoomSettings {
            title: "Friday trivia".to_string(),
            capacity: 4,
            main_category: MainCategory::Science,
            sub_category: SubCategory::Physics,
            difficulty: Difficulty::Normal,
            answer_type: AnswerType::MultipleChoice,
            problem_count: 5,
            password: password.map(str::to_string),
        }
    }

    fn make_room() -> Room {
        let room = Room::create(RoomId::new(), MemberId::from("owner"), settings(None));
        let Ok(room) = room else {
            panic!("room creation failed");
        };
        room
    }

    #[test]
    fn create_adds_owner_as_sole_player() {
        let room = make_room();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.players, vec![MemberId::from("owner")]);
        assert!(!room.is_private);
    }

    #[test]
    fn create_rejects_bad_titles_and_capacity() {
        let mut s = settings(None);
        s.title = "   ".to_string();
        assert!(Room::create(RoomId::new(), MemberId::from("o"), s).is_err());

        let mut s = settings(None);
        s.title = "x".repeat(31);
        assert!(Room::create(RoomId::new(), MemberId::from("o"), s).is_err());

        let mut s = settings(None);
        s.capacity = 9;
        assert!(Room::create(RoomId::new(), MemberId::from("o"), s).is_err());
    }

    #[test]
    fn create_rejects_non_numeric_password() {
        let result = Room::create(RoomId::new(), MemberId::from("o"), settings(Some("abcd")));
        assert!(matches!(result, Err(GatewayError::Validation(_))));

        let result = Room::create(RoomId::new(), MemberId::from("o"), settings(Some("12345")));
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[test]
    fn private_room_password_round_trip() {
        let room = Room::create(RoomId::new(), MemberId::from("o"), settings(Some("0042")));
        let Ok(room) = room else {
            panic!("room creation failed");
        };
        assert!(room.is_private);
        assert!(room.validate_password(Some("0042")));
        assert!(!room.validate_password(Some("0043")));
        assert!(!room.validate_password(None));
        assert!(!room.validate_password(Some("")));
    }

    #[test]
    fn join_rejects_blacklisted_full_and_duplicates() {
        let mut room = make_room();
        room.blacklist.push(MemberId::from("bad"));
        assert!(matches!(
            room.join(MemberId::from("bad"), None),
            Err(GatewayError::Blacklisted)
        ));

        assert!(room.join(MemberId::from("a"), None).is_ok());
        assert!(matches!(
            room.join(MemberId::from("a"), None),
            Err(GatewayError::Conflict(_))
        ));

        assert!(room.join(MemberId::from("b"), None).is_ok());
        assert!(room.join(MemberId::from("c"), None).is_ok());
        assert!(matches!(
            room.join(MemberId::from("d"), None),
            Err(GatewayError::RoomFull)
        ));
    }

    #[test]
    fn join_private_requires_password() {
        let room = Room::create(RoomId::new(), MemberId::from("o"), settings(Some("1234")));
        let Ok(mut room) = room else {
            panic!("room creation failed");
        };
        assert!(matches!(
            room.join(MemberId::from("a"), Some("9999")),
            Err(GatewayError::WrongPassword)
        ));
        assert!(room.join(MemberId::from("a"), Some("1234")).is_ok());
        assert!(room.has_player(&MemberId::from("a")));
    }

    #[test]
    fn owner_leave_transfers_to_earliest_joined() {
        let mut room = make_room();
        let _ = room.join(MemberId::from("a"), None);
        let _ = room.join(MemberId::from("b"), None);
        let _ = room.toggle_ready(&MemberId::from("a"));

        let outcome = room.leave(&MemberId::from("owner"));
        assert_eq!(
            outcome.ok(),
            Some(LeaveOutcome::Departed {
                new_owner: Some(MemberId::from("a"))
            })
        );
        assert_eq!(room.owner_id, MemberId::from("a"));
        // The new owner's ready flag is cleared.
        assert!(!room.is_ready(&MemberId::from("a")));
        assert!(!room.has_player(&MemberId::from("owner")));
    }

    #[test]
    fn last_leave_deletes_room() {
        let mut room = make_room();
        let outcome = room.leave(&MemberId::from("owner"));
        assert_eq!(outcome.ok(), Some(LeaveOutcome::Deleted));
    }

    #[test]
    fn toggle_ready_is_noop_for_owner() {
        let mut room = make_room();
        assert_eq!(room.toggle_ready(&MemberId::from("owner")).ok(), Some(false));
        assert!(room.ready_players.is_empty());
    }

    #[test]
    fn toggle_ready_flips_for_members() {
        let mut room = make_room();
        let _ = room.join(MemberId::from("a"), None);
        assert_eq!(room.toggle_ready(&MemberId::from("a")).ok(), Some(true));
        assert_eq!(room.toggle_ready(&MemberId::from("a")).ok(), Some(false));
    }

    #[test]
    fn start_requires_owner_and_full_readiness() {
        let mut room = make_room();
        let _ = room.join(MemberId::from("a"), None);

        assert!(matches!(
            room.start_game(&MemberId::from("a")),
            Err(GatewayError::NotOwner)
        ));
        assert!(matches!(
            room.start_game(&MemberId::from("owner")),
            Err(GatewayError::NotAllReady)
        ));

        let _ = room.toggle_ready(&MemberId::from("a"));
        assert!(room.start_game(&MemberId::from("owner")).is_ok());
        assert_eq!(room.status, RoomStatus::InGame);
    }

    #[test]
    fn start_with_owner_alone_is_vacuously_ready() {
        let mut room = make_room();
        assert!(room.start_game(&MemberId::from("owner")).is_ok());
    }

    #[test]
    fn start_purges_stale_ready_flags_and_fails() {
        let mut room = make_room();
        let _ = room.join(MemberId::from("a"), None);
        let _ = room.toggle_ready(&MemberId::from("a"));
        // Simulate a leave that raced the start: the player is gone from
        // `players` but the ready flag survived.
        room.players.retain(|p| p.as_str() != "a");

        let result = room.start_game(&MemberId::from("owner"));
        assert!(matches!(result, Err(GatewayError::PlayerLeftDuringStart)));
        assert!(room.ready_players.is_empty());
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[test]
    fn end_game_clears_readiness() {
        let mut room = make_room();
        let _ = room.join(MemberId::from("a"), None);
        let _ = room.toggle_ready(&MemberId::from("a"));
        let _ = room.start_game(&MemberId::from("owner"));

        room.end_game();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert!(room.ready_players.is_empty());
    }

    #[test]
    fn blacklist_ejects_target() {
        let mut room = make_room();
        let _ = room.join(MemberId::from("a"), None);
        let _ = room.toggle_ready(&MemberId::from("a"));

        let result = room.add_to_blacklist(&MemberId::from("owner"), MemberId::from("a"));
        assert!(result.is_ok());
        assert!(!room.has_player(&MemberId::from("a")));
        assert!(!room.is_ready(&MemberId::from("a")));
        assert!(matches!(
            room.join(MemberId::from("a"), None),
            Err(GatewayError::Blacklisted)
        ));
    }

    #[test]
    fn update_privacy_without_password_falls_back_to_public() {
        let mut room = make_room();
        let update = RoomUpdate {
            is_private: Some(true),
            ..RoomUpdate::default()
        };
        let outcome = room.apply_update(update);
        let Ok(outcome) = outcome else {
            panic!("update failed");
        };
        assert!(outcome.fell_back_to_public);
        assert!(!room.is_private);
        assert!(room.password_hash.is_none());
    }

    #[test]
    fn update_rejects_capacity_below_player_count() {
        let mut room = make_room();
        let _ = room.join(MemberId::from("a"), None);
        let update = RoomUpdate {
            capacity: Some(1),
            ..RoomUpdate::default()
        };
        assert!(matches!(
            room.apply_update(update),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn update_only_overwrites_present_fields() {
        let mut room = make_room();
        let update = RoomUpdate {
            title: Some("Rematch".to_string()),
            difficulty: Some(Difficulty::Hard),
            ..RoomUpdate::default()
        };
        let result = room.apply_update(update);
        assert!(result.is_ok());
        assert_eq!(room.title, "Rematch");
        assert_eq!(room.difficulty, Difficulty::Hard);
        assert_eq!(room.capacity, 4);
        assert_eq!(room.main_category, MainCategory::Science);
    }
}
