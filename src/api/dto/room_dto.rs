//! Request/response DTOs for room management endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Room;
use crate::domain::room::{
    AnswerType, DEFAULT_PROBLEM_COUNT, Difficulty, MainCategory, RoomSettings, RoomStatus,
    RoomUpdate, SubCategory,
};

/// Body of `POST /rooms`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    /// Room title (non-empty, at most 30 characters).
    pub title: String,
    /// Player capacity (1..=8).
    pub capacity: u32,
    /// Top-level category.
    pub main_category: MainCategory,
    /// Second-level category.
    pub sub_category: SubCategory,
    /// Question difficulty.
    pub difficulty: Difficulty,
    /// Answer format. Defaults to multiple choice.
    #[serde(default = "default_answer_type")]
    pub answer_type: AnswerType,
    /// Number of questions per game. Defaults to 5.
    #[serde(default = "default_problem_count")]
    pub problem_count: u32,
    /// Optional 4-digit numeric password; presence makes the room
    /// private.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_answer_type() -> AnswerType {
    AnswerType::MultipleChoice
}

fn default_problem_count() -> u32 {
    DEFAULT_PROBLEM_COUNT
}

impl From<CreateRoomRequest> for RoomSettings {
    fn from(req: CreateRoomRequest) -> Self {
        Self {
            title: req.title,
            capacity: req.capacity,
            main_category: req.main_category,
            sub_category: req.sub_category,
            difficulty: req.difficulty,
            answer_type: req.answer_type,
            problem_count: req.problem_count,
            password: req.password,
        }
    }
}

/// Body of `PUT /rooms/{id}`. Every field is optional; only present
/// fields overwrite.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateRoomRequest {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// New difficulty.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// New top-level category.
    #[serde(default)]
    pub main_category: Option<MainCategory>,
    /// New second-level category.
    #[serde(default)]
    pub sub_category: Option<SubCategory>,
    /// New password ("" clears it).
    #[serde(default)]
    pub password: Option<String>,
    /// Privacy toggle.
    #[serde(default)]
    pub is_private: Option<bool>,
}

impl From<UpdateRoomRequest> for RoomUpdate {
    fn from(req: UpdateRoomRequest) -> Self {
        Self {
            title: req.title,
            capacity: req.capacity,
            difficulty: req.difficulty,
            main_category: req.main_category,
            sub_category: req.sub_category,
            password: req.password,
            is_private: req.is_private,
        }
    }
}

/// Room representation returned by the REST API. The password hash never
/// leaves the server.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomResponse {
    /// Room identifier.
    pub room_id: uuid::Uuid,
    /// Room title.
    pub title: String,
    /// Current owner identity.
    pub owner_id: String,
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
    /// Whether a password is required to join.
    pub is_private: bool,
    /// Member identities in join order.
    pub players: Vec<String>,
    /// Members currently ready.
    pub ready_players: Vec<String>,
    /// Optimistic-concurrency version for conditional updates.
    pub version: u64,
}

impl From<&Room> for RoomResponse {
    fn from(room: &Room) -> Self {
        Self {
            room_id: *room.id.as_uuid(),
            title: room.title.clone(),
            owner_id: room.owner_id.to_string(),
            capacity: room.capacity,
            status: room.status,
            main_category: room.main_category,
            sub_category: room.sub_category,
            difficulty: room.difficulty,
            answer_type: room.answer_type,
            problem_count: room.problem_count,
            is_private: room.is_private,
            players: room.players.iter().map(ToString::to_string).collect(),
            ready_players: room.ready_players.iter().map(ToString::to_string).collect(),
            version: room.version,
        }
    }
}

/// Query parameters for `POST /rooms/{id}/join`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct JoinRoomParams {
    /// Password for private rooms.
    #[serde(default)]
    pub password: Option<String>,
}

/// Query parameters for `POST /rooms/{id}/leave-with-id`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LeaveWithIdParams {
    /// Identity of the member leaving (browser-close cleanup path).
    pub user_id: String,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{MemberId, RoomId};

    #[test]
    fn response_never_exposes_password_hash() {
        let settings = RoomSettings {
            title: "Secret".to_string(),
            capacity: 4,
            main_category: MainCategory::General,
            sub_category: SubCategory::Mixed,
            difficulty: Difficulty::Easy,
            answer_type: AnswerType::MultipleChoice,
            problem_count: 5,
            password: Some("1234".to_string()),
        };
        let room = Room::create(RoomId::new(), MemberId::from("owner"), settings);
        let Ok(room) = room else {
            panic!("create failed");
        };
        let response = RoomResponse::from(&room);
        let json = serde_json::to_string(&response).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert!(response.is_private);
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn create_request_defaults_apply() {
        let json = serde_json::json!({
            "title": "Morning quiz",
            "capacity": 4,
            "main_category": "science",
            "sub_category": "physics",
            "difficulty": "normal",
        });
        let request: Result<CreateRoomRequest, _> = serde_json::from_value(json);
        let Ok(request) = request else {
            panic!("decode failed");
        };
        assert_eq!(request.problem_count, DEFAULT_PROBLEM_COUNT);
        assert_eq!(request.answer_type, AnswerType::MultipleChoice);
        assert!(request.password.is_none());
    }
}
