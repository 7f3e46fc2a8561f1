//! Room lifecycle coordinator.
//!
//! Orchestrates every room operation as read → mutate → CAS-write against
//! the shared store, then emits the matching events with a refreshed
//! membership snapshot. A lost CAS surfaces as
//! [`GatewayError::VersionConflict`] and is retried by the caller, never
//! blind-overwritten, which linearizes all mutation per room and keeps
//! `|players| <= capacity` under concurrent joins.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use super::keys;
use crate::domain::room::{LeaveOutcome, RoomSettings, RoomUpdate};
use crate::domain::{EventBus, MemberId, MemberInfo, QuizId, Room, RoomEvent, RoomId, RoomStatus};
use crate::error::GatewayError;
use crate::external::MemberDirectory;
use crate::store::{SharedStore, StoreError};

/// Room lifecycle coordinator over the shared store.
#[derive(Debug, Clone)]
pub struct RoomService {
    store: Arc<dyn SharedStore>,
    event_bus: EventBus,
    directory: Arc<dyn MemberDirectory>,
}

impl RoomService {
    /// Creates a room service.
    #[must_use]
    pub fn new(
        store: Arc<dyn SharedStore>,
        event_bus: EventBus,
        directory: Arc<dyn MemberDirectory>,
    ) -> Self {
        Self {
            store,
            event_bus,
            directory,
        }
    }

    /// Loads a room aggregate, carrying its CAS version.
    async fn load(&self, room_id: RoomId) -> Result<Room, GatewayError> {
        let versioned = self
            .store
            .get_versioned(&keys::room(room_id))
            .await?
            .ok_or(GatewayError::RoomNotFound(*room_id.as_uuid()))?;
        let mut room: Room = serde_json::from_str(&versioned.value)
            .map_err(|e| GatewayError::Internal(format!("room decode failed: {e}")))?;
        room.version = versioned.version;
        Ok(room)
    }

    /// CAS-writes a room aggregate; updates `room.version` on success.
    async fn save(&self, room: &mut Room) -> Result<(), GatewayError> {
        let json = serde_json::to_string(room)
            .map_err(|e| GatewayError::Internal(format!("room encode failed: {e}")))?;
        let new_version = self
            .store
            .put_versioned(&keys::room(room.id), &json, room.version, None)
            .await
            .map_err(|e| match e {
                StoreError::VersionMismatch { .. } => {
                    GatewayError::VersionConflict(format!("room {}", room.id))
                }
                other => other.into(),
            })?;
        room.version = new_version;
        Ok(())
    }

    /// Creates a room with the owner as sole player and indexes it for
    /// the lobby listing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] on bad settings.
    pub async fn create(
        &self,
        owner: MemberId,
        settings: RoomSettings,
    ) -> Result<Room, GatewayError> {
        let mut room = Room::create(RoomId::new(), owner, settings)?;
        self.save(&mut room).await?;
        self.store
            .set_add(keys::ROOMS_INDEX, &room.id.to_string(), None)
            .await?;
        tracing::info!(room = %room.id, owner = %room.owner_id, "room created");
        Ok(room)
    }

    /// Fetches a room by id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RoomNotFound`] when absent.
    pub async fn get(&self, room_id: RoomId) -> Result<Room, GatewayError> {
        self.load(room_id).await
    }

    /// Lists all active rooms, pruning index entries whose room is gone.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn list_active(&self) -> Result<Vec<Room>, GatewayError> {
        let ids = self.store.set_members(keys::ROOMS_INDEX).await?;
        let mut rooms = Vec::with_capacity(ids.len());
        for raw in ids {
            let Ok(uuid) = raw.parse::<uuid::Uuid>() else {
                continue;
            };
            match self.load(RoomId::from_uuid(uuid)).await {
                Ok(room) => rooms.push(room),
                Err(GatewayError::RoomNotFound(_)) => {
                    self.store.set_remove(keys::ROOMS_INDEX, &raw).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(rooms)
    }

    /// Adds `caller` to a room and announces the join.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RoomNotFound`], [`GatewayError::Blacklisted`],
    /// [`GatewayError::RoomFull`], [`GatewayError::WrongPassword`], or
    /// [`GatewayError::VersionConflict`] on a lost race.
    pub async fn join(
        &self,
        room_id: RoomId,
        caller: MemberId,
        password: Option<&str>,
    ) -> Result<Room, GatewayError> {
        let mut room = self.load(room_id).await?;
        room.join(caller.clone(), password)?;
        self.save(&mut room).await?;

        let members = self.member_snapshot(&room).await?;
        self.event_bus.publish(RoomEvent::MemberJoined {
            room_id,
            member_id: caller.clone(),
            members,
            timestamp: Utc::now(),
        });
        tracing::info!(room = %room_id, member = %caller, "member joined");
        Ok(room)
    }

    /// Removes `caller` from a room: transfers ownership to the
    /// earliest-joined remaining member, or deletes the room when empty.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotMember`] if the caller is not in the
    /// room, or [`GatewayError::VersionConflict`] on a lost race.
    pub async fn leave(&self, room_id: RoomId, caller: MemberId) -> Result<(), GatewayError> {
        let mut room = self.load(room_id).await?;
        let outcome = room.leave(&caller)?;
        // The CAS write claims the leave; only the winner deletes or
        // announces, so the room-deleted event fires exactly once.
        self.save(&mut room).await?;

        match outcome {
            LeaveOutcome::Deleted => {
                self.store.remove(&keys::room(room_id)).await?;
                self.store
                    .set_remove(keys::ROOMS_INDEX, &room_id.to_string())
                    .await?;
                self.store.remove(&keys::room_quiz(room_id)).await?;
                self.store.remove(&keys::room_game_status(room_id)).await?;
                self.event_bus.publish(RoomEvent::RoomDeleted {
                    room_id,
                    timestamp: Utc::now(),
                });
                tracing::info!(room = %room_id, "room deleted after last member left");
            }
            LeaveOutcome::Departed { new_owner } => {
                let members = self.member_snapshot(&room).await?;
                self.event_bus.publish(RoomEvent::MemberLeft {
                    room_id,
                    member_id: caller.clone(),
                    members: members.clone(),
                    timestamp: Utc::now(),
                });
                if let Some(new_owner) = new_owner {
                    self.event_bus.publish(RoomEvent::OwnerChanged {
                        room_id,
                        previous_owner: caller.clone(),
                        new_owner: new_owner.clone(),
                        members,
                        timestamp: Utc::now(),
                    });
                    tracing::info!(room = %room_id, new_owner = %new_owner, "ownership transferred");
                }
                tracing::info!(room = %room_id, member = %caller, "member left");
            }
        }
        Ok(())
    }

    /// Flips the caller's ready flag and announces the change. Owners are
    /// implicitly ready; for them this is a no-op without an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotMember`] or
    /// [`GatewayError::VersionConflict`].
    pub async fn toggle_ready(
        &self,
        room_id: RoomId,
        caller: MemberId,
    ) -> Result<bool, GatewayError> {
        let mut room = self.load(room_id).await?;
        if room.is_owner(&caller) {
            return Ok(false);
        }
        let is_ready = room.toggle_ready(&caller)?;
        self.save(&mut room).await?;

        let members = self.member_snapshot(&room).await?;
        self.event_bus.publish(RoomEvent::ReadyChanged {
            room_id,
            member_id: caller,
            is_ready,
            members,
            timestamp: Utc::now(),
        });
        Ok(is_ready)
    }

    /// Starts the game (owner only, all non-owners ready) and announces
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotOwner`], [`GatewayError::NotAllReady`],
    /// [`GatewayError::PlayerLeftDuringStart`],
    /// [`GatewayError::InvalidState`], or
    /// [`GatewayError::VersionConflict`].
    pub async fn start(&self, room_id: RoomId, caller: MemberId) -> Result<Room, GatewayError> {
        let mut room = self.load(room_id).await?;
        let transition = room.start_game(&caller);
        if matches!(transition, Err(GatewayError::PlayerLeftDuringStart)) {
            // Persist the defensive purge so retries see clean flags.
            self.save(&mut room).await?;
        }
        transition?;
        self.save(&mut room).await?;

        let quiz_id = self.bound_quiz(room_id).await?;
        let members = self.member_snapshot(&room).await?;
        self.event_bus.publish(RoomEvent::GameStarted {
            room_id,
            quiz_id,
            members,
            timestamp: Utc::now(),
        });
        tracing::info!(room = %room_id, "game started");
        Ok(room)
    }

    /// Ends the game, clearing readiness, and announces it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RoomNotFound`] or
    /// [`GatewayError::VersionConflict`].
    pub async fn end(&self, room_id: RoomId) -> Result<Room, GatewayError> {
        let mut room = self.load(room_id).await?;
        room.end_game();
        self.save(&mut room).await?;

        let members = self.member_snapshot(&room).await?;
        self.event_bus.publish(RoomEvent::GameEnded {
            room_id,
            members,
            timestamp: Utc::now(),
        });
        tracing::info!(room = %room_id, "game ended");
        Ok(room)
    }

    /// Blacklists `target` (owner only), ejecting them from the room.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotOwner`] or
    /// [`GatewayError::VersionConflict`].
    pub async fn add_to_blacklist(
        &self,
        room_id: RoomId,
        caller: MemberId,
        target: MemberId,
    ) -> Result<(), GatewayError> {
        let mut room = self.load(room_id).await?;
        room.add_to_blacklist(&caller, target.clone())?;
        self.save(&mut room).await?;

        let members = self.member_snapshot(&room).await?;
        self.event_bus.publish(RoomEvent::MemberLeft {
            room_id,
            member_id: target.clone(),
            members,
            timestamp: Utc::now(),
        });
        tracing::info!(room = %room_id, target = %target, "member blacklisted");
        Ok(())
    }

    /// Applies a settings patch (owner only) and announces the update.
    /// A privacy request without a password stays public and additionally
    /// publishes a warning event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotOwner`], [`GatewayError::Validation`],
    /// or [`GatewayError::VersionConflict`].
    pub async fn update(
        &self,
        room_id: RoomId,
        caller: MemberId,
        patch: RoomUpdate,
    ) -> Result<Room, GatewayError> {
        let mut room = self.load(room_id).await?;
        if !room.is_owner(&caller) {
            return Err(GatewayError::NotOwner);
        }
        let outcome = room.apply_update(patch)?;
        self.save(&mut room).await?;

        let members = self.member_snapshot(&room).await?;
        self.event_bus.publish(RoomEvent::RoomUpdated {
            room_id,
            members,
            timestamp: Utc::now(),
        });
        if outcome.fell_back_to_public {
            self.event_bus.publish(RoomEvent::SettingsWarning {
                room_id,
                message: "privacy requires a password; the room stays public".to_string(),
                timestamp: Utc::now(),
            });
            tracing::warn!(room = %room_id, "privacy requested without a password; staying public");
        }
        Ok(room)
    }

    /// Reads the quiz bound to a room, when a game is in flight.
    async fn bound_quiz(&self, room_id: RoomId) -> Result<Option<QuizId>, GatewayError> {
        let Some(raw) = self.store.get(&keys::room_quiz(room_id)).await? else {
            return Ok(None);
        };
        Ok(raw.parse::<uuid::Uuid>().ok().map(QuizId::from_uuid))
    }

    /// Builds the membership list attached to room events: display names
    /// in join order with ready/owner flags, plus per-member submission
    /// flags while a game is running.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Store`] on store failures.
    pub async fn member_snapshot(&self, room: &Room) -> Result<Vec<MemberInfo>, GatewayError> {
        let submitted: Option<BTreeSet<String>> = if room.status == RoomStatus::InGame {
            match self.bound_quiz(room.id).await? {
                Some(quiz_id) => {
                    let current = self
                        .store
                        .get(&keys::quiz_current_round(quiz_id))
                        .await?
                        .and_then(|raw| raw.parse::<u32>().ok())
                        .unwrap_or(0);
                    let members = self
                        .store
                        .set_members(&keys::quiz_submitted(quiz_id, current + 1))
                        .await?;
                    Some(members.into_iter().collect())
                }
                None => None,
            }
        } else {
            None
        };

        let mut infos = Vec::with_capacity(room.players.len());
        for player in &room.players {
            let name = self.directory.display_name(player).await;
            infos.push(MemberInfo {
                id: player.clone(),
                name,
                is_ready: room.is_ready(player),
                is_owner: room.is_owner(player),
                is_submitted: submitted
                    .as_ref()
                    .map(|set| set.contains(player.as_str())),
            });
        }
        Ok(infos)
    }
}
