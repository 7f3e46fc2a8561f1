//! REST DTO types.

pub mod room_dto;

pub use room_dto::{
    CreateRoomRequest, JoinRoomParams, LeaveWithIdParams, RoomResponse, UpdateRoomRequest,
};
