//! Core data types shared across the authorization server.

pub mod client;
pub mod user;

pub use client::{
    CibaDeliveryMode, Client, GrantType, ResponseType, ResponseTypeSet, TokenEndpointAuthMethod,
};
pub use user::User;
