//! User tools.

pub mod get;
pub mod write;

pub use get::{UserGetParams, get_impl};
pub use write::{
    UserCreateParams, UserDeleteParams, UserUpdateParams, create_impl, delete_impl, update_impl,
};
