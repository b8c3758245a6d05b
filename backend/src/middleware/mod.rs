pub mod identity;

pub use identity::{assign_identity, extract_user_id};
