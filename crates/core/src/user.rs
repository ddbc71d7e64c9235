//! Gateway user accounts.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A dashboard user. Jobs and the realtime channel are scoped per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}
