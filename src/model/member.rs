use serde::{Deserialize, Serialize};

use super::{reject_blank, require_filled, Timestamp};
use crate::error::LibraryError;
use crate::Record;

/// A library member.
///
/// `books_checked_out` is a denormalized counter. Nothing ties it to the
/// status of any [`Book`](crate::Book); callers update both independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(collection = "members")]
pub struct Member {
    pub id: String,
    pub name: String,
    /// Search key. Not enforced unique.
    pub email: String,
    #[record(created)]
    pub joined_at: Timestamp,
    pub books_checked_out: u32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub books_checked_out: u32,
    pub is_active: bool,
}

impl NewMember {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            books_checked_out: 0,
            is_active: true,
        }
    }

    pub fn validate(&self) -> Result<(), LibraryError> {
        require_filled(&[("name", self.name.as_str()), ("email", self.email.as_str())])
    }

    pub(crate) fn into_member(self, id: String, now: Timestamp) -> Member {
        Member {
            id,
            name: self.name,
            email: self.email,
            joined_at: now,
            books_checked_out: self.books_checked_out,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub books_checked_out: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl MemberPatch {
    pub fn validate(&self) -> Result<(), LibraryError> {
        reject_blank(&[
            ("name", self.name.as_deref()),
            ("email", self.email.as_deref()),
        ])
    }

    pub fn apply_to(&self, member: &mut Member) {
        if let Some(name) = &self.name {
            member.name = name.clone();
        }
        if let Some(email) = &self.email {
            member.email = email.clone();
        }
        if let Some(count) = self.books_checked_out {
            member.books_checked_out = count;
        }
        if let Some(active) = self.is_active {
            member.is_active = active;
        }
    }
}
