//! Announcements and direct messages.

use super::Role;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
    /// `None` targets every role.
    pub target_role: Option<Role>,
    pub target_class_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Announcement {
    pub fn is_visible_to(&self, audience: &Audience) -> bool {
        match audience {
            Audience::Everyone => true,
            Audience::Role { role, class_id } => {
                self.target_role.is_none()
                    || self.target_role == Some(*role)
                    || (class_id.is_some() && self.target_class_id == *class_id)
            }
        }
    }
}

/// Who an announcement listing is for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    /// Untargeted announcements, those for `role`, and (when set) those for `class_id`.
    Role { role: Role, class_id: Option<i64> },
}

#[derive(Clone, Debug)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub target_role: Option<Role>,
    pub target_class_id: Option<i64>,
    pub created_by: i64,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub subject: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Clone, Debug)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub subject: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announcement(target_role: Option<Role>, target_class_id: Option<i64>) -> Announcement {
        Announcement {
            id: 1,
            title: "Sports day".into(),
            content: String::new(),
            target_role,
            target_class_id,
            created_by: 1,
            created_at: Utc::now(),
            is_active: true,
        }
    }

    #[test]
    fn student_sees_own_role_untargeted_and_own_class() {
        let audience = Audience::Role { role: Role::Student, class_id: Some(7) };
        assert!(announcement(None, None).is_visible_to(&audience));
        assert!(announcement(Some(Role::Student), None).is_visible_to(&audience));
        assert!(announcement(Some(Role::Teacher), Some(7)).is_visible_to(&audience));
        assert!(!announcement(Some(Role::Teacher), Some(8)).is_visible_to(&audience));
        assert!(!announcement(Some(Role::Parent), None).is_visible_to(&audience));
    }

    #[test]
    fn class_target_ignored_without_class() {
        let audience = Audience::Role { role: Role::Parent, class_id: None };
        assert!(!announcement(Some(Role::Teacher), Some(7)).is_visible_to(&audience));
        assert!(announcement(None, Some(7)).is_visible_to(&audience));
    }
}
