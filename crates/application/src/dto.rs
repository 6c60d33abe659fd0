use chrono::NaiveDate;
use domain::{CrossedPath, GeoPoint, Match, Message, Timestamp, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 对外公开的用户档案，不含任何凭据字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub gender: String,
    pub interests: Vec<String>,
    pub birth: Option<NaiveDate>,
    pub location: Option<GeoPoint>,
    pub email_verified: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            name: user.name.clone(),
            bio: user.bio.clone(),
            gender: user.gender.clone(),
            interests: user.interests.clone(),
            birth: user.birth,
            location: user.location,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// 发现/队列的分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePage {
    pub users: Vec<PublicProfile>,
    pub next: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeOutcome {
    #[serde(rename = "match")]
    pub matched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingSummary {
    /// 100 米内的在线用户数
    pub neighbors: usize,
    /// 新建的擦肩而过记录数
    pub recorded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossedPathDto {
    pub id: Uuid,
    pub user1: Uuid,
    pub user2: Uuid,
    pub timestamp: Timestamp,
    pub location: GeoPoint,
    pub times_crossed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_user: Option<PublicProfile>,
}

impl CrossedPathDto {
    pub fn new(record: &CrossedPath, other_user: Option<PublicProfile>) -> Self {
        Self {
            id: record.id.into(),
            user1: record.user1.into(),
            user2: record.user2.into(),
            timestamp: record.timestamp,
            location: record.location,
            times_crossed: record.times_crossed,
            other_user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDto {
    pub id: Uuid,
    pub user1: Uuid,
    pub user2: Uuid,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_user: Option<PublicProfile>,
}

impl MatchDto {
    pub fn new(record: &Match, other_user: Option<PublicProfile>) -> Self {
        Self {
            id: record.id.into(),
            user1: record.user1.into(),
            user2: record.user2.into(),
            created_at: record.created_at,
            other_user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub match_id: Uuid,
    pub from_user: Uuid,
    pub content: String,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.into(),
            match_id: message.match_id.into(),
            from_user: message.from_user.into(),
            content: message.content.as_str().to_owned(),
            created_at: message.created_at,
        }
    }
}
