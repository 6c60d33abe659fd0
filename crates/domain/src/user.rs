use chrono::NaiveDate;

use crate::geo::GeoPoint;
use crate::value_objects::{Timestamp, UserId};

/// 用户档案
///
/// 档案字段由资料子系统维护；核心引擎只写入 `location` 与 `updated_at`。
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub gender: String,
    pub interests: Vec<String>,
    pub birth: Option<NaiveDate>,
    pub location: Option<GeoPoint>,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub verify_token: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, gender: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            name: name.into(),
            email: String::new(),
            password_hash: None,
            bio: None,
            gender: gender.into(),
            interests: Vec::new(),
            birth: None,
            location: None,
            email_verified: false,
            verify_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    pub fn located_at(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// 记录一次位置上报
    pub fn move_to(&mut self, location: GeoPoint, now: Timestamp) {
        self.location = Some(location);
        self.updated_at = now;
    }

    pub fn shares_interest(&self, tags: &[String]) -> bool {
        tags.is_empty() || self.interests.iter().any(|own| tags.contains(own))
    }
}
