use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    #[serde(rename = "_id")]
    pub id_str: String,
    pub classify: String,
    pub icon: String,
    pub sort_no: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites: Option<Vec<Site>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub cat_id: i64,
    pub name: String,
    pub href: String,
    pub desc: String,
    pub logo: String,
    pub sort_no: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub timestamp: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    pub title: String,
    pub subtitle: String,
    pub logo: String,
    pub footer_text: String,
    pub icp: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: "Site Navigation".to_string(),
            subtitle: "Everyday links, one click away".to_string(),
            logo: "/static/logo.png".to_string(),
            footer_text: String::new(),
            icp: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    #[serde(rename = "_id", default)]
    pub id_str: String,
    pub classify: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteInput {
    #[serde(default)]
    pub cat_id: Option<i64>,
    pub name: String,
    pub href: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub logo: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementInput {
    #[serde(default)]
    pub timestamp: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntervalInput {
    pub interval: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SortItem {
    pub id: i64,
    pub sort_no: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortRequest {
    pub items: Vec<SortItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}
