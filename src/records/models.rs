use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Record;

macro_rules! impl_record {
    ($ty:ty, $table:literal) => {
        impl Record for $ty {
            const TABLE: &'static str = $table;

            fn id(&self) -> u64 {
                self.id
            }

            fn is_deleted(&self) -> bool {
                self.is_deleted
            }

            fn mark_deleted(&mut self) {
                self.is_deleted = true;
            }

            fn touch(&mut self, now: String) {
                self.updated_at = now;
            }
        }
    };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub nickname: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

impl User {
    pub fn new(id: u64, nickname: impl Into<String>, now: String) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            created_at: now.clone(),
            updated_at: now,
            is_deleted: false,
        }
    }
}

impl_record!(User, "users");

/// Media a generation starts from: an upload or a registered external URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceImage {
    pub id: u64,
    pub user_id: u64,
    pub image_url: Option<String>,
    pub artifact_key: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

impl_record!(SourceImage, "images");

/// Closed set of background generation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenType {
    RemoveBg,
    ColorBg,
    Simple,
    Concept,
}

impl GenType {
    pub const ALL: [GenType; 4] = [
        GenType::RemoveBg,
        GenType::ColorBg,
        GenType::Simple,
        GenType::Concept,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GenType::RemoveBg => "remove_bg",
            GenType::ColorBg => "color_bg",
            GenType::Simple => "simple",
            GenType::Concept => "concept",
        }
    }
}

impl fmt::Display for GenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        GenType::ALL
            .into_iter()
            .find(|gen_type| gen_type.as_str() == value)
            .ok_or_else(|| {
                let allowed: Vec<&str> = GenType::ALL.iter().map(|g| g.as_str()).collect();
                format!("gen_type is invalid, allowed values: {}", allowed.join(", "))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Background {
    pub id: u64,
    pub user_id: u64,
    pub image_id: u64,
    pub gen_type: GenType,
    /// Serialized JSON object of generation options.
    pub concept_option: String,
    pub output_w: u32,
    pub output_h: u32,
    pub artifact_key: String,
    pub image_url: Option<String>,
    pub recreated: bool,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

impl_record!(Background, "backgrounds");

/// Image-to-video generation from a finished background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: u64,
    pub user_id: u64,
    pub background_id: u64,
    pub artifact_key: String,
    pub video_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

impl_record!(Video, "videos");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextVideo {
    pub id: u64,
    pub user_id: u64,
    pub prompt: String,
    pub translated_prompt: Option<String>,
    pub artifact_key: String,
    pub video_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

impl_record!(TextVideo, "text_videos");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResizing {
    pub id: u64,
    pub user_id: u64,
    pub background_id: u64,
    pub width: u32,
    pub height: u32,
    pub artifact_key: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_deleted: bool,
}

impl_record!(ImageResizing, "image_resizings");

/// Records whose generated artifact lives in the object store.
pub trait HasArtifact {
    fn artifact_key(&self) -> &str;
    fn artifact_url(&self) -> Option<&str>;
}

macro_rules! impl_has_artifact {
    ($ty:ty, $url:ident) => {
        impl HasArtifact for $ty {
            fn artifact_key(&self) -> &str {
                &self.artifact_key
            }

            fn artifact_url(&self) -> Option<&str> {
                self.$url.as_deref()
            }
        }
    };
}

impl_has_artifact!(Background, image_url);
impl_has_artifact!(Video, video_url);
impl_has_artifact!(TextVideo, video_url);
impl_has_artifact!(ImageResizing, image_url);
