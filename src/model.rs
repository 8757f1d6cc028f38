use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_TABLE: &str = "video_posts";

/// Opaque row identifier. The backend may hand out integers or strings;
/// integers always sort below strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostId {
    Int(i64),
    /// Only holds values above `i64::MAX`, so it sorts after every `Int`.
    Large(u64),
    Text(String),
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Int(n) => write!(f, "{n}"),
            PostId::Large(n) => write!(f, "{n}"),
            PostId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for PostId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Ok(PostId::Int(n));
        }
        Ok(match s.parse::<u64>() {
            Ok(n) => PostId::Large(n),
            Err(_) => PostId::Text(s.to_string()),
        })
    }
}

/// A generated video post as stored in the feed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPost {
    pub id: PostId,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub caption: String,
    #[serde(default)]
    pub hashtags: Option<String>,
    #[serde(default)]
    pub instagram_status: Option<String>,
    #[serde(default)]
    pub tiktok_status: Option<String>,
    #[serde(default)]
    pub youtube_status: Option<String>,
}

impl VideoPost {
    /// Media URL if generation has finished.
    pub fn media_url(&self) -> Option<&str> {
        self.video_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn is_processing(&self) -> bool {
        self.media_url().is_none()
    }

    pub fn field(&self, field: EditableField) -> &str {
        match field {
            EditableField::Title => &self.title,
            EditableField::Caption => &self.caption,
        }
    }

    pub fn set_field(&mut self, field: EditableField, value: String) {
        match field {
            EditableField::Title => self.title = value,
            EditableField::Caption => self.caption = value,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Columns the dashboard lets the user edit in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditableField {
    Title,
    Caption,
}

impl EditableField {
    pub fn column(&self) -> &'static str {
        match self {
            EditableField::Title => "title",
            EditableField::Caption => "caption",
        }
    }
}

/// User-supplied connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default, alias = "supabaseUrl")]
    pub backend_url: String,
    #[serde(default, alias = "supabaseKey")]
    pub backend_key: String,
    #[serde(default, alias = "webhookUrl")]
    pub generate_webhook_url: String,
    #[serde(default, alias = "postWebhookUrl")]
    pub post_webhook_url: String,
    #[serde(default = "default_table", alias = "tableName")]
    pub table_name: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            backend_key: String::new(),
            generate_webhook_url: String::new(),
            post_webhook_url: String::new(),
            table_name: default_table(),
        }
    }
}

impl AppSettings {
    /// Blank URL or key means every data operation short-circuits.
    pub fn is_configured(&self) -> bool {
        !self.backend_url.trim().is_empty() && !self.backend_key.trim().is_empty()
    }

    /// Configured table, falling back to the default when left blank.
    pub fn table(&self) -> &str {
        let t = self.table_name.trim();
        if t.is_empty() {
            DEFAULT_TABLE
        } else {
            t
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(format!("unsupported aspect ratio '{other}' (use 16:9 or 9:16)")),
        }
    }
}

/// Transient ad-creation form state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAdDraft {
    #[serde(default)]
    pub prompt: String,
    /// File the user picked for upload.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Cached preview as a `data:<mime>;base64,...` URL.
    #[serde(default)]
    pub preview: Option<String>,
    /// Direct media URL; when set no upload happens.
    #[serde(default, alias = "product_image_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_description: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

impl CreateAdDraft {
    pub fn direct_image_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn has_upload_source(&self) -> bool {
        self.file.is_some() || self.preview.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_ids_order_numbers_before_text() {
        let mut ids = vec![
            PostId::Text("b".into()),
            PostId::Int(10),
            PostId::Int(2),
            PostId::Text("a".into()),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                PostId::Int(2),
                PostId::Int(10),
                PostId::Text("a".into()),
                PostId::Text("b".into()),
            ]
        );
    }

    #[test]
    fn ids_beyond_i64_still_decode_and_order() {
        let big: PostId = serde_json::from_value(json!(u64::MAX)).unwrap();
        assert_eq!(big, PostId::Large(u64::MAX));
        let max: PostId = serde_json::from_value(json!(i64::MAX)).unwrap();
        assert_eq!(max, PostId::Int(i64::MAX));
        assert!(big > max);
        assert!(big < PostId::Text("0".into()));
        assert_eq!(big.to_string(), "18446744073709551615");
        assert_eq!("18446744073709551615".parse::<PostId>().unwrap(), big);
    }

    #[test]
    fn post_id_parses_cli_input() {
        assert_eq!("42".parse::<PostId>().unwrap(), PostId::Int(42));
        assert_eq!(
            "a1b2".parse::<PostId>().unwrap(),
            PostId::Text("a1b2".into())
        );
    }

    #[test]
    fn video_post_tolerates_nulls() {
        let post: VideoPost = serde_json::from_value(json!({
            "id": 7,
            "video_url": null,
            "title": null,
            "caption": "hi",
            "instagram_status": "pending"
        }))
        .unwrap();
        assert_eq!(post.id, PostId::Int(7));
        assert!(post.is_processing());
        assert_eq!(post.title, "");
        assert_eq!(post.caption, "hi");
        assert_eq!(post.instagram_status.as_deref(), Some("pending"));
        assert!(post.tiktok_status.is_none());
    }

    #[test]
    fn blank_media_url_is_processing() {
        let post: VideoPost =
            serde_json::from_value(json!({"id": "x", "video_url": "  "})).unwrap();
        assert!(post.is_processing());
    }

    #[test]
    fn settings_configured_requires_url_and_key() {
        let mut s = AppSettings::default();
        assert!(!s.is_configured());
        s.backend_url = "".into();
        s.backend_key = "x".into();
        assert!(!s.is_configured());
        s.backend_url = "https://db.example".into();
        assert!(s.is_configured());
    }

    #[test]
    fn blank_table_falls_back_to_default() {
        let s = AppSettings {
            table_name: "  ".into(),
            ..Default::default()
        };
        assert_eq!(s.table(), DEFAULT_TABLE);
    }

    #[test]
    fn aspect_ratio_accepts_only_two_values() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Landscape);
        assert!("1:1".parse::<AspectRatio>().is_err());
        assert_eq!(
            serde_json::to_value(AspectRatio::Portrait).unwrap(),
            json!("9:16")
        );
    }

    #[test]
    fn legacy_draft_product_image_url_maps_to_image_url() {
        let draft: CreateAdDraft = serde_json::from_value(json!({
            "prompt": "shoes",
            "product_image_url": "https://cdn/x.png"
        }))
        .unwrap();
        assert_eq!(draft.direct_image_url(), Some("https://cdn/x.png"));
        assert_eq!(draft.aspect_ratio, AspectRatio::Landscape);
    }
}
