//! Generated content model
//!
//! One AI generation result, normalized across providers. The shape is the same
//! for every provider: an ordered list of post groups, each holding ordered post
//! units. Order is significant: for Twitter it is the reply-chain order.

use serde::{Deserialize, Serialize};

use super::integrations::Provider;
use crate::error::{IntegrationError, Result};

/// Shape of the generated post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentType {
    #[serde(rename = "tweet")]
    Tweet,
    #[serde(rename = "pre_nl_cta")]
    PreNewsletterCta,
    #[serde(rename = "post_nl_cta")]
    PostNewsletterCta,
    #[serde(rename = "thread")]
    Thread,
    #[serde(rename = "long_form_tweet")]
    LongFormTweet,
    #[serde(rename = "long_form_post")]
    LongFormPost,
    #[serde(rename = "image_list")]
    ImageList,
}

impl ContentType {
    /// Text-only shapes that map onto a single provider post
    pub fn is_simple_post(&self) -> bool {
        !matches!(self, ContentType::Thread | ContentType::ImageList)
    }
}

/// Tag on a post unit. Unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PostType {
    #[default]
    Normal,
    QuoteTweet,
    Other(String),
}

impl From<String> for PostType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "normal" => PostType::Normal,
            "quote_tweet" => PostType::QuoteTweet,
            _ => PostType::Other(s),
        }
    }
}

impl From<PostType> for String {
    fn from(t: PostType) -> Self {
        match t {
            PostType::Normal => "normal".to_string(),
            PostType::QuoteTweet => "quote_tweet".to_string(),
            PostType::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostUnit {
    #[serde(default)]
    pub post_type: PostType,
    pub post_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(rename = "pageTitle", default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PostUnit {
    pub fn text(post_content: impl Into<String>) -> Self {
        Self {
            post_type: PostType::Normal,
            post_content: post_content.into(),
            thumbnail: None,
            page_title: None,
            domain: None,
            image_url: None,
        }
    }

    pub fn quote(post_content: impl Into<String>) -> Self {
        Self {
            post_type: PostType::QuoteTweet,
            ..Self::text(post_content)
        }
    }

    pub fn is_quote_tweet(&self) -> bool {
        self.post_type == PostType::QuoteTweet
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostGroup {
    pub post_number: u32,
    pub post: Vec<PostUnit>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub provider: Provider,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub content: Vec<PostGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ContentMetadata>,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

impl GeneratedContent {
    /// Parse a stored or submitted payload, failing with a validation error on
    /// any schema mismatch
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| IntegrationError::Validation(format!("generated content: {}", e)))
    }

    /// All post units in publish order, flattened across groups
    pub fn units(&self) -> Vec<&PostUnit> {
        self.content.iter().flat_map(|group| group.post.iter()).collect()
    }

    /// Text of the first unit with non-whitespace content, in publish order
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .flat_map(|group| group.post.iter())
            .map(|unit| unit.post_content.as_str())
            .find(|text| !text.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(provider: Provider, content_type: ContentType, groups: Vec<PostGroup>) -> GeneratedContent {
        GeneratedContent {
            provider,
            content_type,
            content: groups,
            thumbnail_url: Some("https://cdn.example.com/thumb.png".to_string()),
            metadata: Some(ContentMetadata {
                web_url: Some("https://newsletter.example.com/p/issue-12".to_string()),
                title: Some("Issue 12".to_string()),
            }),
            success: true,
        }
    }

    fn roundtrip(value: &GeneratedContent) -> GeneratedContent {
        let json = serde_json::to_value(value).unwrap();
        GeneratedContent::from_json(json).unwrap()
    }

    #[test]
    fn single_tweet_survives_serialization() {
        let content = sample(
            Provider::Twitter,
            ContentType::Tweet,
            vec![PostGroup {
                post_number: 1,
                post: vec![PostUnit::text("Shipping week recap")],
            }],
        );
        assert_eq!(roundtrip(&content), content);
    }

    #[test]
    fn thread_with_quote_and_link_preview_survives_serialization() {
        let mut preview = PostUnit::text("Read the full issue");
        preview.thumbnail = Some("https://cdn.example.com/og.png".to_string());
        preview.page_title = Some("Issue 12".to_string());
        preview.domain = Some("newsletter.example.com".to_string());

        let content = sample(
            Provider::Twitter,
            ContentType::Thread,
            vec![PostGroup {
                post_number: 1,
                post: vec![
                    PostUnit::text("1/ what we learned"),
                    preview,
                    PostUnit::quote("Worth a reread"),
                ],
            }],
        );
        assert_eq!(roundtrip(&content), content);
    }

    #[test]
    fn long_form_linkedin_post_survives_serialization() {
        let content = sample(
            Provider::Linkedin,
            ContentType::LongFormPost,
            vec![PostGroup {
                post_number: 1,
                post: vec![PostUnit::text("Three lessons from running a newsletter")],
            }],
        );
        assert_eq!(roundtrip(&content), content);
    }

    #[test]
    fn image_list_survives_serialization() {
        let mut image = PostUnit::text("Chart of the week");
        image.image_url = Some("https://cdn.example.com/chart.png".to_string());
        let content = sample(
            Provider::Twitter,
            ContentType::ImageList,
            vec![
                PostGroup { post_number: 1, post: vec![image.clone()] },
                PostGroup { post_number: 2, post: vec![image] },
            ],
        );
        assert_eq!(roundtrip(&content), content);
    }

    #[test]
    fn parses_wire_field_names() {
        let value = json!({
            "provider": "twitter",
            "type": "pre_nl_cta",
            "content": [{
                "post_number": 1,
                "post": [{
                    "post_type": "quote_tweet",
                    "post_content": "hi",
                    "pageTitle": "Title"
                }]
            }]
        });
        let parsed = GeneratedContent::from_json(value).unwrap();
        assert_eq!(parsed.content_type, ContentType::PreNewsletterCta);
        assert!(parsed.success);
        let unit = &parsed.content[0].post[0];
        assert!(unit.is_quote_tweet());
        assert_eq!(unit.page_title.as_deref(), Some("Title"));
    }

    #[test]
    fn unknown_post_type_is_kept() {
        let unit: PostUnit = serde_json::from_value(json!({
            "post_type": "poll",
            "post_content": "A or B?"
        }))
        .unwrap();
        assert_eq!(unit.post_type, PostType::Other("poll".to_string()));
        let back = serde_json::to_value(&unit).unwrap();
        assert_eq!(back["post_type"], "poll");
    }

    #[test]
    fn schema_mismatch_is_a_validation_error() {
        let err = GeneratedContent::from_json(json!({ "provider": "twitter" })).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn first_text_skips_blank_units() {
        let content = sample(
            Provider::Linkedin,
            ContentType::LongFormPost,
            vec![PostGroup { post_number: 1, post: vec![PostUnit::text("   ")] }],
        );
        assert_eq!(content.first_text(), None);
    }

    #[test]
    fn first_text_finds_later_non_blank_unit() {
        let content = sample(
            Provider::Linkedin,
            ContentType::LongFormPost,
            vec![
                PostGroup { post_number: 1, post: vec![PostUnit::text("")] },
                PostGroup { post_number: 2, post: vec![PostUnit::text("\n"), PostUnit::text("hello")] },
            ],
        );
        assert_eq!(content.first_text(), Some("hello"));
    }

    #[test]
    fn units_flatten_in_group_order() {
        let content = sample(
            Provider::Twitter,
            ContentType::Thread,
            vec![
                PostGroup { post_number: 1, post: vec![PostUnit::text("a"), PostUnit::text("b")] },
                PostGroup { post_number: 2, post: vec![PostUnit::text("c")] },
            ],
        );
        let texts: Vec<&str> = content.units().iter().map(|u| u.post_content.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }
}
