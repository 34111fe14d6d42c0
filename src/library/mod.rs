//! Video metadata
//!
//! Records describing uploaded videos and the `VideoStore` capability the
//! handlers consume. The store is injected through `AppState`, so the
//! streaming path never depends on where metadata lives.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category used when an upload does not name one
pub const DEFAULT_CATEGORY: &str = "Other";

/// Category filter value meaning "no filter"
pub const ALL_CATEGORIES: &str = "All Categories";

/// Stored video record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Storage filename inside the media directory
    pub filename: String,
    /// Filename the client uploaded, used for downloads
    pub original_filename: String,
    pub file_size: u64,
    pub duration: Option<String>,
    pub category: String,
    pub thumbnail_url: Option<String>,
    pub upload_date: DateTime<Utc>,
}

/// Fields supplied when registering a new video
#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub duration: Option<String>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Partial update; storage fields are not patchable
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl VideoPatch {
    pub(crate) fn apply(self, video: &mut Video) {
        if let Some(title) = self.title {
            video.title = title;
        }
        if let Some(description) = self.description {
            video.description = description;
        }
        if let Some(duration) = self.duration {
            video.duration = non_empty(duration);
        }
        if let Some(category) = self.category {
            video.category = category;
        }
        if let Some(thumbnail_url) = self.thumbnail_url {
            video.thumbnail_url = non_empty(thumbnail_url);
        }
    }
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    /// Exact category; `All Categories` disables the filter
    pub category: Option<String>,
}

impl VideoFilter {
    pub fn matches(&self, video: &Video) -> bool {
        let search_ok = self
            .search
            .as_deref()
            .filter(|q| !q.is_empty())
            .map_or(true, |q| {
                let q = q.to_lowercase();
                video.title.to_lowercase().contains(&q)
                    || video.description.to_lowercase().contains(&q)
            });

        let category_ok = self
            .category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
            .map_or(true, |c| video.category == c);

        search_ok && category_ok
    }
}

/// Metadata store consumed by the handlers
pub trait VideoStore: Send + Sync {
    /// Videos matching `filter`, newest upload first
    fn list(&self, filter: &VideoFilter) -> Vec<Video>;

    fn get(&self, id: &str) -> Option<Video>;

    fn insert(&self, video: NewVideo) -> Video;

    /// `None` when no record has this id
    fn update(&self, id: &str, patch: VideoPatch) -> Option<Video>;

    /// Removed record, `None` when no record has this id
    fn remove(&self, id: &str) -> Option<Video>;
}

pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(title: &str, description: &str, category: &str) -> Video {
        Video {
            id: "1".to_string(),
            title: title.to_string(),
            description: description.to_string(),
            filename: "f.mp4".to_string(),
            original_filename: "f.mp4".to_string(),
            file_size: 1,
            duration: None,
            category: category.to_string(),
            thumbnail_url: None,
            upload_date: Utc::now(),
        }
    }

    #[test]
    fn test_filter_search_title_and_description() {
        let v = video("Big Buck Bunny", "An open movie", "Animation");
        let by_title = VideoFilter {
            search: Some("buck".to_string()),
            category: None,
        };
        let by_description = VideoFilter {
            search: Some("OPEN".to_string()),
            category: None,
        };
        let miss = VideoFilter {
            search: Some("sintel".to_string()),
            category: None,
        };
        assert!(by_title.matches(&v));
        assert!(by_description.matches(&v));
        assert!(!miss.matches(&v));
    }

    #[test]
    fn test_filter_category() {
        let v = video("Clip", "", "Music");
        let exact = VideoFilter {
            search: None,
            category: Some("Music".to_string()),
        };
        let all = VideoFilter {
            search: None,
            category: Some(ALL_CATEGORIES.to_string()),
        };
        let other = VideoFilter {
            search: None,
            category: Some("Sports".to_string()),
        };
        assert!(exact.matches(&v));
        assert!(all.matches(&v));
        assert!(!other.matches(&v));
        assert!(VideoFilter::default().matches(&v));
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let mut v = video("Old", "desc", "Other");
        VideoPatch {
            title: Some("New".to_string()),
            thumbnail_url: Some(String::new()),
            ..VideoPatch::default()
        }
        .apply(&mut v);
        assert_eq!(v.title, "New");
        assert_eq!(v.description, "desc");
        assert_eq!(v.thumbnail_url, None);
    }

    #[test]
    fn test_video_serializes_camel_case() {
        let json = serde_json::to_value(video("T", "", "Other")).unwrap();
        assert!(json.get("originalFilename").is_some());
        assert!(json.get("uploadDate").is_some());
        assert!(json.get("fileSize").is_some());
    }
}
