//! In-memory video store

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use super::{non_empty, NewVideo, Video, VideoFilter, VideoPatch, VideoStore, DEFAULT_CATEGORY};

/// Video records held in a map for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    videos: RwLock<HashMap<String, Video>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoStore for MemoryStore {
    fn list(&self, filter: &VideoFilter) -> Vec<Video> {
        let videos = self.videos.read().unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<Video> = videos
            .values()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        matched
    }

    fn get(&self, id: &str) -> Option<Video> {
        self.videos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn insert(&self, video: NewVideo) -> Video {
        let record = Video {
            id: Uuid::new_v4().to_string(),
            title: video.title,
            description: video.description,
            filename: video.filename,
            original_filename: video.original_filename,
            file_size: video.file_size,
            duration: video.duration.and_then(non_empty),
            category: video
                .category
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            thumbnail_url: video.thumbnail_url.and_then(non_empty),
            upload_date: Utc::now(),
        };

        self.videos
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone(), record.clone());
        record
    }

    fn update(&self, id: &str, patch: VideoPatch) -> Option<Video> {
        let mut videos = self.videos.write().unwrap_or_else(PoisonError::into_inner);
        let video = videos.get_mut(id)?;
        patch.apply(video);
        Some(video.clone())
    }

    fn remove(&self, id: &str) -> Option<Video> {
        self.videos
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }
}
