//! Curated asset libraries: scene backgrounds and stickers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundItem {
    pub id: String,
    /// Human-readable name, matched against scene inference output.
    pub name: String,
    pub image_ref: String,
}

impl BackgroundItem {
    pub fn new(name: impl Into<String>, image_ref: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            image_ref: image_ref.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: String,
    pub image_ref: String,
}

impl Sticker {
    pub fn new(image_ref: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_ref: image_ref.into(),
        }
    }
}

pub fn default_backgrounds() -> Vec<BackgroundItem> {
    [
        ("bg1", "夜晚卧室", "https://files.catbox.moe/k6wjs8.png"),
        ("bg2", "海边", "https://files.catbox.moe/l0orzq.jpeg"),
        (
            "bg3",
            "客厅",
            "https://images.unsplash.com/photo-1600210492486-724fe5c67fb0?auto=format&fit=crop&w=1600&q=80",
        ),
        (
            "bg4",
            "商场",
            "https://images.unsplash.com/photo-1519567241046-7f570eee3d9f?auto=format&fit=crop&w=1600&q=80",
        ),
    ]
    .into_iter()
    .map(|(id, name, url)| BackgroundItem {
        id: id.to_string(),
        name: name.to_string(),
        image_ref: url.to_string(),
    })
    .collect()
}

pub fn default_stickers() -> Vec<Sticker> {
    [
        ("s1", "https://files.catbox.moe/oqpdk2.jpg"),
        ("s2", "https://files.catbox.moe/3ccltl.jpg"),
        ("s3", "https://files.catbox.moe/obkwjp.jpg"),
        ("s4", "https://files.catbox.moe/5788u9.jpg"),
        ("s5", "https://files.catbox.moe/bbz1rq.jpg"),
        ("s6", "https://files.catbox.moe/ihw69u.jpg"),
    ]
    .into_iter()
    .map(|(id, url)| Sticker {
        id: id.to_string(),
        image_ref: url.to_string(),
    })
    .collect()
}
