use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Axis-aligned rectangle in page coordinates, as the highlight layer
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub height: f64,
}

/// Where a highlight sits: one box around the whole selection plus the
/// per-line boxes of the text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub bounding_rect: Rect,
    pub rects: Vec<Rect>,
    pub page_number: u32,
}

/// What was captured: selected text, an area snapshot as a data URL, or
/// both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub text: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: String,
    pub position: Position,
    pub content: Content,
    pub comment: Comment,
}

/// Partial position for merge updates; `None` fields keep the stored value.
#[derive(Debug, Clone, Default)]
pub struct PositionPatch {
    pub bounding_rect: Option<Rect>,
    pub rects: Option<Vec<Rect>>,
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentPatch {
    pub text: Option<String>,
    pub image: Option<String>,
}

/// In-memory highlight set for one document, keyed by id. Nothing here
/// persists; `export_json` is the only way state survives a reload.
#[derive(Debug, Default)]
pub struct HighlightStore {
    entries: HashMap<String, Highlight>,
    // Insertion order, oldest first; iteration reverses it.
    order: Vec<String>,
}

impl HighlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the given position and content under a fresh id, which is
    /// returned.
    pub fn add(&mut self, position: Position, content: Content, comment: Comment) -> String {
        let id = Uuid::new_v4().to_string();
        self.entries.insert(
            id.clone(),
            Highlight { id: id.clone(), position, content, comment },
        );
        self.order.push(id.clone());
        id
    }

    pub fn get(&self, id: &str) -> Option<&Highlight> {
        self.entries.get(id)
    }

    /// Merge the patches into the stored record; fields the patches leave
    /// out stay as they are. Unknown ids are a no-op.
    pub fn update(&mut self, id: &str, position: PositionPatch, content: ContentPatch) -> bool {
        let h = match self.entries.get_mut(id) {
            Some(h) => h,
            None => return false,
        };
        if let Some(rect) = position.bounding_rect {
            h.position.bounding_rect = rect;
        }
        if let Some(rects) = position.rects {
            h.position.rects = rects;
        }
        if let Some(page) = position.page_number {
            h.position.page_number = page;
        }
        if let Some(text) = content.text {
            h.content.text = Some(text);
        }
        if let Some(image) = content.image {
            h.content.image = Some(image);
        }
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Highlight> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.order.retain(|existing| existing != id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Newest first, the order the sidebar lists them.
    pub fn iter(&self) -> impl Iterator<Item = &Highlight> {
        self.order.iter().rev().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        let all: Vec<&Highlight> = self.iter().collect();
        serde_json::to_string_pretty(&all)
    }

    pub fn import_json(json: &str) -> serde_json::Result<Self> {
        let list: Vec<Highlight> = serde_json::from_str(json)?;
        let mut store = Self::new();
        // Exports are newest-first; rebuild the insertion order.
        for h in list.into_iter().rev() {
            if store.entries.contains_key(&h.id) {
                continue;
            }
            store.order.push(h.id.clone());
            store.entries.insert(h.id.clone(), h);
        }
        Ok(store)
    }
}
