//! Shared types used by the catalog, the gallery service, and the renderers.
//!
//! Cards form a tree through `parent_id` references. Nothing here holds a
//! pointer to another card: children and images are derived by id, either by
//! the catalog's indexed queries or by [`CardNode`] trees built from a single
//! adjacency pass.

use serde::Serialize;

/// A named folder in the gallery tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: i64,
    pub name: String,
    /// `None` for top-level cards.
    pub parent_id: Option<i64>,
}

/// An uploaded image owned by exactly one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub id: i64,
    /// Name of the file inside the uploads directory.
    pub filename: String,
    pub card_id: i64,
}

/// A card with its children and images resolved, ready to be walked
/// recursively by the presentation layer or the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct CardNode {
    #[serde(flatten)]
    pub card: Card,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CardNode>,
}

impl CardNode {
    /// Number of images in this card and every card below it.
    pub fn total_images(&self) -> usize {
        self.images.len()
            + self
                .children
                .iter()
                .map(CardNode::total_images)
                .sum::<usize>()
    }
}
