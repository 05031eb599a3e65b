//! CLI output formatting for the `tree` command.
//!
//! # Information-First Display
//!
//! The primary display for every entity (card, image) is its identity: a
//! positional index and its name. Database ids and image counts follow as
//! secondary detail, so the output reads as an inventory of the gallery while
//! still letting the admin match entries to URLs like `/gallery/edit_card/7`.
//!
//! # Output Format
//!
//! ```text
//! 001 Travel #1 (3 images)
//!     001 map.png #1
//!     001 Japan #2 (2 images)
//!         001 kyoto.jpg #2
//!         002 nara.jpg #3
//! 002 Minimal #3 (0 images)
//!
//! 3 cards, 3 images
//! ```
//!
//! Within a card, images are listed before sub-cards; both are indexed from
//! 001. The image count of a card includes its sub-cards.
//!
//! # Architecture
//!
//! [`format_card_tree`] returns `Vec<String>` for testability and
//! [`print_card_tree`] writes it to stdout. Formatting is pure: no I/O, no
//! side effects.

use crate::types::CardNode;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a card header: positional index, name, id, and image count.
///
/// ```text
/// 001 Landscapes #4 (5 images)
/// ```
fn entity_header(index: usize, name: &str, id: i64, images: usize) -> String {
    format!("{} {} #{} ({} images)", format_index(index), name, id, images)
}

fn image_line(index: usize, filename: &str, id: i64) -> String {
    format!("{} {} #{}", format_index(index), filename, id)
}

// ============================================================================
// Card tree
// ============================================================================

/// Format the card tree plus a summary line.
pub fn format_card_tree(cards: &[CardNode]) -> Vec<String> {
    if cards.is_empty() {
        return vec!["No cards".to_string()];
    }

    let mut lines = Vec::new();
    let mut totals = (0usize, 0usize);
    for (i, node) in cards.iter().enumerate() {
        walk_card(node, i + 1, 0, &mut lines, &mut totals);
    }

    let (card_count, image_count) = totals;
    lines.push(String::new());
    lines.push(format!(
        "{} {}, {} {}",
        card_count,
        plural(card_count, "card", "cards"),
        image_count,
        plural(image_count, "image", "images"),
    ));
    lines
}

fn walk_card(
    node: &CardNode,
    index: usize,
    depth: usize,
    lines: &mut Vec<String>,
    totals: &mut (usize, usize),
) {
    lines.push(format!(
        "{}{}",
        indent(depth),
        entity_header(index, &node.card.name, node.card.id, node.total_images())
    ));
    totals.0 += 1;
    totals.1 += node.images.len();

    for (i, image) in node.images.iter().enumerate() {
        lines.push(format!(
            "{}{}",
            indent(depth + 1),
            image_line(i + 1, &image.filename, image.id)
        ));
    }
    for (i, child) in node.children.iter().enumerate() {
        walk_card(child, i + 1, depth + 1, lines, totals);
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}

/// Print the card tree to stdout.
pub fn print_card_tree(cards: &[CardNode]) {
    for line in format_card_tree(cards) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Card, Image};

    fn node(id: i64, name: &str, images: &[(i64, &str)], children: Vec<CardNode>) -> CardNode {
        CardNode {
            card: Card {
                id,
                name: name.to_string(),
                parent_id: None,
            },
            images: images
                .iter()
                .map(|(image_id, filename)| Image {
                    id: *image_id,
                    filename: filename.to_string(),
                    card_id: id,
                })
                .collect(),
            children,
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(999), "999");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn entity_header_shows_id_and_count() {
        assert_eq!(entity_header(1, "Travel", 7, 3), "001 Travel #7 (3 images)");
    }

    #[test]
    fn empty_tree() {
        assert_eq!(format_card_tree(&[]), vec!["No cards"]);
    }

    #[test]
    fn nested_tree() {
        let cards = vec![
            node(
                1,
                "Travel",
                &[(1, "map.png")],
                vec![node(2, "Japan", &[(2, "kyoto.jpg"), (3, "nara.jpg")], vec![])],
            ),
            node(3, "Minimal", &[], vec![]),
        ];

        assert_eq!(
            format_card_tree(&cards),
            vec![
                "001 Travel #1 (3 images)",
                "    001 map.png #1",
                "    001 Japan #2 (2 images)",
                "        001 kyoto.jpg #2",
                "        002 nara.jpg #3",
                "002 Minimal #3 (0 images)",
                "",
                "3 cards, 3 images",
            ]
        );
    }

    #[test]
    fn summary_uses_singular() {
        let cards = vec![node(1, "Solo", &[(1, "a.png")], vec![])];
        let lines = format_card_tree(&cards);
        assert_eq!(lines.last().unwrap(), "1 card, 1 image");
    }
}
