//! SQLite catalog of cards and images.
//!
//! Two tables mirror the gallery tree:
//!
//! ```text
//! card  (id, name, parent_id → card.id)
//! image (id, filename, card_id → card.id)
//! ```
//!
//! Foreign keys are enforced but carry no `ON DELETE CASCADE`. Removing a
//! card subtree is done explicitly by [`Writer::delete_card_tree`], which
//! walks the parent index breadth-first and deletes images, then cards from
//! the leaves up. Keeping the cascade in code means callers see exactly which
//! rows went away and decide which files to unlink.
//!
//! All mutations go through [`Catalog::write`], which runs a closure inside a
//! transaction and commits only if the closure returns `Ok`.

use crate::types::{Card, CardNode, Image};
use rusqlite::{Connection, OptionalExtension, Result as SqlResult, Row, Transaction, params};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS card (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        name      TEXT NOT NULL,
        parent_id INTEGER REFERENCES card(id)
    );

    CREATE TABLE IF NOT EXISTS image (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL,
        card_id  INTEGER NOT NULL REFERENCES card(id)
    );

    CREATE INDEX IF NOT EXISTS idx_card_parent_id ON card(parent_id);
    CREATE INDEX IF NOT EXISTS idx_image_card_id ON image(card_id);
";

/// Owner of the catalog connection.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (or create) the catalog file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let catalog = Self::init(conn)?;
        info!(path = %path.display(), "catalog opened");
        Ok(catalog)
    }

    /// A throwaway catalog, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Cards without a parent, in creation order.
    pub fn top_level_cards(&self) -> SqlResult<Vec<Card>> {
        query_cards(
            &self.conn,
            "SELECT id, name, parent_id FROM card WHERE parent_id IS NULL ORDER BY id",
            [],
        )
    }

    /// The whole gallery as nested nodes, rooted at the top-level cards.
    ///
    /// Reads every row once and links them through an adjacency index, so
    /// the cost does not grow with tree depth.
    pub fn tree(&self) -> SqlResult<Vec<CardNode>> {
        let cards = query_cards(
            &self.conn,
            "SELECT id, name, parent_id FROM card ORDER BY id",
            [],
        )?;
        let images = query_images(
            &self.conn,
            "SELECT id, filename, card_id FROM image ORDER BY id",
            [],
        )?;

        let mut children: HashMap<Option<i64>, Vec<Card>> = HashMap::new();
        for card in cards {
            children.entry(card.parent_id).or_default().push(card);
        }
        let mut images_by_card: HashMap<i64, Vec<Image>> = HashMap::new();
        for image in images {
            images_by_card.entry(image.card_id).or_default().push(image);
        }

        let roots = children.remove(&None).unwrap_or_default();
        Ok(roots
            .into_iter()
            .map(|card| build_node(card, &mut children, &mut images_by_card))
            .collect())
    }

    /// Run `f` inside a transaction. `Ok` commits; `Err` (or a panic) rolls
    /// every statement back.
    pub fn write<T, E>(&mut self, f: impl FnOnce(&Writer<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = self.conn.transaction()?;
        let value = f(&Writer { tx: &tx })?;
        tx.commit()?;
        Ok(value)
    }
}

/// Point lookups outside a transaction, for assertions.
#[cfg(test)]
impl Catalog {
    pub(crate) fn card(&self, id: i64) -> SqlResult<Option<Card>> {
        find_card(&self.conn, id)
    }

    pub(crate) fn image(&self, id: i64) -> SqlResult<Option<Image>> {
        find_image(&self.conn, id)
    }

    pub(crate) fn children(&self, card_id: i64) -> SqlResult<Vec<Card>> {
        children_of(&self.conn, card_id)
    }

    pub(crate) fn images_of(&self, card_id: i64) -> SqlResult<Vec<Image>> {
        images_of(&self.conn, card_id)
    }

    /// `(cards, images)` row counts.
    pub(crate) fn counts(&self) -> SqlResult<(i64, i64)> {
        let cards = self
            .conn
            .query_row("SELECT COUNT(*) FROM card", [], |row| row.get(0))?;
        let images = self
            .conn
            .query_row("SELECT COUNT(*) FROM image", [], |row| row.get(0))?;
        Ok((cards, images))
    }
}

fn build_node(
    card: Card,
    children: &mut HashMap<Option<i64>, Vec<Card>>,
    images: &mut HashMap<i64, Vec<Image>>,
) -> CardNode {
    let kids = children.remove(&Some(card.id)).unwrap_or_default();
    let own_images = images.remove(&card.id).unwrap_or_default();
    CardNode {
        children: kids
            .into_iter()
            .map(|child| build_node(child, children, images))
            .collect(),
        images: own_images,
        card,
    }
}

/// Rows removed by a subtree delete.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CascadeDeletion {
    /// Card ids in deletion order: leaves first, the requested card last.
    pub cards: Vec<i64>,
    /// Every image row removed, direct and nested.
    pub images: Vec<Image>,
}

/// Transaction-scoped access handed out by [`Catalog::write`].
pub struct Writer<'a> {
    tx: &'a Transaction<'a>,
}

impl Writer<'_> {
    pub fn card(&self, id: i64) -> SqlResult<Option<Card>> {
        find_card(self.tx, id)
    }

    pub fn image(&self, id: i64) -> SqlResult<Option<Image>> {
        find_image(self.tx, id)
    }

    pub fn images_of(&self, card_id: i64) -> SqlResult<Vec<Image>> {
        images_of(self.tx, card_id)
    }

    pub fn insert_card(&self, name: &str, parent_id: Option<i64>) -> SqlResult<Card> {
        self.tx.execute(
            "INSERT INTO card (name, parent_id) VALUES (?1, ?2)",
            params![name, parent_id],
        )?;
        Ok(Card {
            id: self.tx.last_insert_rowid(),
            name: name.to_string(),
            parent_id,
        })
    }

    /// Returns `false` when no card has that id.
    pub fn rename_card(&self, id: i64, name: &str) -> SqlResult<bool> {
        let changed = self.tx.execute(
            "UPDATE card SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        Ok(changed > 0)
    }

    pub fn insert_image(&self, filename: &str, card_id: i64) -> SqlResult<Image> {
        self.tx.execute(
            "INSERT INTO image (filename, card_id) VALUES (?1, ?2)",
            params![filename, card_id],
        )?;
        Ok(Image {
            id: self.tx.last_insert_rowid(),
            filename: filename.to_string(),
            card_id,
        })
    }

    /// Returns `false` when no image has that id.
    pub fn delete_image(&self, id: i64) -> SqlResult<bool> {
        let changed = self
            .tx
            .execute("DELETE FROM image WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Ids of every card below `card_id`, breadth-first, nearest first.
    ///
    /// A visited set keeps a self-parented card from looping the walk.
    pub fn descendants(&self, card_id: i64) -> SqlResult<Vec<i64>> {
        let mut seen = HashSet::from([card_id]);
        let mut queue = VecDeque::from([card_id]);
        let mut found = Vec::new();
        while let Some(id) = queue.pop_front() {
            for child in children_of(self.tx, id)? {
                if seen.insert(child.id) {
                    found.push(child.id);
                    queue.push_back(child.id);
                }
            }
        }
        Ok(found)
    }

    /// Delete `card_id`, every card below it, and all their image rows.
    ///
    /// Files are not touched; the returned rows say what went away.
    pub fn delete_card_tree(&self, card_id: i64) -> SqlResult<CascadeDeletion> {
        let mut order = vec![card_id];
        order.extend(self.descendants(card_id)?);
        // Breadth-first puts parents before children; reversed, leaves go first.
        order.reverse();

        let mut deletion = CascadeDeletion::default();
        for &id in &order {
            deletion.images.extend(images_of(self.tx, id)?);
            self.tx
                .execute("DELETE FROM image WHERE card_id = ?1", params![id])?;
        }
        for &id in &order {
            self.tx
                .execute("DELETE FROM card WHERE id = ?1", params![id])?;
        }
        deletion.cards = order;
        Ok(deletion)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn card_from_row(row: &Row<'_>) -> SqlResult<Card> {
    Ok(Card {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
    })
}

fn image_from_row(row: &Row<'_>) -> SqlResult<Image> {
    Ok(Image {
        id: row.get(0)?,
        filename: row.get(1)?,
        card_id: row.get(2)?,
    })
}

fn query_cards<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> SqlResult<Vec<Card>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, card_from_row)?;
    rows.collect()
}

fn query_images<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> SqlResult<Vec<Image>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, image_from_row)?;
    rows.collect()
}

fn find_card(conn: &Connection, id: i64) -> SqlResult<Option<Card>> {
    conn.query_row(
        "SELECT id, name, parent_id FROM card WHERE id = ?1",
        params![id],
        card_from_row,
    )
    .optional()
}

fn find_image(conn: &Connection, id: i64) -> SqlResult<Option<Image>> {
    conn.query_row(
        "SELECT id, filename, card_id FROM image WHERE id = ?1",
        params![id],
        image_from_row,
    )
    .optional()
}

fn children_of(conn: &Connection, card_id: i64) -> SqlResult<Vec<Card>> {
    query_cards(
        conn,
        "SELECT id, name, parent_id FROM card WHERE parent_id = ?1 ORDER BY id",
        params![card_id],
    )
}

fn images_of(conn: &Connection, card_id: i64) -> SqlResult<Vec<Image>> {
    query_images(
        conn,
        "SELECT id, filename, card_id FROM image WHERE card_id = ?1 ORDER BY id",
        params![card_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn catalog() -> Catalog {
        Catalog::open_in_memory().unwrap()
    }

    fn add(catalog: &mut Catalog, name: &str, parent: Option<i64>) -> Card {
        catalog
            .write(|w| w.insert_card(name, parent))
            .unwrap()
    }

    fn add_image(catalog: &mut Catalog, filename: &str, card_id: i64) -> Image {
        catalog
            .write(|w| w.insert_image(filename, card_id))
            .unwrap()
    }

    #[test]
    fn open_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("instance/gallery.db");
        Catalog::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn reopen_keeps_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.db");
        {
            let mut catalog = Catalog::open(&path).unwrap();
            add(&mut catalog, "Landscapes", None);
        }
        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.counts().unwrap(), (1, 0));
    }

    #[test]
    fn top_level_excludes_children() {
        let mut c = catalog();
        let root = add(&mut c, "Travel", None);
        add(&mut c, "Japan", Some(root.id));
        let other = add(&mut c, "Portraits", None);

        let names: Vec<String> = c
            .top_level_cards()
            .unwrap()
            .into_iter()
            .map(|card| card.name)
            .collect();
        assert_eq!(names, vec!["Travel", "Portraits"]);
        assert_eq!(c.children(root.id).unwrap().len(), 1);
        assert!(c.children(other.id).unwrap().is_empty());
    }

    #[test]
    fn dangling_parent_rejected_by_foreign_key() {
        let mut c = catalog();
        let result = c.write(|w| w.insert_card("Orphan", Some(999)));
        assert!(result.is_err());
        assert_eq!(c.counts().unwrap(), (0, 0));
    }

    #[test]
    fn image_requires_existing_card() {
        let mut c = catalog();
        let result = c.write(|w| w.insert_image("a.png", 42));
        assert!(result.is_err());
    }

    #[test]
    fn rename_reports_missing_card() {
        let mut c = catalog();
        let card = add(&mut c, "Old", None);
        assert!(c.write(|w| w.rename_card(card.id, "New")).unwrap());
        assert!(!c.write(|w| w.rename_card(card.id + 1, "New")).unwrap());
        assert_eq!(c.card(card.id).unwrap().unwrap().name, "New");
    }

    #[test]
    fn failed_closure_rolls_back() {
        let mut c = catalog();
        let result: Result<(), CatalogError> = c.write(|w| {
            let card = w.insert_card("Temp", None)?;
            w.insert_image("a.png", card.id)?;
            Err(CatalogError::Io(io::Error::other("boom")))
        });
        assert!(result.is_err());
        assert_eq!(c.counts().unwrap(), (0, 0));
    }

    #[test]
    fn descendants_are_breadth_first() {
        let mut c = catalog();
        let root = add(&mut c, "root", None);
        let a = add(&mut c, "a", Some(root.id));
        let b = add(&mut c, "b", Some(root.id));
        let a1 = add(&mut c, "a1", Some(a.id));

        let found = c.write(|w| w.descendants(root.id)).unwrap();
        assert_eq!(found, vec![a.id, b.id, a1.id]);
    }

    #[test]
    fn self_parented_card_does_not_loop() {
        let mut c = catalog();
        // A client can name the id the new card is about to receive.
        let card = add(&mut c, "loop", Some(1));
        assert_eq!(card.parent_id, Some(card.id));

        assert!(c.write(|w| w.descendants(card.id)).unwrap().is_empty());
        let deletion = c.write(|w| w.delete_card_tree(card.id)).unwrap();
        assert_eq!(deletion.cards, vec![card.id]);
        assert_eq!(c.counts().unwrap(), (0, 0));
    }

    #[test]
    fn delete_card_tree_removes_subtree_rows_only() {
        let mut c = catalog();
        let root = add(&mut c, "root", None);
        let child = add(&mut c, "child", Some(root.id));
        let grandchild = add(&mut c, "grandchild", Some(child.id));
        let keep = add(&mut c, "keep", None);
        add_image(&mut c, "r.png", root.id);
        add_image(&mut c, "c.png", child.id);
        add_image(&mut c, "g.png", grandchild.id);
        add_image(&mut c, "k.png", keep.id);

        let deletion = c.write(|w| w.delete_card_tree(root.id)).unwrap();

        assert_eq!(deletion.cards, vec![grandchild.id, child.id, root.id]);
        let mut removed: Vec<&str> = deletion.images.iter().map(|i| i.filename.as_str()).collect();
        removed.sort();
        assert_eq!(removed, vec!["c.png", "g.png", "r.png"]);
        assert_eq!(c.counts().unwrap(), (1, 1));
        assert!(c.card(keep.id).unwrap().is_some());
    }

    #[test]
    fn tree_nests_children_and_images() {
        let mut c = catalog();
        let travel = add(&mut c, "Travel", None);
        let japan = add(&mut c, "Japan", Some(travel.id));
        add(&mut c, "Italy", Some(travel.id));
        add(&mut c, "Portraits", None);
        let tokyo = add_image(&mut c, "tokyo.jpg", japan.id);
        add_image(&mut c, "kyoto.jpg", japan.id);
        assert_eq!(c.image(tokyo.id).unwrap(), Some(tokyo.clone()));
        assert_eq!(c.images_of(japan.id).unwrap().len(), 2);

        let tree = c.tree().unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].card.name, "Travel");
        let children: Vec<&str> = tree[0].children.iter().map(|n| n.card.name.as_str()).collect();
        assert_eq!(children, vec!["Japan", "Italy"]);
        assert_eq!(tree[0].children[0].images.len(), 2);
        assert_eq!(tree[0].total_images(), 2);
        assert_eq!(tree[1].card.name, "Portraits");
    }
}
