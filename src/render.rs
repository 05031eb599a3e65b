//! HTML rendering.
//!
//! Every page the server returns is built here with
//! [maud](https://maud.lambda.xyz/): templates are Rust code, interpolation is
//! escaped by default, and there is no template directory to ship.
//!
//! ## Pages
//!
//! - **Site pages** (`/`, `/projects`, `/contact`, `/experience`): the
//!   pre-rendered Markdown bodies from [`crate::pages`].
//! - **Login** (`/gallery/login`): a single password field.
//! - **Gallery** (`/gallery`): the card tree, rendered recursively. Admins get
//!   inline forms on every card (rename, delete, add sub-card, upload images)
//!   plus a toolbar for top-level cards and folder uploads.
//!
//! ## CSS
//!
//! `static/style.css` is embedded at compile time and inlined into every
//! page, so the only other assets served are the uploaded images.

use crate::access::AccessLevel;
use crate::gallery::GalleryView;
use crate::pages::{Page, PageKind};
use crate::session::Flash;
use crate::types::{CardNode, Image};
use maud::{DOCTYPE, Markup, PreEscaped, html};

const CSS: &str = include_str!("../static/style.css");

/// Site name shown in the header and page titles.
const SITE_NAME: &str = "Folio";

const GALLERY_PATH: &str = "/gallery";

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " · " (SITE_NAME) }
                style { (PreEscaped(CSS)) }
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

/// Renders the site header: brand link plus the page navigation
fn site_header(current_path: &str) -> Markup {
    html! {
        header.site-header {
            a.brand href="/" { (SITE_NAME) }
            nav.site-nav {
                ul {
                    @for kind in PageKind::ALL {
                        (nav_link(kind.path(), kind.label(), current_path))
                    }
                    (nav_link(GALLERY_PATH, "Gallery", current_path))
                }
            }
        }
    }
}

fn nav_link(path: &str, label: &str, current_path: &str) -> Markup {
    let is_current = path == current_path;
    html! {
        li class=[is_current.then_some("current")] {
            a href=(path) { (label) }
        }
    }
}

/// Renders pending flash messages, oldest first
fn render_flashes(flashes: &[Flash]) -> Markup {
    html! {
        @if !flashes.is_empty() {
            ul.flashes {
                @for flash in flashes {
                    li class={ "flash " (flash.kind.as_str()) } { (flash.message) }
                }
            }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Renders one of the Markdown site pages
pub fn render_page(page: &Page, flashes: &[Flash]) -> Markup {
    let content = html! {
        (site_header(page.kind.path()))
        main {
            (render_flashes(flashes))
            article.page-content {
                (PreEscaped(&page.body_html))
            }
        }
    };
    base_document(&page.title, None, content)
}

/// Renders the gallery password form
pub fn render_login(flashes: &[Flash]) -> Markup {
    let content = html! {
        (site_header(GALLERY_PATH))
        main.login-page {
            (render_flashes(flashes))
            h1 { "Gallery" }
            p { "Enter the password to view the gallery." }
            form.login-form method="post" action="/gallery/login" {
                input type="password" name="password" placeholder="Password" required autofocus;
                button type="submit" { "Log in" }
            }
        }
    };
    base_document("Gallery login", Some("login"), content)
}

/// Renders the card tree
pub fn render_gallery(view: &GalleryView, flashes: &[Flash]) -> Markup {
    let admin = view.access == AccessLevel::Admin;
    let content = html! {
        (site_header(GALLERY_PATH))
        main.gallery-page {
            (render_flashes(flashes))
            h1 { "Gallery" }
            p.card-meta {
                "Viewing with " (view.access) " access. "
                a href="/gallery/logout" { "Log out" }
            }
            @if admin {
                (admin_toolbar())
            }
            @if view.cards.is_empty() {
                p.empty { "No cards yet." }
            }
            @for node in &view.cards {
                (render_card(node, admin))
            }
        }
    };
    base_document("Gallery", Some("gallery"), content)
}

/// Renders a minimal 404 page
pub fn render_not_found() -> Markup {
    let content = html! {
        (site_header(""))
        main {
            h1 { "Not found" }
            p { "The page you asked for does not exist." }
            p { a href=(GALLERY_PATH) { "Back to the gallery" } }
        }
    };
    base_document("Not found", None, content)
}

// ============================================================================
// Gallery Components
// ============================================================================

/// Top-level actions: new card, folder upload
fn admin_toolbar() -> Markup {
    html! {
        section.gallery-toolbar {
            form method="post" action="/gallery/add_card" {
                input type="hidden" name="parent_id" value="None";
                input type="text" name="card_name" placeholder="New card" required;
                button type="submit" { "Add card" }
            }
            form method="post" action="/gallery/upload_folder" enctype="multipart/form-data" {
                input type="file" name="folder_files" webkitdirectory multiple;
                button type="submit" { "Upload folder" }
            }
        }
    }
}

/// Renders a card, its images, and its children (recursively)
fn render_card(node: &CardNode, admin: bool) -> Markup {
    let id = node.card.id;
    html! {
        section.card id={ "card-" (id) } {
            h2.card-title { (node.card.name) }
            p.card-meta {
                (node.images.len()) " image(s), "
                (node.total_images()) " including sub-cards"
            }
            @if admin {
                div.card-actions {
                    form method="post" action={ "/gallery/edit_card/" (id) } {
                        input type="text" name="card_name" value=(node.card.name) required;
                        button type="submit" { "Rename" }
                    }
                    form method="post" action={ "/gallery/delete_card/" (id) }
                        onsubmit="return confirm('Delete this card, its sub-cards and all their images?');" {
                        button type="submit" { "Delete card" }
                    }
                    form method="post" action="/gallery/add_card" {
                        input type="hidden" name="parent_id" value=(id);
                        input type="text" name="card_name" placeholder="Sub-card name" required;
                        button type="submit" { "Add sub-card" }
                    }
                    form method="post" action="/gallery/upload_image" enctype="multipart/form-data" {
                        input type="hidden" name="card_id" value=(id);
                        input type="file" name="image" accept="image/*" multiple;
                        button type="submit" { "Upload" }
                    }
                }
            }
            @if !node.images.is_empty() {
                div.image-grid {
                    @for image in &node.images {
                        (render_image(image, admin))
                    }
                }
            }
            @for child in &node.children {
                (render_card(child, admin))
            }
        }
    }
}

fn render_image(image: &Image, admin: bool) -> Markup {
    html! {
        figure {
            a href={ "/uploads/" (image.filename) } {
                img src={ "/uploads/" (image.filename) } alt=(image.filename) loading="lazy";
            }
            @if admin {
                form method="post" action={ "/gallery/delete_image/" (image.id) } {
                    button type="submit" { "Delete" }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
