//! Static site pages.
//!
//! The four public pages are plain Markdown files in the content root:
//!
//! ```text
//! content/
//! ├── index.md        # Home        → /
//! ├── projects.md     # Projects    → /projects
//! ├── contact.md      # Contact     → /contact
//! └── experience.md   # Experience  → /experience
//! ```
//!
//! Each file is read and rendered once, when the server starts. The page title
//! is the first `# heading` in the file, falling back to the page's nav label.
//! A missing file is not an error: the page renders a short placeholder so a
//! fresh site works before any content has been written.

use pulldown_cmark::{Parser, html as md_html};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Home,
    Projects,
    Contact,
    Experience,
}

impl PageKind {
    pub const ALL: [PageKind; 4] = [
        PageKind::Home,
        PageKind::Projects,
        PageKind::Contact,
        PageKind::Experience,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            PageKind::Home => "index.md",
            PageKind::Projects => "projects.md",
            PageKind::Contact => "contact.md",
            PageKind::Experience => "experience.md",
        }
    }

    /// Label shown in the site navigation.
    pub fn label(self) -> &'static str {
        match self {
            PageKind::Home => "Home",
            PageKind::Projects => "Projects",
            PageKind::Contact => "Contact",
            PageKind::Experience => "Experience",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            PageKind::Home => "/",
            PageKind::Projects => "/projects",
            PageKind::Contact => "/contact",
            PageKind::Experience => "/experience",
        }
    }
}

/// A rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub kind: PageKind,
    pub title: String,
    /// HTML rendered from the Markdown body.
    pub body_html: String,
}

impl Page {
    pub fn from_markdown(kind: PageKind, markdown: &str) -> Self {
        let title = markdown
            .lines()
            .find(|line| line.starts_with("# "))
            .map(|line| line.trim_start_matches("# ").trim().to_string())
            .unwrap_or_else(|| kind.label().to_string());

        let mut body_html = String::new();
        md_html::push_html(&mut body_html, Parser::new(markdown));

        Self {
            kind,
            title,
            body_html,
        }
    }

    fn placeholder(kind: PageKind) -> Self {
        Self {
            kind,
            title: kind.label().to_string(),
            body_html: format!(
                "<p>Nothing here yet. Add <code>{}</code> to the content directory.</p>\n",
                kind.file_name()
            ),
        }
    }
}

/// All site pages, rendered.
#[derive(Debug, Clone)]
pub struct Pages {
    home: Page,
    projects: Page,
    contact: Page,
    experience: Page,
}

impl Pages {
    /// Read and render every page from `content_root`.
    ///
    /// Missing files become placeholders; any other read error is returned.
    pub fn load(content_root: &Path) -> io::Result<Self> {
        Ok(Self {
            home: load_page(content_root, PageKind::Home)?,
            projects: load_page(content_root, PageKind::Projects)?,
            contact: load_page(content_root, PageKind::Contact)?,
            experience: load_page(content_root, PageKind::Experience)?,
        })
    }

    pub fn get(&self, kind: PageKind) -> &Page {
        match kind {
            PageKind::Home => &self.home,
            PageKind::Projects => &self.projects,
            PageKind::Contact => &self.contact,
            PageKind::Experience => &self.experience,
        }
    }
}

fn load_page(content_root: &Path, kind: PageKind) -> io::Result<Page> {
    let path = content_root.join(kind.file_name());
    match fs::read_to_string(&path) {
        Ok(markdown) => Ok(Page::from_markdown(kind, &markdown)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "page missing, using placeholder");
            Ok(Page::placeholder(kind))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn title_from_first_heading() {
        let page = Page::from_markdown(PageKind::Projects, "intro\n\n# My Work\n\nText");
        assert_eq!(page.title, "My Work");
    }

    #[test]
    fn title_falls_back_to_label() {
        let page = Page::from_markdown(PageKind::Contact, "Write to me.");
        assert_eq!(page.title, "Contact");
    }

    #[test]
    fn second_level_heading_is_not_a_title() {
        let page = Page::from_markdown(PageKind::Home, "## Sub\n");
        assert_eq!(page.title, "Home");
    }

    #[test]
    fn markdown_is_rendered() {
        let page = Page::from_markdown(PageKind::Home, "# Hello\n\n**bold** text");
        assert!(page.body_html.contains("<h1>Hello</h1>"));
        assert!(page.body_html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn load_reads_files_and_fills_gaps() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.md"), "# Welcome\n\nHi.").unwrap();
        fs::write(tmp.path().join("experience.md"), "# CV\n").unwrap();

        let pages = Pages::load(tmp.path()).unwrap();
        assert_eq!(pages.get(PageKind::Home).title, "Welcome");
        assert_eq!(pages.get(PageKind::Experience).title, "CV");

        let projects = pages.get(PageKind::Projects);
        assert_eq!(projects.title, "Projects");
        assert!(projects.body_html.contains("projects.md"));
    }

    #[test]
    fn load_from_missing_directory_gives_placeholders() {
        let tmp = TempDir::new().unwrap();
        let pages = Pages::load(&tmp.path().join("nope")).unwrap();
        for kind in PageKind::ALL {
            assert_eq!(pages.get(kind).kind, kind);
        }
    }
}
