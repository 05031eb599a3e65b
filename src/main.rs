use clap::{Parser, Subcommand};
use folio::{catalog::Catalog, config, output, server};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Personal site with a password-gated photo gallery")]
#[command(long_about = "\
Personal site with a password-gated photo gallery

The site directory holds everything the server needs:

  site/
  ├── config.toml                  # Site config (optional)
  ├── content/                     # Markdown bodies of the public pages
  │   ├── index.md                 # Home      → /
  │   ├── projects.md              # Projects  → /projects
  │   ├── contact.md               # Contact   → /contact
  │   └── experience.md            # Experience → /experience
  ├── instance/gallery.db          # Card and image catalog (created on first run)
  └── static/uploads/              # Uploaded image files (created on first run)

Gallery access is granted by shared passwords mapped to a level:
  public  browse cards and images
  admin   also create, rename and delete cards, upload and delete images

Log verbosity follows RUST_LOG (default: info).

Run 'folio gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site directory (holds config.toml; relative paths resolve against it)
    #[arg(long, default_value = ".", global = true)]
    site: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the site and gallery over HTTP
    Serve,
    /// Print the card tree from the catalog
    Tree {
        /// Print JSON instead of the indexed text tree
        #[arg(long)]
        json: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Serve => {
            let site_config = config::load_config(&cli.site)?;
            if site_config.uses_stock_passwords() {
                warn!("gallery.passwords are the stock secrets; set your own in config.toml");
            }
            info!(site = %cli.site.display(), "starting server");
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(&site_config, &cli.site))?;
        }
        Command::Tree { json } => {
            let site_config = config::load_config(&cli.site)?;
            let paths = site_config.resolve_paths(&cli.site);
            let catalog = Catalog::open(&paths.database)?;
            let cards = catalog.tree()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
            } else {
                output::print_card_tree(&cards);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so `tree` output stays pipeable.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
