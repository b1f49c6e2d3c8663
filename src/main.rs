mod config;
mod raster;
mod sink;
mod store;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::PathBuf;

use canvas::doc::ElementId;
use canvas::engine::{Action, Confirm, Engine, EngineCore};
use canvas::export::ExportError;
use canvas::geom::{Point, Rect};
use canvas::input::{Button, MenuAction};
use canvas::palette::{Category, ElementDescriptor, PaletteError};
use canvas::persist::{self, PersistError};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::DeskConfig;
use crate::raster::SoftwareRasterizer;
use crate::sink::{DirectorySink, StdinConfirm};
use crate::store::FileStore;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no element with id {0}")]
    UnknownElement(ElementId),
    #[error("element {0} is covered at its grab point; bring it to front first")]
    Occluded(ElementId),
    #[error("invalid palette item: {0}")]
    Palette(#[from] PaletteError),
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("desktop storage failed: {0}")]
    Persist(#[from] PersistError),
    #[error("{message} [{code}]: {0}", message = .0.user_message(), code = .0.error_code())]
    Export(#[from] ExportError),
}

#[derive(Parser, Debug)]
#[command(name = "deskcraft", about = "Compose and export a dorm desktop")]
struct Cli {
    /// Directory holding the saved desktop (overrides `DESK_DATA_DIR`).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Canvas width in pixels (overrides `DESK_CANVAS_WIDTH`).
    #[arg(long)]
    width: Option<f64>,

    /// Canvas height in pixels (overrides `DESK_CANVAS_HEIGHT`).
    #[arg(long)]
    height: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the saved desktop.
    Show {
        /// Print the raw saved snapshot.
        #[arg(long)]
        json: bool,
    },
    /// Place a palette item at the center of the canvas.
    Add(AddArgs),
    /// Drop a serialized palette item centered on canvas coordinates.
    Drop {
        payload: String,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
    },
    /// Drag an element so its top-left corner lands on (x, y).
    Move {
        id: ElementId,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
    },
    /// Run a context-menu action on an element.
    Menu {
        id: ElementId,
        action: MenuChoice,
        /// Degrees for `rotate`.
        #[arg(long, default_value_t = 90.0, allow_hyphen_values = true)]
        angle: f64,
    },
    /// Set the dorm identifier used for the watermark and filename.
    Identifier { value: String },
    /// Set the background reference.
    Background { value: String },
    /// Remove every element.
    Clear {
        /// Do not ask for confirmation.
        #[arg(long, short)]
        yes: bool,
    },
    /// Rasterize the desktop to a PNG.
    Export {
        /// Output directory (overrides `DESK_EXPORT_DIR`).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    name: String,
    icon: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    size: Option<u32>,
    #[arg(long)]
    cabinet: bool,
    #[arg(long)]
    depth: Option<f64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum MenuChoice {
    Edit,
    Delete,
    Duplicate,
    Rotate,
    Front,
    Back,
}

impl MenuChoice {
    fn to_action(self, angle: f64) -> MenuAction {
        match self {
            Self::Edit => MenuAction::Edit,
            Self::Delete => MenuAction::Delete,
            Self::Duplicate => MenuAction::Duplicate,
            Self::Rotate => MenuAction::Rotate(angle),
            Self::Front => MenuAction::BringToFront,
            Self::Back => MenuAction::SendToBack,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = DeskConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(width) = cli.width.filter(|w| *w > 0.0) {
        config.canvas_width = width;
    }
    if let Some(height) = cli.height.filter(|h| *h > 0.0) {
        config.canvas_height = height;
    }

    let assume_yes = matches!(cli.command, Command::Clear { yes: true });
    let confirm = StdinConfirm::stdin(assume_yes);
    for line in run(cli.command, &config, &confirm).await? {
        println!("{line}");
    }
    Ok(())
}

/// Load the saved desktop into an engine sized to the configured canvas.
fn open(config: &DeskConfig) -> Result<(EngineCore, FileStore), CliError> {
    let store = FileStore::new(&config.data_dir);
    let mut core = EngineCore::new();
    core.set_canvas_rect(Rect::new(0.0, 0.0, config.canvas_width, config.canvas_height));
    if let Some(snapshot) = persist::try_load(&store)? {
        core.restore(snapshot);
    }
    Ok((core, store))
}

/// Execute one command against the saved desktop, returning the lines to
/// print. Mutating commands save before returning.
async fn run(command: Command, config: &DeskConfig, confirm: &dyn Confirm) -> Result<Vec<String>, CliError> {
    let (mut core, mut store) = open(config)?;
    let actions = match command {
        Command::Show { json } => return Ok(show(&core, json)),
        Command::Export { out } => {
            let dir = out.unwrap_or_else(|| config.export_dir.clone());
            return export(core, dir).await;
        }
        Command::Add(args) => core.palette_click(&descriptor(args)?),
        Command::Drop { payload, x, y } => core.drop_payload(&payload, Point::new(x, y))?,
        Command::Move { id, x, y } => drag(&mut core, id, Point::new(x, y))?,
        Command::Menu { id, action, angle } => {
            let anchor = core.element(&id).map(|e| e.position()).ok_or(CliError::UnknownElement(id))?;
            core.open_context_menu(id, anchor);
            core.menu_action(action.to_action(angle))
        }
        Command::Identifier { value } => {
            core.set_identifier(value.trim());
            vec![Action::RenderNeeded]
        }
        Command::Background { value } => {
            core.set_background(value);
            vec![Action::RenderNeeded]
        }
        Command::Clear { .. } => core.clear_desktop(confirm),
    };

    if actions.is_empty() {
        return Ok(vec!["nothing changed".to_owned()]);
    }
    let saved = core.save_desktop(&mut store)?;
    info!(elements = saved.elements.len(), timestamp = %saved.timestamp, "desktop saved");
    let mut lines: Vec<String> = actions.iter().filter_map(|a| describe(&core, a)).collect();
    if lines.is_empty() {
        lines.push("saved".to_owned());
    }
    Ok(lines)
}

fn descriptor(args: AddArgs) -> Result<ElementDescriptor, CliError> {
    let mut descriptor = ElementDescriptor::new(args.name, args.icon);
    descriptor.category = args.category.map(|c| parse_category(&c)).transpose()?;
    descriptor.size_class = args.size;
    descriptor.is_cabinet = args.cabinet;
    descriptor.depth = args.depth;
    descriptor.validate()?;
    Ok(descriptor)
}

fn parse_category(raw: &str) -> Result<Category, CliError> {
    let category = Category::from(raw.trim().to_lowercase());
    if !category.is_known() {
        return Err(CliError::UnknownCategory(raw.to_owned()));
    }
    Ok(category)
}

/// Drag `id` by pressing just inside its top-left corner.
fn drag(core: &mut EngineCore, id: ElementId, to: Point) -> Result<Vec<Action>, CliError> {
    let from = core.element(&id).map(|e| e.position()).ok_or(CliError::UnknownElement(id))?;
    let grab = Point::new(1.0, 1.0);
    core.on_pointer_down(Point::new(from.x + grab.x, from.y + grab.y), Button::Primary);
    if core.input.dragging_id() != Some(id) {
        core.end_drag();
        return Err(CliError::Occluded(id));
    }
    let mut actions = core.on_pointer_move(Point::new(to.x + grab.x, to.y + grab.y));
    actions.extend(core.on_pointer_up(to));
    Ok(actions)
}

async fn export(core: EngineCore, dir: PathBuf) -> Result<Vec<String>, CliError> {
    let engine = Engine::new(core, SoftwareRasterizer, DirectorySink::new(&dir));
    let artifact = engine.export().await?;
    Ok(vec![format!(
        "exported {} ({}x{}, {} bytes)",
        dir.join(&artifact.filename).display(),
        artifact.width,
        artifact.height,
        artifact.png.len()
    )])
}

fn show(core: &EngineCore, json: bool) -> Vec<String> {
    let snapshot = core.snapshot();
    if json {
        return vec![snapshot.to_json().unwrap_or_else(|e| format!("<unserializable: {e}>"))];
    }
    let mut lines = vec![
        format!("identifier: {}", if snapshot.identifier.is_empty() { "-" } else { &snapshot.identifier }),
        format!("background: {}", if snapshot.background.is_empty() { "-" } else { &snapshot.background }),
        format!("elements:   {}", core.doc.len()),
    ];
    lines.extend(core.doc.sorted_elements().into_iter().map(|e| {
        format!("{}  z={:<3} ({:.0}, {:.0})  rot={:.0}  {}", e.id, e.z_index, e.x, e.y, e.rotation, e.name)
    }));
    lines
}

fn describe(core: &EngineCore, action: &Action) -> Option<String> {
    match action {
        Action::ElementCreated(e) => Some(format!("added {} {} at ({:.0}, {:.0})", e.id, e.name, e.x, e.y)),
        Action::ElementUpdated { id } => core.element(id).map(|e| {
            format!("updated {id} at ({:.0}, {:.0}) rot={:.0} z={}", e.x, e.y, e.rotation, e.z_index)
        }),
        Action::ElementDeleted { id } => Some(format!("deleted {id}")),
        Action::SelectionChanged(Some(id)) => Some(format!("selected {id}")),
        Action::SelectionChanged(None) => Some("selection cleared".to_owned()),
        Action::DesktopCleared { removed } => Some(format!("cleared {removed} elements")),
        Action::ContextMenuChanged(_) | Action::RenderNeeded => None,
    }
}
