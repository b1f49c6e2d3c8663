#![allow(clippy::float_cmp)]

use canvas::persist::SceneSnapshot;
use tempfile::TempDir;

use super::*;

// =============================================================
// Helpers
// =============================================================

fn config(dir: &TempDir) -> DeskConfig {
    DeskConfig {
        data_dir: dir.path().join("data"),
        export_dir: dir.path().join("exports"),
        canvas_width: 400.0,
        canvas_height: 300.0,
    }
}

fn yes(_: &str) -> bool {
    true
}

fn no(_: &str) -> bool {
    false
}

async fn exec(config: &DeskConfig, command: Command) -> Result<Vec<String>, CliError> {
    run(command, config, &yes).await
}

fn saved(config: &DeskConfig) -> SceneSnapshot {
    persist::try_load(&FileStore::new(&config.data_dir)).unwrap().unwrap()
}

fn add(name: &str) -> Command {
    Command::Add(AddArgs {
        name: name.into(),
        icon: format!("/icons/{name}.png"),
        category: None,
        size: None,
        cabinet: false,
        depth: None,
    })
}

async fn add_one(config: &DeskConfig, name: &str) -> ElementId {
    exec(config, add(name)).await.unwrap();
    saved(config).elements.last().map(|e| e.id).unwrap()
}

// =============================================================
// Argument parsing
// =============================================================

#[test]
fn parses_menu_with_negative_angle() {
    let id = uuid::Uuid::new_v4().to_string();
    let cli = Cli::try_parse_from(["deskcraft", "menu", &id, "rotate", "--angle", "-90"]).unwrap();
    let Command::Menu { action, angle, .. } = cli.command else {
        panic!("expected menu command");
    };
    assert_eq!(action, MenuChoice::Rotate);
    assert_eq!(angle, -90.0);
}

#[test]
fn rejects_bad_element_id() {
    assert!(Cli::try_parse_from(["deskcraft", "menu", "42", "delete"]).is_err());
}

#[test]
fn category_names_are_checked() {
    assert_eq!(parse_category("Study").unwrap(), Category::Study);
    assert!(matches!(parse_category("furniture"), Err(CliError::UnknownCategory(_))));
}

// =============================================================
// Commands
// =============================================================

#[tokio::test]
async fn add_centers_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let lines = exec(&config, add("lamp")).await.unwrap();
    assert!(lines[0].starts_with("added "));
    let scene = saved(&config);
    assert_eq!(scene.elements.len(), 1);
    assert_eq!((scene.elements[0].x, scene.elements[0].y), (150.0, 100.0));
    assert!(!scene.timestamp.is_empty());
}

#[tokio::test]
async fn add_cabinet_uses_cabinet_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let command = Command::Add(AddArgs {
        name: "shelf".into(),
        icon: "/icons/shelf.png".into(),
        category: Some("tools".into()),
        size: Some(3),
        cabinet: true,
        depth: None,
    });
    exec(&config, command).await.unwrap();
    let e = &saved(&config).elements[0];
    assert_eq!(e.depth, 50.0);
    assert_eq!(e.material, "wood");
    assert_eq!(e.size_class, Some(3));
}

#[tokio::test]
async fn add_rejects_blank_icon() {
    let dir = tempfile::tempdir().unwrap();
    let mut command = add("lamp");
    if let Command::Add(args) = &mut command {
        args.icon = "  ".into();
    }
    let err = exec(&config(&dir), command).await.unwrap_err();
    assert!(matches!(err, CliError::Palette(PaletteError::MissingIcon { .. })));
}

#[tokio::test]
async fn drop_places_under_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let payload = r#"{"name":"mug","icon":"/icons/mug.png","category":"daily"}"#.to_owned();
    exec(&config, Command::Drop { payload, x: 120.0, y: 80.0 }).await.unwrap();
    let e = &saved(&config).elements[0];
    assert_eq!((e.x, e.y), (70.0, 30.0));
    assert_eq!(e.category, Some(Category::Daily));
}

#[tokio::test]
async fn move_drags_to_target() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let id = add_one(&config, "lamp").await;
    exec(&config, Command::Move { id, x: 40.0, y: 25.0 }).await.unwrap();
    let e = &saved(&config).elements[0];
    assert_eq!((e.x, e.y), (40.0, 25.0));
}

#[tokio::test]
async fn move_is_clamped_with_drag_footprint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let id = add_one(&config, "lamp").await;
    exec(&config, Command::Move { id, x: 1000.0, y: -30.0 }).await.unwrap();
    let e = &saved(&config).elements[0];
    assert_eq!((e.x, e.y), (350.0, 0.0));
}

#[tokio::test]
async fn move_of_covered_element_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let below = add_one(&config, "lamp").await;
    add_one(&config, "mug").await;
    let err = exec(&config, Command::Move { id: below, x: 0.0, y: 0.0 }).await.unwrap_err();
    assert!(matches!(err, CliError::Occluded(id) if id == below));
}

#[tokio::test]
async fn menu_actions_apply_and_persist() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let first = add_one(&config, "lamp").await;
    add_one(&config, "mug").await;

    exec(&config, Command::Menu { id: first, action: MenuChoice::Rotate, angle: -90.0 }).await.unwrap();
    exec(&config, Command::Menu { id: first, action: MenuChoice::Front, angle: 0.0 }).await.unwrap();
    let scene = saved(&config);
    let lamp = scene.elements.iter().find(|e| e.id == first).unwrap();
    assert_eq!(lamp.rotation, 270.0);
    assert_eq!(lamp.z_index, 3);

    exec(&config, Command::Menu { id: first, action: MenuChoice::Duplicate, angle: 0.0 }).await.unwrap();
    assert_eq!(saved(&config).elements.len(), 3);

    let lines = exec(&config, Command::Menu { id: first, action: MenuChoice::Delete, angle: 0.0 }).await.unwrap();
    assert!(lines.contains(&format!("deleted {first}")));
    assert!(saved(&config).elements.iter().all(|e| e.id != first));
}

#[tokio::test]
async fn menu_on_unknown_element_fails() {
    let dir = tempfile::tempdir().unwrap();
    let id = uuid::Uuid::new_v4();
    let err = exec(&config(&dir), Command::Menu { id, action: MenuChoice::Delete, angle: 0.0 }).await.unwrap_err();
    assert!(matches!(err, CliError::UnknownElement(_)));
}

#[tokio::test]
async fn identifier_and_background_are_saved() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    exec(&config, Command::Identifier { value: " 301 ".into() }).await.unwrap();
    exec(&config, Command::Background { value: "/bg/oak.jpg".into() }).await.unwrap();
    let scene = saved(&config);
    assert_eq!(scene.identifier, "301");
    assert_eq!(scene.background, "/bg/oak.jpg");
    let shown = exec(&config, Command::Show { json: false }).await.unwrap();
    assert_eq!(shown[0], "identifier: 301");
}

#[tokio::test]
async fn clear_respects_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    add_one(&config, "lamp").await;

    let lines = run(Command::Clear { yes: false }, &config, &no).await.unwrap();
    assert_eq!(lines, vec!["nothing changed".to_owned()]);
    assert_eq!(saved(&config).elements.len(), 1);

    let lines = exec(&config, Command::Clear { yes: true }).await.unwrap();
    assert_eq!(lines, vec!["cleared 1 elements".to_owned()]);
    assert!(saved(&config).elements.is_empty());
}

#[tokio::test]
async fn show_json_prints_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    add_one(&config, "lamp").await;
    let lines = exec(&config, Command::Show { json: true }).await.unwrap();
    let parsed = SceneSnapshot::from_json(&lines[0]).unwrap();
    assert_eq!(parsed.elements.len(), 1);
}

#[tokio::test]
async fn corrupt_save_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::write(config.data_dir.join("desktop-config.json"), "{not json").unwrap();
    let err = exec(&config, Command::Show { json: false }).await.unwrap_err();
    assert!(matches!(err, CliError::Persist(PersistError::SnapshotCorrupt(_))));
}

#[tokio::test]
async fn export_writes_named_png() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    add_one(&config, "lamp").await;
    exec(&config, Command::Identifier { value: "301".into() }).await.unwrap();

    let lines = exec(&config, Command::Export { out: None }).await.unwrap();
    assert!(lines[0].starts_with("exported "));

    let files: Vec<PathBuf> = std::fs::read_dir(&config.export_dir).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("宿舍_301_桌面设计_"), "{name}");
    assert!(name.ends_with(".png"));
    let bytes = std::fs::read(&files[0]).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    assert!(lines[0].contains("800x600"));
}

#[tokio::test]
async fn export_does_not_touch_saved_scene() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    add_one(&config, "lamp").await;
    let before = saved(&config);
    exec(&config, Command::Export { out: Some(dir.path().join("elsewhere")) }).await.unwrap();
    assert_eq!(saved(&config), before);
    assert!(dir.path().join("elsewhere").is_dir());
}
