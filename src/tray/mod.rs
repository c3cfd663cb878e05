// System tray shell
// Tray icon + menu over the keep-alive controller; no windows are ever opened
use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tauri::image::Image;
use tauri::menu::{CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem, Submenu};
use tauri::tray::TrayIconBuilder;
use tauri::{AppHandle, Manager, RunEvent, Wry};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::audio::{AudioBackend, DeviceId};
use crate::state::AppState;

const TRAY_ID: &str = "main";
const DEVICE_PREFIX: &str = "device:";
const MENU_REFRESH: &str = "refresh";
const MENU_STARTUP: &str = "startup";
const MENU_OPEN_CONFIG: &str = "open-config";
const MENU_RESTART: &str = "restart";
const MENU_ABOUT: &str = "about";
const MENU_EXIT: &str = "exit";

const TITLE: &str = "AudioPopFix";
const TRAY_ICON: &[u8] = include_bytes!("../../icons/tray.png");

pub fn run(state: AppState, runtime: Runtime) -> Result<()> {
    // Share one runtime between tauri and the controller
    tauri::async_runtime::set(runtime.handle().clone());

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(move |app| {
            app.manage(state);
            build_tray(app.handle())?;
            Ok(())
        })
        .build(tauri::generate_context!())
        .context("error while building tauri application")?;

    app.run(|app, event| match event {
        RunEvent::ExitRequested { api, code, .. } => {
            // Only the Exit menu item ends a tray-only app
            if code.is_none() {
                api.prevent_exit();
            }
        }
        RunEvent::Exit => {
            info!("Exiting");
            app.state::<AppState>().shutdown();
        }
        _ => {}
    });

    drop(runtime);
    Ok(())
}

fn build_tray(app: &AppHandle) -> Result<()> {
    let menu = build_menu(app)?;

    TrayIconBuilder::with_id(TRAY_ID)
        .icon(tray_icon()?)
        .tooltip(tooltip(app))
        .menu(&menu)
        .on_menu_event(handle_menu_event)
        .build(app)?;
    Ok(())
}

fn tray_icon() -> Result<Image<'static>> {
    let decoded = image::load_from_memory_with_format(TRAY_ICON, image::ImageFormat::Png)
        .context("Failed to decode tray icon")?
        .into_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(Image::new_owned(decoded.into_raw(), width, height))
}

fn tooltip(app: &AppHandle) -> String {
    let state = app.state::<AppState>();
    if state.location.portable {
        format!("{} (Portable)", TITLE)
    } else {
        let active = state.controller.active_devices().len();
        format!("{} - keeping {} device(s) awake", TITLE, active)
    }
}

fn build_menu(app: &AppHandle) -> tauri::Result<Menu<Wry>> {
    let state = app.state::<AppState>();
    let targets = state.controller.targets();

    let keep_awake = Submenu::new(app, "Keep Awake", true)?;
    let mut present = BTreeSet::new();
    match state.controller.backend().enumerate_active_render_devices() {
        Ok(devices) => {
            for device in devices {
                let item = CheckMenuItem::with_id(
                    app,
                    format!("{}{}", DEVICE_PREFIX, device.id),
                    &device.display_name,
                    true,
                    targets.contains(&device.id),
                    None::<&str>,
                )?;
                keep_awake.append(&item)?;
                present.insert(device.id);
            }
        }
        Err(e) => warn!(error = %e, "Failed to list output devices"),
    }

    // Selected but not plugged in: still listed so it can be deselected
    for id in targets.iter().filter(|id| !present.contains(*id)) {
        let item = CheckMenuItem::with_id(
            app,
            format!("{}{}", DEVICE_PREFIX, id),
            format!("{} (unavailable)", id),
            true,
            true,
            None::<&str>,
        )?;
        keep_awake.append(&item)?;
    }

    if present.is_empty() && targets.is_empty() {
        let empty = MenuItem::new(app, "No output devices found", false, None::<&str>)?;
        keep_awake.append(&empty)?;
    }
    keep_awake.append(&PredefinedMenuItem::separator(app)?)?;
    keep_awake.append(&MenuItem::with_id(
        app,
        MENU_REFRESH,
        "Refresh Device List",
        true,
        None::<&str>,
    )?)?;

    let startup_label = if cfg!(windows) {
        "Start with Windows"
    } else {
        "Start at Login"
    };
    let startup = CheckMenuItem::with_id(
        app,
        MENU_STARTUP,
        startup_label,
        state.startup.is_available(),
        state.startup.is_enabled(),
        None::<&str>,
    )?;
    let open_config =
        MenuItem::with_id(app, MENU_OPEN_CONFIG, "Open Config Folder", true, None::<&str>)?;
    let restart = MenuItem::with_id(app, MENU_RESTART, "Restart Streams", true, None::<&str>)?;
    let about = MenuItem::with_id(app, MENU_ABOUT, "About", true, None::<&str>)?;
    let exit = MenuItem::with_id(app, MENU_EXIT, "Exit", true, None::<&str>)?;

    Menu::with_items(
        app,
        &[
            &keep_awake,
            &startup,
            &open_config,
            &PredefinedMenuItem::separator(app)?,
            &restart,
            &about,
            &PredefinedMenuItem::separator(app)?,
            &exit,
        ],
    )
}

fn refresh_menu(app: &AppHandle) {
    let Some(tray) = app.tray_by_id(TRAY_ID) else {
        return;
    };

    match build_menu(app) {
        Ok(menu) => {
            if let Err(e) = tray.set_menu(Some(menu)) {
                warn!(error = %e, "Failed to replace tray menu");
            }
            if let Err(e) = tray.set_tooltip(Some(tooltip(app))) {
                warn!(error = %e, "Failed to update tray tooltip");
            }
        }
        Err(e) => warn!(error = %e, "Failed to rebuild tray menu"),
    }
}

fn handle_menu_event(app: &AppHandle, event: MenuEvent) {
    let id = event.id().0.as_str();

    if let Some(device) = id.strip_prefix(DEVICE_PREFIX) {
        toggle_device(app, DeviceId::from(device));
        return;
    }

    match id {
        MENU_REFRESH => refresh_menu(app),
        MENU_STARTUP => toggle_startup(app),
        MENU_OPEN_CONFIG => open_config_folder(app),
        MENU_RESTART => app.state::<AppState>().controller.restart_streams(),
        MENU_ABOUT => {
            let text = app.state::<AppState>().about_text();
            show_message(app, &text, MessageDialogKind::Info);
        }
        MENU_EXIT => app.exit(0),
        other => debug!(id = other, "Unhandled menu event"),
    }
}

fn toggle_device(app: &AppHandle, id: DeviceId) {
    let state = app.state::<AppState>();
    let mut targets = state.controller.targets();
    if !targets.remove(&id) {
        targets.insert(id);
    }

    state.controller.set_target_devices(targets);
    refresh_menu(app);
}

fn toggle_startup(app: &AppHandle) {
    let state = app.state::<AppState>();
    if state.location.portable {
        show_message(
            app,
            "Start with Windows is disabled in Portable Mode.\n\n\
             Tip: create a shortcut to this EXE in the Startup folder (shell:startup).",
            MessageDialogKind::Info,
        );
        return;
    }

    if let Err(e) = state.startup.toggle() {
        warn!(error = %e, "Failed to toggle startup registration");
        show_message(
            app,
            &format!("Failed to update Startup setting.\n\n{}", e),
            MessageDialogKind::Warning,
        );
    }
    refresh_menu(app);
}

fn open_config_folder(app: &AppHandle) {
    let dir = app.state::<AppState>().location.dir.to_string_lossy().into_owned();
    if let Err(e) = app.opener().open_path(dir, None::<&str>) {
        warn!(error = %e, "Failed to open config folder");
    }
}

fn show_message(app: &AppHandle, text: &str, kind: MessageDialogKind) {
    app.dialog()
        .message(text)
        .title(TITLE)
        .kind(kind)
        .show(|_| {});
}
