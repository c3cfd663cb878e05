use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone, Default)]
#[command(name = "audiopopfix")]
#[command(about = "Keeps selected audio output devices awake by playing silence")]
pub struct Cli {
    /// Keep the config next to the executable.
    #[arg(long)]
    pub portable: bool,

    /// Override the config directory.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Print active output devices (id, then name) and exit.
    #[arg(long)]
    pub list_devices: bool,

    /// Replace the selected devices. Repeat for several.
    #[arg(long = "device", value_name = "ID")]
    pub devices: Vec<String>,

    /// Deselect every device.
    #[arg(long, conflicts_with = "devices")]
    pub clear_devices: bool,

    /// Run without the tray icon until Ctrl-C.
    #[arg(long)]
    pub headless: bool,
}

impl Cli {
    /// New target set requested on the command line, if any
    pub fn requested_devices(&self) -> Option<Vec<String>> {
        if self.clear_devices {
            Some(Vec::new())
        } else if self.devices.is_empty() {
            None
        } else {
            Some(self.devices.clone())
        }
    }
}
