// HKCU Run key registration using winreg
use std::io;
use std::path::Path;

use winreg::enums::{HKEY_CURRENT_USER, KEY_READ};
use winreg::RegKey;

use crate::error::StartupError;

pub const SUPPORTED: bool = true;

const RUN_KEY_PATH: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";
const VALUE_NAME: &str = "AudioPopFix";

pub fn is_registered() -> bool {
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    hkcu.open_subkey_with_flags(RUN_KEY_PATH, KEY_READ)
        .and_then(|key| key.get_value::<String, _>(VALUE_NAME))
        .map(|value| !value.is_empty())
        .unwrap_or(false)
}

pub fn register(exe: &Path) -> Result<(), StartupError> {
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _) = hkcu.create_subkey(RUN_KEY_PATH)?;
    key.set_value(VALUE_NAME, &format!("\"{}\"", exe.display()))?;
    Ok(())
}

pub fn unregister() -> Result<(), StartupError> {
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _) = hkcu.create_subkey(RUN_KEY_PATH)?;
    match key.delete_value(VALUE_NAME) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
