// Windows suspend/resume notifications using windows-rs crate

use std::ffi::c_void;

use windows::Win32::Foundation::{ERROR_SUCCESS, HANDLE};
use windows::Win32::System::Power::{
    PowerRegisterSuspendResumeNotification, PowerUnregisterSuspendResumeNotification,
    DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS, HPOWERNOTIFY,
};
use windows::Win32::UI::WindowsAndMessaging::{DEVICE_NOTIFY_CALLBACK, PBT_APMRESUMEAUTOMATIC};

use super::ResumeCallback;
use crate::error::PowerError;

/// Registration with the power manager. Unregisters on drop.
pub struct PowerNotification {
    handle: HPOWERNOTIFY,
    // Both are referenced by the OS until unregistered, so they stay boxed
    _params: Box<DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS>,
    _callback: Box<ResumeCallback>,
}

// SAFETY: the handle is only passed back to PowerUnregisterSuspendResumeNotification,
// which may be called from any thread. The callback itself is Send + Sync.
unsafe impl Send for PowerNotification {}

impl PowerNotification {
    pub fn register(callback: ResumeCallback) -> Result<Self, PowerError> {
        let callback = Box::new(callback);
        let params = Box::new(DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS {
            Callback: Some(on_power_event),
            Context: &*callback as *const ResumeCallback as *mut c_void,
        });

        let mut handle = HPOWERNOTIFY::default();
        // SAFETY: `params` and `callback` live in boxes owned by the returned value and are
        // only freed after unregistering in Drop.
        let status = unsafe {
            PowerRegisterSuspendResumeNotification(
                DEVICE_NOTIFY_CALLBACK,
                HANDLE(&*params as *const DEVICE_NOTIFY_SUBSCRIBE_PARAMETERS as *mut c_void),
                &mut handle,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(PowerError::Register { code: status.0 });
        }

        Ok(Self {
            handle,
            _params: params,
            _callback: callback,
        })
    }
}

impl Drop for PowerNotification {
    fn drop(&mut self) {
        // SAFETY: handle came from a successful registration and is unregistered once
        unsafe {
            let _ = PowerUnregisterSuspendResumeNotification(self.handle);
        }
    }
}

unsafe extern "system" fn on_power_event(
    context: *const c_void,
    kind: u32,
    _setting: *const c_void,
) -> u32 {
    // Sent on every resume, with or without user input
    if kind == PBT_APMRESUMEAUTOMATIC && !context.is_null() {
        let callback = &*(context as *const ResumeCallback);
        callback();
    }
    ERROR_SUCCESS.0
}
