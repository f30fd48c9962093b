use super::r#trait::ForegroundBackend;
use crate::error::Result;
use crate::events::ActivityInfo;

/// Windows: foreground window -> owning process image, straight through user32/kernel32.
#[derive(Default)]
pub struct Win32Detector;

impl Win32Detector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ForegroundBackend for Win32Detector {
    async fn test(&self) -> Result<()> {
        if cfg!(windows) {
            Ok(())
        } else {
            Err(crate::presence_error!(command, "the win32 backend only runs on Windows"))
        }
    }

    async fn get_active_activity(&self) -> Result<ActivityInfo> {
        foreground_activity()
    }
}

#[cfg(windows)]
fn foreground_activity() -> Result<ActivityInfo> {
    use crate::error::PresenceError;
    use crate::presence_error;
    use windows::core::PWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId};

    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.0.is_null() {
            return Err(PresenceError::NoActiveWindow);
        }

        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
        if pid == 0 {
            return Err(PresenceError::NoActiveWindow);
        }

        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid)
            .map_err(|e| presence_error!(command, "OpenProcess({}) failed: {}", pid, e))?;
        let mut image = [0u16; 1024];
        let mut size = image.len() as u32;
        let queried = QueryFullProcessImageNameW(process, PROCESS_NAME_WIN32, PWSTR(image.as_mut_ptr()), &mut size);
        let _ = CloseHandle(process);
        queried.map_err(|e| presence_error!(command, "QueryFullProcessImageNameW({}) failed: {}", pid, e))?;

        let path = String::from_utf16_lossy(&image[..size as usize]);
        let name = image_name(&path).ok_or(PresenceError::NoActiveWindow)?;

        let mut title = [0u16; 512];
        let copied = GetWindowTextW(hwnd, &mut title).max(0) as usize;

        Ok(ActivityInfo::new(name)
            .with_pid(pid)
            .with_title(String::from_utf16_lossy(&title[..copied])))
    }
}

#[cfg(not(windows))]
fn foreground_activity() -> Result<ActivityInfo> {
    Err(crate::presence_error!(command, "the win32 backend only runs on Windows"))
}

/// `C:\Program Files\Google\Chrome\Application\chrome.exe` -> `chrome.exe`.
pub(super) fn image_name(path: &str) -> Option<String> {
    let name = path.trim().rsplit(['\\', '/']).next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_name() {
        assert_eq!(
            image_name(r"C:\Program Files\Google\Chrome\Application\chrome.exe").as_deref(),
            Some("chrome.exe")
        );
        assert_eq!(image_name("Code.exe").as_deref(), Some("Code.exe"));
        assert_eq!(image_name(r"C:\Windows\").as_deref(), None);
        assert_eq!(image_name("").as_deref(), None);
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_unavailable_off_windows() {
        assert!(Win32Detector::new().test().await.is_err());
        assert!(Win32Detector::new().get_active_activity().await.is_err());
    }
}
