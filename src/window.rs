// Window collaborator contract
//
// The renderer never creates or polls a window. It only needs the native
// handles, the instance extensions the platform requires for presenting,
// and the framebuffer size in pixels.

use crate::error::{InitError, InitResult};
use raw_window_handle::{
    HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use std::ffi::CStr;

pub trait WindowTarget {
    /// Native display and window handles used to create the surface.
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError>;

    /// Platform windowing extensions the instance must enable.
    fn required_instance_extensions(&self) -> InitResult<Vec<String>>;

    /// Framebuffer size in pixels as (width, height).
    fn framebuffer_size(&self) -> (u32, u32);
}

impl WindowTarget for winit::window::Window {
    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        let display = self.display_handle()?.as_raw();
        let window = self.window_handle()?.as_raw();
        Ok((display, window))
    }

    fn required_instance_extensions(&self) -> InitResult<Vec<String>> {
        let display = self.display_handle()?.as_raw();
        let names = ash_window::enumerate_required_extensions(display)
            .map_err(InitError::query("window surface extensions"))?;

        // Safety: ash-window hands out pointers to static NUL-terminated names
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
            .collect())
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}
