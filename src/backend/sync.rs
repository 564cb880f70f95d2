// Synchronization primitives
//
// A single pair of semaphores orders acquire -> render -> present. There is
// no fence: the CPU never waits on the GPU inside the loop.

use ash::vk;

use super::Driver;
use crate::error::{InitError, InitResult, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSync {
    /// Signaled by acquire, waited on by submit.
    pub image_available: vk::Semaphore,
    /// Signaled by submit, waited on by present.
    pub render_finished: vk::Semaphore,
}

impl FrameSync {
    pub fn new(driver: &mut dyn Driver) -> InitResult<Self> {
        let image_available = driver
            .create_semaphore()
            .map_err(InitError::creation(Stage::Semaphore))?;

        let render_finished = match driver.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(result) => {
                driver.destroy_semaphore(image_available);
                return Err(InitError::Creation { stage: Stage::Semaphore, result });
            }
        };

        Ok(Self { image_available, render_finished })
    }

    /// Render-finished first, mirroring creation.
    pub fn destroy(&self, driver: &mut dyn Driver) {
        driver.destroy_semaphore(self.render_finished);
        driver.destroy_semaphore(self.image_available);
    }
}
