// Shader module loading
//
// Vulkan consumes SPIR-V as 32-bit words. Blobs are taken verbatim: the
// only check is that the byte length is word-sized.

use ash::vk;
use std::path::Path;

use super::Driver;
use crate::error::{InitError, InitResult, Stage};

/// Entry point used for both stages.
pub const ENTRY_POINT: &std::ffi::CStr = c"main";

/// A compiled SPIR-V blob, stored as aligned words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCode {
    words: Vec<u32>,
}

impl ShaderCode {
    pub fn from_bytes(bytes: &[u8]) -> InitResult<Self> {
        let words = bytes_to_words(bytes).map_err(InitError::Shader)?;
        Ok(Self { words })
    }

    pub fn from_words(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Read a compiled `.spv` file.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let words = bytes_to_words(&bytes)?;
        Ok(Self { words })
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// Copies the bytes into u32 storage unchanged. No magic check, no byte swap.
fn bytes_to_words(bytes: &[u8]) -> std::io::Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("length {} is not a multiple of 4", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Vertex + fragment bytecode handed to the renderer.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: ShaderCode,
    pub fragment: ShaderCode,
}

pub fn create_shader_module(driver: &mut dyn Driver, code: &ShaderCode) -> InitResult<vk::ShaderModule> {
    driver
        .create_shader_module(code.words())
        .map_err(InitError::creation(Stage::ShaderModule))
}
