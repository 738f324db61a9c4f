use std::path::{Path, PathBuf};

use anyhow::Context;
use pac_bus::{
    encoder::{OverflowPolicy, Settings},
    frame::PixelFormat,
    pac::DEFAULT_CHUNK_SIZE,
};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub chunk_size: usize,
    pub fail_on_overflow: bool,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            codec: "pac_plugin".to_string(),
            width: 1920,
            height: 1080,
            chunk_size: DEFAULT_CHUNK_SIZE,
            fail_on_overflow: false,
            input: None,
            output: None,
        }
    }
}

impl EncodeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            width: self.width,
            height: self.height,
            pixel_format: PixelFormat::Uyvy422,
            overflow_policy: if self.fail_on_overflow {
                OverflowPolicy::Fail
            } else {
                OverflowPolicy::Drop
            },
        }
    }

    /// Bytes in one packed UYVY input frame.
    pub fn frame_bytes(&self) -> usize {
        pac_bus::frame::uyvy_frame_bytes(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() -> anyhow::Result<()> {
        let config = EncodeConfig::from_json(r#"{ "width": 320, "height": 240 }"#)?;
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 240);
        assert_eq!(config.codec, "pac_plugin");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.frame_bytes(), 320 * 240 * 2);
        assert_eq!(config.settings().overflow_policy, OverflowPolicy::Drop);
        Ok(())
    }

    #[test]
    fn test_fail_on_overflow_maps_policy() -> anyhow::Result<()> {
        let config = EncodeConfig::from_json(r#"{ "fail_on_overflow": true }"#)?;
        assert_eq!(config.settings().overflow_policy, OverflowPolicy::Fail);
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pac.json");
        std::fs::write(&path, r#"{ "input": "in.uyvy", "output": "out.pac" }"#)?;
        let config = EncodeConfig::load(&path)?;
        assert_eq!(config.input.as_deref(), Some(Path::new("in.uyvy")));
        assert_eq!(config.output.as_deref(), Some(Path::new("out.pac")));

        assert!(EncodeConfig::load(&dir.path().join("missing.json")).is_err());
        Ok(())
    }
}
