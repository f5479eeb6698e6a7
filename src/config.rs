use crate::vk_engine::presentation::RenderFinishedIndexing;
use crate::vk_types::EngineError;
use ash::vk;
use std::path::PathBuf;

const WINDOW_TITLE: &str = "SDL_VULKAN_TRIANGLE";
const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 800;
const SHADER_DIR: &str = "./shaders";

pub struct EngineConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// directory holding `triangle.vert.spv` and `triangle.frag.spv`
    pub shader_dir: PathBuf,
    /// falls back to FIFO if the surface does not offer it
    pub present_mode: vk::PresentModeKHR,
    pub render_finished_indexing: RenderFinishedIndexing,
    pub clear_color: [f32; 4],
    /// stop after this many frames, `None` runs until the window is closed
    pub max_frames: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            window_title: String::from(WINDOW_TITLE),
            window_width: WINDOW_WIDTH,
            window_height: WINDOW_HEIGHT,
            shader_dir: PathBuf::from(SHADER_DIR),
            present_mode: vk::PresentModeKHR::FIFO,
            render_finished_indexing: RenderFinishedIndexing::AsRecorded,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_frames: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `TRIANGLE_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = EngineConfig::default();
        if let Some(value) = lookup("TRIANGLE_WIDTH") {
            config.window_width = parse_dimension("TRIANGLE_WIDTH", value)?;
        }
        if let Some(value) = lookup("TRIANGLE_HEIGHT") {
            config.window_height = parse_dimension("TRIANGLE_HEIGHT", value)?;
        }
        if let Some(value) = lookup("TRIANGLE_SHADER_DIR") {
            config.shader_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("TRIANGLE_PRESENT_MODE") {
            config.present_mode = match value.to_ascii_lowercase().as_str() {
                "fifo" => vk::PresentModeKHR::FIFO,
                "mailbox" => vk::PresentModeKHR::MAILBOX,
                "immediate" => vk::PresentModeKHR::IMMEDIATE,
                _ => return Err(invalid("TRIANGLE_PRESENT_MODE", value)),
            };
        }
        if let Some(value) = lookup("TRIANGLE_RENDER_FINISHED_INDEXING") {
            config.render_finished_indexing = match value.to_ascii_lowercase().as_str() {
                "as_recorded" => RenderFinishedIndexing::AsRecorded,
                "per_image" => RenderFinishedIndexing::PerImage,
                "per_frame" => RenderFinishedIndexing::PerFrame,
                _ => return Err(invalid("TRIANGLE_RENDER_FINISHED_INDEXING", value)),
            };
        }
        if let Some(value) = lookup("TRIANGLE_MAX_FRAMES") {
            let frames: u64 = value
                .trim()
                .parse()
                .map_err(|_| invalid("TRIANGLE_MAX_FRAMES", value.clone()))?;
            config.max_frames = (frames > 0).then_some(frames);
        }
        Ok(config)
    }
}

fn parse_dimension(key: &'static str, value: String) -> Result<u32, EngineError> {
    match value.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &'static str, value: String) -> EngineError {
    EngineError::InvalidConfig { key, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 800);
        assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(
            config.render_finished_indexing,
            RenderFinishedIndexing::AsRecorded
        );
        assert_eq!(config.max_frames, None);
    }

    #[test]
    fn overrides_apply() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("TRIANGLE_WIDTH", "640"),
            ("TRIANGLE_HEIGHT", " 480 "),
            ("TRIANGLE_SHADER_DIR", "/opt/shaders"),
            ("TRIANGLE_PRESENT_MODE", "Mailbox"),
            ("TRIANGLE_RENDER_FINISHED_INDEXING", "per_image"),
            ("TRIANGLE_MAX_FRAMES", "120"),
        ]))
        .unwrap();
        assert_eq!((config.window_width, config.window_height), (640, 480));
        assert_eq!(config.shader_dir, PathBuf::from("/opt/shaders"));
        assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            config.render_finished_indexing,
            RenderFinishedIndexing::PerImage
        );
        assert_eq!(config.max_frames, Some(120));
    }

    #[test]
    fn zero_max_frames_means_unbounded() {
        let config =
            EngineConfig::from_lookup(lookup_from(&[("TRIANGLE_MAX_FRAMES", "0")])).unwrap();
        assert_eq!(config.max_frames, None);
    }

    #[test]
    fn rejects_bad_values() {
        for (key, value) in [
            ("TRIANGLE_WIDTH", "0"),
            ("TRIANGLE_HEIGHT", "tall"),
            ("TRIANGLE_PRESENT_MODE", "vsync"),
            ("TRIANGLE_RENDER_FINISHED_INDEXING", "by_guess"),
            ("TRIANGLE_MAX_FRAMES", "-1"),
        ] {
            match EngineConfig::from_lookup(lookup_from(&[(key, value)])) {
                Err(EngineError::InvalidConfig { key: k, value: v }) => {
                    assert_eq!(k, key);
                    assert_eq!(v, value);
                }
                _ => panic!("{key}={value} should be rejected"),
            }
        }
    }
}
