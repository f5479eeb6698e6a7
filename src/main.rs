mod config;
mod vk_bootstrap;
#[cfg(debug_assertions)]
mod vk_debug;
mod vk_engine;
mod vk_init;
mod vk_pipelines;
mod vk_types;

use config::EngineConfig;
use vk_engine::VulkanEngine;

fn main() {
    pretty_env_logger::init();
    if let Err(e) = run() {
        log::error!("{e:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = EngineConfig::from_env()?;
    let mut engine = VulkanEngine::init(config)?;
    engine.run()
    //no cleanup, it's in the engine's drop
}
