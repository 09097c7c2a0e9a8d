#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod bvh;
mod config;
mod hierarchy;
mod landmark;
mod model_download;
mod pipeline;
mod playback;
mod scene;
mod types;
mod ui;

use anyhow::Result;
use clap::Parser;
use gpui::Application;

use crate::config::{Args, ViewerConfig};

fn main() -> Result<()> {
    env_logger::init();

    let config = match ViewerConfig::from_args(Args::parse()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };
    log::debug!("starting with {config:?}");

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config.clone()) {
                eprintln!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
