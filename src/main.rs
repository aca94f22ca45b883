mod app;
mod application;
mod config;
mod domain;
mod engine;
mod ui;
mod utils;

use iced::window;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

fn main() -> iced::Result {
    init_logging();

    let icon_data = include_bytes!("../assets/icon.png");

    let icon = match image::load_from_memory(icon_data) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            window::icon::from_rgba(rgba.into_raw(), width, height).ok()
        }
        Err(e) => {
            tracing::warn!("Failed to decode window icon: {}", e);
            None
        }
    };

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("Media Grabber")
        .window(window::Settings {
            icon,
            ..Default::default()
        })
        .run()
}

/// `RUST_LOG` wins; otherwise info for everything.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
