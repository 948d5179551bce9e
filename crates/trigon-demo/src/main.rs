mod app;

use trigon_engine::device::GpuInit;
use trigon_engine::logging::{init_logging, LoggingConfig};
use trigon_engine::window::{Runtime, RuntimeConfig};

use app::TriangleApp;

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "trigon · flat triangle".to_string(),
        ..Default::default()
    };

    Runtime::run(config, GpuInit::default(), TriangleApp::default())
}
