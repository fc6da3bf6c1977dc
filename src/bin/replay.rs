use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use taskcanvas::config::CanvasConfig;
use taskcanvas::document::{GestureScript, load};
use taskcanvas::graph::geometry::Point;
use taskcanvas::graph::interaction::{CanvasController, CanvasEvent, Viewport};
use taskcanvas::graph::registry::NodeRegistry;
use taskcanvas::logging::{default_log_level, init_logging};

/// Replays recorded canvas input and prints the resulting callbacks
#[derive(Parser, Debug)]
#[command(name = "taskcanvas-replay")]
#[command(version)]
#[command(about = "Replay a gesture script through the canvas controller", long_about = None)]
struct Args {
    /// Gesture script (JSON, YAML or TOML; use "-" for JSON/YAML on stdin)
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Canvas configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Log level for stderr output (off, error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Serialize)]
struct FinalState {
    viewport: Viewport,
    positions: Vec<NodePosition>,
}

#[derive(Serialize)]
struct NodePosition {
    id: String,
    position: Point,
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    let level = args.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level).map_err(|e| e.to_string())?;

    let config = match args.config {
        Some(ref path) => CanvasConfig::from_path(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => CanvasConfig::default(),
    }
    .sanitized();

    let script: GestureScript = load(&args.script).map_err(|e| format!("Failed to read script: {}", e))?;

    let registry = NodeRegistry::new();
    let handles = script.mount(&registry);
    let mut controller = CanvasController::new(registry.clone(), &config, Vec::<CanvasEvent>::new());
    script.replay(&mut controller);
    log::debug!("replayed {} steps", script.events.len());

    for event in controller.delegate() {
        let line = serde_json::to_string(event).map_err(|e| format!("Failed to encode event: {}", e))?;
        println!("{}", line);
    }

    let final_state = FinalState {
        viewport: controller.viewport(),
        positions: handles
            .iter()
            .map(|handle| NodePosition {
                id: handle.id().to_string(),
                position: handle.entry().position.point(),
            })
            .collect(),
    };
    let summary = serde_json::to_string(&final_state).map_err(|e| format!("Failed to encode state: {}", e))?;
    println!("{}", summary);

    Ok(())
}
