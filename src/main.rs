use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use resvg::usvg;
use std::path::{Path, PathBuf};
use taskcanvas::config::{CanvasConfig, RoutingMode};
use taskcanvas::document::load_document;
use taskcanvas::fonts::CosmicTextMeasure;
use taskcanvas::graph::scene::{SceneOptions, render_canvas};
use taskcanvas::logging::{default_log_level, init_logging};
use taskcanvas::theme::CanvasTheme;
use tiny_skia::{Pixmap, Transform};

/// Render a task graph canvas to SVG, PNG or PDF
#[derive(Parser, Debug)]
#[command(name = "taskcanvas")]
#[command(version)]
#[command(about = "Render a task list as a node-graph canvas (SVG, PNG or PDF)", long_about = None)]
struct Args {
    /// Task list (JSON, YAML or TOML; use "-" for JSON/YAML on stdin)
    #[arg(value_name = "INPUT", required_unless_present = "completions")]
    input: Option<PathBuf>,

    /// Output file path (extension determines format: .svg, .png or .pdf; "-" writes SVG to stdout)
    #[arg(short, long, value_name = "OUTPUT", required_unless_present = "completions")]
    output: Option<PathBuf>,

    /// Built-in theme name (light, dark) or path to a TOML/YAML theme file
    #[arg(short, long, value_name = "THEME", default_value = "light")]
    theme: String,

    /// Canvas configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Lay out every node again instead of keeping stored positions
    #[arg(long)]
    organize: bool,

    /// Connector style, overriding the configuration file
    #[arg(long, value_enum)]
    routing: Option<RoutingArg>,

    /// Raster scale multiplier for PNG output (e.g. 2.0 for sharper output)
    #[arg(long, default_value_t = 1.0)]
    png_scale: f32,

    /// Padding around the canvas in pixels
    #[arg(long, default_value_t = 24.0)]
    padding: f32,

    /// Log level for stderr output (off, error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Print a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoutingArg {
    Orthogonal,
    Bezier,
}

impl From<RoutingArg> for RoutingMode {
    fn from(arg: RoutingArg) -> Self {
        match arg {
            RoutingArg::Orthogonal => RoutingMode::Orthogonal,
            RoutingArg::Bezier => RoutingMode::Bezier,
        }
    }
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        let mut command = Args::command();
        clap_complete::generate(shell, &mut command, "taskcanvas", &mut std::io::stdout());
        return Ok(());
    }

    let level = args.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level).map_err(|e| e.to_string())?;

    let (Some(input), Some(output)) = (args.input.as_deref(), args.output.as_deref()) else {
        return Err("INPUT and --output are required".to_string());
    };

    let theme = CanvasTheme::resolve(&args.theme).map_err(|e| format!("Failed to load theme: {}", e))?;

    let mut config = match args.config {
        Some(ref path) => CanvasConfig::from_path(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => CanvasConfig::default(),
    }
    .sanitized();
    if let Some(routing) = args.routing {
        config.edges.routing = routing.into();
    }

    let document = load_document(input).map_err(|e| format!("Failed to read input: {}", e))?;

    let mut measure = CosmicTextMeasure::new(theme.line_height);
    let options = SceneOptions {
        organize: args.organize,
        padding: args.padding,
    };
    let scene = render_canvas(&document.nodes, &theme, &config, &mut measure, &options);
    log::info!(
        "rendered {} nodes and {} edges ({:.0}x{:.0})",
        document.nodes.len(),
        scene.edges_drawn,
        scene.width,
        scene.height
    );

    if output.to_str() == Some("-") {
        println!("{}", scene.svg);
        return Ok(());
    }

    // Determine output format and save
    let output_ext = output
        .extension()
        .and_then(|e| e.to_str())
        .ok_or("Output file has no extension")?
        .to_ascii_lowercase();

    match output_ext.as_str() {
        "svg" => {
            std::fs::write(output, &scene.svg).map_err(|e| format!("Failed to write SVG: {}", e))?;
            eprintln!("SVG saved to: {}", output.display());
        }
        "png" => {
            let png_data = svg_to_png(&scene.svg, args.png_scale)?;
            std::fs::write(output, png_data).map_err(|e| format!("Failed to write PNG: {}", e))?;
            eprintln!("PNG saved to: {}", output.display());
        }
        "pdf" => {
            let pdf_data = svg_to_pdf(&scene.svg)?;
            std::fs::write(output, pdf_data).map_err(|e| format!("Failed to write PDF: {}", e))?;
            eprintln!("PDF saved to: {}", output.display());
        }
        _ => {
            return Err(format!(
                "Unsupported output format: .{} (use .svg, .png or .pdf)",
                output_ext
            ));
        }
    }

    Ok(())
}

fn svg_to_png(svg: &str, scale: f32) -> Result<Vec<u8>, String> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(format!("Invalid --png-scale value: {}", scale));
    }

    let mut opts = usvg::Options::default();
    {
        let fontdb = opts.fontdb_mut();
        fontdb.load_system_fonts();

        let local_fonts = Path::new("fonts");
        if local_fonts.is_dir() {
            fontdb.load_fonts_dir(local_fonts);
        }

        let fallbacks = FontFallbacks::pick(fontdb.faces().flat_map(|face| face.families.iter().map(|(f, _)| f.as_str())));
        if let Some(family) = fallbacks.sans() {
            fontdb.set_sans_serif_family(family);
        }
        if let Some(family) = fallbacks.serif() {
            fontdb.set_serif_family(family);
        }
    }

    let tree = usvg::Tree::from_str(svg, &opts).map_err(|e| format!("Failed to parse SVG: {}", e))?;

    let svg_width = (tree.size().width() * scale).ceil() as u32;
    let svg_height = (tree.size().height() * scale).ceil() as u32;

    let mut pixmap = Pixmap::new(svg_width, svg_height).ok_or("Failed to create pixmap")?;
    let transform = Transform::from_scale(scale, scale);

    resvg::render(&tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| format!("Failed to encode PNG: {}", e))
}

fn svg_to_pdf(svg: &str) -> Result<Vec<u8>, String> {
    use svg2pdf::usvg::fontdb;

    let mut fontdb = fontdb::Database::new();
    fontdb.load_system_fonts();

    let local_fonts = Path::new("fonts");
    if local_fonts.is_dir() {
        fontdb.load_fonts_dir(local_fonts);
    }

    let fallbacks = FontFallbacks::pick(fontdb.faces().flat_map(|face| face.families.iter().map(|(f, _)| f.as_str())));
    if let Some(family) = fallbacks.sans() {
        fontdb.set_sans_serif_family(family);
    }
    if let Some(family) = fallbacks.serif() {
        fontdb.set_serif_family(family);
    }

    let mut opts = svg2pdf::usvg::Options::default();
    opts.fontdb = std::sync::Arc::new(fontdb);

    let tree = svg2pdf::usvg::Tree::from_str(svg, &opts).map_err(|e| format!("Failed to parse SVG: {}", e))?;

    // Text as paths: card titles survive viewers without the font.
    let mut options = svg2pdf::ConversionOptions::default();
    options.embed_text = false;
    let page_options = svg2pdf::PageOptions::default();

    svg2pdf::to_pdf(&tree, options, page_options).map_err(|e| format!("Failed to convert SVG to PDF: {}", e))
}

/// Generic family names resolved against the installed fonts.
#[derive(Debug, Default)]
struct FontFallbacks {
    sans: Option<String>,
    serif: Option<String>,
    first: Option<String>,
}

impl FontFallbacks {
    fn pick<'a>(families: impl Iterator<Item = &'a str>) -> Self {
        let mut picked = FontFallbacks::default();
        for family in families {
            if picked.first.is_none() {
                picked.first = Some(family.to_string());
            }
            let lower = family.to_ascii_lowercase();
            if picked.sans.is_none() && lower.contains("sans") {
                picked.sans = Some(family.to_string());
            }
            if picked.serif.is_none() && lower.contains("serif") {
                picked.serif = Some(family.to_string());
            }
        }
        picked
    }

    fn sans(&self) -> Option<String> {
        self.sans.clone().or_else(|| self.first.clone())
    }

    fn serif(&self) -> Option<String> {
        self.serif.clone().or_else(|| self.first.clone())
    }
}
