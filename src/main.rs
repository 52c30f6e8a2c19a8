// laneforge — Free-text workflows to PlantUML BPMN swim-lane diagrams
// License: Apache-2.0

use clap::{Args, Parser, Subcommand};
use laneforge::config::Config;
use laneforge::pipeline::{Generation, Generator, Renderer};
use laneforge::plantuml::encode::{self, Encoding};
use laneforge::plantuml::Variant;
use laneforge::provider::factory::create_provider;
use laneforge::render::DiagramFetcher;
use laneforge::workflow::{WorkflowDocument, WorkflowError};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const LOGO: &str = "🛠";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "laneforge",
    about = "laneforge — AI BPMN swim-lane generator (free text → PlantUML)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a workflow with the LLM and render it as a BPMN diagram
    Generate {
        /// Workflow description
        #[arg(short, long)]
        text: Option<String>,
        /// Read the workflow description from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[command(flatten)]
        render: RenderArgs,
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Render an existing workflow JSON document (no LLM call)
    Render {
        /// Workflow JSON file
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        render: RenderArgs,
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Encode a PlantUML file into a diagram URL
    Encode {
        /// PlantUML file
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long, value_enum)]
        encoding: Option<Encoding>,
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Decode a diagram URL path segment back into PlantUML
    Decode {
        segment: String,
        #[arg(short, long, value_enum, default_value = "deflate")]
        encoding: Encoding,
    },
    /// Show configuration status
    Status {
        /// Config file path
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Show version information
    Version,
}

#[derive(Args, Default)]
struct RenderArgs {
    /// Generator variant
    #[arg(long, value_enum)]
    variant: Option<Variant>,
    /// Payload encoding (defaults to the variant's)
    #[arg(short, long, value_enum)]
    encoding: Option<Encoding>,
    /// Add lanes for actors that only appear in steps
    #[arg(long, conflicts_with = "no_repair_actors")]
    repair_actors: bool,
    /// Leave steps of unknown actors out of the pool
    #[arg(long)]
    no_repair_actors: bool,
    /// Where to write the PlantUML artifact (file or directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also fetch the rendered diagram and save it here
    #[arg(long)]
    image: Option<PathBuf>,
    /// Print a single JSON object instead of sections
    #[arg(long)]
    json: bool,
}

impl RenderArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(v) = self.variant {
            cfg.render.variant = v;
        }
        if let Some(e) = self.encoding {
            cfg.render.encoding = Some(e);
        }
        if self.repair_actors {
            cfg.render.repair_actors = Some(true);
        } else if self.no_repair_actors {
            cfg.render.repair_actors = Some(false);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    laneforge::logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Generate {
            text,
            file,
            render,
            config,
        }) => {
            generate_cmd(text, file, render, config).await;
        }
        Some(Commands::Render {
            file,
            render,
            config,
        }) => {
            render_cmd(file, render, config).await;
        }
        Some(Commands::Encode {
            file,
            encoding,
            config,
        }) => {
            encode_cmd(file, encoding, config);
        }
        Some(Commands::Decode { segment, encoding }) => {
            decode_cmd(&segment, encoding);
        }
        Some(Commands::Status { config }) => {
            status_cmd(config);
        }
        Some(Commands::Version) => {
            version_cmd();
        }
        None => {
            // Default: prompt for a workflow
            generate_cmd(None, None, RenderArgs::default(), None).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Generate command
// ---------------------------------------------------------------------------

async fn generate_cmd(
    text: Option<String>,
    file: Option<PathBuf>,
    args: RenderArgs,
    config_path: Option<String>,
) {
    let mut cfg = load_config(config_path.as_deref());
    args.apply(&mut cfg);

    if let Err(e) = cfg.validate() {
        eprintln!("{} Configuration Error: {}", LOGO, e);
        std::process::exit(1);
    }

    let workflow_text = match read_workflow_text(text, file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{} Error: {}", LOGO, e);
            std::process::exit(1);
        }
    };

    let provider = match create_provider(&cfg) {
        Ok(p) => Arc::from(p),
        Err(e) => {
            eprintln!("{} Error: {}", LOGO, e);
            std::process::exit(1);
        }
    };

    let generator = Generator::from_config(&cfg, provider);

    if !args.json {
        eprintln!("{} Parsing workflow into structured JSON...", LOGO);
    }

    let generation = match generator.generate(&workflow_text).await {
        Ok(g) => g,
        Err(e) => {
            match e.downcast_ref::<WorkflowError>() {
                Some(we @ (WorkflowError::MalformedJson { .. } | WorkflowError::InvalidDocument { .. })) => {
                    eprintln!("❌ {}", we);
                    if let Some(raw) = we.raw() {
                        eprintln!("\n{}", raw);
                    }
                }
                _ => eprintln!("{} Error: {:#}", LOGO, e),
            }
            std::process::exit(1);
        }
    };

    finish(&cfg, &args, generation).await;
}

/// Resolve the workflow text: --text, then --file, then piped stdin,
/// then an interactive prompt.
fn read_workflow_text(text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(t) = text {
        return Ok(t);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e));
    }

    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut buf = String::new();
        stdin.lock().read_to_string(&mut buf)?;
        return Ok(buf);
    }

    prompt_workflow_text()
}

/// Read a multi-line description; an empty line finishes it.
fn prompt_workflow_text() -> anyhow::Result<String> {
    println!("{} laneforge v{} — AI BPMN Swimlane Generator", LOGO, laneforge::VERSION);
    println!("Paste the workflow description. Finish with an empty line or Ctrl+D.");
    println!("E.g., Customer places an order, System validates payment, Warehouse ships order...\n");

    let mut rl = rustyline::DefaultEditor::new()?;
    let mut lines = Vec::new();
    loop {
        match rl.readline("> ") {
            Ok(line) if line.trim().is_empty() => break,
            Ok(line) => lines.push(line),
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                anyhow::bail!("cancelled");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Render command
// ---------------------------------------------------------------------------

async fn render_cmd(file: PathBuf, args: RenderArgs, config_path: Option<String>) {
    let mut cfg = load_config(config_path.as_deref());
    args.apply(&mut cfg);

    if let Err(e) = cfg.validate_render() {
        eprintln!("{} Configuration Error: {}", LOGO, e);
        std::process::exit(1);
    }

    let document = match load_document(&file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{} Error: {:#}", LOGO, e);
            std::process::exit(1);
        }
    };

    match Renderer::from_config(&cfg).render(document) {
        Ok(generation) => finish(&cfg, &args, generation).await,
        Err(e) => {
            eprintln!("{} Error: {}", LOGO, e);
            std::process::exit(1);
        }
    }
}

fn load_document(path: &Path) -> anyhow::Result<WorkflowDocument> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    Ok(WorkflowDocument::from_json(&raw)?)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Print results, write the artifact and optionally fetch the image.
async fn finish(cfg: &Config, args: &RenderArgs, generation: Generation) {
    let target = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.output.file_name));
    let artifact = match generation.write_markup(&target) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{} Failed to write {}: {}", LOGO, target.display(), e);
            std::process::exit(1);
        }
    };

    if args.json {
        let out = serde_json::json!({
            "workflow": generation.document,
            "plantuml": generation.markup,
            "image_url": generation.image_url,
            "artifact": artifact.display().to_string(),
            "repaired_actors": generation.repaired_actors,
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
    } else {
        println!("✅ Extracted Workflow JSON");
        println!(
            "{}\n",
            serde_json::to_string_pretty(&generation.document).unwrap_or_default()
        );
        if !generation.repaired_actors.is_empty() {
            println!(
                "ℹ️  Added lanes for: {}\n",
                generation.repaired_actors.join(", ")
            );
        }
        println!("📄 Generated PlantUML Code");
        println!("{}\n", generation.markup);
        println!("📊 BPMN Swimlane Diagram");
        println!("{}\n", generation.image_url);
        println!("📥 PlantUML code saved to {}", artifact.display());
    }

    if let Some(image_path) = &args.image {
        let fetched = match DiagramFetcher::new(Duration::from_secs(cfg.llm.timeout_secs)) {
            Ok(fetcher) => fetcher.fetch(&generation.image_url).await,
            Err(e) => Err(e),
        };
        match fetched.and_then(|img| {
            img.save(image_path)?;
            Ok(img)
        }) {
            Ok(img) => {
                if !args.json {
                    println!(
                        "🖼  Diagram ({}) saved to {}",
                        img.content_type,
                        image_path.display()
                    );
                }
            }
            Err(e) => {
                eprintln!("{} Failed to fetch diagram: {:#}", LOGO, e);
                std::process::exit(1);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode commands
// ---------------------------------------------------------------------------

fn encode_cmd(file: PathBuf, encoding: Option<Encoding>, config_path: Option<String>) {
    let cfg = load_config(config_path.as_deref());
    let encoding = encoding.unwrap_or_else(|| cfg.encoding());

    let markup = match std::fs::read_to_string(&file) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{} Failed to read {}: {}", LOGO, file.display(), e);
            std::process::exit(1);
        }
    };

    match encode::encode(&markup, encoding) {
        Ok(segment) => println!(
            "{}",
            encode::diagram_url(&cfg.render.server, cfg.render.format, &segment)
        ),
        Err(e) => {
            eprintln!("{} Error: {}", LOGO, e);
            std::process::exit(1);
        }
    }
}

fn decode_cmd(segment: &str, encoding: Encoding) {
    // Deflate segments never contain '/', so a full URL can be passed.
    let segment = match encoding {
        Encoding::Deflate => segment.rsplit('/').next().unwrap_or(segment),
        Encoding::Percent => segment,
    };
    match encode::decode(segment, encoding) {
        Ok(markup) => println!("{}", markup),
        Err(e) => {
            eprintln!("{} Error: {}", LOGO, e);
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Other commands
// ---------------------------------------------------------------------------

fn version_cmd() {
    println!("{} laneforge v{}", LOGO, laneforge::VERSION);
    println!("  Free-text workflows → PlantUML BPMN swim lanes");
}

fn status_cmd(config_path: Option<String>) {
    println!("{} laneforge Status\n", LOGO);

    let cfg = load_config(config_path.as_deref());

    let path = resolve_config_path(config_path.as_deref());
    if path.exists() {
        println!("  Config:    ✅ {}", path.display());
    } else {
        println!("  Config:    ⏭️  {} (not found, using defaults)", path.display());
    }

    println!("  Model:     {} (temperature {})", cfg.llm.model, cfg.llm.temperature);
    if cfg.providers.openai.api_key.is_empty() {
        println!("  API key:   ❌ Not set (OPENAI_API_KEY)");
    } else {
        println!("  API key:   ✅ configured");
    }

    match cfg.validate_render() {
        Ok(()) => println!("  Server:    ✅ {}", cfg.render.server),
        Err(e) => println!("  Server:    ❌ {}", e),
    }
    println!(
        "  Variant:   {:?} ({:?} encoding, {} output)",
        cfg.render.variant,
        cfg.encoding(),
        cfg.render.format.as_str()
    );
    println!("  Artifact:  {}", cfg.output.file_name);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_config_path(path: Option<&str>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => Config::default_path().unwrap_or_else(|_| PathBuf::from("config.json")),
    }
}

fn load_config(path: Option<&str>) -> Config {
    let config_path = resolve_config_path(path);
    Config::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::from_env()
    })
}
