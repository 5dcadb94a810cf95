use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use search_me::acquire::FileCamera;
use search_me::config::{self, Config};
use search_me::controller::{UploadController, UploadHandle, UploadOutcome};
use search_me::notify::{ConsoleNotifier, Notifier, TracingNotifier};
use search_me::state::{AppSnapshot, AppState};
use search_me::{AcquireError, FileHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Snap a product, find it cheaper.
#[derive(Parser, Debug)]
#[command(name = "search-me", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the final state as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Upload(UploadCommand),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

#[derive(Subcommand, Debug)]
enum UploadCommand {
    /// Upload an image as if picked in a file dialog (prompts when PATH is omitted)
    Select { path: Option<PathBuf> },

    /// Upload a file as if dropped onto the upload area; non-images are refused
    Drop {
        path: PathBuf,
        /// Declared media type (guessed from the extension otherwise)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Open a virtual camera fed by an image file, then capture or cancel
    Camera { source: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration JSON Schema
    Schema,
    /// Print the default config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "search-me", &mut std::io::stdout());
            Ok(())
        }
        Command::Config { action } => run_config(action, cli.config),
        Command::Upload(command) => {
            let config = Config::load(cli.config.as_deref())?;
            // JSON output is for scripts; keep notices in the log there.
            let notifier: Arc<dyn Notifier> = if cli.json {
                Arc::new(TracingNotifier)
            } else {
                Arc::new(ConsoleNotifier)
            };
            let controller = UploadController::from_config(&config, AppState::new(), notifier)?;
            run_upload(&controller, command, cli.json).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "search_me=warn",
        1 => "search_me=info",
        _ => "search_me=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_config(action: ConfigAction, path: Option<PathBuf>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load(path.as_deref())?;
            print!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
        }
        ConfigAction::Schema => {
            let schema = schemars::schema_for!(Config);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        ConfigAction::Path => match config::default_config_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("No config directory on this platform"),
        },
    }
    Ok(())
}

async fn run_upload(controller: &UploadController, command: UploadCommand, json: bool) -> Result<()> {
    let handle = match command {
        UploadCommand::Select { path } => {
            let path = match path {
                Some(path) => path,
                None => prompt_for_path().await?,
            };
            controller.select_files(vec![FileHandle::from_path(path)]).await
        }
        UploadCommand::Drop { path, mime } => {
            let mut file = FileHandle::from_path(path);
            if let Some(mime) = mime {
                file = file.with_mime_type(mime);
            }
            controller.drag_enter();
            controller.drop_files(vec![file]).await
        }
        UploadCommand::Camera { source } => run_camera(controller, source).await,
    };

    let handle = match handle {
        Ok(handle) => handle,
        Err(AcquireError::Empty) => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    let outcome = settle(controller, handle).await;
    let snapshot = controller.state().snapshot();
    if json {
        print_json(snapshot)?;
    } else {
        print_summary(&snapshot, &outcome);
    }
    Ok(())
}

async fn run_camera(controller: &UploadController, source: PathBuf) -> Result<UploadHandle, AcquireError> {
    controller.start_camera(&FileCamera::new(source)).await?;

    let choice = tokio::task::spawn_blocking(|| {
        dialoguer::Select::new()
            .with_prompt("Camera ready")
            .items(&["Capture", "Cancel"])
            .default(0)
            .interact()
    })
    .await;

    match choice {
        Ok(Ok(0)) => controller.capture().await,
        _ => {
            controller.cancel_camera();
            Err(AcquireError::Empty)
        }
    }
}

/// Wait for the upload, tearing everything down on Ctrl-C.
async fn settle(controller: &UploadController, handle: UploadHandle) -> UploadOutcome {
    tokio::select! {
        outcome = handle.outcome() => outcome,
        _ = tokio::signal::ctrl_c() => {
            controller.shutdown();
            UploadOutcome::Superseded
        }
    }
}

async fn prompt_for_path() -> Result<PathBuf> {
    let input = tokio::task::spawn_blocking(|| {
        dialoguer::Input::<String>::new()
            .with_prompt("Image to upload")
            .interact_text()
    })
    .await
    .context("Prompt task failed")?
    .context("No path entered")?;
    Ok(PathBuf::from(shellexpand::tilde(input.trim()).into_owned()))
}

fn print_json(mut snapshot: AppSnapshot) -> Result<()> {
    // The data URI is only useful to an image renderer.
    snapshot.image = None;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn print_summary(snapshot: &AppSnapshot, outcome: &UploadOutcome) {
    use console::style;

    if *outcome == UploadOutcome::Superseded {
        println!("{}", style("Upload cancelled.").dim());
        return;
    }

    if let Some(details) = &snapshot.product_details {
        let heading = if snapshot.degraded {
            style(format!("{} (sample)", details.name)).yellow().bold()
        } else {
            style(details.name.clone()).green().bold()
        };
        println!("{heading}");
        if let Some(brand) = &details.brand {
            println!("  brand       {brand}");
        }
        if let Some(category) = &details.category {
            println!("  category    {category}");
        }
        println!("  confidence  {:.0}%", details.confidence * 100.0);
        if !details.materials.is_empty() {
            println!("  materials   {}", details.materials.join(", "));
        }
        for (key, value) in &details.attributes {
            let value = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            println!("  {key:<11} {value}");
        }
    }

    if let Some(results) = &snapshot.search_results {
        println!();
        for item in &results.products {
            let price = item.price.as_deref().unwrap_or("-");
            let source = item.source.as_deref().unwrap_or("unknown");
            match &item.list_price {
                Some(list) => println!(
                    "  {} {} {}  {}",
                    style(price).bold(),
                    style(list).dim(),
                    item.title,
                    style(source).cyan()
                ),
                None => println!("  {} {}  {}", style(price).bold(), item.title, style(source).cyan()),
            }
            if let Some(url) = &item.url {
                println!("      {}", style(url).dim());
            }
        }
    }

    if let Some(url) = &snapshot.s3_url {
        println!("\n  stored at {}", style(url).dim());
    }
}
