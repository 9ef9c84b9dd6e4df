use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use hubble_install::boards::{self, Board};
use hubble_install::config::{self, ConfigError, Credentials};
use hubble_install::flash::{FlashRequest, FlashResult, TOOL_ENTRYPOINT, TOOL_PACKAGE};
use hubble_install::platform::{self, PlatformInstaller};
use hubble_install::progress::ProgressFn;
use hubble_install::{Dependency, HostContext, InstallOptions, ProvisionError, ProvisionEvent};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Set up a developer board on the Hubble Network.
#[derive(Debug, Parser)]
#[command(name = "hubble-install", version, about)]
struct Cli {
    /// Board to provision (e.g. nrf52840dk). Prompted for when omitted.
    #[arg(long)]
    board: Option<String>,

    /// Name to register the device under.
    #[arg(long)]
    device_name: Option<String>,

    /// Answer yes to every confirmation.
    #[arg(short, long)]
    yes: bool,

    /// Log debug output to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            render_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn render_error(err: &anyhow::Error) {
    eprintln!();
    if let Some(provision) = err.downcast_ref::<ProvisionError>() {
        if provision.is_reboot_required() {
            eprintln!("{} {}", style("⚠").yellow().bold(), provision);
            eprintln!();
            eprintln!("  Your computer must restart before setup can continue.");
            eprintln!("  {}", provision.fix_suggestion());
            return;
        }
        eprintln!("{} {}", style("✗").red().bold(), provision);
        eprintln!("{} {}", style("  help:").dim(), provision.fix_suggestion());
    } else if let Some(config) = err.downcast_ref::<ConfigError>() {
        eprintln!("{} {}", style("✗").red().bold(), config);
        eprintln!("{} {}", style("  help:").dim(), config.fix_suggestion());
    } else {
        eprintln!("{} {:#}", style("✗").red().bold(), err);
    }
}

fn progress_printer() -> ProgressFn {
    Arc::new(|event: ProvisionEvent| {
        let text = event.description();
        match event {
            ProvisionEvent::PrivilegePrompt => println!("{} {text}", style("⚠").yellow()),
            ref e if e.is_success() => println!("{} {text}", style("✓").green()),
            _ => println!("{} {text}", style("ℹ").cyan()),
        }
    })
}

fn success(message: &str) {
    println!("{} {message}", style("✓").green());
}

fn info(message: &str) {
    println!("{} {message}", style("ℹ").cyan());
}

fn warning(message: &str) {
    println!("{} {message}", style("⚠").yellow());
}

fn step(current: usize, total: usize, title: &str) {
    println!();
    println!("{}", style(format!("[{current}/{total}] {title}")).blue().bold());
}

fn confirm(assume_yes: bool, prompt: &str) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(Confirm::new().with_prompt(prompt).default(true).interact()?)
}

fn banner() {
    println!(
        "{}",
        style(
            "\n╔═══════════════════════════════════════════════════════════╗\n\
             ║      Welcome to Hubble Network! Let's get you setup.      ║\n\
             ╚═══════════════════════════════════════════════════════════╝"
        )
        .cyan()
        .bold()
    );
    println!();
    info("This installer will:");
    println!("  • Confirm your developer board model");
    println!("  • Check for and install required dependencies");
    println!("  • Configure your Hubble credentials");
    println!("  • Register your board to your organization, and give it a name");
    println!("  • Provision your board, or generate a hex file for you to flash");
    println!();
}

fn prompt_credentials() -> Result<Credentials> {
    info(&format!("Get your credentials at: {}", config::CREDENTIALS_URL));
    println!();
    let org_id: String = Input::new()
        .with_prompt("Enter your Hubble Org ID")
        .validate_with(|input: &String| config::validate_org_id(input.trim()))
        .interact_text()?;
    let api_token = Password::new()
        .with_prompt("Enter your Hubble API Token (hidden)")
        .interact()?;
    Ok(Credentials::new(org_id, api_token)?)
}

fn select_board() -> Result<&'static Board> {
    let items: Vec<String> = boards::BOARDS.iter().map(ToString::to_string).collect();
    let index = Select::new()
        .with_prompt("Available developer boards")
        .items(&items)
        .default(0)
        .interact()?;
    boards::BOARDS
        .get(index)
        .context("board selection out of range")
}

fn resolve_board(id: &str) -> Result<&'static Board> {
    boards::find(id).ok_or_else(|| {
        ConfigError::UnknownBoard {
            board: id.to_string(),
        }
        .into()
    })
}

async fn run(cli: Cli) -> Result<()> {
    banner();
    if !confirm(cli.yes, "Ready to install?")? {
        warning("Installation cancelled");
        return Ok(());
    }

    let started = Instant::now();
    let ctx = HostContext::system(InstallOptions::default(), progress_printer())?;
    let installer = platform::installer(ctx)?;

    // Total is revised once we know whether anything must be installed.
    let mut total = 4;

    step(1, total, "Configuring credentials");
    let creds = match Credentials::from_env()? {
        Some(creds) => {
            success("Credentials found in environment");
            creds
        }
        None => {
            let creds = prompt_credentials()?;
            success("Credentials configured");
            creds
        }
    };

    step(2, total, "Selecting developer board");
    let board = match cli.board.as_deref().or(creds.board.as_deref()) {
        Some(id) => {
            let board = resolve_board(id)?;
            success(&format!("Using board: {}", board.name));
            board
        }
        None => {
            let board = select_board()?;
            success(&format!("Selected: {}", board.name));
            board
        }
    };
    println!();
    if board.requires_jlink() {
        info("This board uses SEGGER J-Link for direct flashing.");
        warning("Make sure your board is connected via USB with a data-capable cable.");
    } else {
        info("This board uses TI Uniflash. A hex file will be generated for you.");
        info("You'll need Uniflash installed to complete the flashing process.");
    }

    step(3, total, "Checking prerequisites");
    let deps = board.dependencies();
    let missing = installer.check_prerequisites(&deps).await?;
    let mut current = 3;
    if missing.is_empty() {
        success("All prerequisites satisfied");
    } else {
        total += 1;
        warning("Missing dependencies detected:");
        for dep in &missing {
            println!("  • {}: {}", dep.name, dep.status);
        }
        println!();
        if !confirm(cli.yes, "Would you like to install missing dependencies?")? {
            anyhow::bail!("cannot proceed without dependencies");
        }

        current += 1;
        step(current, total, "Installing dependencies");
        let manager_missing = missing
            .iter()
            .any(|dep| dep.name.parse::<Dependency>().is_err());
        if manager_missing {
            installer.install_package_manager().await?;
        }
        installer.install_dependencies(&deps).await?;
        success("All dependencies installed");
    }

    current += 1;
    flash(installer.as_ref(), &cli, &creds, board, current, total, started).await
}

async fn flash(
    installer: &dyn PlatformInstaller,
    cli: &Cli,
    creds: &Credentials,
    board: &Board,
    current: usize,
    total: usize,
    started: Instant,
) -> Result<()> {
    let prompt = if board.requires_jlink() {
        format!("Would you like to flash your {} now?", board.name)
    } else {
        format!("Would you like to generate the hex file for your {} now?", board.name)
    };
    if !confirm(cli.yes, &prompt)? {
        warning("Skipped. You can run it later using:");
        println!(
            "  uv tool run --from {TOOL_PACKAGE} {TOOL_ENTRYPOINT} flash {} -o {} -t <your_token>",
            board.id, creds.org_id
        );
        return Ok(());
    }

    let device_name = match &cli.device_name {
        Some(name) => Some(name.clone()),
        None if cli.yes => None,
        None => {
            let name: String = Input::new()
                .with_prompt("What should the device name be? (optional)")
                .allow_empty(true)
                .interact_text()?;
            Some(name)
        }
    };
    let request = FlashRequest::new(&creds.org_id, &creds.api_token, board.id, device_name);

    let result = if board.requires_jlink() {
        step(current, total, "Flashing board");
        info("This may take 10-15 seconds...");
        installer.flash_board(&request).await?
    } else {
        step(current, total, "Generating hex file");
        installer.generate_hex_file(&request).await?
    };

    completion_banner(&result, board, started.elapsed());
    Ok(())
}

fn completion_banner(result: &FlashResult, board: &Board, elapsed: Duration) {
    let title = match result {
        FlashResult::DeviceName(_) => "✓ Installation Complete!",
        FlashResult::HexFilePath(_) => "✓ Hex File Generated!",
    };
    println!();
    println!("{}", style(format!("{title} ({}s)", elapsed.as_secs())).green().bold());
    println!();
    println!("{}", style("What's next").green());
    println!();
    match result {
        FlashResult::DeviceName(name) => {
            println!("  • Your device \"{name}\" is now broadcasting on the Hubble Terrestrial Network");
            println!();
            println!("  • In Sandbox, you will need the Hubble Connect mobile app to scan for device packets");
            println!();
            println!("Return to https://dash.hubble.com to capture device packets!");
        }
        FlashResult::HexFilePath(path) => {
            println!("  • Your hex file for the {} has been generated:", board.name);
            println!();
            println!("    {}", style(path.display()).bold());
            println!();
            println!("Return to https://dash.hubble.com to complete UniFlash steps!");
        }
    }
    println!();
    println!("{}", style("Need help? Visit https://hubble.com/support/").yellow());
}
