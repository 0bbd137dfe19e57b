use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing::info;

use janitor_core::{ApprovalSignal, Finding, JanitorConfig, OutputFormat, RunContext};
use janitor_github::GitHubClient;
use janitor_remedy::vcs::GitWorkspace;
use janitor_remedy::{RemediationEngine, RemediationOutcome};

const CONFIG_FILE: &str = ".ci-janitor.toml";

#[derive(Parser)]
#[command(
    name = "ci-janitor",
    version,
    about = "Diagnose failed CI runs and fix them once a human approves",
    long_about = "CI Janitor reads the logs of a failed workflow run, recognizes known failures,\n\
                   and explains them on the pull request. Fixes are only applied after a\n\
                   reviewer comments the approval command or the approval flag is set.\n\n\
                   Examples:\n  \
                     ci-janitor                           Run the full pipeline from CI env vars\n  \
                     ci-janitor run --repo o/r --run-id 1  Same, with explicit inputs\n  \
                     ci-janitor classify --file build.log  Classify a saved log offline\n  \
                     ci-janitor init                       Write a default .ci-janitor.toml",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,

    /// Path to configuration file (default: .ci-janitor.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable summary (default)\n  \
                         json  Machine-readable JSON with camelCase keys"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Classify the failed run, gate on approval, and act
    #[command(long_about = "Classify the failed run, gate on approval, and act.\n\n\
        Inputs default to the environment a GitHub Actions job provides.\n\
        This is also what runs when no subcommand is given.\n\n\
        Examples:\n  ci-janitor run\n  ci-janitor run --repo octocat/hello --pr 12 --branch feature --approved 1")]
    Run(RunArgs),
    /// Classify a CI log offline
    #[command(long_about = "Classify a CI log offline.\n\n\
        Reads the log from a file or stdin and prints the finding, if any.\n\
        Nothing is posted and no network access is made.\n\n\
        Examples:\n  ci-janitor classify --file build.log\n  cat build.log | ci-janitor classify --format json")]
    Classify {
        /// Read the log from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Create a default .ci-janitor.toml configuration file
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Repository as owner/name (falls back to GITHUB_REPOSITORY)
    #[arg(long, env = "REPO")]
    repo: Option<String>,

    /// Workflow run whose logs to read
    #[arg(long, env = "RUN_ID")]
    run_id: Option<u64>,

    /// Pull request number; resolved from the run when omitted
    #[arg(long, env = "PR_NUMBER")]
    pr: Option<u64>,

    /// Source branch of the pull request, required to push a fix
    #[arg(long, env = "PR_BRANCH")]
    branch: Option<String>,

    /// Approval flag
    #[arg(
        long,
        env = "CI_JANITOR_APPROVED",
        long_help = "Out-of-band approval.\n\n\
            1, true, yes, all   approve whatever is found\n\
            <kind>              approve only that kind (missing-dependency, runtime-version-conflict)\n\
            0, false, no        no approval; PR comments still count"
    )]
    approved: Option<String>,

    /// Interpreter version shown in messages
    #[arg(long, env = "PYTHON_VERSION", default_value = "unknown")]
    runtime_label: String,

    /// GitHub token (falls back to GITHUB_TOKEN or GH_TOKEN)
    #[arg(long)]
    github_token: Option<String>,

    /// Checked-out repository to modify (default: current directory)
    #[arg(long, default_value = ".")]
    workspace: PathBuf,
}

const DEFAULT_CONFIG: &str = r#"# CI Janitor Configuration

[approval]
# command_prefix = "/ci-janitor"
# Which failure kinds a bare CI_JANITOR_APPROVED=1 covers: "any-kind" or "detected-kind"
# flag_scope = "any-kind"

[classify]
# context_before = 3
# context_after = 3
# max_evidence_chars = 2000

[manifest]
# path = "requirements.txt"

[git]
# bot_name = "ci-janitor-bot"
# bot_email = "ci-janitor@users.noreply.github.com"
# remote = "origin"

[github]
# api_url = "https://api.github.com"
# bot_login = "github-actions[bot]"

[network]
# timeout_secs = 30
# retries = 1
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => JanitorConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                JanitorConfig::from_file(default_path)?
            } else {
                JanitorConfig::default()
            }
        }
    };

    match cli.command {
        None => run(&config, cli.run, cli.format).await?,
        Some(Command::Run(args)) => run(&config, args, cli.format).await?,
        Some(Command::Classify { file }) => {
            // CI logs can carry stray non-UTF-8 bytes; decode lossily like fetched logs.
            let bytes = match file {
                Some(path) => std::fs::read(&path)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin()
                        .read_to_end(&mut buf)
                        .into_diagnostic()?;
                    buf
                }
            };
            let log = String::from_utf8_lossy(&bytes);
            let finding = janitor_logscan::classify(&log, &config.classify);
            print_finding(finding.as_ref(), cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ci-janitor", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn run(config: &JanitorConfig, args: RunArgs, format: OutputFormat) -> Result<()> {
    let repo = match args
        .repo
        .or_else(|| std::env::var("GITHUB_REPOSITORY").ok())
        .filter(|r| !r.trim().is_empty())
    {
        Some(repo) => repo,
        None => miette::bail!("no repository given. Pass --repo or set REPO / GITHUB_REPOSITORY"),
    };

    let ctx = RunContext {
        repo,
        run_id: args.run_id,
        pr_number: args.pr,
        branch: args.branch,
        approval: ApprovalSignal::parse(args.approved.as_deref())?,
        runtime_label: args.runtime_label,
    };
    ctx.repo_parts()?;

    let client = GitHubClient::new(args.github_token.as_deref(), &ctx.repo, config)?;
    let pr = client.resolve_pr_number(ctx.pr_number, ctx.run_id).await?;
    info!(repo = %ctx.repo, pr, run_id = ?ctx.run_id, approval = ?ctx.approval, "starting");

    let workspace = GitWorkspace::open(&args.workspace, &config.git, &config.network)?;
    let engine = RemediationEngine::new(config, &client, &client, &workspace, workspace.root());
    let outcome = engine.run(&ctx, pr).await?;

    print_outcome(&outcome, pr, format)
}

fn print_outcome(outcome: &RemediationOutcome, pr: u64, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_value(outcome).into_diagnostic()?;
            if let Some(obj) = json.as_object_mut() {
                obj.insert("pr".into(), pr.into());
            }
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Text => println!("PR #{pr}: {outcome}"),
    }
    Ok(())
}

fn print_finding(finding: Option<&Finding>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&finding).into_diagnostic()?);
        }
        OutputFormat::Text => match finding {
            None => println!("No supported failure detected."),
            Some(f) => {
                println!("{} (line {})", f.kind, f.evidence.line);
                for (key, value) in f.parameters.iter() {
                    println!("  {key}: {value}");
                }
                if let Some(source) = &f.evidence.source {
                    println!("  source: {source}");
                }
                println!("\n{}", f.evidence.excerpt);
                if f.evidence.truncated {
                    println!("(excerpt truncated)");
                }
            }
        },
    }
    Ok(())
}
