use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use smash_or_pass::client::{ModelDirectory, ProviderConfig, XaiClient};
use smash_or_pass::config::{JudgeConfig, SettingsForm, SettingsPatch, SettingsStore};
use smash_or_pass::error::{HasRecoverySuggestion, VerdictError, VerdictResult};
use smash_or_pass::onboarding::{self, FirstRun};
use smash_or_pass::personas;
use smash_or_pass::presenter::View;
use smash_or_pass::processing::PreprocessOptions;
use smash_or_pass::session::{GenerationMode, JudgeSession};
use smash_or_pass::storage::LocalStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Smash or pass, judged by a hosted multimodal model:
/// - images are downscaled to fit 1500x1500 and sent as JPEG
/// - the verdict streams in field by field
#[derive(Parser, Debug)]
#[command(name = "sop")]
#[command(about = "🔥 Get a smash-or-pass verdict on any image from xAI's Grok models")]
#[command(long_about = "Upload an image and get a structured verdict back: smash or pass, a 1-10 rating \
and an explanation. Settings (API key, model, judge persona) are saved locally between runs.")]
struct Cli {
    /// Provider API base URL
    #[arg(long, global = true, env = "SOP_API_BASE", default_value = smash_or_pass::client::DEFAULT_BASE_URL)]
    api_base: String,

    /// Where settings and first-run flags are stored
    #[arg(long, global = true, env = "SOP_DATA_DIR", help = "Data directory (defaults to the platform data dir)")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Judge an image
    Judge(JudgeArgs),
    /// Show or change saved settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// List the models available to the saved API key
    Models {
        #[arg(long, help = "Bypass the cache and fetch again")]
        refresh: bool,
    },
    /// List judge personas
    Judges,
    /// Show the terms, or accept them
    Terms {
        #[arg(long)]
        accept: bool,
    },
}

#[derive(Args, Debug)]
struct JudgeArgs {
    /// Image to judge
    #[arg(help = "Path to an image file (JPEG, PNG, GIF, WebP, BMP)")]
    image: PathBuf,

    #[arg(short, long, help = "Judge persona for this run (see `sop judges`)")]
    judge: Option<String>,

    #[arg(short, long, help = "Model for this run (see `sop models`)")]
    model: Option<String>,

    /// Wait for the full response instead of streaming
    #[arg(long)]
    once: bool,

    #[arg(long, default_value_t = 1500, help = "Maximum upload width in pixels")]
    max_width: u32,

    #[arg(long, default_value_t = 1500, help = "Maximum upload height in pixels")]
    max_height: u32,

    #[arg(short, long, default_value_t = 0.8, help = "JPEG quality in (0, 1]")]
    quality: f32,

    /// Request timeout, e.g. 90s or 2m. Unlimited by default.
    #[arg(long)]
    timeout: Option<String>,

    #[arg(long, help = "Accept the terms and service before judging")]
    accept_terms: bool,

    #[arg(short, long, help = "Stay open: [r] regenerate, a path to judge another image, [q] quit")]
    interactive: bool,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the saved settings (API key masked)
    Show,
    /// Update and save settings
    Set {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        judge: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = match &cli.data_dir {
        Some(dir) => LocalStore::open(dir),
        None => LocalStore::open_default()?,
    };
    let provider = ProviderConfig::with_base_url(&cli.api_base);

    match cli.command {
        Command::Judge(args) => judge(store, provider, args).await,
        Command::Settings { action } => settings(store, action),
        Command::Models { refresh } => models(store, provider, refresh).await,
        Command::Judges => {
            for name in personas::persona_names() {
                let marker = if name == personas::default_persona() { " (default)" } else { "" };
                println!("{name}{marker}");
            }
            Ok(())
        }
        Command::Terms { accept } => {
            let flags = FirstRun::new(store);
            if accept {
                flags.accept_terms()?;
                println!("Terms accepted.");
            } else {
                print_terms(flags.terms_accepted()?);
            }
            Ok(())
        }
    }
}

async fn judge(store: LocalStore, provider: ProviderConfig, args: JudgeArgs) -> Result<()> {
    let flags = FirstRun::new(store.clone());
    if args.accept_terms {
        flags.accept_terms()?;
    }
    if !flags.terms_accepted()? {
        print_terms(false);
        bail!("the terms must be accepted first (rerun with --accept-terms)");
    }
    if flags.settings_tip_pending()? {
        eprintln!("Tip: {}", onboarding::SETTINGS_TIP_TITLE);
        eprintln!("     {}", onboarding::SETTINGS_TIP);
        flags.acknowledge_settings_tip()?;
    }

    let mut settings = SettingsStore::load_or_default(store)?.get().clone();
    if let Some(judge) = args.judge {
        if !personas::is_known(&judge) {
            bail!("unknown judge '{judge}', see `sop judges`");
        }
        settings.judge = judge;
    }
    if let Some(model) = args.model {
        settings.model = model;
    }

    let mut provider = provider;
    provider.request_timeout = args.timeout.as_deref().map(parse_timeout).transpose()?;
    let config = JudgeConfig::new(
        PreprocessOptions {
            max_width: args.max_width,
            max_height: args.max_height,
            quality: args.quality,
        },
        if args.once { GenerationMode::OneShot } else { GenerationMode::Streaming },
        provider,
    );
    config.validate().map_err(anyhow::Error::msg)?;

    let live = std::io::stdout().is_terminal();
    let client = XaiClient::new(config.provider.clone())?;
    let session = JudgeSession::builder()
        .with_provider(Arc::new(client))
        .with_settings(settings)
        .with_config(config)
        .with_observer(move |view: &View| {
            if live {
                redraw(view);
            }
        })
        .build()?;

    let outcome = session.generate(Some(args.image)).await;
    redraw_final(&session.view(), live);
    report(&outcome.result);

    if !args.interactive {
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await.context("reading input")? else {
            return Ok(());
        };
        match line.trim() {
            "" => continue,
            "q" | "quit" => return Ok(()),
            "r" | "regenerate" => {
                let outcome = session.regenerate().await;
                redraw_final(&session.view(), live);
                if outcome.ticket.is_none() && !outcome.displayed {
                    if let Err(e) = &outcome.result {
                        eprintln!("{}", e.user_message());
                    }
                }
                report(&outcome.result);
            }
            path => {
                let outcome = session.generate(Some(PathBuf::from(path))).await;
                redraw_final(&session.view(), live);
                report(&outcome.result);
            }
        }
    }
}

fn settings(store: LocalStore, action: SettingsAction) -> Result<()> {
    let mut settings = SettingsStore::load_or_default(store)?;
    match action {
        SettingsAction::Show => {
            let current = settings.get();
            println!("API key: {}", current.masked_api_key());
            println!("Model:   {}", if current.model.is_empty() { "(not set)" } else { &current.model });
            println!("Judge:   {}", current.judge);
            println!("Stored:  {}", settings.local_store().root().display());
        }
        SettingsAction::Set {
            api_key,
            model,
            judge,
        } => {
            SettingsForm::from_store(&settings)
                .apply(SettingsPatch {
                    api_key,
                    model,
                    judge,
                })
                .submit(&mut settings)?;
            println!("Settings saved.");
        }
    }
    Ok(())
}

async fn models(store: LocalStore, provider: ProviderConfig, refresh: bool) -> Result<()> {
    let settings = SettingsStore::load_or_default(store)?;
    let api_key = settings.get().api_key.clone();
    if api_key.is_empty() {
        bail!("no API key saved, run `sop settings set --api-key <KEY>` first");
    }
    let directory = ModelDirectory::new(XaiClient::new(provider)?);
    let listed = if refresh {
        directory.refresh(&api_key).await
    } else {
        directory.models(&api_key).await
    };
    report(&listed);
    let models = listed.map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let current = &settings.get().model;
    for model in models {
        let marker = if &model.id == current { "*" } else { " " };
        println!(
            "{marker} {:<32} {}  {}",
            model.id,
            model.created_at.format("%Y-%m-%d"),
            model.owner
        );
    }
    Ok(())
}

fn print_terms(accepted: bool) {
    println!("{}\n", onboarding::TERMS_TITLE);
    println!("{}\n", onboarding::TERMS_TEXT);
    if accepted {
        println!("(accepted)");
    } else {
        println!("Run `sop terms --accept` to agree.");
    }
}

/// Print the recovery hint of a failed operation, if it has one.
fn report<T>(result: &VerdictResult<T>) {
    if let Some(hint) = result.as_ref().err().and_then(recovery_hint) {
        eprintln!("hint: {hint}");
    }
}

fn recovery_hint(error: &VerdictError) -> Option<&str> {
    error.recovery_suggestion()
}

fn redraw(view: &View) {
    print!("\x1b[2J\x1b[H{view}");
    std::io::stdout().flush().ok();
}

fn redraw_final(view: &View, live: bool) {
    if live {
        redraw(view);
    } else {
        print!("{view}");
    }
}

/// Parse duration string like "90s", "2m" or plain seconds. Zero is rejected.
fn parse_timeout(raw: &str) -> Result<Duration> {
    let seconds = if let Ok(seconds) = raw.parse::<u64>() {
        seconds
    } else {
        if raw.len() < 2 || !raw.is_ascii() {
            bail!("Invalid timeout: {raw}");
        }
        let (num_str, unit) = raw.split_at(raw.len() - 1);
        let num: u64 = num_str
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid number in timeout: {num_str}"))?;
        match unit {
            "s" => num,
            "m" => num
                .checked_mul(60)
                .ok_or_else(|| anyhow::anyhow!("Timeout too large: {raw}"))?,
            _ => bail!("Invalid timeout unit: {unit}. Use 's' for seconds or 'm' for minutes"),
        }
    };
    if seconds == 0 {
        bail!("Timeout must be greater than zero: {raw}");
    }
    Ok(Duration::from_secs(seconds))
}
