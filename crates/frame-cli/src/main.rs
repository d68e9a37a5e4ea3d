use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use frame_contracts::events::EventLog;
use frame_contracts::payload::{extension_for_mime, ImagePayload};
use frame_contracts::receipts::{write_receipt, AttemptReceipt, RECEIPT_SCHEMA_VERSION};
use frame_contracts::records::{AuthSession, ImagePage, ImageRecord, NewImageRecord};
use frame_engine::{
    select_path, AttemptState, EnhancementGateway, FlowController, FrameConfig, GatewayContext,
    ImageStore, RequestBuilder, SupabaseStore,
};
use serde_json::{json, Map, Value};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "foreverframe",
    version,
    about = "Turn a photo into a cinematic milestone memory"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available milestones.
    Milestones,
    /// Print the prompt sent for a milestone.
    Prompt(PromptArgs),
    /// Enhance a photo for a milestone.
    Enhance(EnhanceArgs),
    /// Show which paths are configured and check the backend.
    Health,
    /// Sign in and print the session.
    Login(LoginArgs),
    /// Browse or prune saved enhancements.
    #[command(subcommand)]
    Gallery(GalleryCommand),
}

#[derive(Debug, Parser)]
struct PromptArgs {
    #[arg(long)]
    milestone: String,
}

#[derive(Debug, Default, Args)]
struct AuthArgs {
    #[arg(long, requires = "user_id")]
    access_token: Option<String>,
    #[arg(long, requires = "access_token")]
    user_id: Option<String>,
    #[arg(long, requires = "password", conflicts_with = "access_token")]
    email: Option<String>,
    #[arg(long, requires = "email")]
    password: Option<String>,
}

#[derive(Debug, Parser)]
struct EnhanceArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    milestone: String,
    #[arg(long, default_value = "foreverframe-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    demo_delay_ms: Option<u64>,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Debug, Parser)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Subcommand)]
enum GalleryCommand {
    List(GalleryListArgs),
    Show(GalleryShowArgs),
    /// Save an enhancement produced outside the backend, e.g. by the direct path.
    Save(GallerySaveArgs),
    Delete(GalleryDeleteArgs),
}

#[derive(Debug, Parser)]
struct GalleryListArgs {
    #[arg(long, default_value_t = frame_contracts::records::DEFAULT_PAGE_LIMIT)]
    limit: u64,
    #[arg(long, default_value_t = 0)]
    offset: u64,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Debug, Parser)]
struct GalleryShowArgs {
    #[arg(long)]
    id: String,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Debug, Parser)]
struct GallerySaveArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    enhanced_url: String,
    #[arg(long)]
    milestone: String,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Debug, Parser)]
struct GalleryDeleteArgs {
    #[arg(long)]
    id: String,
    #[command(flatten)]
    auth: AuthArgs,
}

const LOADING_MESSAGES: [&str; 7] = [
    "Analyzing your photo...",
    "Understanding the moment...",
    "Crafting the scene...",
    "Adding cinematic touches...",
    "Enhancing details...",
    "Perfecting the atmosphere...",
    "Finalizing your memory...",
];
const LOADING_MESSAGE_INTERVAL: Duration = Duration::from_millis(1400);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() {
    init_logging();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("foreverframe error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Milestones => run_milestones(),
        Command::Prompt(args) => run_prompt(args),
        Command::Enhance(args) => run_enhance(args),
        Command::Health => run_health(),
        Command::Login(args) => run_login(args),
        Command::Gallery(GalleryCommand::List(args)) => run_gallery_list(args),
        Command::Gallery(GalleryCommand::Show(args)) => run_gallery_show(args),
        Command::Gallery(GalleryCommand::Save(args)) => run_gallery_save(args),
        Command::Gallery(GalleryCommand::Delete(args)) => run_gallery_delete(args),
    }
}

fn run_milestones() -> Result<i32> {
    let builder = RequestBuilder::default();
    for milestone in builder.catalog().list() {
        println!("{:<12} {} {}", milestone.id, milestone.icon, milestone.name);
        println!("{:<12} {}", "", milestone.description);
    }
    Ok(0)
}

fn run_prompt(args: PromptArgs) -> Result<i32> {
    let prompt = RequestBuilder::default().build_prompt(&args.milestone)?;
    println!("{prompt}");
    Ok(0)
}

fn run_enhance(args: EnhanceArgs) -> Result<i32> {
    let mut config = FrameConfig::from_env()?;
    if let Some(delay_ms) = args.demo_delay_ms {
        config.demo_delay = Duration::from_millis(delay_ms);
    }
    let payload = read_image_payload(&args.image)?;
    let session = resolve_session(&config, &args.auth)?;
    let context = match session {
        Some(session) => GatewayContext::authenticated(session),
        None => GatewayContext::anonymous(),
    };

    let gateway = Arc::new(EnhancementGateway::from_config(&config)?);
    let selection = select_path(gateway.flags(&context));
    println!("Path: {} ({})", selection.path, selection.reason);

    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventLog::for_new_session(&events_path);
    tracing::debug!(
        events = %events_path.display(),
        session_id = events.session_id(),
        "recording flow events"
    );
    let session_id = events.session_id().to_string();
    let mut flow = FlowController::new(gateway).with_events(events);
    flow.select_image(payload)?;
    flow.select_milestone(&args.milestone)?;

    let started_at = Utc::now();
    flow.generate(context)?;
    wait_with_progress(&mut flow)?;
    let finished_at = Utc::now();

    let stamp = file_stamp(finished_at);
    let mut saved_image = None;
    if let Some(result) = flow.result() {
        let enhanced = ImagePayload::new(result.image_url.clone());
        if enhanced.is_data_uri() {
            let path = save_data_uri(&enhanced, &args.out, &stamp)?;
            saved_image = Some(path);
        }
    }

    let receipt = build_receipt(&flow, &session_id, &args.image, started_at, finished_at);
    let receipt_path = args.out.join(format!("receipt-{stamp}.json"));
    write_receipt(&receipt_path, &receipt)?;

    match flow.state() {
        AttemptState::Succeeded => {
            if let Some(result) = flow.result() {
                match saved_image.as_deref() {
                    Some(path) => println!("Enhanced image saved to {}", path.display()),
                    None => println!("Enhanced image: {}", result.image_url),
                }
                if let Some(record_id) = result.record_id.as_deref() {
                    println!("Saved to gallery as {record_id}");
                }
            }
            for warning in &receipt.warnings {
                println!("Warning: {warning}");
            }
            println!("Receipt: {}", receipt_path.display());
            Ok(0)
        }
        state => {
            eprintln!(
                "Enhancement failed: {}",
                flow.error().unwrap_or("attempt did not complete")
            );
            eprintln!("Receipt: {} (state {state})", receipt_path.display());
            Ok(1)
        }
    }
}

fn wait_with_progress(flow: &mut FlowController) -> Result<()> {
    let started = Instant::now();
    let mut shown = None;
    let mut stdout = io::stdout();
    while flow.poll() == AttemptState::InFlight {
        let index = loading_message_index(started.elapsed());
        if shown != Some(index) {
            writeln!(stdout, "{}", LOADING_MESSAGES[index])?;
            stdout.flush()?;
            shown = Some(index);
        }
        thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}

fn loading_message_index(elapsed: Duration) -> usize {
    let ticks = elapsed.as_millis() / LOADING_MESSAGE_INTERVAL.as_millis();
    (ticks % LOADING_MESSAGES.len() as u128) as usize
}

fn read_image_payload(path: &Path) -> Result<ImagePayload> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let format = image::guess_format(&bytes)
        .or_else(|_| image::ImageFormat::from_path(path))
        .with_context(|| format!("{} is not a recognised image", path.display()))?;
    Ok(ImagePayload::from_bytes(&bytes, format.to_mime_type()))
}

fn save_data_uri(image: &ImagePayload, out_dir: &Path, stamp: &str) -> Result<PathBuf> {
    let decoded = image.decode()?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let path = out_dir.join(format!(
        "enhanced-{stamp}.{}",
        extension_for_mime(&decoded.mime_type)
    ));
    fs::write(&path, &decoded.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn build_receipt(
    flow: &FlowController,
    session_id: &str,
    source: &Path,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> AttemptReceipt {
    let outcome = flow.last_outcome();
    let mut warnings = Vec::new();
    if let Some(upload_error) = outcome.and_then(|outcome| outcome.upload_error.clone()) {
        warnings.push(upload_error);
    }
    AttemptReceipt {
        schema_version: RECEIPT_SCHEMA_VERSION,
        session_id: Some(session_id.to_string()),
        milestone_id: flow
            .milestone()
            .map(|milestone| milestone.id.clone())
            .unwrap_or_default(),
        path: outcome
            .map(|outcome| outcome.path.as_str().to_string())
            .unwrap_or_default(),
        path_reason: outcome
            .map(|outcome| outcome.reason.clone())
            .unwrap_or_default(),
        source_image: source.display().to_string(),
        outcome: outcome
            .and_then(|outcome| serde_json::to_value(&outcome.result).ok())
            .unwrap_or_else(|| json!({"status": flow.state().as_str()})),
        warnings,
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        finished_at: finished_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        elapsed_ms: outcome
            .map(|outcome| outcome.elapsed.as_millis() as u64)
            .unwrap_or_default(),
    }
}

fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

fn supabase_store(config: &FrameConfig) -> Result<SupabaseStore> {
    let Some(url) = config.supabase_url.as_deref() else {
        bail!("SUPABASE_URL is not set");
    };
    SupabaseStore::new(url, config.supabase_anon_key.clone(), config.http_timeout)
        .context("failed to build Supabase client")
}

fn resolve_session(config: &FrameConfig, auth: &AuthArgs) -> Result<Option<AuthSession>> {
    match (
        auth.access_token.as_deref(),
        auth.user_id.as_deref(),
        auth.email.as_deref(),
        auth.password.as_deref(),
    ) {
        (Some(access_token), Some(user_id), _, _) => Ok(Some(AuthSession {
            access_token: access_token.to_string(),
            user_id: user_id.to_string(),
        })),
        (_, _, Some(email), Some(password)) => {
            let session = supabase_store(config)?
                .sign_in_with_password(email, password)
                .context("sign-in failed")?;
            Ok(Some(session))
        }
        (None, None, None, None) => Ok(None),
        _ => bail!("pass --access-token with --user-id, or --email with --password"),
    }
}

fn require_session(config: &FrameConfig, auth: &AuthArgs) -> Result<AuthSession> {
    resolve_session(config, auth)?
        .context("this command needs a session; pass --email/--password or --access-token/--user-id")
}

fn run_health() -> Result<i32> {
    let config = FrameConfig::from_env()?;
    let gateway = EnhancementGateway::from_config(&config)?;
    println!("{config:?}");
    for (label, authenticated) in [("anonymous", false), ("signed in", true)] {
        let mut flags = gateway.flags(&GatewayContext::anonymous());
        flags.authenticated = authenticated;
        let selection = select_path(flags);
        println!("{label:>10}: {} ({})", selection.path, selection.reason);
    }

    let Some(backend) = gateway.backend() else {
        println!("backend: not configured");
        return Ok(0);
    };
    let health = backend.health();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "endpoint": backend.enhance_endpoint(),
            "healthy": health.healthy,
            "status": health.status,
            "error": health.error,
        }))?
    );
    Ok(if health.healthy { 0 } else { 1 })
}

fn run_login(args: LoginArgs) -> Result<i32> {
    let config = FrameConfig::from_env()?;
    let session = supabase_store(&config)?
        .sign_in_with_password(&args.email, &args.password)
        .context("sign-in failed")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "user_id": session.user_id,
            "access_token": session.access_token,
        }))?
    );
    Ok(0)
}

fn run_gallery_list(args: GalleryListArgs) -> Result<i32> {
    let config = FrameConfig::from_env()?;
    let session = require_session(&config, &args.auth)?;
    let store = supabase_store(&config)?;
    let rows = store.list_images(
        &session,
        ImagePage {
            limit: args.limit,
            offset: args.offset,
        },
    )?;
    if rows.is_empty() {
        println!("No saved memories yet.");
        return Ok(0);
    }
    for row in rows {
        println!("{}", gallery_line(&serde_json::to_value(&row)?));
    }
    Ok(0)
}

fn run_gallery_show(args: GalleryShowArgs) -> Result<i32> {
    let config = FrameConfig::from_env()?;
    let session = require_session(&config, &args.auth)?;
    let record = supabase_store(&config)?.get_image(&session, &args.id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(0)
}

fn run_gallery_save(args: GallerySaveArgs) -> Result<i32> {
    let config = FrameConfig::from_env()?;
    let session = require_session(&config, &args.auth)?;
    let store = supabase_store(&config)?;
    let original = read_image_payload(&args.image)?;
    let record = save_to_gallery(
        &store,
        &session,
        &RequestBuilder::default(),
        &original,
        &args.enhanced_url,
        &args.milestone,
    )?;
    println!("Saved to gallery as {}", record.id);
    Ok(0)
}

/// Uploads the original and writes the `images` row for a finished
/// enhancement. The backend path does this server-side.
fn save_to_gallery(
    store: &dyn ImageStore,
    session: &AuthSession,
    builder: &RequestBuilder,
    original: &ImagePayload,
    enhanced_url: &str,
    milestone_id: &str,
) -> Result<ImageRecord> {
    let milestone = builder.milestone(milestone_id)?;
    let prompt = builder.build_prompt(milestone_id)?;
    if !ImagePayload::new(enhanced_url).is_remote() {
        bail!("--enhanced-url must be an http(s) link: {enhanced_url}");
    }
    let stored = store
        .upload_image(session, original, "originals")
        .context("failed to upload the original photo")?;
    let mut metadata = Map::new();
    metadata.insert("saved_from".to_string(), json!("cli"));
    let record = store.create_image_record(
        session,
        NewImageRecord {
            user_id: session.user_id.clone(),
            original_image_url: stored.url,
            enhanced_image_url: enhanced_url.to_string(),
            milestone_id: milestone.id.clone(),
            milestone_name: milestone.name.clone(),
            prompt,
            status: "completed".to_string(),
            metadata,
        },
    )?;
    Ok(record)
}

fn run_gallery_delete(args: GalleryDeleteArgs) -> Result<i32> {
    let config = FrameConfig::from_env()?;
    let session = require_session(&config, &args.auth)?;
    supabase_store(&config)?.delete_image(&session, &args.id)?;
    println!("Deleted {}", args.id);
    Ok(0)
}

fn gallery_line(row: &Value) -> String {
    let field = |key: &str| row.get(key).and_then(Value::as_str).unwrap_or("-");
    let milestone = row
        .get("milestone_name")
        .and_then(Value::as_str)
        .unwrap_or_else(|| field("milestone_id"));
    format!(
        "{}  {}  {}  {}",
        field("id"),
        field("created_at"),
        milestone,
        field("enhanced_image_url")
    )
}
