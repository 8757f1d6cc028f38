use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};

use adgen_studio::config::{self, Config};
use adgen_studio::create::AdCreation;
use adgen_studio::draft;
use adgen_studio::feed::{AssumeYes, Confirm, EditOutcome, FeedView, VideoFeedRepository};
use adgen_studio::model::{AppSettings, AspectRatio, CreateAdDraft, EditableField, PostId, VideoPost};
use adgen_studio::settings;
use adgen_studio::store::{self, Pool};
use adgen_studio::upload::{self, UploadGateway};
use adgen_studio::webhook::{HttpWebhookTransport, WebhookDispatcher};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Configure the backend, submit ad requests and manage generated video posts"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Backend connection and webhook settings
    Settings {
        #[command(subcommand)]
        action: SettingsCmd,
    },
    /// Generated video posts
    Feed {
        #[command(subcommand)]
        action: FeedCmd,
    },
    /// The saved ad-creation form
    Draft {
        #[command(subcommand)]
        action: DraftCmd,
    },
    /// Submit the saved draft (after applying any overrides) for generation
    Create(DraftFields),
}

#[derive(Debug, Subcommand)]
enum SettingsCmd {
    Show,
    Set {
        #[arg(long)]
        backend_url: Option<String>,
        #[arg(long)]
        backend_key: Option<String>,
        #[arg(long)]
        generate_webhook: Option<String>,
        #[arg(long)]
        post_webhook: Option<String>,
        #[arg(long)]
        table: Option<String>,
    },
    Reset,
}

#[derive(Debug, Subcommand)]
enum FeedCmd {
    List,
    /// Edit a post's title and/or caption
    Edit {
        id: PostId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Delete a post permanently
    Delete {
        id: PostId,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Save a post's video locally
    Download {
        id: PostId,
        /// Target directory (defaults to {data_dir}/downloads)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Send a post to the posting workflow
    Publish { id: PostId },
}

#[derive(Debug, Subcommand)]
enum DraftCmd {
    Show,
    Set(DraftFields),
    Clear,
}

#[derive(Debug, Default, clap::Args)]
struct DraftFields {
    #[arg(long)]
    prompt: Option<String>,
    /// Image file to upload on submission
    #[arg(long)]
    file: Option<PathBuf>,
    /// Cache this file as the draft's preview
    #[arg(long)]
    preview_from: Option<PathBuf>,
    /// Use an already hosted image instead of uploading
    #[arg(long)]
    image_url: Option<String>,
    #[arg(long)]
    product_name: Option<String>,
    #[arg(long)]
    product_description: Option<String>,
    /// 16:9 or 9:16
    #[arg(long)]
    aspect_ratio: Option<AspectRatio>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(?err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = store::init_pool(&database_url).await?;
    store::run_migrations(&pool).await?;

    match args.command {
        Command::Settings { action } => settings_cmd(&pool, &cfg, action).await,
        Command::Feed { action } => feed_cmd(&pool, &cfg, action).await,
        Command::Draft { action } => draft_cmd(&pool, action).await,
        Command::Create(fields) => create_cmd(&pool, &cfg, fields).await,
    }
}

async fn load_settings(pool: &Pool, cfg: &Config) -> Result<AppSettings> {
    let mut s = settings::load(pool).await?;
    if s.table_name.trim().is_empty() {
        s.table_name = cfg.feed.default_table.clone();
    }
    Ok(s)
}

fn dispatcher(settings: &AppSettings, cfg: &Config) -> WebhookDispatcher {
    let transport = HttpWebhookTransport::new(&cfg.app.user_agent);
    WebhookDispatcher::new(settings.clone(), Arc::new(transport))
}

async fn settings_cmd(pool: &Pool, cfg: &Config, action: SettingsCmd) -> Result<()> {
    match action {
        SettingsCmd::Show => {
            let s = load_settings(pool, cfg).await?;
            println!("backend url:      {}", display_or_unset(&s.backend_url));
            println!("backend key:      {}", settings::mask(&s.backend_key));
            println!("generate webhook: {}", display_or_unset(&s.generate_webhook_url));
            println!("post webhook:     {}", display_or_unset(&s.post_webhook_url));
            println!("table:            {}", s.table());
            if !s.is_configured() {
                println!("(backend not configured)");
            }
        }
        SettingsCmd::Set {
            backend_url,
            backend_key,
            generate_webhook,
            post_webhook,
            table,
        } => {
            let mut s = settings::load(pool).await?;
            if let Some(v) = backend_url {
                s.backend_url = v;
            }
            if let Some(v) = backend_key {
                s.backend_key = v;
            }
            if let Some(v) = generate_webhook {
                s.generate_webhook_url = v;
            }
            if let Some(v) = post_webhook {
                s.post_webhook_url = v;
            }
            if let Some(v) = table {
                s.table_name = v;
            }
            settings::save(pool, &s).await?;
            println!("Settings saved.");
        }
        SettingsCmd::Reset => {
            settings::reset(pool).await?;
            println!("Settings reset to defaults.");
        }
    }
    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "(unset)"
    } else {
        value
    }
}

async fn feed_cmd(pool: &Pool, cfg: &Config, action: FeedCmd) -> Result<()> {
    let s = load_settings(pool, cfg).await?;
    let mut view = FeedView::new(VideoFeedRepository::from_settings(&s, &cfg.app.user_agent));
    view.refresh().await?;

    match action {
        FeedCmd::List => {
            if view.posts().is_empty() {
                println!("No posts yet.");
            }
            for post in view.posts() {
                print_post(post);
            }
        }
        FeedCmd::Edit { id, title, caption } => {
            let edits = [(EditableField::Title, title), (EditableField::Caption, caption)];
            for (field, value) in edits {
                let Some(value) = value else { continue };
                match view.commit_edit(&id, field, &value).await? {
                    EditOutcome::Unchanged => println!("{} unchanged.", field.column()),
                    EditOutcome::Updated => println!("{} updated.", field.column()),
                }
            }
        }
        FeedCmd::Delete { id, yes } => {
            let confirm: &dyn Confirm = if yes { &AssumeYes } else { &StdinConfirm };
            if view.delete(&id, confirm).await? {
                println!("Post {id} deleted.");
            } else {
                println!("Delete cancelled.");
            }
        }
        FeedCmd::Download { id, out } => {
            let dir = out.unwrap_or_else(|| {
                Path::new(&cfg.app.resolved_data_dir()).join("downloads")
            });
            let path = view.download(&id, &dir).await?;
            println!("Saved {}", path.display());
        }
        FeedCmd::Publish { id } => {
            let reply = view.publish(&id, &dispatcher(&s, cfg)).await?;
            println!("Publish request sent for post {id}.");
            if !reply.is_null() {
                println!("{}", serde_json::to_string_pretty(&reply)?);
            }
        }
    }
    Ok(())
}

fn print_post(post: &VideoPost) {
    let media = post.media_url().unwrap_or("processing");
    let title = if post.title.is_empty() { "(untitled)" } else { post.title.as_str() };
    println!("#{}  {}", post.id, title);
    println!("    media:    {media}");
    if !post.caption.is_empty() {
        println!("    caption:  {}", post.caption);
    }
    if let Some(tags) = post.hashtags.as_deref().filter(|t| !t.is_empty()) {
        println!("    hashtags: {tags}");
    }
    let status = |s: &Option<String>| s.clone().unwrap_or_else(|| "-".into());
    println!(
        "    instagram: {}  tiktok: {}  youtube: {}",
        status(&post.instagram_status),
        status(&post.tiktok_status),
        status(&post.youtube_status)
    );
}

/// Asks on the terminal; anything but `y`/`yes` declines.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

async fn draft_cmd(pool: &Pool, action: DraftCmd) -> Result<()> {
    match action {
        DraftCmd::Show => print_draft(&draft::load(pool).await?),
        DraftCmd::Set(fields) => {
            let d = apply_fields(pool, fields).await?;
            print_draft(&d);
        }
        DraftCmd::Clear => {
            draft::clear(pool).await?;
            println!("Draft cleared.");
        }
    }
    Ok(())
}

/// Persist the given overrides onto the stored draft.
async fn apply_fields(pool: &Pool, fields: DraftFields) -> Result<CreateAdDraft> {
    let preview = match &fields.preview_from {
        Some(path) => Some(
            upload::preview_from_file(path)
                .await
                .with_context(|| format!("failed to read preview {}", path.display()))?,
        ),
        None => None,
    };
    let d = draft::update(pool, move |d| {
        if let Some(v) = fields.prompt {
            d.prompt = v;
        }
        if let Some(v) = fields.file {
            d.file = Some(v);
        }
        if let Some(v) = preview {
            d.preview = Some(v);
        }
        if let Some(v) = fields.image_url {
            d.image_url = Some(v);
        }
        if let Some(v) = fields.product_name {
            d.product_name = v;
        }
        if let Some(v) = fields.product_description {
            d.product_description = v;
        }
        if let Some(v) = fields.aspect_ratio {
            d.aspect_ratio = v;
        }
    })
    .await?;
    Ok(d)
}

fn print_draft(d: &CreateAdDraft) {
    println!("prompt:              {}", d.prompt);
    println!("aspect ratio:        {}", d.aspect_ratio);
    println!("product name:        {}", d.product_name);
    println!("product description: {}", d.product_description);
    if let Some(file) = &d.file {
        println!("file:                {}", file.display());
    }
    if let Some(preview) = &d.preview {
        println!("preview:             cached ({} bytes encoded)", preview.len());
    }
    if let Some(url) = d.direct_image_url() {
        println!("image url:           {url}");
    }
}

async fn create_cmd(pool: &Pool, cfg: &Config, fields: DraftFields) -> Result<()> {
    let d = apply_fields(pool, fields).await?;
    let s = load_settings(pool, cfg).await?;
    let flow = AdCreation::new(
        UploadGateway::from_settings(&s, &cfg.app.user_agent, cfg.storage.bucket.clone()),
        dispatcher(&s, cfg),
        cfg.storage.category.clone(),
    );

    let submission = flow.submit(pool, &d).await;
    if let Some(reason) = &submission.upload_warning {
        warn!(%reason, "image upload degraded");
        eprintln!("warning: image upload failed ({reason}); sending request without an image URL");
    }
    let draft_cleared = submission.draft_cleared;
    let reply = submission.into_result()?;
    if draft_cleared {
        println!("Ad request submitted. Draft cleared.");
    } else {
        println!("Ad request submitted. The saved draft could not be cleared; run `draft clear`.");
    }
    if !reply.is_null() {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    }
    Ok(())
}
