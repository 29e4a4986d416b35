//! sealpage: lock static HTML pages behind a password
//!
//! Commands:
//!   lock <file.html>    - encrypt the page and embed it behind a login form
//!   unlock <file.html>  - recover the original page from a locked one
//!   hash [--salt HEX]   - print the current-pipeline key for a password
//!   config show         - display the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sealpage_core::config::SealConfig;
use sealpage_core::{
    extract_payload, render_locked_page, LockOptions, LockedPayload, PageUnlocker, Renderer,
    SealError, SealResult, UnlockOutcome,
};
use sealpage_crypto::{encode_with_key, generate_salt, hex, DerivedKey, KeyDerivation};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealpage",
    version,
    about = "Password-lock static HTML pages",
    long_about = "sealpage: encrypt a static HTML page and embed it behind a password form"
)]
struct Cli {
    /// Path to sealpage.toml configuration file
    #[arg(long, short = 'c', env = "SEALPAGE_CONFIG", default_value = "sealpage.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "SEALPAGE_LOG")]
    log: Option<String>,

    /// Log format; overrides config
    #[arg(long, env = "SEALPAGE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt an HTML page and replace its body with a login form
    ///
    /// The file is overwritten in place unless --out is given.
    Lock {
        /// Page to lock (must end in .html)
        file: PathBuf,
        /// Write the locked page here instead of overwriting FILE
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Login markup to use instead of the built-in form
        #[arg(long, short = 't')]
        template: Option<PathBuf>,
        /// Browser-side unlock script to inline into the page
        #[arg(long)]
        viewer_script: Option<PathBuf>,
        /// Replace the page <head> with an empty one
        #[arg(long)]
        remove_head: bool,
        /// Keep line breaks and indentation in the locked page
        #[arg(long)]
        no_minify: bool,
        /// Password (prompted for when omitted)
        #[arg(long, env = "SEALPAGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Recover the original page from a locked one
    Unlock {
        /// Locked page
        file: PathBuf,
        /// Write the recovered page here (default: stdout)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Password (prompted for when omitted)
        #[arg(long, env = "SEALPAGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Derive and print the document key for a password and salt
    Hash {
        /// Hex salt (default: a fresh random salt)
        #[arg(long)]
        salt: Option<String>,
        /// Password (prompted for when omitted)
        #[arg(long, env = "SEALPAGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SealConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Lock {
            file,
            out,
            template,
            viewer_script,
            remove_head,
            no_minify,
            password,
        } => {
            let flags = LockFlags {
                template,
                viewer_script,
                remove_head,
                no_minify,
            };
            cmd_lock(&config, &file, out.as_deref(), &flags, password).await
        }
        Commands::Unlock { file, out, password } => {
            cmd_unlock(&config, &file, out.as_deref(), password).await
        }
        Commands::Hash { salt, password } => cmd_hash(&config, salt, password).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn is_html_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html"))
}

/// Password from flag/env, or an interactive prompt.
fn read_password(provided: Option<String>, confirm: bool) -> Result<SecretString> {
    let password = match provided {
        Some(p) => SecretString::from(p),
        None => {
            let first = prompt_secret("Enter your long, unusual password: ")?;
            if confirm {
                let again = prompt_secret("Confirm password: ")?;
                if again.expose_secret() != first.expose_secret() {
                    anyhow::bail!("passwords do not match");
                }
            }
            first
        }
    };
    if password.expose_secret().is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(password)
}

fn prompt_secret(prompt: &str) -> Result<SecretString> {
    rpassword::prompt_password(prompt)
        .map(SecretString::from)
        .context("reading password")
}

fn build_kdf(config: &SealConfig) -> Result<Arc<KeyDerivation>> {
    if !config.kdf.is_default() {
        warn!(
            sha1 = config.kdf.sha1_iterations,
            sha256 = config.kdf.sha256_iterations,
            final_rounds = config.kdf.final_iterations,
            "non-default KDF iteration counts: pages only open with the same counts"
        );
    }
    let kdf = KeyDerivation::new(&config.kdf.to_params()).context("building key derivation")?;
    Ok(Arc::new(kdf))
}

/// Run the current pipeline on a blocking worker behind a spinner.
async fn derive_key(
    kdf: Arc<KeyDerivation>,
    password: SecretString,
    salt: String,
) -> Result<DerivedKey> {
    let pb = make_spinner("derive");
    pb.set_message("hashing password...");

    let key = tokio::task::spawn_blocking(move || kdf.derive_current(&password, &salt))
        .await
        .context("key derivation task")?
        .context("deriving key");

    pb.finish_and_clear();
    key
}

async fn read_optional(path: Option<&Path>, what: &str) -> Result<Option<String>> {
    match path {
        Some(p) => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("reading {what}: {}", p.display()))
            .map(Some),
        None => Ok(None),
    }
}

// ── `sealpage lock` ───────────────────────────────────────────────────────────

struct LockFlags {
    template: Option<PathBuf>,
    viewer_script: Option<PathBuf>,
    remove_head: bool,
    no_minify: bool,
}

async fn cmd_lock(
    config: &SealConfig,
    file: &Path,
    out: Option<&Path>,
    flags: &LockFlags,
    password: Option<String>,
) -> Result<()> {
    if !is_html_path(file) {
        anyhow::bail!("please specify a valid .html file: {}", file.display());
    }

    let html = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    if extract_payload(&html).is_ok() {
        anyhow::bail!("{} is already locked", file.display());
    }

    let target = out.unwrap_or(file);
    if target == file {
        eprintln!("This operation will overwrite {}", file.display());
    }

    let template_path = flags.template.as_deref().or(config.lock.login_template.as_deref());
    let viewer_path = flags
        .viewer_script
        .as_deref()
        .or(config.lock.viewer_script.as_deref());
    let options = LockOptions {
        remove_head: flags.remove_head || config.lock.remove_head,
        minify: config.lock.minify && !flags.no_minify,
        login_template: read_optional(template_path, "login template").await?,
        viewer_script: read_optional(viewer_path, "viewer script").await?,
    };

    let password = read_password(password, true)?;
    let kdf = build_kdf(config)?;
    let salt = generate_salt();

    let key = derive_key(kdf, password, salt.clone()).await?;
    let msg = encode_with_key(&html, &key).context("encrypting page")?;
    let payload = LockedPayload {
        salt,
        signed_msg: msg.into_string(),
    };

    let locked = render_locked_page(&html, &payload, &options).context("rendering locked page")?;
    tokio::fs::write(target, &locked)
        .await
        .with_context(|| format!("writing {}", target.display()))?;

    info!(
        source = %file.display(),
        target = %target.display(),
        plaintext_bytes = html.len(),
        locked_bytes = locked.len(),
        "page locked"
    );
    println!("Locked {} → {}", file.display(), target.display());
    println!("  salt:    {}", payload.salt);
    println!("  message: {} hex chars", payload.signed_msg.len());

    Ok(())
}

// ── `sealpage unlock` ─────────────────────────────────────────────────────────

/// Writes recovered plaintext to a file, or to stdout.
struct OutputRenderer {
    out: Option<PathBuf>,
}

impl Renderer for OutputRenderer {
    fn render(&self, plaintext: &str) -> SealResult<()> {
        match &self.out {
            Some(path) => std::fs::write(path, plaintext)
                .map_err(|e| SealError::Render(format!("{}: {e}", path.display()))),
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(plaintext.as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(|e| SealError::Render(format!("stdout: {e}")))
            }
        }
    }
}

async fn cmd_unlock(
    config: &SealConfig,
    file: &Path,
    out: Option<&Path>,
    password: Option<String>,
) -> Result<()> {
    let html = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let payload =
        extract_payload(&html).with_context(|| format!("reading payload from {}", file.display()))?;

    let password = read_password(password, false)?;
    let unlocker = PageUnlocker::new(
        build_kdf(config)?,
        payload,
        OutputRenderer {
            out: out.map(Path::to_path_buf),
        },
    );

    let pb = make_spinner("unlock");
    pb.set_message("checking password...");
    let outcome = unlocker.handle_decryption_of_page(password).await;
    pb.finish_and_clear();

    match outcome.context("unlocking page")? {
        UnlockOutcome::Unlocked => {
            if let Some(path) = out {
                eprintln!("Unlocked {} → {}", file.display(), path.display());
            }
            Ok(())
        }
        UnlockOutcome::Rejected => anyhow::bail!("incorrect password"),
        UnlockOutcome::Superseded => anyhow::bail!("unlock attempt was superseded"),
    }
}

// ── `sealpage hash` ───────────────────────────────────────────────────────────

async fn cmd_hash(config: &SealConfig, salt: Option<String>, password: Option<String>) -> Result<()> {
    let salt = match salt {
        Some(s) => {
            hex::parse(&s).with_context(|| format!("invalid salt: {s}"))?;
            s
        }
        None => generate_salt(),
    };

    let password = read_password(password, false)?;
    let key = derive_key(build_kdf(config)?, password, salt.clone()).await?;

    println!("salt: {salt}");
    println!("key:  {}", key.as_hex());
    Ok(())
}

// ── `sealpage config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &SealConfig, path: &Path) -> Result<()> {
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    println!("# config: {source}");
    print!(
        "{}",
        toml::to_string_pretty(config).context("serializing config")?
    );
    Ok(())
}
