use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "tokensmith", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and save both the avatar and the token.
    Tokenize(TokenizeArgs),
    /// Build and save only the framed token, optionally updating a JSON actor record.
    Auto(AutoArgs),
    /// List the frames available to a session.
    Frames(FramesArgs),
}

#[derive(Parser, Debug)]
struct SessionArgs {
    /// Configuration JSON (kebab-case keys).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory images and frames are read from.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Directory uploads are written to.
    #[arg(long)]
    out: PathBuf,

    /// Actor name; file names are derived from it.
    #[arg(long)]
    name: String,

    /// Actor kind.
    #[arg(long, value_enum, default_value_t = KindChoice::Pc)]
    kind: KindChoice,

    /// Token disposition (-1 hostile, 0 neutral, 1 friendly).
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    disposition: i64,

    /// Current avatar image, relative to `--root`.
    #[arg(long)]
    avatar: Option<String>,

    /// Current token image, relative to `--root`.
    #[arg(long)]
    token: Option<String>,

    /// Treat the token path as a wildcard and number the new token.
    #[arg(long)]
    wildcard: bool,

    /// Text appended to generated file names.
    #[arg(long, default_value = "")]
    suffix: String,

    /// Upload folder overriding the configured directories.
    #[arg(long)]
    target_folder: Option<String>,
}

#[derive(Parser, Debug)]
struct TokenizeArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Frame to use instead of the default one.
    #[arg(long)]
    frame: Option<String>,

    /// Add a solid color layer beneath the token.
    #[arg(long)]
    color: Option<tokensmith::Color>,

    /// Save only the token.
    #[arg(long)]
    token_only: bool,
}

#[derive(Parser, Debug)]
struct AutoArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Actor record JSON to update in place with the new paths.
    #[arg(long)]
    record: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FramesArgs {
    /// Configuration JSON (kebab-case keys).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory scanned for additional frames.
    #[arg(long)]
    scan: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindChoice {
    Pc,
    Npc,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    match cli.cmd {
        Command::Tokenize(args) => cmd_tokenize(args),
        Command::Auto(args) => cmd_auto(args),
        Command::Frames(args) => cmd_frames(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<tokensmith::TokenizerConfig> {
    match path {
        Some(p) => tokensmith::TokenizerConfig::load(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(tokensmith::TokenizerConfig::default()),
    }
}

fn build_request(args: &SessionArgs) -> tokensmith::TokenRequest {
    let kind = match args.kind {
        KindChoice::Pc => tokensmith::ActorKind::Pc,
        KindChoice::Npc => tokensmith::ActorKind::Npc,
    };
    tokensmith::TokenRequest {
        disposition: tokensmith::Disposition::from_i64(args.disposition),
        avatar_path: args.avatar.clone(),
        token_path: args.token.clone(),
        wildcard: args.wildcard,
        name_suffix: args.suffix.clone(),
        target_folder: args.target_folder.clone(),
        ..tokensmith::TokenRequest::new(args.name.clone(), kind)
    }
}

fn cmd_tokenize(args: TokenizeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.session.config.as_deref())?;
    if args.token_only {
        config.token_only_toggle = true;
    }
    let request = build_request(&args.session);

    let mut session = tokensmith::Tokenizer::open(
        config,
        request,
        tokensmith::FsFetcher::new(&args.session.root),
        tokensmith::FsStorage::new(&args.session.out),
        &tokensmith::Grants::ALL,
        Vec::new(),
    )?;

    let report = session.load_images()?;
    if report.token_fallback || report.avatar_fallback {
        eprintln!("warning: placeholder image used");
    }
    if let Some(err) = &report.frame_error {
        eprintln!("warning: default frame skipped: {err}");
    }

    if let Some(color) = args.color {
        session.dispatch(tokensmith::Command::AddColor {
            target: tokensmith::ViewKind::Token,
            color: Some(color),
        })?;
    }
    if let Some(path) = args.frame {
        session
            .dispatch(tokensmith::Command::SelectFrame { path: path.clone() })
            .with_context(|| format!("apply frame '{path}'"))?;
    }

    let outcome = session.finalize()?;
    print_outcome(&args.session.out, &outcome);
    Ok(())
}

fn cmd_auto(args: AutoArgs) -> anyhow::Result<()> {
    let config = load_config(args.session.config.as_deref())?;
    let request = build_request(&args.session);
    let fetcher = tokensmith::FsFetcher::new(&args.session.root);
    let storage = tokensmith::FsStorage::new(&args.session.out);

    let outcome = match &args.record {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read record '{}'", path.display()))?;
            let mut record: serde_json::Value =
                serde_json::from_str(&text).with_context(|| "parse record JSON")?;
            let outcome = tokensmith::auto_token(
                config,
                request,
                fetcher,
                storage,
                &tokensmith::Grants::ALL,
                Some(&mut record),
            )?;
            let text = serde_json::to_string_pretty(&record)?;
            std::fs::write(path, text)
                .with_context(|| format!("write record '{}'", path.display()))?;
            outcome
        }
        None => tokensmith::auto_token(
            config,
            request,
            fetcher,
            storage,
            &tokensmith::Grants::ALL,
            None,
        )?,
    };
    print_outcome(&args.session.out, &outcome);
    Ok(())
}

fn cmd_frames(args: FramesArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let mut discovered = Vec::new();
    if let Some(dir) = &args.scan {
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("scan '{}'", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let key = path.to_string_lossy().replace('\\', "/");
            discovered.push(tokensmith::FrameDescriptor::from_path(&key, false));
        }
        discovered.sort_by(|a, b| a.key.cmp(&b.key));
    }

    let catalog = tokensmith::FrameCatalog::new(&config, discovered);
    for frame in catalog.frames() {
        let mark = if frame.selected { "*" } else { " " };
        println!("{mark} {}\t{}", frame.label, frame.key);
    }
    Ok(())
}

fn print_outcome(out: &Path, outcome: &tokensmith::TokenizeOutcome) {
    if let Some(p) = outcome.avatar_path.as_deref().filter(|_| outcome.avatar_uploaded) {
        eprintln!("wrote {}", out.join(p).display());
    }
    if let Some(p) = outcome.token_path.as_deref().filter(|_| outcome.token_uploaded) {
        eprintln!("wrote {}", out.join(p).display());
    }
}
