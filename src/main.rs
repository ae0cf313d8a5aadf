use apk_backup::backup::catalog::PackageCategory;
use apk_backup::backup::device::aapt::{AaptInfoTool, DEFAULT_TOOL_CANDIDATES};
use apk_backup::backup::device::pm::PmPackageService;
use apk_backup::backup::device::su::SuShell;
use apk_backup::backup::extract::ExtractionReport;
use apk_backup::backup::filter::FilterOptions;
use apk_backup::backup::result_error::error::Error;
use apk_backup::backup::result_error::result::{convert_error_vec, Result};
use apk_backup::backup::result_error::WithMsg;
use apk_backup::backup::session::{RunOptions, Session};
use apk_backup::backup::state::{BackupState, StateStore};
use apk_backup::backup::validate::validate_tool_path;
use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};

/// Incremental APK extractor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("category").args(["user", "system", "disabled", "all"])))]
struct Args {
    /// User apps
    #[arg(short, long)]
    user: bool,
    /// System apps
    #[arg(short, long)]
    system: bool,
    /// Disabled apps
    #[arg(short, long)]
    disabled: bool,
    /// Any app
    #[arg(short, long)]
    all: bool,
    /// Delete the saved state before doing anything else
    #[arg(short, long)]
    reset: bool,
    /// Also extract Substratum overlays
    #[arg(long)]
    keep_overlays: bool,
    /// Also extract theme variants compiled with Arcus
    #[arg(long, visible_alias = "keep-arcus")]
    keep_variants: bool,
    /// Backup directory, remembered for later runs
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Location of the state file [default: next to the executable]
    #[arg(long)]
    state: Option<PathBuf>,
    /// aapt or aopt binary, remembered for later runs
    #[arg(long)]
    info_tool: Option<PathBuf>,
}

impl Args {
    /// `None` only for a bare `--reset`.
    fn category(&self) -> Option<PackageCategory> {
        let category = if self.user {
            Some(PackageCategory::User)
        } else if self.system {
            Some(PackageCategory::System)
        } else if self.disabled {
            Some(PackageCategory::Disabled)
        } else if self.all {
            Some(PackageCategory::All)
        } else {
            None
        };

        if category.is_none() && !self.reset {
            Args::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    "one of -u/--user -s/--system -d/--disabled -a/--all is required",
                )
                .exit();
        }
        if (self.keep_overlays || self.keep_variants) && !(self.user || self.all) {
            Args::command()
                .error(
                    ErrorKind::ArgumentConflict,
                    "--keep-overlays and --keep-variants require -u/--user or -a/--all",
                )
                .exit();
        }

        category
    }

    fn run_options(&self, category: PackageCategory) -> RunOptions {
        RunOptions::builder()
            .category(category)
            .filters(
                FilterOptions::builder()
                    .keep_overlays(self.keep_overlays)
                    .keep_variants(self.keep_variants)
                    .build(),
            )
            .build()
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let category = args.category();

    let store = match &args.state {
        Some(path) => StateStore::new(path),
        None => match StateStore::beside_executable() {
            Ok(store) => store,
            Err(e) => {
                error!("{e}");
                exit(1);
            }
        },
    };

    if args.reset {
        match store.reset() {
            Ok(true) => info!("State reset: {:?}", store.path()),
            Ok(false) => warn!("State was not present: {:?}", store.path()),
            Err(e) => {
                error!("{e}");
                exit(1);
            }
        }
    }

    let Some(category) = category else {
        exit(0);
    };

    let mut state = match store.load_or_default() {
        Ok(state) => state,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    let res = run(&args, category, &store, &mut state);

    if let Err(e) = store.save(&state) {
        error!("{e}");
        exit(1);
    }

    match res {
        Ok(report) => {
            let failures = report
                .failures
                .into_iter()
                .map(|(identifier, e)| e.with_msg(format!("Not backed up: {identifier}")))
                .collect();
            if let Err(e) = convert_error_vec(failures) {
                warn!("{e}");
            }
        }
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}

fn run(
    args: &Args,
    category: PackageCategory,
    store: &StateStore,
    state: &mut BackupState,
) -> Result<ExtractionReport> {
    let tool_path = resolve_tool_path(args, state)?;
    state.tool_path = Some(tool_path.clone());

    if let Some(dir) = &args.dir {
        state.backup_dir = Some(dir.clone());
    }
    if state.backup_dir.is_none() {
        state.backup_dir = Some(prompt_backup_dir()?);
    }

    let shell = SuShell::default();
    let service = PmPackageService::default();
    let info_tool = AaptInfoTool::new(tool_path);

    Session::builder()
        .shell(&shell)
        .service(&service)
        .info_tool(&info_tool)
        .build()
        .run(state, args.run_options(category), |s| {
            if let Err(e) = store.save(s) {
                warn!("Checkpoint failed: {e}");
            }
        })
}

fn resolve_tool_path(args: &Args, state: &BackupState) -> Result<PathBuf> {
    if let Some(path) = &args.info_tool {
        validate_tool_path(path)
            .map_err(Error::from)
            .with_msg("Invalid --info-tool")?;
        return Ok(path.clone());
    }
    match &state.tool_path {
        Some(path) => Ok(path.clone()),
        None => AaptInfoTool::discover(DEFAULT_TOOL_CANDIDATES),
    }
}

fn prompt_backup_dir() -> Result<PathBuf> {
    print!("Directory where to extract the APKs:\n> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    let dir = match line.trim_end_matches('/') {
        "" if line.starts_with('/') => "/",
        dir => dir,
    };

    if dir.is_empty() {
        return Err(Error::MissingBackupDir);
    }
    Ok(PathBuf::from(dir))
}
