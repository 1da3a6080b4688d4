use formsync::config::{Config, Opts};
use formsync::core::tasks::JobOutcome;
use formsync::err::Result;
use formsync::forms::{FsFormMetadata, TransferForms, scan_forms};
use formsync::global_var::LOGGER_CELL;
use formsync::http::{Http, ReqwestHttp};
use formsync::push::PushPipeline;
use formsync::utilities::init_file_logger;
use std::sync::Arc;
use tokio::sync::mpsc;

fn print_version_and_exit() -> ! {
    // These are set by build.rs; fall back to unknown if missing
    let pkg_version = env!("CARGO_PKG_VERSION");
    let commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
    let state = option_env!("GIT_STATE").unwrap_or("unknown");
    let built = option_env!("BUILD_TIME").unwrap_or("unknown time");
    println!(
        "formsync {} (commit: {}, state: {}, built: {})",
        pkg_version, commit, state, built
    );
    std::process::exit(0)
}

#[tokio::main]
async fn main() {
    let opts = Opts::from_args();

    if opts.version {
        print_version_and_exit();
    }
    if opts.debug {
        // Read once by the DEBUG_MODE lazy; set before anything logs.
        unsafe { std::env::set_var("DEBUG_MODE", "1") };
    }

    match run(opts).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("formsync: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(opts: Opts) -> Result<i32> {
    let config = Config::from_config(opts.config.as_deref().and_then(|p| p.to_str()))?;

    let (logger, _logger_task) = init_file_logger(config.log_file()).await?;
    let _ = LOGGER_CELL.set(logger);

    let storage_dir = config.storage_dir();
    let all_forms = scan_forms(&storage_dir)?;
    let selected: TransferForms = if opts.form.is_empty() {
        all_forms
    } else {
        all_forms
            .iter()
            .filter(|f| opts.form.iter().any(|name| name == f.name()))
            .cloned()
            .collect()
    };
    if selected.is_empty() {
        println!("No forms to push.");
        return Ok(0);
    }

    let prefs = config.transfer_prefs();
    let http: Arc<dyn Http> = Arc::new(ReqwestHttp::from_prefs(&prefs)?);
    let target = config.push_target()?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let pipeline = PushPipeline::new(http, events_tx);

    let metadata = FsFormMetadata::at(storage_dir.clone());
    if let Some(warning) = pipeline.push_warning(&metadata, &selected)? {
        println!("{}", warning);
        if !opts.yes {
            println!("Nothing was pushed. Re-run with --yes to proceed.");
            return Ok(0);
        }
    }

    let runner = pipeline.push(&selected, &target, &storage_dir).await?;
    let _ = events_rx.recv().await;
    runner.wait().await;

    for form in selected.iter() {
        println!("{}: {}", form.name(), form.status_string());
    }
    let failed = runner
        .outcomes()
        .iter()
        .filter(|(_, outcome)| matches!(outcome, JobOutcome::Failed(_)))
        .count();
    Ok(if failed > 0 { 1 } else { 0 })
}
