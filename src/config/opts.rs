use std::path::PathBuf;
use structopt::StructOpt;
use structopt::clap::ErrorKind;

/// Command-line options.
///
/// Examples:
/// - Push every local form:
///   formsync --config formsync.toml
/// - Push a selection:
///   formsync --config formsync.toml --form basic --form census
///
/// Note: When invoking via `cargo run`, always place `--` before program
/// arguments so Cargo stops parsing its own flags.
#[derive(StructOpt, Debug)]
pub struct Opts {
    #[structopt(short = "v", long = "version")]
    pub version: bool,

    #[structopt(short, long, help = "Enable debug mode (verbose logging)")]
    pub debug: bool,

    #[structopt(
        short = "c",
        long = "config",
        required_unless = "version",
        help = "Path to the configuration file."
    )]
    pub config: Option<PathBuf>,

    #[structopt(
        long = "form",
        number_of_values = 1,
        help = "Push only this form (repeatable). Default: every local form."
    )]
    pub form: Vec<String>,

    #[structopt(
        short = "y",
        long = "yes",
        help = "Proceed even if the multi-version advisory applies."
    )]
    pub yes: bool,
}

impl Opts {
    /// Parse CLI arguments. If parsing fails, print the error and the full help, then exit.
    pub fn from_args() -> Self {
        let app = Opts::clap();
        match app.get_matches_safe() {
            Ok(m) => Opts::from_clap(&m),
            Err(e) => {
                let kind = e.kind; // capture before we move/print
                eprintln!("{}", e);
                let mut app = Opts::clap();
                eprintln!();
                let _ = app.print_long_help();
                eprintln!();
                std::process::exit(match kind {
                    ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => 0,
                    _ => 2,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use structopt::StructOpt;

    #[test]
    fn parse_version_flag() {
        let o = Opts::from_iter_safe(["formsync", "--version"]).expect("parse");
        assert!(o.version);
        assert!(!o.debug);
        assert!(o.config.is_none());
    }

    #[test]
    fn parse_selection_and_consent_flags() {
        let o = Opts::from_iter_safe([
            "formsync", "-c", "cfg.toml", "--form", "basic", "--form", "census", "--yes",
        ])
        .expect("parse");
        assert_eq!(o.config.unwrap(), PathBuf::from("cfg.toml"));
        assert_eq!(o.form, vec!["basic", "census"]);
        assert!(o.yes);
    }

    #[test]
    fn missing_required_config_without_version_errors() {
        let err = Opts::from_iter_safe(["formsync"]).err().expect("should error");
        assert_eq!(err.kind, ErrorKind::MissingRequiredArgument);
    }
}
