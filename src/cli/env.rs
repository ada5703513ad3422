use clap::Parser;
use std::path::PathBuf;

/// Automates the Renew, Create Invoice and Pay sequence of a service portal.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file path (JSON or YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Navigation timeout in milliseconds
    #[arg(long, default_value_t = 60_000)]
    pub timeout_ms: u64,

    /// Inject the cookies from the configuration before navigating
    #[arg(long)]
    pub use_config_cookies: bool,

    /// Run the renewal workflow
    #[arg(long)]
    pub run_renew: bool,

    /// Continue even when the portal shows a renewal restriction (reported as a warning)
    #[arg(long)]
    pub bypass_restriction: bool,

    /// Allow paying a non-zero invoice
    #[arg(long)]
    pub confirm_payment: bool,

    /// Wait for Enter before each step
    #[arg(long)]
    pub pause: bool,

    /// Save a screenshot after each click and on abort
    #[arg(long)]
    pub screenshots: bool,

    /// Only load the manage page and print its cookies, unless --run-renew is also given
    #[arg(long)]
    pub dry: bool,
}

impl CliArgs {
    /// `--run-renew`, or no mode flag at all. `--dry`, `--headful`,
    /// `--use-config-cookies` and `--pause` alone only load and report the page.
    pub fn runs_workflow(&self) -> bool {
        if self.run_renew {
            return true;
        }
        !(self.dry || self.headful || self.use_config_cookies || self.pause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("renew-pilot").chain(args.iter().copied()))
    }

    #[test]
    fn bare_invocation_runs_the_workflow() {
        let args = parse(&[]);
        assert!(args.runs_workflow());
        assert_eq!(args.timeout_ms, 60_000);
    }

    #[test]
    fn mode_flags() {
        assert!(!parse(&["--dry"]).runs_workflow());
        assert!(parse(&["--dry", "--run-renew"]).runs_workflow());
        assert!(!parse(&["--headful"]).runs_workflow());
        assert!(parse(&["--headful", "--run-renew"]).runs_workflow());
        assert!(!parse(&["--use-config-cookies"]).runs_workflow());
        // Guards alone do not change the mode.
        assert!(parse(&["--confirm-payment", "--screenshots"]).runs_workflow());
    }
}
