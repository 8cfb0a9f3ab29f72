//! Configuration file command.

use session_config_and_utils::{Config, Paths};
use tracing::info;

use crate::output;

/// Write the effective configuration to `config.json` so timings can be
/// edited. An existing file is kept unless `force` is set.
pub fn init(
    paths: &Paths,
    config: &Config,
    force: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let path = paths.config_file();
    if path.exists() && !force {
        output::print_error(&format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
        return Ok(false);
    }

    config.save(paths)?;
    info!(path = %path.display(), "Wrote configuration");
    output::print_success(&format!("Wrote {}", path.display()));
    Ok(true)
}
