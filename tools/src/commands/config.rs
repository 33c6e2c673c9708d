//! Config command - show where the configuration came from and what it holds

use anyhow::Result;
use todomvc_harness::HarnessConfig;
use todomvc_harness::config::ConfigSource;

pub fn run(config: &HarnessConfig, source: &ConfigSource) -> Result<()> {
    match source {
        ConfigSource::File(path) => println!("# loaded from {}", path.display()),
        ConfigSource::Default => println!("# built-in defaults"),
    }
    print!("{}", config.to_toml()?);
    if config.timing.timeout.is_none() {
        println!("# timing.timeout unset: waits poll until their condition holds");
    }
    Ok(())
}
