use pomocoach_core::EngineConfig;

/// Print the config new sessions start with, as JSON.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load_or_default();
    println!("{}", serde_json::to_string_pretty(&config.defaults)?);
    Ok(())
}
