use cp_bridge::EndpointRegistry;
use cp_core::config::Config;

/// Print the effective configuration (file plus environment) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let text = config.to_toml()?;
    print!("{text}");
    Ok(())
}

pub fn validate(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    let ext = &config.extension;
    let candidates = EndpointRegistry::from_config(ext).len();
    println!("configuration ok");
    println!("  extension name   {}", ext.extension_name);
    println!("  origin           {}", ext.origin);
    println!("  candidates       {candidates}");
    println!("  probe timeout    {} ms", ext.probe_timeout_ms);
    println!("  message timeout  {} ms", ext.message_timeout_ms);
    Ok(())
}

pub fn path() {
    println!("{}", Config::default_path().display());
}
