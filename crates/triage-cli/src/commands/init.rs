use anyhow::Result;
use triage_config::Config;

pub fn handle(force: bool) -> Result<()> {
    let path = Config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save_to(&path)?;

    println!("✓ Created {}", path.display());
    println!("  Set [helpdesk] domain and api_key, and [ai] api_key");
    println!("  Or export TRIAGE_HELPDESK_API_KEY / TRIAGE_AI_API_KEY");

    Ok(())
}
