//! Gateway server command.

use console::style;

use ocrgate::config::Settings;

/// Start the gateway.
pub async fn cmd_serve(settings: &Settings) -> anyhow::Result<()> {
    println!(
        "{} Starting ocrgate on {}:{} (languages: {}, startup: {})",
        style("→").cyan(),
        settings.host,
        settings.port,
        settings.engine.languages,
        settings.engine.policy,
    );
    println!("  Press Ctrl+C to stop");

    ocrgate::server::serve(settings).await
}
