//! Engine check command.

use console::style;

use ocrgate::config::Settings;
use ocrgate::engine::EngineManager;
use ocrgate::ocr::TesseractEngine;

/// Load the engine with the configured languages, then release it.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    println!(
        "{} Loading Tesseract from {} ({})",
        style("→").cyan(),
        settings.tesseract_bin.display(),
        settings.engine.languages,
    );

    let manager = EngineManager::new(
        Box::new(TesseractEngine::with_binary(&settings.tesseract_bin)),
        settings.engine.clone(),
    );
    let result = manager.initialize().await;
    manager.terminate().await;

    match result {
        Ok(()) => {
            println!(
                "  {} Engine ready with {} languages ({})",
                style("✓").green(),
                manager.languages().len(),
                manager.languages(),
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("  {} {}", style("✗").red(), e);
            Err(anyhow::anyhow!("OCR engine check failed: {}", e))
        }
    }
}
