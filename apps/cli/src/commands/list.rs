use anyhow::Context;
use colored::Colorize;
use lcm_training::discover_recipes;
use std::path::PathBuf;

pub async fn execute(dir: PathBuf) -> anyhow::Result<()> {
    let recipes = discover_recipes(&dir).with_context(|| format!("Failed to list recipes in {}", dir.display()))?;

    println!();
    println!("{}", format!("Recipes ({})", recipes.len()).bold().cyan());
    println!();

    if recipes.is_empty() {
        println!("  {}", "No YAML recipes found.".dimmed());
        return Ok(());
    }

    println!("{:<12} {}", "Package", "Path");
    println!("{}", "─".repeat(60));
    for recipe in recipes {
        let path = recipe.path.strip_prefix(&dir).unwrap_or(&recipe.path).display().to_string();
        let package = recipe.package.unwrap_or_else(|| "-".to_string());
        println!("{:<12} {}", package.cyan(), path);
    }
    println!();
    Ok(())
}
