use anyhow::Result;

use modforge_lib::config::BuildConfig;

use super::Invocation;
use crate::output::{print_info, print_json, print_stat, print_warning};

/// Print the tool version, the project if there is one, and every build property.
pub fn cmd_info(invocation: &Invocation, json: bool) -> Result<()> {
  let config = invocation.config();
  let project = invocation.manifest.is_file().then(|| invocation.project()).transpose()?;
  let rows = BuildConfig::describe(&invocation.resolver);

  if json {
    let properties: serde_json::Map<String, serde_json::Value> = rows
      .iter()
      .map(|(name, value, source)| {
        (
          name.to_string(),
          serde_json::json!({ "value": value, "source": source.to_string() }),
        )
      })
      .collect();
    let project = project.as_ref().map(|p| {
      serde_json::json!({
        "name": p.manifest.project.name,
        "version": config.display_version(&p.manifest.project.version),
        "modules": p.manifest.modules.len(),
      })
    });
    return print_json(&serde_json::json!({
      "version": env!("CARGO_PKG_VERSION"),
      "project": project,
      "properties": properties,
    }));
  }

  print_info(&format!("modforge v{}", env!("CARGO_PKG_VERSION")));
  if let Some(project) = &project {
    print_stat("Project", &project.manifest.project.name);
    print_stat("Version", &config.display_version(&project.manifest.project.version));
    print_stat("Modules", &project.manifest.modules.len().to_string());
  }
  println!();
  println!("Properties:");
  for (name, value, source) in &rows {
    println!("  {:<24} {:<10} ({})", name, value, source);
  }
  for warning in &config.warnings {
    print_warning(&warning.to_string());
  }
  Ok(())
}
