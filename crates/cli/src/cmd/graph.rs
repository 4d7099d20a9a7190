//! Implementation of the `modforge graph` command.

use anyhow::{Context, Result};

use modforge_lib::graph::ModuleGraph;
use modforge_lib::manifest::DependencyScope;

use super::Invocation;
use crate::output::{print_json, symbols};

/// Print the build order and the waves of modules that may build together.
///
/// Dependencies on a module's test outputs only are tagged `(test)`.
pub fn cmd_graph(invocation: &Invocation, json: bool) -> Result<()> {
  let project = invocation.project()?;
  let graph = ModuleGraph::load(&project.manifest.modules).context("Invalid module graph")?;
  let order = graph.build_order();
  let waves = graph.waves();

  if json {
    let mut dependencies = serde_json::Map::new();
    for name in &order {
      dependencies.insert(
        name.to_string(),
        serde_json::json!({
          "main": graph.dependencies_in_scope(name, DependencyScope::Main)?,
          "test": graph.dependencies_in_scope(name, DependencyScope::Test)?,
        }),
      );
    }
    return print_json(&serde_json::json!({
      "order": order,
      "waves": waves,
      "dependencies": dependencies,
    }));
  }

  println!("Build order:");
  for (i, name) in order.iter().enumerate() {
    let main = graph.dependencies_in_scope(name, DependencyScope::Main)?;
    let deps: Vec<String> = graph
      .dependencies(name)?
      .into_iter()
      .map(|dep| {
        if main.contains(&dep) {
          dep.to_string()
        } else {
          format!("{} (test)", dep)
        }
      })
      .collect();
    if deps.is_empty() {
      println!("  {:>3}. {}", i + 1, name);
    } else {
      println!("  {:>3}. {} {} {}", i + 1, name, symbols::ARROW, deps.join(", "));
    }
  }
  println!();
  println!("Waves:");
  for (i, wave) in waves.iter().enumerate() {
    println!("  {:>3}: {}", i, wave.join(", "));
  }
  Ok(())
}
