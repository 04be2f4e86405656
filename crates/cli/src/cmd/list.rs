//! List command implementation.
//!
//! Shows every registered external module, where it applies, and whether
//! this host already provides it.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};
use portable_python_lib::platform::TargetSystem;
use portable_python_lib::recipes::module_registry;
use serde::Serialize;

use crate::output::{print_heading, print_json, symbols};

#[derive(Debug, Serialize)]
struct ModuleListing {
  name: String,
  platforms: Vec<&'static str>,
  telltale: Vec<&'static str>,
  found: Option<String>,
  skip_reason: Option<String>,
}

pub fn cmd_list(target: Option<&str>, json: bool) -> Result<()> {
  let target = TargetSystem::from_override(target);
  let registry = module_registry();

  let listings: Vec<ModuleListing> = registry
    .names()
    .filter_map(|name| {
      let descriptor = registry.descriptor(name)?;
      Some(ModuleListing {
        name: name.to_string(),
        platforms: descriptor.platforms.to_vec(),
        telltale: descriptor.telltale.to_vec(),
        found: descriptor.existing_telltale(&target).map(|p| p.display().to_string()),
        skip_reason: descriptor.skip_reason(&target),
      })
    })
    .collect();

  if json {
    return print_json(&listings);
  }

  print_heading(&format!("{} for {}", registry, target));
  for listing in &listings {
    let platforms = if listing.platforms.is_empty() {
      "all platforms".to_string()
    } else {
      listing.platforms.join("/")
    };
    let marker = match (&listing.skip_reason, &listing.found) {
      (Some(_), _) => symbols::SKIPPED,
      (None, Some(_)) => symbols::OK,
      (None, None) => symbols::ACTIVE,
    };
    println!(
      "  {} {:<10} {}",
      marker,
      listing.name,
      platforms.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
    if let Some(found) = &listing.found {
      println!("      {} found {}", symbols::DETAIL, found);
    } else if !listing.telltale.is_empty() {
      println!("      {} looks for {}", symbols::DETAIL, listing.telltale.join(", "));
    }
  }
  Ok(())
}
