//! Implementation of the `nodebuild validate` command.

use anyhow::{Result, bail};

use nodebuild_lib::BuildProperties;

use crate::output::{print_error, print_info, print_stat, print_success};

pub fn cmd_validate(event: Option<&str>) -> Result<()> {
  let request = super::read_event(event)?;

  if !request.request_type.builds() {
    print_info(&format!("{} events do not build; nothing to validate", request.request_type));
    return Ok(());
  }

  let properties = match BuildProperties::try_from(&request.resource_properties) {
    Ok(p) => p,
    Err(e) => {
      print_error(&format!("Invalid resource properties: {}", e));
      bail!("validation failed");
    }
  };

  print_success("Resource properties are valid");
  print_stat("Sources", &properties.sources.len().to_string());
  for source in &properties.sources {
    let dir = source.directory.display().to_string();
    let dir = if dir.is_empty() { ".".to_string() } else { dir };
    print_stat("  Source", &format!("{} -> {}", source.location, dir));
  }
  print_stat("Working directory", &properties.working_directory.display().to_string());
  print_stat("Output directory", &properties.output_directory.display().to_string());
  print_stat("Destination", &properties.destination.to_string());
  print_stat("Build commands", &properties.build_commands.join(" && "));

  Ok(())
}
