//! `stm32kit doctor`: toolchain and catalog diagnostics.

use std::path::Path;

use anyhow::Result;
use stm32kit_build::toolchain::{self, ToolStatus};
use stm32kit_build::BuildState;
use stm32kit_project::ProjectDescriptor;
use stm32kit_render::BackendKind;

use crate::config::{Settings, DATA_ENV};

/// Print diagnostic information.
pub fn run(settings: &Settings, project_dir: &Path) -> Result<()> {
    println!("=== stm32kit Doctor ===");
    println!();
    println!("stm32kit version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("--- Tools ---");
    let tools = toolchain::survey();
    for tool in &tools {
        print_tool_status(tool);
    }
    println!();

    println!("--- Backends ---");
    for backend in [BackendKind::Cmake, BackendKind::Make] {
        let missing = missing_tools(&tools, toolchain::required_for(backend));
        if missing.is_empty() {
            println!("  {backend:<6} ready");
        } else {
            println!("  {backend:<6} missing {}", missing.join(", "));
        }
    }
    let flash_ready = missing_tools(&tools, &[toolchain::OPENOCD]).is_empty();
    println!("  flash  {}", if flash_ready { "ready" } else { "missing openocd" });
    println!();

    println!("--- Catalog ---");
    match &settings.catalog_root {
        Some(root) => match settings.catalog() {
            Ok(catalog) => {
                println!("  Root:   {}", root.display());
                println!("  Packs:  {}", catalog.packs().map(|p| p.len()).unwrap_or(0));
                println!("  Boards: {}", catalog.boards().map(|b| b.len()).unwrap_or(0));
            }
            Err(e) => println!("  Root:   {} (error: {e:#})", root.display()),
        },
        None => println!("  not found (set {DATA_ENV} or pass --catalog)"),
    }
    println!();

    println!("--- Project ---");
    match ProjectDescriptor::load(project_dir) {
        Ok(descriptor) => {
            println!("  Directory: {}", project_dir.display());
            println!("  Board:     {}", descriptor.board);
            println!("  Backend:   {}", descriptor.backend);
            match BuildState::load(project_dir) {
                Ok(Some(state)) => println!("  Build:     {:?}", state.status),
                Ok(None) => println!("  Build:     never built"),
                Err(e) => println!("  Build:     error: {e}"),
            }
        }
        Err(stm32kit_project::ProjectError::NotGenerated { .. }) => {
            println!("  no project in {}", project_dir.display());
        }
        Err(e) => println!("  error: {e}"),
    }

    Ok(())
}

fn print_tool_status(tool: &ToolStatus) {
    match (&tool.path, &tool.version) {
        (Some(_), Some(version)) => println!("  {:<22} {version}", tool.name),
        (Some(path), None) => println!("  {:<22} {}", tool.name, path.display()),
        (None, _) => println!("  {:<22} not found", tool.name),
    }
}

fn missing_tools<'a>(tools: &[ToolStatus], required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| !tools.iter().any(|t| t.name == *name && t.is_available()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_tools_lists_unavailable_ones() {
        let tools = vec![
            ToolStatus {
                name: "make",
                path: Some(PathBuf::from("/usr/bin/make")),
                version: Some("GNU Make 4.3".into()),
            },
            ToolStatus {
                name: "arm-none-eabi-gcc",
                path: None,
                version: None,
            },
        ];
        assert_eq!(
            missing_tools(&tools, toolchain::required_for(BackendKind::Make)),
            ["arm-none-eabi-gcc", "arm-none-eabi-objcopy"]
        );
    }

    #[test]
    fn doctor_runs_without_project_or_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            catalog_root: None,
            backend: BackendKind::Cmake,
            preserve: Default::default(),
            adapter_speed_khz: None,
            interactive_reset: false,
        };
        run(&settings, dir.path()).unwrap();
    }
}
