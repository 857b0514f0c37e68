use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use m1_level_editor::{
    compress::Compressor,
    import::import_rom,
    persist::{build_project, load_global_config, load_project, render_project, save_global_config},
    state::{get_global_config_path, EditorState, GlobalConfig},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Level data tools for Metroid (NES)")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract every area from a ROM into a project directory
    Import { rom: PathBuf, project: PathBuf },
    /// Write assembler sources and compressed rooms for the game build
    Build {
        /// Defaults to the last project used
        project: Option<PathBuf>,
        /// Compressor program, overriding the configured one
        #[arg(long)]
        compressor: Option<String>,
    },
    /// Render tile sheets and rooms to PNG
    Render {
        project: Option<PathBuf>,
        /// Output directory (defaults to `<project>/render`)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn resolve_project(config: &mut GlobalConfig, project: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match project {
        Some(dir) => dir,
        None => config
            .project_dir
            .clone()
            .context("No project directory given and none used before.")?,
    };
    if config.project_dir.as_ref() != Some(&dir) {
        config.project_dir = Some(dir.clone());
        config.modified = true;
    }
    Ok(dir)
}

fn open(project: Option<PathBuf>) -> Result<EditorState> {
    let config_path = get_global_config_path()?;
    let mut config = load_global_config(&config_path)?;
    let dir = resolve_project(&mut config, project)?;
    let mut state = load_project(config_path, config, &dir)?;
    save_global_config(&mut state)?;
    Ok(state)
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Import { rom, project } => {
            let config_path = get_global_config_path()?;
            let mut config = load_global_config(&config_path)?;
            resolve_project(&mut config, Some(project.clone()))?;
            let mut state = import_rom(&rom, &project, config_path, config)?;
            save_global_config(&mut state)?;
            info!("Imported {} areas into {}", state.areas.len(), project.display());
        }
        Command::Build {
            project,
            compressor,
        } => {
            let mut state = open(project)?;
            let mut tool = Compressor::from(&state.global_config);
            if let Some(program) = compressor {
                tool.program = program;
            }
            let report = build_project(&mut state, &tool)?;
            if !report.is_ok() {
                bail!("{} room(s) could not be compressed", report.failures.len());
            }
        }
        Command::Render { project, out } => {
            let state = open(project)?;
            let out = out.unwrap_or_else(|| state.project_dir.join("render"));
            let count = render_project(&state, &out)?;
            info!("Wrote {} images to {}", count, out.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Args::parse())
}
