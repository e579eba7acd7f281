use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use vibe_browser::config::Settings;
use vibe_browser::potion::{format_strength, ReferenceGroup};
use vibe_browser::state::data::{CatalogEntry, ImportInfo};
use vibe_browser::state::edit::{save_import_info, ImportInfoEdit};
use vibe_browser::state::library::Library;

#[derive(Parser, Debug)]
#[command(name = "vibe-browser", version, about)]
struct Opts {
    /// Settings file [default: <config dir>/vibe-browser/config.json]
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Folder to scan for vibe files, may be repeated. Replaces the configured folders
    #[arg(short = 'd', long = "dir", global = true, value_name = "DIR")]
    directories: Vec<PathBuf>,
    /// Model version label: v4.5, v4.5c, v4 or v4c
    #[arg(short = 'm', long, global = true, value_name = "LABEL")]
    model_version: Option<String>,
    /// Sort order: name_asc, name_desc, time_asc or time_desc
    #[arg(short, long, global = true, value_name = "ORDER")]
    sort: Option<String>,
    /// Thumbnail display size in pixels (50 to 500)
    #[arg(long, global = true, value_name = "PIXELS")]
    thumbnail_size: Option<u32>,
    /// Also list vibe files that carry no thumbnail
    #[arg(long, global = true)]
    show_all: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the folders and list the vibe files found
    Scan(ScanArgs),
    /// Show the potions referenced by a generated image
    Potions(PotionArgs),
    /// Write import settings into a vibe file
    ImportInfo(ImportInfoArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Only list files whose name contains this text (case-insensitive)
    #[arg(short = 'q', long, default_value = "")]
    search: String,
    /// Lay the results out as a grid for a view this many pixels wide
    #[arg(short, long, value_name = "PIXELS")]
    width: Option<u32>,
    /// Save the listed thumbnails as PNG files into this folder
    #[arg(long, value_name = "DIR")]
    export: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PotionArgs {
    /// Generated PNG image
    image: PathBuf,
    /// Set one potion's strength and rescale the rest, e.g. `0=0.8`
    #[arg(short, long, value_name = "INDEX=VALUE")]
    edit: Option<String>,
}

#[derive(Args, Debug)]
struct ImportInfoArgs {
    /// Vibe file to update
    file: PathBuf,
    /// Version label or full model name
    #[arg(long)]
    model: String,
    /// Reference strength
    #[arg(long)]
    strength: String,
    /// Information extracted (0.01 to 1.0)
    #[arg(long)]
    extracted: String,
}

fn load_settings(opts: &Opts) -> Settings {
    let path = opts.config.clone().or_else(Settings::default_path);
    let mut settings = path.map(|p| Settings::load(&p)).unwrap_or_default();

    if !opts.directories.is_empty() {
        settings.directories = opts.directories.clone();
        settings.retain_existing_directories();
    }
    if let Some(version) = &opts.model_version {
        settings.version = version.clone();
    }
    if let Some(sort) = &opts.sort {
        settings.sort_order = sort.clone();
    }
    if let Some(size) = opts.thumbnail_size {
        settings.thumbnail_size = size;
    }
    if opts.show_all {
        settings.show_images_without_thumbnails = true;
    }
    settings
}

fn import_label(info: &ImportInfo) -> String {
    let model = info.model.as_deref().unwrap_or("-");
    let strength = info.strength.map_or("-".to_string(), |v| v.to_string());
    let extracted = info.information_extracted.map_or("-".to_string(), |v| v.to_string());
    format!("{} strength={} extracted={}", model, strength, extracted)
}

fn print_entry(entry: &CatalogEntry, position: Option<(u32, u32)>) {
    let position = position.map_or(String::new(), |(row, col)| format!("[{},{}] ", row, col));
    println!(
        "{}{}\t{}\t{}\t{}",
        position,
        entry.name(),
        entry.created_label(),
        entry.extraction_label(),
        import_label(&entry.import_info)
    );
}

fn scan(library: &mut Library, args: &ScanArgs) -> Result<()> {
    library.reload();

    match args.width {
        Some(width) => {
            for cell in library.layout(&args.search, width) {
                print_entry(cell.entry, Some((cell.row, cell.col)));
            }
        }
        None => {
            for entry in library.visible(&args.search) {
                print_entry(entry, None);
            }
        }
    }

    if let Some(dir) = &args.export {
        export_thumbnails(library, &args.search, dir)?;
    }

    for error in library.errors() {
        eprintln!("{}", error);
    }
    Ok(())
}

fn export_thumbnails(library: &Library, search: &str, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let visible = library.visible(search);
    for entry in &visible {
        let target = dir.join(format!("{}.png", entry.name()));
        library
            .thumbnail_for(entry)
            .save(&target)
            .with_context(|| format!("cannot write {}", target.display()))?;
    }
    log::info!("Exported {} thumbnails to {}", visible.len(), dir.display());
    Ok(())
}

fn potions(library: &mut Library, args: &PotionArgs) -> Result<()> {
    library.reload();

    let mut group = match ReferenceGroup::from_image(&args.image, library.index()) {
        Ok(group) => group,
        Err(issue) => {
            println!("{}", issue);
            return Ok(());
        }
    };

    if let Some(edit) = &args.edit {
        let Some((index, value)) = edit.split_once('=') else {
            bail!("expected INDEX=VALUE, got {:?}", edit);
        };
        let index: usize = index.trim().parse().with_context(|| format!("bad potion index {:?}", index))?;
        match group.apply_input(index, value)? {
            Some(outcome) => {
                if let Some(warning) = outcome.displayed() {
                    println!("{}", warning);
                }
                for warning in &outcome.warnings {
                    log::debug!("{:?}", warning);
                }
            }
            None => log::warn!("Ignoring non-numeric strength {:?}", value),
        }
    }

    for (i, member) in group.members().iter().enumerate() {
        let extracted = member
            .information_extracted()
            .map_or(String::new(), |v| format!("\textracted={}", v));
        println!("{}\t{}\t{}{}", i, member.name(), format_strength(member.strength), extracted);
    }
    Ok(())
}

fn import_info(args: &ImportInfoArgs) -> Result<()> {
    let edit = ImportInfoEdit::parse(&args.model, &args.strength, &args.extracted)?;
    save_import_info(&args.file, &edit)?;
    println!("Saved import info for {}", args.file.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.command {
        Command::Scan(args) => {
            let mut library = Library::new(load_settings(&opts))?;
            scan(&mut library, args)
        }
        Command::Potions(args) => {
            let mut library = Library::new(load_settings(&opts))?;
            potions(&mut library, args)
        }
        Command::ImportInfo(args) => import_info(args),
    }
}
