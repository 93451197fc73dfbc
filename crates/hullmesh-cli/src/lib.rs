//! # Hullmesh CLI
//!
//! Command-line interface for the hullmesh pipeline.
//!
//! ## Commands
//! - `inspect` - Build a scene, wait for all LODs and report mesh statistics
//! - `pattern` - Print the replication transforms of a modifier

pub mod document;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hullmesh_core::RenderSettings;
use hullmesh_core::math::translation_of;
use hullmesh_renderer::{InstanceCollection, PrimitiveGenerator, ReplicationPattern, Scene};

use crate::document::SceneDocument;

/// Hullmesh renderable-mesh pipeline CLI
#[derive(Parser)]
#[command(name = "hullmesh")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Render settings file (JSON)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Override the number of LOD levels
    #[arg(long)]
    pub lod_count: Option<i32>,

    /// Skip background LOD generation
    #[arg(long)]
    pub no_lods: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build a scene and report per-object mesh statistics
    Inspect {
        /// Scene file
        scene: PathBuf,

        /// How long to wait for LOD generation
        #[arg(short, long, default_value = "10000")]
        timeout_ms: u64,
    },

    /// Print the replication transforms of a modifier
    Pattern {
        /// Scene file
        scene: PathBuf,

        /// Name of the modifier object
        object: String,
    },
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let settings = load_settings(cli.settings.as_deref(), cli.lod_count, cli.no_lods)?;

    match cli.command {
        Commands::Inspect { scene, timeout_ms } => {
            let document = load_document(&scene)?;
            log::info!("Building {} objects from {}", document.object_count(), scene.display());

            let mut scene = build_scene(&document, settings)?;
            let events = scene
                .settle(Duration::from_millis(timeout_ms))
                .context("Waiting for LOD generation")?;
            log::info!("LODs settled ({} events)", events.len());

            print!("{}", inspect_report(&scene));
        }

        Commands::Pattern { scene, object } => {
            let document = load_document(&scene)?;
            let scene = build_scene(&document, settings)?;
            print!("{}", pattern_report(&scene, &object)?);
        }
    }

    Ok(())
}

/// Load settings from an optional file and apply command-line overrides
pub fn load_settings(path: Option<&Path>, lod_count: Option<i32>, no_lods: bool) -> Result<RenderSettings> {
    let mut settings = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Reading settings from {}", path.display()))?;
            RenderSettings::from_json(&text)
                .with_context(|| format!("Parsing settings from {}", path.display()))?
        }
        None => RenderSettings::default(),
    };

    if let Some(lod_count) = lod_count {
        settings.lod_count = lod_count;
    }
    if no_lods {
        settings.disable_lods = true;
    }
    Ok(settings)
}

fn load_document(path: &Path) -> Result<SceneDocument> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Reading scene {}", path.display()))?;
    SceneDocument::from_json(&text).with_context(|| format!("Parsing scene {}", path.display()))
}

/// Create a scene and add every object of `document`
pub fn build_scene(document: &SceneDocument, settings: RenderSettings) -> Result<Scene> {
    let mut scene = Scene::new(settings, Arc::new(PrimitiveGenerator::new()))?;
    document.build(&mut scene)?;
    Ok(scene)
}

/// Per-object vertex, triangle, LOD and replica counts plus the scene bounds
pub fn inspect_report(scene: &Scene<InstanceCollection>) -> String {
    let mut out = String::new();
    let mut objects: Vec<_> = scene.tree().iter().collect();
    objects.sort_by_key(|o| o.id());

    for object in objects {
        let Some(node) = object.renderer() else {
            continue;
        };
        let mesh = node.mesh().read();
        let _ = writeln!(
            out,
            "{:<20} {:<12} vertices={:<6} triangles={:<6} lods={:<3} replicas={}",
            object.name,
            object.object_type.name(),
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.lod_levels().len(),
            node.replicas().len(),
        );
    }
    let bounds = scene.collection().bounds();
    if !bounds.is_empty() {
        let _ = writeln!(
            out,
            "bounds=({:.3}, {:.3}, {:.3})..({:.3}, {:.3}, {:.3})",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z,
        );
    }
    let _ = writeln!(out, "instances={}", scene.collection().len());
    out
}

/// Replication transforms of the named modifier
pub fn pattern_report(scene: &Scene<InstanceCollection>, name: &str) -> Result<String> {
    let Some(id) = scene.tree().find_by_name(name) else {
        bail!("No object named '{name}'");
    };
    let object = scene.tree().object(id)?;
    if !object.object_type.is_modifier() {
        bail!("'{name}' is a {}, not a modifier", object.object_type);
    }

    let pattern = ReplicationPattern::from_state(&object.state);
    let transforms = pattern.transformations();

    let mut out = String::new();
    let _ = writeln!(out, "{:?} pattern, {} copies", pattern.kind, transforms.len());
    for (i, transform) in transforms.iter().enumerate() {
        let (_, rotation, _) = transform.to_scale_rotation_translation();
        let (axis, angle) = rotation.to_axis_angle();
        let t = translation_of(*transform);
        let _ = writeln!(
            out,
            "{i:>4}: offset=({:.3}, {:.3}, {:.3}) rotation={:.1} deg about ({:.3}, {:.3}, {:.3})",
            t.x,
            t.y,
            t.z,
            angle.to_degrees(),
            axis.x,
            axis.y,
            axis.z,
        );
    }
    Ok(out)
}
