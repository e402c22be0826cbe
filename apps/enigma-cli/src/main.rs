use clap::{Parser, Subcommand};
use enigma_common::{Color, Geometry, ObjectId, Transform};
use enigma_offline::{
    CacheStorage, DEFAULT_CACHE_NAME, FileNetwork, OfflineWorker, Request, WorkerConfig,
};
use enigma_physics::{BodyConfig, ColliderKind, PhysicsSystem};
use enigma_render::{DebugTextRenderer, Renderer};
use enigma_scene::{Material, Mesh, Scene, SceneNode};
use glam::Vec3;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Origin the asset root is served under.
const LOCAL_ORIGIN: &str = "https://enigma.local";

#[derive(Parser)]
#[command(name = "enigma-cli", about = "CLI tool for Enigma operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Inspect and maintain the offline cache
    Cache {
        /// Cache directory
        #[arg(long, default_value = "./.enigma-cache")]
        cache_dir: PathBuf,
        /// Directory the worker serves requests from
        #[arg(long, default_value = "./assets")]
        asset_root: PathBuf,
        /// Name of the current store
        #[arg(long, default_value = DEFAULT_CACHE_NAME)]
        cache_name: String,
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Run the example scene headlessly and print the last frame
    Simulate {
        /// Number of physics steps
        #[arg(short, long, default_value = "120")]
        ticks: u32,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List every store and its entries
    List,
    /// Create the current store and precache the given locators
    Install { precache: Vec<String> },
    /// Install, then delete every store but the current one
    Activate,
    /// Fetch a URL through the worker, storing it on a miss
    Fetch { url: String },
    /// Delete every store
    Purge,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("enigma-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("assets: {}", enigma_assets::crate_info());
            println!("render: {}", enigma_render::crate_info());
            println!("ui: {}", enigma_ui::crate_info());
            println!("offline: {}", enigma_offline::crate_info());
        }
        Commands::Cache {
            cache_dir,
            asset_root,
            cache_name,
            action,
        } => {
            for line in run_cache(&cache_dir, &asset_root, &cache_name, action)? {
                println!("{line}");
            }
        }
        Commands::Simulate { ticks } => {
            print!("{}", simulate(ticks)?);
        }
    }

    Ok(())
}

fn worker(
    cache_dir: &Path,
    asset_root: &Path,
    cache_name: &str,
    precache: Vec<String>,
) -> anyhow::Result<OfflineWorker<FileNetwork>> {
    let storage = CacheStorage::new(cache_dir)?;
    let network = FileNetwork::new(asset_root, LOCAL_ORIGIN);
    Ok(OfflineWorker::new(
        storage,
        network,
        WorkerConfig {
            cache_name: cache_name.to_string(),
            precache,
        },
    ))
}

fn run_cache(
    cache_dir: &Path,
    asset_root: &Path,
    cache_name: &str,
    action: CacheAction,
) -> anyhow::Result<Vec<String>> {
    tracing::debug!(cache_dir = %cache_dir.display(), cache_name, "cache command");
    let mut out = Vec::new();
    match action {
        CacheAction::List => {
            let mut storage = CacheStorage::new(cache_dir)?;
            let names = storage.keys();
            if names.is_empty() {
                out.push("no caches".to_string());
            }
            for name in names {
                let cache = storage.open(&name)?;
                let requests = cache.keys()?;
                out.push(format!("{name} ({} entries)", requests.len()));
                for request in requests {
                    let size = cache
                        .match_request(&request)?
                        .map_or(0, |response| response.body.len());
                    out.push(format!("  {} {} ({size} bytes)", request.method, request.url));
                }
            }
        }
        CacheAction::Install { precache } => {
            let mut worker = worker(cache_dir, asset_root, cache_name, precache)?;
            worker.install()?;
            out.push(format!("{cache_name}: {}", worker.state().as_str()));
        }
        CacheAction::Activate => {
            let mut worker = worker(cache_dir, asset_root, cache_name, Vec::new())?;
            worker.install()?;
            let removed = worker.activate()?;
            for name in &removed {
                out.push(format!("deleted {name}"));
            }
            out.push(format!("{cache_name}: {}", worker.state().as_str()));
        }
        CacheAction::Fetch { url } => {
            let mut worker = worker(cache_dir, asset_root, cache_name, Vec::new())?;
            worker.install()?;
            worker.activate()?;
            let request = Request::get(&url);
            let hit = worker.storage().match_request(&request)?.is_some();
            let response = worker.handle_fetch(&request)?;
            out.push(format!(
                "{url}: {} {:?} {} bytes ({})",
                response.status,
                response.kind,
                response.body.len(),
                if hit { "cache" } else { "network" }
            ));
        }
        CacheAction::Purge => {
            let mut storage = CacheStorage::new(cache_dir)?;
            for name in storage.keys() {
                storage.delete(&name)?;
                out.push(format!("deleted {name}"));
            }
        }
    }
    Ok(out)
}

/// Drop the example knot onto a fixed floor for `ticks` steps.
fn simulate(ticks: u32) -> anyhow::Result<String> {
    tracing::debug!(ticks, "simulating example scene");
    let mut scene = Scene::new(1280, 720);
    let mut physics = PhysicsSystem::new(Vec3::new(0.0, -9.81, 0.0));
    pollster::block_on(physics.init())?;

    let floor = SceneNode::new("floor")
        .with_mesh(
            Mesh::new(Geometry::cuboid(Vec3::new(20.0, 0.5, 20.0))),
            Material {
                color: Color::from_hex(0x222233),
                ..Material::default()
            },
        )
        .with_transform(Transform::from_position(Vec3::new(0.0, -3.0, 0.0)));
    let floor_id = scene.graph.add(floor);
    register(
        &mut physics,
        &mut scene,
        floor_id,
        &BodyConfig::fixed(ColliderKind::Cuboid {
            size: Vec3::new(20.0, 0.5, 20.0),
        }),
    )?;

    let knot = SceneNode::new("example").with_mesh(
        Mesh::new(Geometry::torus_knot(1.2, 0.4, 120, 12, 2, 3)),
        Material {
            color: Color::from_hex(0x8b00ff),
            emissive: Color::from_hex(0x440088),
            metalness: 0.7,
            roughness: 0.2,
        },
    );
    let knot_id = scene.graph.add(knot);
    register(
        &mut physics,
        &mut scene,
        knot_id,
        &BodyConfig::dynamic(ColliderKind::TriMesh),
    )?;

    let mut renderer = DebugTextRenderer::new();
    let mut output = String::new();
    for _ in 0..ticks {
        physics.update(1.0 / 60.0, &mut scene.graph);
        scene.update();
        output = renderer.render(&scene, &scene.camera);
    }
    Ok(output)
}

fn register(
    physics: &mut PhysicsSystem,
    scene: &mut Scene,
    id: ObjectId,
    config: &BodyConfig,
) -> anyhow::Result<()> {
    if let Some(node) = scene.graph.get_mut(id) {
        physics.add_rigid_body(id, node, config)?;
    }
    Ok(())
}
