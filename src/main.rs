use blog_img::cache::ContentKey;
use blog_img::config::{self, Mode};
use blog_img::imaging::{WidthPolicy, supported_input_extensions};
use blog_img::types::RenderSet;
use blog_img::{ImageRequest, Materializer, output};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "blog-img")]
#[command(about = "Responsive image materializer for static blog builds")]
#[command(long_about = "\
Responsive image materializer for static blog builds

Resizes source images to a width ladder in several formats, inlines a
blurred placeholder, and emits lazy-loading <picture> markup. Derived files
are named after a hash of the source bytes, so unchanged images are never
encoded twice.

  src/static/posts/hero.jpg  →  _output/images/b94d27b9934d3e08a52e-320.webp
                                _output/images/b94d27b9934d3e08a52e-320.jpeg
                                ...

Set SITE_ENV=production for full output; any other value passes the
original source through untouched. Logging is controlled by RUST_LOG.

Run 'blog-img gen-config' to generate a documented blog-img.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the markup for one image
    Render {
        /// Path under the source root, or an http(s) URL
        src: String,
        /// Alt text (required)
        #[arg(long, default_value = "")]
        alt: String,
        /// CSS class for the <img>
        #[arg(long, default_value = "")]
        class: String,
        /// Generate the full width ladder instead of a single width
        #[arg(long)]
        responsive: bool,
    },
    /// Materialize every image under the source root
    Warm {
        /// Generate the full width ladder instead of a single width
        #[arg(long)]
        responsive: bool,
        /// Write a JSON report of every artifact set
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print a stock blog-img.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blog_img=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            src,
            alt,
            class,
            responsive,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let materializer = Materializer::new(config, Mode::from_env())?;
            let request = ImageRequest::new(src, alt).class(class).responsive(responsive);
            println!("{}", materializer.render(&request)?);
        }
        Command::Warm { responsive, report } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let materializer = Materializer::new(config, Mode::Production)?;
            let failed = warm(&materializer, WidthPolicy::from_flag(responsive), report.as_deref())?;
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    reference: &'a str,
    /// Other references with identical bytes.
    duplicates: &'a [String],
    #[serde(flatten)]
    render_set: &'a RenderSet,
}

/// Materialize every supported image under the source root. Returns the
/// number of failures.
fn warm(
    materializer: &Materializer,
    policy: WidthPolicy,
    report: Option<&Path>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let root = &materializer.config().source_root;
    let references = collect_references(root);
    tracing::info!(root = %root.display(), images = references.len(), "warming");

    // One materialize call per distinct content.
    let keyed: Vec<(String, Option<ContentKey>)> = references
        .into_par_iter()
        .map(|reference| {
            let key = ContentKey::from_file(&root.join(&reference)).ok();
            (reference, key)
        })
        .collect();

    let mut groups: BTreeMap<ContentKey, Vec<String>> = BTreeMap::new();
    let mut unhashed = Vec::new();
    for (reference, key) in keyed {
        match key {
            Some(key) => groups.entry(key).or_default().push(reference),
            None => unhashed.push(vec![reference]),
        }
    }
    let mut jobs: Vec<Vec<String>> = groups.into_values().chain(unhashed).collect();
    jobs.sort();

    let results: Vec<_> = jobs
        .par_iter()
        .map(|refs| materializer.materialize(&refs[0], policy))
        .collect();

    let mut entries = Vec::new();
    let mut failed = 0;
    for (index, (refs, result)) in jobs.iter().zip(&results).enumerate() {
        match result {
            Ok(set) => {
                output::print_render_set(index + 1, &refs[0], set);
                entries.push(ReportEntry {
                    reference: &refs[0],
                    duplicates: &refs[1..],
                    render_set: set,
                });
            }
            Err(err) => {
                output::print_failure(index + 1, &refs[0], err);
                failed += 1;
            }
        }
    }
    output::print_summary(entries.len(), failed, &materializer.stats());

    if let Some(path) = report {
        let json = serde_json::to_string_pretty(&entries)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "wrote report");
    }
    Ok(failed)
}

/// Supported images under `root`, as `/`-separated references relative to
/// it, sorted.
fn collect_references(root: &Path) -> Vec<String> {
    let extensions = supported_input_extensions();
    let mut references: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| extensions.contains(&x.to_ascii_lowercase().as_str()))
        })
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?;
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
        .collect();
    references.sort();
    references
}
