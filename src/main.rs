use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memsize::bitmap::DEFAULT_CHUNK_BITS;
use memsize::{
    human_size, reflect_struct, Quiesced, ReportStore, RootSet, Safepoint, ScanConfig, Scanner,
    WorldPause,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "memsize",
    about = "Live memory accounting for in-process object graphs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the roots of the built-in demonstration heap.
    Roots,
    /// Scan one root and print its report.
    Scan {
        /// Root name (see `memsize roots`).
        root: String,
        /// Number of scans to run.
        #[arg(long, default_value_t = 1)]
        repeat: usize,
        /// Bitmap chunk width: each chunk covers 2^bits bytes.
        #[arg(long, default_value_t = DEFAULT_CHUNK_BITS)]
        chunk_bits: u32,
        /// Mutator threads churning the session table during the scans.
        #[arg(long, default_value_t = 0)]
        mutators: usize,
    },
    /// Scan every root once and list the report summaries.
    Reports,
}

struct Session {
    user: String,
    tags: Vec<String>,
    last_seen: Duration,
}

reflect_struct!(Session {
    user,
    tags,
    last_seen
});

struct Node {
    id: u32,
    label: String,
    edges: Mutex<Vec<Arc<Node>>>,
}

reflect_struct!(Node { id, label, edges });

struct Buffers {
    frames: Vec<Arc<[u8]>>,
    latest: Option<Arc<[u8]>>,
    backlog: VecDeque<Box<[u8]>>,
}

reflect_struct!(Buffers {
    frames,
    latest,
    backlog
});

type SessionTable = Mutex<HashMap<u64, Session>>;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sessions = Arc::new(build_sessions(256));
    let roots = Arc::new(demo_roots(Arc::clone(&sessions)));

    match cli.command {
        Commands::Roots => {
            for name in roots.names() {
                println!("{name}");
            }
        }
        Commands::Scan {
            root,
            repeat,
            chunk_bits,
            mutators,
        } => run_scan(roots, sessions, &root, repeat, chunk_bits, mutators)?,
        Commands::Reports => run_reports(roots)?,
    }

    Ok(())
}

fn run_scan(
    roots: Arc<RootSet>,
    sessions: Arc<SessionTable>,
    root: &str,
    repeat: usize,
    chunk_bits: u32,
    mutators: usize,
) -> Result<()> {
    let safepoint = Safepoint::new();
    let pause: Arc<dyn WorldPause> = if mutators > 0 {
        safepoint.clone()
    } else {
        Arc::new(Quiesced)
    };
    let config = ScanConfig::default().with_chunk_bits(chunk_bits);
    let scanner = Scanner::new(config, pause).context("invalid scan configuration")?;
    let store = ReportStore::new(roots, scanner);

    let stop = Arc::new(AtomicBool::new(false));
    let workers: Vec<_> = (0..mutators)
        .map(|worker| {
            let handle = safepoint.register();
            let sessions = Arc::clone(&sessions);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut key = 1_000_000 * (worker as u64 + 1);
                while !stop.load(Ordering::Acquire) {
                    handle.poll();
                    churn_sessions(&sessions, key);
                    key += 1;
                }
            })
        })
        .collect();

    let outcome = (0..repeat).try_for_each(|_| -> Result<()> {
        let id = store
            .trigger_scan(root)
            .with_context(|| format!("scan of root '{root}' failed"))?;
        let report = store
            .get_report(id)
            .context("report missing right after the scan")?;
        println!(
            "report {}\troot={}\tduration={:?}\tfingerprint={}",
            report.id,
            report.root_name,
            report.duration,
            report.sizes.fingerprint()
        );
        print!("{}", report.sizes.report());
        println!(
            "bitmap {}\tutilization={:.4}",
            human_size(report.sizes.bitmap_size),
            report.sizes.bitmap_utilization
        );
        Ok(())
    });

    stop.store(true, Ordering::Release);
    for worker in workers {
        if worker.join().is_err() {
            anyhow::bail!("mutator thread panicked");
        }
    }
    outcome
}

fn run_reports(roots: Arc<RootSet>) -> Result<()> {
    let store = ReportStore::new(Arc::clone(&roots), Scanner::default());
    for name in roots.names() {
        store
            .trigger_scan(&name)
            .with_context(|| format!("scan of root '{name}' failed"))?;
    }

    for summary in store.list_reports() {
        println!(
            "{}\t{}\ttotal={}\ttypes={}\tduration={:?}",
            summary.id,
            summary.root_name,
            human_size(summary.total),
            summary.types,
            summary.duration
        );
    }
    Ok(())
}

fn demo_roots(sessions: Arc<SessionTable>) -> RootSet {
    let roots = RootSet::new();
    roots.add("sessions", sessions);
    roots.add("graph", build_graph(64));
    roots.add("buffers", Arc::new(build_buffers()));
    roots
}

fn build_sessions(count: u64) -> SessionTable {
    let table = (0..count)
        .map(|key| (key, new_session(key)))
        .collect::<HashMap<_, _>>();
    Mutex::new(table)
}

fn new_session(key: u64) -> Session {
    Session {
        user: format!("user-{key:05}"),
        tags: (0..key % 4).map(|tag| format!("tag{tag}")).collect(),
        last_seen: Duration::from_secs(key),
    }
}

/// Insert one session and drop the oldest so the table stays bounded.
fn churn_sessions(sessions: &SessionTable, key: u64) {
    let Ok(mut table) = sessions.lock() else {
        return;
    };
    table.insert(key, new_session(key));
    if let Some(&oldest) = table.keys().min() {
        table.remove(&oldest);
    }
}

/// Ring of nodes, each pointing at its successor: every node is reachable
/// from every other and the graph is cyclic.
fn build_graph(count: u32) -> Arc<Node> {
    let nodes: Vec<Arc<Node>> = (0..count)
        .map(|id| {
            Arc::new(Node {
                id,
                label: format!("node-{id}"),
                edges: Mutex::new(Vec::new()),
            })
        })
        .collect();
    for (index, node) in nodes.iter().enumerate() {
        let next = Arc::clone(&nodes[(index + 1) % nodes.len()]);
        if let Ok(mut edges) = node.edges.lock() {
            edges.push(next);
        }
    }
    Arc::clone(&nodes[0])
}

/// Frames share backing buffers with each other and with `latest`.
fn build_buffers() -> Buffers {
    let pool: Vec<Arc<[u8]>> = (0..4)
        .map(|i| Arc::from(vec![i as u8; 4096].into_boxed_slice()))
        .collect();
    let frames = (0..32).map(|i| Arc::clone(&pool[i % pool.len()])).collect();
    let backlog = (0..8)
        .map(|i| vec![0u8; 512 * (i + 1)].into_boxed_slice())
        .collect();
    Buffers {
        frames,
        latest: pool.last().cloned(),
        backlog,
    }
}
