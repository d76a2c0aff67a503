use std::path::Path as FsPath;
use std::sync::Arc;

use anyhow::{bail, Context};
use arbor_dag::History;
use arbor_merge::{CommitMerger, Conflict, MergeOutcome, NodeMerger};
use arbor_store::{Backend, BlockStore, CommitInfo, Node, StoreConfig};
use arbor_tree::NodeStore;
use arbor_types::{Key, Path};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use crate::cli::*;

const DEFAULT_CONFIG: &str = "arbor.toml";

type Blocks = BlockStore<Arc<dyn Backend>>;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let session = Session::open(&config);
    let report = execute(&session, cli.command).await?;
    report.print(cli.format)?;
    if let Report::Conflicts { conflicts } = &report {
        bail!("merge stopped with {} conflict(s)", conflicts.len());
    }
    Ok(())
}

fn load_config(explicit: Option<&FsPath>) -> anyhow::Result<StoreConfig> {
    match explicit {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None if FsPath::new(DEFAULT_CONFIG).exists() => {
            StoreConfig::load(DEFAULT_CONFIG).context("loading ./arbor.toml")
        }
        None => Ok(StoreConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An opened store plus the typed views the commands use.
pub struct Session {
    blocks: Arc<Blocks>,
}

impl Session {
    pub fn open(config: &StoreConfig) -> Self {
        Self {
            blocks: Arc::new(config.open()),
        }
    }

    fn tree(&self) -> NodeStore<Arc<dyn Backend>, String> {
        NodeStore::new(Arc::clone(&self.blocks))
    }

    fn history(&self) -> History<Arc<dyn Backend>> {
        History::new(Arc::clone(&self.blocks))
    }

    /// Resolve a tree argument: `empty` or the hex key of a stored node.
    async fn root(&self, arg: &str) -> anyhow::Result<Node> {
        if arg == "empty" {
            return Ok(Node::empty());
        }
        let key = parse_key(arg)?;
        Ok(self.tree().read_exn(&key).await?)
    }
}

fn parse_key(arg: &str) -> anyhow::Result<Key> {
    arg.parse::<Key>()
        .with_context(|| format!("invalid key {arg:?}"))
}

fn author(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "arbor".into())
}

fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub async fn execute(session: &Session, command: Command) -> anyhow::Result<Report> {
    match command {
        Command::Put(args) => cmd_put(session, args).await,
        Command::Get(args) => cmd_get(session, args).await,
        Command::Ls(args) => cmd_ls(session, args).await,
        Command::Rm(args) => cmd_rm(session, args).await,
        Command::Merge(args) => cmd_merge(session, args).await,
        Command::Commit(args) => cmd_commit(session, args).await,
        Command::MergeCommits(args) => cmd_merge_commits(session, args).await,
        Command::Log(args) => cmd_log(session, args).await,
        Command::Objects => cmd_objects(session).await,
    }
}

async fn cmd_put(session: &Session, args: PutArgs) -> anyhow::Result<Report> {
    let tree = session.tree();
    let root = session.root(&args.root).await?;
    let root = tree.update(&root, &Path::of_hum(&args.path), &args.value).await?;
    Ok(Report::Root {
        root: tree.add(&root).await?.to_hex(),
    })
}

async fn cmd_get(session: &Session, args: PathArgs) -> anyhow::Result<Report> {
    let path = Path::of_hum(&args.path);
    let root = session.root(&args.root).await?;
    let value = session.tree().find(&root, &path).await?;
    Ok(Report::Value {
        path: path.to_hum(),
        value,
    })
}

async fn cmd_ls(session: &Session, args: PathArgs) -> anyhow::Result<Report> {
    let path = Path::of_hum(&args.path);
    let tree = session.tree();
    let root = session.root(&args.root).await?;
    let node = tree.sub_exn(&root, &path).await?;
    let mut children = Vec::new();
    for (step, child) in tree.succ(&node) {
        children.push(ChildEntry {
            step: step.to_string(),
            key: child.key().to_hex(),
            leaf: child.get().await?.contents().is_some(),
        });
    }
    Ok(Report::Children {
        path: path.to_hum(),
        contents: tree.contents(&node).await?,
        children,
    })
}

async fn cmd_rm(session: &Session, args: PathArgs) -> anyhow::Result<Report> {
    let tree = session.tree();
    let root = session.root(&args.root).await?;
    let root = tree.remove(&root, &Path::of_hum(&args.path)).await?;
    Ok(Report::Root {
        root: tree.add(&root).await?.to_hex(),
    })
}

async fn cmd_merge(session: &Session, args: MergeArgs) -> anyhow::Result<Report> {
    let ancestor = session.root(&args.ancestor).await?;
    let left = session.root(&args.left).await?;
    let right = session.root(&args.right).await?;
    let merger = NodeMerger::with_default(session.tree());
    Ok(match merger.merge(&ancestor, &left, &right).await? {
        MergeOutcome::Resolved(node) => Report::Root {
            root: node.key()?.to_hex(),
        },
        MergeOutcome::Conflict(conflicts) => Report::Conflicts { conflicts },
    })
}

async fn cmd_commit(session: &Session, args: CommitArgs) -> anyhow::Result<Report> {
    let tree = parse_key(&args.tree)?;
    let parents = args
        .parents
        .iter()
        .map(|p| parse_key(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let info = CommitInfo::new(author(args.author), args.message, now());
    let commit = session.history().commit(tree, parents, info).await?;
    Ok(Report::Commit {
        commit: commit.to_hex(),
    })
}

async fn cmd_merge_commits(session: &Session, args: MergeCommitsArgs) -> anyhow::Result<Report> {
    let left = parse_key(&args.left)?;
    let right = parse_key(&args.right)?;
    let message = args
        .message
        .unwrap_or_else(|| format!("Merge {} into {}", right.short_hex(), left.short_hex()));
    let info = CommitInfo::new(author(args.author), message, now());

    let merger = CommitMerger::new(session.history(), NodeMerger::with_default(session.tree()));
    Ok(match merger.merge(&left, &right, info).await? {
        MergeOutcome::Resolved(commit) => Report::Commit {
            commit: commit.to_hex(),
        },
        MergeOutcome::Conflict(conflicts) => Report::Conflicts { conflicts },
    })
}

async fn cmd_log(session: &Session, args: LogArgs) -> anyhow::Result<Report> {
    let start = parse_key(&args.commit)?;
    let history = session.history();
    let mut keys = vec![start];
    keys.extend(history.ancestors(&start).await?);
    keys.truncate(args.limit);

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let commit = history.read_exn(&key).await?;
        entries.push(LogEntry {
            commit: key.to_hex(),
            tree: commit.tree.to_hex(),
            parents: commit.parents.iter().map(Key::to_hex).collect(),
            author: commit.info.author,
            date: format_date(commit.info.date),
            message: commit.info.message,
        });
    }
    Ok(Report::Log {
        oneline: args.oneline,
        entries,
    })
}

async fn cmd_objects(session: &Session) -> anyhow::Result<Report> {
    let keys = session.blocks.list().await?;
    debug!(count = keys.len(), "listing objects");
    let mut objects = Vec::with_capacity(keys.len());
    for key in keys {
        let block = session.blocks.find(&key).await?;
        objects.push(ObjectEntry {
            key: key.to_hex(),
            kind: block.kind().to_string(),
        });
    }
    Ok(Report::Objects { objects })
}

fn format_date(seconds: u64) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|date| date.to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ChildEntry {
    pub step: String,
    pub key: String,
    pub leaf: bool,
}

#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub commit: String,
    pub tree: String,
    pub parents: Vec<String>,
    pub author: String,
    pub date: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ObjectEntry {
    pub key: String,
    pub kind: String,
}

/// What a command produced, rendered as text or JSON.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Root {
        root: String,
    },
    Value {
        path: String,
        value: Option<String>,
    },
    Children {
        path: String,
        contents: Option<String>,
        children: Vec<ChildEntry>,
    },
    Commit {
        commit: String,
    },
    Conflicts {
        conflicts: Vec<Conflict>,
    },
    Log {
        #[serde(skip)]
        oneline: bool,
        entries: Vec<LogEntry>,
    },
    Objects {
        objects: Vec<ObjectEntry>,
    },
}

impl Report {
    pub fn print(&self, format: OutputFormat) -> anyhow::Result<()> {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(self)?),
            OutputFormat::Text => self.print_text(),
        }
        Ok(())
    }

    fn print_text(&self) {
        match self {
            Report::Root { root } | Report::Commit { commit: root } => println!("{}", root.yellow()),
            Report::Value { path, value } => match value {
                Some(value) => println!("{value}"),
                None => eprintln!("{} nothing at {}", "!".red().bold(), path.bold()),
            },
            Report::Children {
                contents, children, ..
            } => {
                if let Some(contents) = contents {
                    println!("{} {}", "=".dimmed(), contents);
                }
                for child in children {
                    let name = if child.leaf {
                        child.step.normal()
                    } else {
                        format!("{}/", child.step).blue().bold()
                    };
                    println!("{}  {}", child.key[..12].dimmed(), name);
                }
            }
            Report::Conflicts { conflicts } => {
                println!("{} {} conflict(s)", "✗".red().bold(), conflicts.len());
                for conflict in conflicts {
                    println!("  {}", conflict.path.to_hum().bold());
                    println!("    ancestor: {}", side(&conflict.ancestor));
                    println!("    left:     {}", side(&conflict.left).green());
                    println!("    right:    {}", side(&conflict.right).cyan());
                }
            }
            Report::Log { oneline, entries } => {
                for entry in entries {
                    if *oneline {
                        println!("{} {}", entry.commit[..12].yellow(), entry.message);
                        continue;
                    }
                    println!("{} {}", "commit".yellow(), entry.commit.yellow().bold());
                    if entry.parents.len() > 1 {
                        let parents: Vec<&str> = entry.parents.iter().map(|p| &p[..12]).collect();
                        println!("Merge:  {}", parents.join(" "));
                    }
                    println!("Author: {}", entry.author);
                    println!("Date:   {}", entry.date);
                    println!("Tree:   {}", entry.tree.dimmed());
                    println!("\n    {}\n", entry.message);
                }
            }
            Report::Objects { objects } => {
                for object in objects {
                    println!("{}  {}", object.key, object.kind.cyan());
                }
            }
        }
    }
}

fn side(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<absent>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    fn session() -> Session {
        Session::open(&StoreConfig::in_memory())
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["arbor"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    async fn run(session: &Session, args: &[&str]) -> Report {
        execute(session, parse(args)).await.unwrap()
    }

    async fn root_of(session: &Session, args: &[&str]) -> String {
        match run(session, args).await {
            Report::Root { root } => root,
            other => panic!("expected a root, got {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn put_get_and_rm() {
        let s = session();
        let r1 = root_of(&s, &["put", "empty", "/a/b", "x"]).await;
        match run(&s, &["get", &r1, "/a/b"]).await {
            Report::Value { value, .. } => assert_eq!(value.as_deref(), Some("x")),
            other => panic!("unexpected {other:?}"),
        }

        let r2 = root_of(&s, &["rm", &r1, "/a/b"]).await;
        match run(&s, &["get", &r2, "/a/b"]).await {
            Report::Value { value, .. } => assert_eq!(value, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn ls_lists_children() {
        let s = session();
        let r1 = root_of(&s, &["put", "empty", "/dir/file", "1"]).await;
        let r2 = root_of(&s, &["put", &r1, "/top", "2"]).await;
        match run(&s, &["ls", &r2]).await {
            Report::Children { children, .. } => {
                let steps: Vec<(&str, bool)> =
                    children.iter().map(|c| (c.step.as_str(), c.leaf)).collect();
                assert_eq!(steps, vec![("dir", false), ("top", true)]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn merge_reports_conflicts() {
        let s = session();
        let base = root_of(&s, &["put", "empty", "/f", "A"]).await;
        let left = root_of(&s, &["put", &base, "/f", "B"]).await;
        let right = root_of(&s, &["put", &base, "/f", "C"]).await;

        match run(&s, &["merge", &base, &left, &right]).await {
            Report::Conflicts { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].path.to_hum(), "/f");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn commits_merge_and_log() {
        let s = session();
        let base_tree = root_of(&s, &["put", "empty", "/a", "1"]).await;
        let Report::Commit { commit: base } = run(&s, &["commit", &base_tree, "-m", "base"]).await
        else {
            panic!("expected a commit");
        };

        let left_tree = root_of(&s, &["put", &base_tree, "/l", "L"]).await;
        let right_tree = root_of(&s, &["put", &base_tree, "/r", "R"]).await;
        let Report::Commit { commit: left } =
            run(&s, &["commit", &left_tree, "-p", &base, "-m", "left"]).await
        else {
            panic!("expected a commit");
        };
        let Report::Commit { commit: right } =
            run(&s, &["commit", &right_tree, "-p", &base, "-m", "right"]).await
        else {
            panic!("expected a commit");
        };

        let Report::Commit { commit: merged } = run(&s, &["merge-commits", &left, &right]).await
        else {
            panic!("expected a merge commit");
        };

        match run(&s, &["log", &merged]).await {
            Report::Log { entries, .. } => {
                assert_eq!(entries.len(), 4);
                assert_eq!(entries[0].commit, merged);
                assert_eq!(entries[0].parents.len(), 2);
                assert_eq!(entries[3].message, "base");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn objects_lists_every_kind() {
        let s = session();
        let tree = root_of(&s, &["put", "empty", "/k", "v"]).await;
        run(&s, &["commit", &tree]).await;
        match run(&s, &["objects"]).await {
            Report::Objects { objects } => {
                let mut kinds: Vec<&str> = objects.iter().map(|o| o.kind.as_str()).collect();
                kinds.sort_unstable();
                kinds.dedup();
                assert_eq!(kinds, vec!["commit", "contents", "node"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_keys_are_rejected() {
        let s = session();
        assert!(execute(&s, parse(&["get", "not-hex", "/"])).await.is_err());
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbor.toml");
        std::fs::write(&path, "verify_reads = false\n[backend]\nkind = \"memory\"\n").unwrap();
        let config = load_config(Some(path.as_path())).unwrap();
        assert!(!config.verify_reads);
        assert!(load_config(Some(dir.path().join("missing.toml").as_path())).is_err());
    }
}
