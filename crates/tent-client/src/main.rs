//! `tent`: discover entities, fetch posts, and compute version ids.

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tent_client::{ClientConfig, HttpTransport, discover, get_post_url};
use tent_core::{MetaPost, Post};

#[derive(Parser)]
#[command(name = "tent")]
#[command(about = "Tent protocol client", long_about = None)]
#[command(version)]
struct Cli {
    /// Request timeout in seconds (overrides TENT_TIMEOUT_SECS)
    #[arg(short, long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find an entity's meta post and list its servers
    Discover {
        /// Entity URI
        entity: String,
    },

    /// Fetch a post by URL and check its version id
    Post {
        url: String,
    },

    /// Compute the version id of a post read from a JSON file ("-" for stdin)
    Hash {
        file: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    match cli.command {
        Commands::Discover { entity } => {
            let transport = HttpTransport::new(&config);
            let meta = discover(&transport, &entity)?;
            print!("{}", discovery_report(&entity, meta.as_ref()));
        }
        Commands::Post { url } => {
            let transport = HttpTransport::new(&config);
            let envelope = get_post_url(&transport, &url)?;
            let Some(post) = envelope.post else {
                bail!("{url} returned no post");
            };
            println!("{}", serde_json::to_string_pretty(&post)?);
            let computed = post.calculate_version()?;
            match post.version.as_ref().map(|v| v.id.as_str()) {
                Some(stored) if stored == computed.to_hex() => println!("version {computed} (verified)"),
                Some(stored) => println!("version {computed} (server says {stored})"),
                None => println!("version {computed}"),
            }
        }
        Commands::Hash { file } => {
            let mut json = String::new();
            if file == "-" {
                std::io::stdin().read_to_string(&mut json)?;
            } else {
                json = std::fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;
            }
            let post: Post = serde_json::from_str(&json).context("parsing post")?;
            println!("{}", post.calculate_version()?);
        }
    }
    Ok(())
}

/// What `discover` prints. Finding no meta post is a normal outcome.
fn discovery_report(entity: &str, meta: Option<&MetaPost>) -> String {
    let Some(meta) = meta else {
        return format!("no meta post found for {entity}\n");
    };
    let mut out = format!("entity: {}\n", meta.entity);
    if !meta.profile.name.is_empty() {
        out.push_str(&format!("name:   {}\n", meta.profile.name));
    }
    for (i, server) in meta.servers.iter().enumerate() {
        out.push_str(&format!(
            "server {}: version={} preference={} post={}\n",
            i + 1,
            server.version,
            server.preference,
            server.urls.post
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_meta_post_is_reported_not_raised() {
        assert_eq!(
            discovery_report("https://alice.example/", None),
            "no meta post found for https://alice.example/\n"
        );
    }

    #[test]
    fn report_lists_servers_in_order() {
        let meta: MetaPost = serde_json::from_str(
            r#"{"entity":"https://alice.example/","profile":{"name":"Alice"},"servers":[
                {"version":"0.3","preference":0,"urls":{"post":"https://s1.example/{entity}/{post}"}},
                {"version":"0.3","preference":1,"urls":{"post":"https://s2.example/{entity}/{post}"}}]}"#,
        )
        .unwrap();
        let report = discovery_report("https://alice.example/", Some(&meta));
        assert_eq!(
            report,
            "entity: https://alice.example/\nname:   Alice\n\
             server 1: version=0.3 preference=0 post=https://s1.example/{entity}/{post}\n\
             server 2: version=0.3 preference=1 post=https://s2.example/{entity}/{post}\n"
        );
    }
}
