use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use nd_cache::{NewsCache, NewsService, RefreshConfig, RefreshScheduler};
use nd_core::{ArticleRef, ArticleStore, Category, NewsPreferences, Page, UserArticle, UserNewsStore};
use nd_newsapi::NewsApiClient;
use nd_storage::{MemoryPreferences, MemoryStore, SqliteStore};
use tracing::{info, Level};

/// Durations like "90s", "15m", "2h" or a bare number of seconds.
#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let seconds = match c {
                    's' => Some(num),
                    'm' => num.checked_mul(60),
                    'h' => num.checked_mul(3600),
                    'd' => num.checked_mul(86400),
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = seconds
                    .and_then(|n| total_seconds.checked_add(n))
                    .ok_or_else(|| "Duration is too large".to_string())?;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        if !current_number.is_empty() {
            if let Ok(num) = current_number.parse::<u64>() {
                total_seconds = total_seconds
                    .checked_add(num)
                    .ok_or_else(|| "Duration is too large".to_string())?;
                has_unit = true;
            } else {
                return Err("Invalid number in duration".to_string());
            }
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser)]
#[command(name = "newsdesk", about = "Cached news aggregation backend")]
struct Cli {
    /// SQLite database path; omitted means an in-memory store for this run
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch top headlines for one preference combination
    Fetch {
        #[arg(long, value_enum, default_value_t)]
        category: Category,
        #[arg(long, default_value = "us")]
        country: String,
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Search cached and live articles by keyword
    Search {
        query: String,
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Run the background cache refresher
    Refresh {
        /// JSON file with an array of user preference records
        #[arg(long)]
        preferences: PathBuf,
        /// Refresh period
        #[arg(long, default_value = "15m")]
        interval: HumanDuration,
        /// Delay between upstream calls within one tick
        #[arg(long, default_value = "1s")]
        pacing: HumanDuration,
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },
    /// Delete expired cache entries now
    Sweep,
    /// Mark an article read for a user
    MarkRead {
        #[arg(long)]
        user: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Set or clear an article's favorite flag for a user
    Favorite {
        #[arg(long)]
        user: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        remove: bool,
    },
    /// List a user's read or favorited articles
    List {
        #[arg(long)]
        user: String,
        #[arg(long)]
        favorites: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
}

async fn open_stores(
    db: Option<&Path>,
) -> anyhow::Result<(Arc<dyn ArticleStore>, Arc<dyn UserNewsStore>)> {
    match db {
        Some(path) => {
            let store = Arc::new(SqliteStore::open(path).await?);
            info!("🏦 using SQLite store at {}", path.display());
            Ok((store.clone(), store))
        }
        None => {
            let store = Arc::new(MemoryStore::new());
            Ok((store.clone(), store))
        }
    }
}

async fn build_service(db: Option<&Path>) -> anyhow::Result<NewsService> {
    let (articles, _) = open_stores(db).await?;
    let source = Arc::new(NewsApiClient::from_env()?);
    Ok(NewsService::new(articles, source))
}

fn print_page(page: &Page<UserArticle>) {
    for item in &page.items {
        println!(
            "- {} [{}]",
            item.title.as_deref().unwrap_or("<untitled>"),
            item.url
        );
    }
    println!(
        "page {} ({} per page), {} total",
        page.page, page.per_page, page.total
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch {
            category,
            country,
            language,
        } => {
            let service = build_service(cli.db.as_deref()).await?;
            let prefs = NewsPreferences {
                categories: vec![category],
                country: Some(country),
                language: Some(language),
            };
            let response = service.fetch_news(&prefs).await?;
            println!(
                "{} articles for {} ({})",
                response.articles.len(),
                response.partition,
                if response.from_cache { "cached" } else { "fresh" }
            );
            for article in &response.articles {
                println!("- {} [{}]", article.title, article.url);
            }
        }
        Commands::Search { query, language } => {
            let service = build_service(cli.db.as_deref()).await?;
            let response = service.search_news(&query, Some(&language)).await?;
            println!(
                "{} results for {:?} ({})",
                response.articles.len(),
                response.query,
                if response.from_cache { "cached" } else { "fresh" }
            );
            for article in &response.articles {
                println!("- {} [{}]", article.title, article.url);
            }
        }
        Commands::Refresh {
            preferences,
            interval,
            pacing,
            once,
        } => {
            let service = Arc::new(build_service(cli.db.as_deref()).await?);
            let records = Arc::new(MemoryPreferences::from_file(&preferences)?);
            let scheduler = RefreshScheduler::with_config(
                service,
                records,
                RefreshConfig {
                    period: interval.0,
                    pacing: pacing.0,
                },
            );

            if once {
                match scheduler.run_once().await {
                    Some(summary) => println!(
                        "refreshed {} of {} partitions ({} failed), swept {} expired entries",
                        summary.refreshed, summary.partitions, summary.failed, summary.swept
                    ),
                    None => println!("a refresh was already in progress"),
                }
            } else {
                scheduler.start();
                tokio::signal::ctrl_c().await?;
                scheduler.stop();
            }
        }
        Commands::Sweep => {
            let (articles, _) = open_stores(cli.db.as_deref()).await?;
            let removed = NewsCache::new(articles).clear_expired().await?;
            println!("removed {} expired entries", removed);
        }
        Commands::MarkRead {
            user,
            url,
            title,
            source,
        } => {
            let (_, user_news) = open_stores(cli.db.as_deref()).await?;
            let record = user_news
                .mark_read(
                    &user,
                    &ArticleRef {
                        url,
                        title,
                        source,
                        image_url: None,
                    },
                )
                .await?;
            println!("marked read: {}", record.url);
        }
        Commands::Favorite {
            user,
            url,
            title,
            remove,
        } => {
            let (_, user_news) = open_stores(cli.db.as_deref()).await?;
            let record = user_news
                .set_favorite(
                    &user,
                    &ArticleRef {
                        url,
                        title,
                        source: None,
                        image_url: None,
                    },
                    !remove,
                )
                .await?;
            println!(
                "{}: {}",
                if record.is_favorite { "favorited" } else { "unfavorited" },
                record.url
            );
        }
        Commands::List {
            user,
            favorites,
            page,
            per_page,
        } => {
            let (_, user_news) = open_stores(cli.db.as_deref()).await?;
            let listing = if favorites {
                user_news.list_favorites(&user, page, per_page).await?
            } else {
                user_news.list_read(&user, page, per_page).await?
            };
            print_page(&listing);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_human_durations() {
        assert_eq!("90s".parse::<HumanDuration>().unwrap().0.as_secs(), 90);
        assert_eq!("15m".parse::<HumanDuration>().unwrap().0.as_secs(), 900);
        assert_eq!("1h30m".parse::<HumanDuration>().unwrap().0.as_secs(), 5400);
        assert_eq!("45".parse::<HumanDuration>().unwrap().0.as_secs(), 45);
        assert!("abc".parse::<HumanDuration>().is_err());
        assert!("10w".parse::<HumanDuration>().is_err());
        assert!("999999999999999999d".parse::<HumanDuration>().is_err());
    }
}
