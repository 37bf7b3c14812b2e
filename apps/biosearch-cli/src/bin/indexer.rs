use biosearch_cli::{ingest, init_logging};
use biosearch_core::config::Config;
use biosearch_index::PaperIndex;
use std::env;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <papers.csv>", args[0]);
        eprintln!("Example: {} data/papers.csv", args[0]);
        std::process::exit(1);
    }
    let csv_path = PathBuf::from(&args[1]);
    let config = Config::load()?;

    let documents = ingest::load_csv(&csv_path)?;
    println!(
        "📄 Loaded {} papers from {}",
        documents.len(),
        csv_path.display()
    );

    let index = PaperIndex::create(&config.index, &config.recency, &config.search)?;
    let indexed = index.add_documents(&documents)?;
    println!("✅ Indexed {} papers into {}", indexed, config.index.dir);
    Ok(())
}
