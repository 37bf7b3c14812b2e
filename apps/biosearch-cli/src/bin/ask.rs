use biosearch_cli::init_logging;
use biosearch_core::config::Config;
use biosearch_index::PaperIndex;
use biosearch_rag::AnswerEngine;
use biosearch_retrieval::RetrievalGateway;
use std::env;

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <question> [--style keypoints|abstract|methods|results|conclusion]", args[0]);
        eprintln!(
            "Example: {} \"How does microgravity affect bone density in mice?\"",
            args[0]
        );
        std::process::exit(1);
    }
    let mut style = None;
    let mut words = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        if arg == "--style" {
            style = iter.next().cloned();
        } else {
            words.push(arg.as_str());
        }
    }
    let question = words.join(" ");

    let config = Config::load()?;
    let index = PaperIndex::open(&config.index, &config.recency, &config.search)?;
    let gateway = RetrievalGateway::new(index, config.search.clone());
    let engine = AnswerEngine::from_config(gateway, &config);

    let answer = engine.answer(&question, style.as_deref());
    println!("{}", answer.text);

    if !answer.citations.is_empty() {
        println!("\nSources:");
        for citation in &answer.citations {
            let year = citation
                .year
                .map_or_else(|| "n.d.".to_string(), |y| y.to_string());
            println!("  [{}] {} ({})", citation.index, citation.title, year);
            if !citation.url.is_empty() {
                println!("      {}", citation.url);
            }
        }
    }
    Ok(())
}
